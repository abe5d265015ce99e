//! # toolmesh agent
//!
//! The client side of toolmesh:
//!
//! - [`ToolAggregator`] lists several tool endpoints in parallel and merges
//!   them into one [`AggregatedCatalog`]. A name offered twice is a
//!   configuration error; an endpoint that does not answer is left out.
//! - [`ReasoningLoop`] alternates between a [`DecisionOracle`] and tool
//!   dispatch until the oracle answers, the round cap is hit, or the caller
//!   cancels.
//! - [`Gateway`] wraps one loop run per query, in-process or over HTTP.
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolmesh_agent::{AgentConfig, ChatCompletionsOracle, Gateway, ReasoningLoop, ToolAggregator};
//!
//! # async fn example() -> toolmesh_agent::AgentResult<()> {
//! let config = AgentConfig::from_file("toolmesh.yaml")?;
//! let aggregator = ToolAggregator::connect(config.servers.clone(), config.aggregator_config()).await?;
//! let oracle = ChatCompletionsOracle::new(config.oracle_config()?)?;
//! let reasoning = ReasoningLoop::new(Arc::new(aggregator), Arc::new(oracle))
//!     .with_config(config.loop_config());
//!
//! let answer = Gateway::new(Arc::new(reasoning)).invoke("what's (3 + 5) x 12?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod catalog;
pub mod chat_completions;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod oracle;
pub mod reasoning;
pub mod transport;

pub use aggregator::{AggregatorConfig, ToolAggregator};
pub use catalog::{AggregatedCatalog, CatalogEntry, UnavailableEndpoint};
pub use chat_completions::{ChatCompletionsOracle, OracleConfig};
pub use config::AgentConfig;
pub use conversation::{Conversation, Message, MessageBody, Role};
pub use error::{AgentError, AgentResult};
pub use gateway::{Gateway, InvokeRequest, InvokeResponse};
pub use oracle::{Decision, DecisionOracle, ToolIntent};
pub use reasoning::{LoopConfig, LoopState, ReasoningLoop, RunError, RunOptions, RunOutcome};
pub use transport::{HttpToolTransport, ToolTransport};
