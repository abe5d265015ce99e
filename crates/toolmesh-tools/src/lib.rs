//! # toolmesh Tools
//!
//! Server-side tool machinery: a [`ToolRegistry`] holding descriptors and
//! handlers, a stateless [`Dispatcher`] that validates and executes one call at
//! a time, and the built-in tool sets in [`standard`].
//!
//! ```rust
//! use std::sync::Arc;
//! use toolmesh_core::ToolCallRequest;
//! use toolmesh_tools::{Dispatcher, ToolRegistry, standard::math};
//!
//! # tokio_test_block(async {
//! let mut registry = ToolRegistry::new();
//! math::register(&mut registry).unwrap();
//!
//! let dispatcher = Dispatcher::new(Arc::new(registry));
//! let request = ToolCallRequest::new("add").with_argument("a", 3).with_argument("b", 5);
//! let result = dispatcher.dispatch(&request).await;
//! assert_eq!(result.to_text(), "8");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod dispatcher;
pub mod registry;
pub mod standard;
pub mod validation;

pub use dispatcher::{DEFAULT_CALL_TIMEOUT, Dispatcher};
pub use registry::{FnHandler, RegisteredTool, ToolHandler, ToolRegistry, handler_fn};
pub use validation::validate_arguments;

pub use toolmesh_core::{
    Arguments, ContentItem, FailureReason, ParamSpec, ParamType, RegistryError, ToolCallRequest,
    ToolCallResult, ToolDescriptor, ToolError, ToolResult,
};
