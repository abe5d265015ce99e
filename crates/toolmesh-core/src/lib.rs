//! # toolmesh Core
//!
//! Core types shared by every toolmesh crate: the tool server side (registry,
//! dispatcher, transport endpoint) and the client side (aggregator, reasoning
//! loop) speak in terms of the types defined here.
//!
//! - [`ToolDescriptor`] / [`ParamSpec`]: what a tool is called and what it accepts
//! - [`ToolCallRequest`]: one invocation, built fresh per call
//! - [`ToolCallResult`]: either `Success` with content items or `Failure` with a
//!   structured [`FailureReason`]
//! - [`EndpointId`]: where a tool server lives and how to reach it

pub mod call;
pub mod endpoint;
pub mod error;
pub mod tool;

pub use call::{Arguments, ContentItem, FailureReason, ResourceRef, ToolCallRequest, ToolCallResult};
pub use endpoint::{EndpointId, TransportKind};
pub use error::{RegistryError, ToolError, ToolResult};
pub use tool::{MAX_TOOL_NAME_LEN, ParamSpec, ParamType, ToolDescriptor, validate_tool_name};
