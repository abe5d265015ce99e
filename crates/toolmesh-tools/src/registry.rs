//! Tool registry: descriptors plus executable handlers.
//!
//! The registry is built once at startup and then shared read-only (behind an
//! `Arc`) by every request task. Registration order is preserved so that
//! `list_tools` is stable across calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use toolmesh_core::{Arguments, ContentItem, RegistryError, ToolDescriptor, ToolResult};

/// Executable body of a tool.
///
/// Handlers receive arguments that already passed schema validation: every
/// required parameter is present and every supplied one has the declared type.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &Arguments) -> ToolResult<Vec<ContentItem>>;
}

/// Adapter turning a synchronous closure into a [`ToolHandler`].
pub struct FnHandler<F>(pub F);

/// Wrap a synchronous closure as a shared handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(&Arguments) -> ToolResult<Vec<ContentItem>> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(&Arguments) -> ToolResult<Vec<ContentItem>> + Send + Sync,
{
    async fn call(&self, arguments: &Arguments) -> ToolResult<Vec<ContentItem>> {
        (self.0)(arguments)
    }
}

/// A descriptor paired with its handler.
#[derive(Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Catalog of tools available on one server.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// Fails on a duplicate name, an invalid name, or a descriptor that
    /// declares the same parameter twice. A failed registration leaves the
    /// registry unchanged.
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        descriptor.validate()?;
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }

        tracing::debug!(tool = %descriptor.name, params = descriptor.parameters.len(), "Registered tool");
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor,
            handler,
        });
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(
        mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, RegistryError> {
        self.register(descriptor, handler)?;
        Ok(self)
    }

    /// Full descriptor set in registration order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.descriptor.name.as_str()).collect()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}
