//! Tool registries for tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use toolmesh_core::{Arguments, ContentItem, ParamSpec, ParamType, ToolDescriptor, ToolResult};
use toolmesh_tools::standard::{math, weather};
use toolmesh_tools::{ToolHandler, ToolRegistry};

/// The four arithmetic tools.
pub fn math_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    if let Err(e) = math::register(&mut registry) {
        panic!("math tools failed to register: {e}");
    }
    Arc::new(registry)
}

/// `get_weather` over the bundled sample locations.
pub fn weather_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let provider = Arc::new(weather::StaticWeatherProvider::with_sample_data());
    if let Err(e) = weather::register(&mut registry, provider) {
        panic!("weather tool failed to register: {e}");
    }
    Arc::new(registry)
}

/// Tool that sleeps before answering, counting calls that started.
#[derive(Debug, Clone)]
pub struct DelayTool {
    delay: Duration,
    started: Arc<AtomicUsize>,
}

impl DelayTool {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, "Wait, then echo the optional text argument.").with_param(
            ParamSpec::optional("text", ParamType::String, "Text to echo"),
        )
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Registry holding only this tool under `name`.
    pub fn registry(&self, name: &str) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        if let Err(e) = registry.register(Self::descriptor(name), Arc::new(self.clone())) {
            panic!("delay tool failed to register: {e}");
        }
        Arc::new(registry)
    }
}

#[async_trait]
impl ToolHandler for DelayTool {
    async fn call(&self, arguments: &Arguments) -> ToolResult<Vec<ContentItem>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let text = arguments.get("text").and_then(|v| v.as_str()).unwrap_or("done");
        Ok(vec![ContentItem::text(text)])
    }
}
