//! Weather lookup tool: `get_weather(location)`.
//!
//! Lookups go through the [`WeatherProvider`] trait so a real backend can be
//! plugged in; [`StaticWeatherProvider`] serves a fixed table of cities and
//! countries and is what the bundled weather server uses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use toolmesh_core::{
    Arguments, ContentItem, ParamSpec, ParamType, RegistryError, ToolDescriptor, ToolError,
    ToolResult,
};

use crate::registry::{ToolHandler, ToolRegistry};

pub const TOOL_NAME: &str = "get_weather";

/// Current conditions at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub condition: String,
    pub temperature_c: f64,
    pub humidity_pct: u8,
}

impl WeatherReport {
    pub fn new(
        location: impl Into<String>,
        condition: impl Into<String>,
        temperature_c: f64,
        humidity_pct: u8,
    ) -> Self {
        Self {
            location: location.into(),
            condition: condition.into(),
            temperature_c,
            humidity_pct,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {}, {}°C, humidity {}%",
            self.location, self.condition, self.temperature_c, self.humidity_pct
        )
    }
}

/// Source of weather data.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions, `Ok(None)` when the location is unknown.
    async fn current(&self, location: &str) -> ToolResult<Option<WeatherReport>>;
}

/// Fixed in-memory weather table. Lookups ignore case, spaces and hyphens,
/// so "VietNam", "viet nam" and "Viet-Nam" all match.
#[derive(Debug, Clone, Default)]
pub struct StaticWeatherProvider {
    reports: HashMap<String, WeatherReport>,
}

impl StaticWeatherProvider {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the bundled sample locations.
    pub fn with_sample_data() -> Self {
        [
            WeatherReport::new("Vietnam", "Sunny", 31.0, 74),
            WeatherReport::new("Hanoi", "Partly cloudy", 29.0, 78),
            WeatherReport::new("Ho Chi Minh City", "Thunderstorms", 32.0, 83),
            WeatherReport::new("London", "Light rain", 12.0, 81),
            WeatherReport::new("New York", "Clear", 18.0, 55),
            WeatherReport::new("New York City", "Clear", 18.0, 55),
            WeatherReport::new("Tokyo", "Cloudy", 21.0, 64),
            WeatherReport::new("Paris", "Overcast", 15.0, 70),
            WeatherReport::new("Sydney", "Sunny", 24.0, 58),
        ]
        .into_iter()
        .fold(Self::new(), Self::with_report)
    }

    pub fn with_report(mut self, report: WeatherReport) -> Self {
        self.reports.insert(normalize(&report.location), report);
        self
    }
}

#[async_trait]
impl WeatherProvider for StaticWeatherProvider {
    async fn current(&self, location: &str) -> ToolResult<Option<WeatherReport>> {
        Ok(self.reports.get(&normalize(location)).cloned())
    }
}

fn normalize(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Handler for `get_weather`.
pub struct WeatherTool {
    provider: Arc<dyn WeatherProvider>,
}

impl WeatherTool {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            TOOL_NAME,
            "Get the current weather for a location (city or country).",
        )
        .with_param(ParamSpec::required(
            "location",
            ParamType::String,
            "The city or country to get the weather for.",
        ))
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    async fn call(&self, arguments: &Arguments) -> ToolResult<Vec<ContentItem>> {
        let location = arguments
            .get("location")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if location.is_empty() {
            return Err(ToolError::invalid_argument("location", "location is empty"));
        }

        match self.provider.current(location).await? {
            Some(report) => Ok(vec![ContentItem::text(report.summary())]),
            None => Err(ToolError::NotFound(format!("weather for '{}'", location))),
        }
    }
}

/// Register `get_weather` backed by `provider`.
pub fn register(
    registry: &mut ToolRegistry,
    provider: Arc<dyn WeatherProvider>,
) -> Result<(), RegistryError> {
    registry.register(WeatherTool::descriptor(), Arc::new(WeatherTool::new(provider)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dispatcher;
    use rstest::rstest;
    use toolmesh_core::{FailureReason, ToolCallRequest};

    fn dispatcher() -> Dispatcher {
        let mut registry = ToolRegistry::new();
        register(&mut registry, Arc::new(StaticWeatherProvider::with_sample_data())).unwrap();
        Dispatcher::new(Arc::new(registry))
    }

    #[rstest]
    #[case("VietNam")]
    #[case("viet nam")]
    #[case("  Vietnam ")]
    #[tokio::test]
    async fn test_known_location(#[case] location: &str) {
        let result = dispatcher()
            .dispatch(&ToolCallRequest::new(TOOL_NAME).with_argument("location", location))
            .await;
        assert!(result.is_success());
        assert_eq!(result.to_text(), "Vietnam: Sunny, 31°C, humidity 74%");
    }

    #[rstest]
    #[case("New York")]
    #[case("New York City")]
    #[case("new-york-city")]
    #[tokio::test]
    async fn test_new_york_spellings(#[case] location: &str) {
        let result = dispatcher()
            .dispatch(&ToolCallRequest::new(TOOL_NAME).with_argument("location", location))
            .await;
        assert!(result.is_success());
        assert!(result.to_text().contains("Clear, 18°C"));
    }

    #[tokio::test]
    async fn test_unknown_location_is_not_found() {
        let result = dispatcher()
            .dispatch(&ToolCallRequest::new(TOOL_NAME).with_argument("location", "Atlantis"))
            .await;
        assert_eq!(
            result.failure_reason(),
            Some(&FailureReason::NotFound {
                resource: "weather for 'Atlantis'".into()
            })
        );
    }

    #[tokio::test]
    async fn test_blank_location_is_invalid() {
        let result = dispatcher()
            .dispatch(&ToolCallRequest::new(TOOL_NAME).with_argument("location", "   "))
            .await;
        assert_eq!(
            result.failure_reason().map(|r| r.code()),
            Some("invalid_argument")
        );
    }

    #[tokio::test]
    async fn test_custom_report() {
        let provider = StaticWeatherProvider::new()
            .with_report(WeatherReport::new("Reykjavik", "Snow", -3.5, 90));
        let report = provider.current("REYKJAVIK").await.unwrap().unwrap();
        assert_eq!(report.summary(), "Reykjavik: Snow, -3.5°C, humidity 90%");
    }
}
