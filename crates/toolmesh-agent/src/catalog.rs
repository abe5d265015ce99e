//! Merged view over the catalogs of several tool endpoints.

use std::collections::HashMap;
use toolmesh_core::{EndpointId, ToolDescriptor};

use crate::error::{AgentError, AgentResult};

/// One tool and the endpoint that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub endpoint: EndpointId,
    pub descriptor: ToolDescriptor,
}

/// An endpoint that could not be listed and why.
#[derive(Debug, Clone, PartialEq)]
pub struct UnavailableEndpoint {
    pub endpoint: EndpointId,
    pub reason: String,
}

/// Immutable snapshot: tool name to (owning endpoint, descriptor).
///
/// Entries keep endpoint configuration order, then each endpoint's own
/// listing order. Names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    available: Vec<EndpointId>,
    unavailable: Vec<UnavailableEndpoint>,
}

impl AggregatedCatalog {
    /// Merge per-endpoint listings, given in configuration order.
    ///
    /// A failed listing marks its endpoint unavailable. Fails on a name
    /// offered twice, on an empty endpoint set, or when every listing failed.
    pub fn merge<I>(listings: I) -> AgentResult<Self>
    where
        I: IntoIterator<Item = (EndpointId, Result<Vec<ToolDescriptor>, String>)>,
    {
        let mut catalog = Self::default();
        let mut seen_endpoints = 0;

        for (endpoint, listing) in listings {
            seen_endpoints += 1;
            match listing {
                Ok(tools) => {
                    for descriptor in tools {
                        catalog.insert(endpoint.clone(), descriptor)?;
                    }
                    catalog.available.push(endpoint);
                }
                Err(reason) => catalog.unavailable.push(UnavailableEndpoint { endpoint, reason }),
            }
        }

        if seen_endpoints == 0 {
            return Err(AgentError::NoEndpointsConfigured);
        }
        if catalog.available.is_empty() {
            return Err(AgentError::NoEndpointsAvailable {
                unreachable: catalog.unavailable.len(),
            });
        }
        Ok(catalog)
    }

    fn insert(&mut self, endpoint: EndpointId, descriptor: ToolDescriptor) -> AgentResult<()> {
        if let Some(&existing) = self.index.get(&descriptor.name) {
            return Err(AgentError::DuplicateTool {
                name: descriptor.name,
                first: self.entries[existing].endpoint.name.clone(),
                second: endpoint.name,
            });
        }
        self.index
            .insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(CatalogEntry {
            endpoint,
            descriptor,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Endpoint that owns `name`.
    pub fn owner(&self, name: &str) -> Option<&EndpointId> {
        self.get(name).map(|entry| &entry.endpoint)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Descriptors in catalog order, as handed to the decision oracle.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.descriptor.name.as_str()).collect()
    }

    pub fn available_endpoints(&self) -> &[EndpointId] {
        &self.available
    }

    pub fn unavailable_endpoints(&self) -> &[UnavailableEndpoint] {
        &self.unavailable
    }

    /// True when at least one endpoint could not be listed.
    pub fn is_partial(&self) -> bool {
        !self.unavailable.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
