//! Static agent routing table.
//!
//! The table is read once at startup from a JSON routing file and never
//! changes afterwards. Loading fails soft: a missing or malformed file yields
//! an empty table, so forward mode answers `routing-missing` instead of the
//! process refusing to start.

use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Attach the static service token on forward.
    Header,
    #[default]
    #[serde(other)]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub id: String,
    pub url: String,
    #[serde(default, rename = "auth")]
    pub auth_mode: AuthMode,
}

/// Both layouts seen in routing files: a bare list, or `{ "routes": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RoutingFile {
    List(Vec<Route>),
    Wrapped { routes: Vec<Route> },
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads and parses the routing file. Never fails: errors are logged and
    /// produce an empty table.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(table) => {
                tracing::info!(
                    "Loaded {} route(s) from {}",
                    table.len(),
                    path.display()
                );
                table
            }
            Err(e) => {
                tracing::warn!(
                    "Routing file {} unusable, starting with an empty route table: {}",
                    path.display(),
                    e.inner
                );
                Self::empty()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let records = match serde_json::from_str::<RoutingFile>(content)? {
            RoutingFile::List(routes) => routes,
            RoutingFile::Wrapped { routes } => routes,
        };
        Ok(Self::from_routes(records))
    }

    /// Builds a table keyed by id; a later record replaces an earlier one.
    pub fn from_routes(records: impl IntoIterator<Item = Route>) -> Self {
        let mut routes = HashMap::new();
        for route in records {
            if let Some(previous) = routes.insert(route.id.clone(), route) {
                tracing::warn!(
                    "Duplicate route id '{}' in routing file, keeping the last entry",
                    previous.id
                );
            }
        }
        Self { routes }
    }

    /// Case-sensitive lookup.
    pub fn resolve(&self, agent_id: &str) -> Option<&Route> {
        self.routes.get(agent_id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Configured ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.routes.keys().cloned().collect();
        ids.sort();
        ids
    }
}
