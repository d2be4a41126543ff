//! Route table persistence.
//!
//! The table is stored as `{"routes":[…]}` under the user's config
//! directory. Loading is forgiving: unknown fields are ignored and malformed
//! entries are skipped so one bad record cannot take the bridge down.

use super::MidiRoute;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Serialize, Deserialize, Default)]
struct RouteFile {
    #[serde(default)]
    routes: Vec<serde_json::Value>,
}

/// Reads and writes the routes file.
pub struct RouteStore {
    path: PathBuf,
}

impl RouteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The platform default: `<config dir>/audiocontrol.org/midi-server/routes.json`.
    pub fn at_default_path() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(
            base.join("audiocontrol.org")
                .join("midi-server")
                .join("routes.json"),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted routes, skipping entries that fail to parse or
    /// have empty ids. A missing file is an empty table.
    pub fn load(&self) -> Vec<MidiRoute> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => {
                info!("No routes file at {}", self.path.display());
                return Vec::new();
            }
        };
        let file: RouteFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to parse {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        let mut routes = Vec::new();
        for value in file.routes {
            match serde_json::from_value::<MidiRoute>(value) {
                Ok(route)
                    if !route.id.is_empty()
                        && !route.source.port_id.is_empty()
                        && !route.destination.port_id.is_empty() =>
                {
                    routes.push(route)
                }
                Ok(route) => warn!("Skipping route '{}' with empty endpoint", route.id),
                Err(e) => warn!("Skipping malformed route entry: {}", e),
            }
        }
        info!("Loaded {} routes from {}", routes.len(), self.path.display());
        routes
    }

    /// Write the whole table, creating parent directories as needed.
    pub fn save(&self, routes: &[MidiRoute]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = RouteFile {
            routes: routes
                .iter()
                .map(|r| serde_json::to_value(r))
                .collect::<std::result::Result<_, _>>()?,
        };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}
