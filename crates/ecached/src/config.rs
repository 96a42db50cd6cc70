//! TOML configuration for `ecached`.

use std::path::Path;

use anyhow::Context;
use ecache_client::ClientConfig;
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Client session parameters.
    pub client: ClientConfig,
    /// Nodes to talk to.
    pub cluster: ClusterSection,
    /// Reference node settings.
    pub node: NodeSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[cluster]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Ordered node list. Every client of a cluster must use the same order.
    pub nodes: Vec<String>,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Address the node listens on.
    pub listen_addr: String,
    /// Maximum payload bytes the node keeps in memory.
    pub max_bytes: u64,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:6378".to_string(),
            max_bytes: 1 << 30,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read {}", p.display()))?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string.
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Node list from the command line, falling back to `[cluster] nodes`.
    pub fn nodes(&self, flag: Option<&str>) -> anyhow::Result<Vec<String>> {
        let nodes: Vec<String> = match flag {
            Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
            None => self.cluster.nodes.clone(),
        };
        anyhow::ensure!(
            !nodes.is_empty(),
            "no nodes given: pass --nodes or set [cluster] nodes"
        );
        Ok(nodes)
    }
}
