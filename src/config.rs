use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::http::parser::ParserLimits;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    /// Size of the per-connection socket read buffer
    pub read_buffer_size: usize,
    /// Largest request head (request line plus headers) accepted
    pub max_head_size: usize,
    pub max_headers: usize,
}

impl Default for Config {
    fn default() -> Self {
        let limits = ParserLimits::default();
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            read_buffer_size: 8192,
            max_head_size: limits.max_head_size,
            max_headers: limits.max_headers,
        }
    }
}

impl Config {
    /// Loads the configuration from the YAML file named by `TETHER_CONFIG`,
    /// if any, then applies the `LISTEN` override.
    pub fn load() -> Self {
        let mut cfg = match std::env::var("TETHER_CONFIG") {
            Ok(path) => Self::from_file(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path, error = %e, "Falling back to default config");
                Self::default()
            }),
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.listen_addr = listen_addr;
        }
        cfg
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("parsing config")
    }

    pub fn parser_limits(&self) -> ParserLimits {
        ParserLimits {
            max_head_size: self.max_head_size,
            max_headers: self.max_headers,
        }
    }
}
