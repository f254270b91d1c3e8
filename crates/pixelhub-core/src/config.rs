//! Configuration loading and defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level pixelhub configuration. Every section is optional; accessors
/// fall back to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub selections: Option<SelectionsConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of viewer slots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<usize>,

    /// Bounded depth of each slot's outbound queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Substitute `${ENV_VAR}` references in a raw config string.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::PixelhubError::Io)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::PixelhubError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.as_ref().and_then(|s| s.port).unwrap_or(8080)
    }

    pub fn bind_addr(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        let width = self.canvas.as_ref().and_then(|c| c.width).unwrap_or(256);
        let height = self.canvas.as_ref().and_then(|c| c.height).unwrap_or(256);
        (width, height)
    }

    pub fn pool_slots(&self) -> usize {
        self.pool.as_ref().and_then(|p| p.slots).unwrap_or(64)
    }

    pub fn queue_depth(&self) -> usize {
        self.pool.as_ref().and_then(|p| p.queue_depth).unwrap_or(256)
    }

    pub fn selections_path(&self) -> PathBuf {
        self.selections
            .as_ref()
            .and_then(|s| s.path.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("selections.json"))
    }

    /// Get a config value by dotted path (e.g. "server.port").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Set a config value by dotted path, creating intermediate objects.
    pub fn set_path(&mut self, path: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| anyhow::anyhow!("Config serialization error: {e}"))?;

        let segments: Vec<&str> = path.split('.').collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(anyhow::anyhow!("Invalid path: {path}"));
        }

        let mut current = &mut json;
        for segment in &segments[..segments.len() - 1] {
            if current.get(segment).is_none() {
                current[segment] = serde_json::json!({});
            }
            current = current
                .get_mut(segment)
                .ok_or_else(|| anyhow::anyhow!("Path segment '{segment}' is not an object"))?;
        }

        let last = segments[segments.len() - 1];
        current[last] = value;

        *self = serde_json::from_value(json)
            .map_err(|e| anyhow::anyhow!("Config deserialization error: {e}"))?;
        Ok(())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let (width, height) = self.canvas_size();
        if width == 0 || height == 0 {
            errors.push("Canvas dimensions cannot be 0".to_string());
        }
        if self.pool_slots() == 0 {
            errors.push("Slot pool capacity cannot be 0".to_string());
        }
        if self.queue_depth() == 0 {
            errors.push("Outbound queue depth cannot be 0".to_string());
        }
        if self.server_port() == 0 {
            errors.push("Server port cannot be 0".to_string());
        }
        if width * height > 4096 * 4096 {
            warnings.push(format!("Canvas {width}x{height} is very large"));
        }

        (warnings, errors)
    }
}
