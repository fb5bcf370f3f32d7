//! Kernel configuration
//!
//! ## Example
//!
//! ```
//! use sim_kernel::KernelConfig;
//!
//! let config = KernelConfig::from_json(r#"{ "limits": { "max_net_namespaces": 4 } }"#).unwrap();
//! assert_eq!(config.limits.max_net_namespaces, 4);
//! assert_eq!(config.init_uid, 0);
//! ```

use crate::error::ConfigError;
use resources::NamespaceLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for a [`crate::SimulatedKernel`]
///
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Limits of the kernel's root user namespace
    pub limits: NamespaceLimits,
    /// uid of the init task
    pub init_uid: u32,
    /// gid of the init task
    pub init_gid: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            limits: NamespaceLimits::default(),
            init_uid: 0,
            init_gid: 0,
        }
    }
}

impl KernelConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_limits(mut self, limits: NamespaceLimits) -> Self {
        self.limits = limits;
        self
    }
}
