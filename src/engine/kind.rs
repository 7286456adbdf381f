//! The closed set of supported proxy engines.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Proxy engine driven by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Xray,
    Mihomo,
}

/// Static facts about an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineDescriptor {
    /// Process and binary name.
    pub name: &'static str,
    /// Directory holding the engine's configuration.
    pub config_dir: &'static str,
    /// Glob of the configuration files inside `config_dir`.
    pub config_pattern: &'static str,
    /// Whether configuration is JSON (otherwise YAML).
    pub is_json: bool,
}

const XRAY: EngineDescriptor = EngineDescriptor {
    name: "xray",
    config_dir: "/opt/etc/xray/configs",
    config_pattern: "*.json",
    is_json: true,
};

const MIHOMO: EngineDescriptor = EngineDescriptor {
    name: "mihomo",
    config_dir: "/opt/etc/mihomo",
    config_pattern: "config.yaml",
    is_json: false,
};

/// Directory the engine binaries are installed into.
pub const BINARY_DIR: &str = "/opt/sbin";

impl EngineKind {
    /// Every supported engine.
    pub const ALL: [Self; 2] = [Self::Xray, Self::Mihomo];

    /// Descriptor of this engine.
    #[must_use]
    pub fn descriptor(self) -> &'static EngineDescriptor {
        match self {
            Self::Xray => &XRAY,
            Self::Mihomo => &MIHOMO,
        }
    }

    /// Process and binary name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Installed binary location.
    #[must_use]
    pub fn binary(self) -> PathBuf {
        PathBuf::from(BINARY_DIR).join(self.name())
    }

    /// The other engine.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Xray => Self::Mihomo,
            Self::Mihomo => Self::Xray,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
