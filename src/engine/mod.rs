//! Proxy engine descriptors and host probes.

mod kind;
mod probe;

pub use kind::{EngineDescriptor, EngineKind, BINARY_DIR};
pub use probe::{active, detect_configured, find_process, installed, installed_in, is_running};
