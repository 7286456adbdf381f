//! Detection of the configured, installed and running engine.

use std::path::{Path, PathBuf};

use super::kind::{EngineKind, BINARY_DIR};

const MIHOMO_MARKER: &str = "name_client=\"mihomo\"";

/// Engine selected by the first readable init script.
///
/// A script containing `name_client="mihomo"` selects mihomo; anything else,
/// including no readable script at all, selects xray.
pub async fn detect_configured(init_scripts: &[PathBuf]) -> EngineKind {
    for script in init_scripts {
        match tokio::fs::read_to_string(script).await {
            Ok(content) => {
                let kind = if content.contains(MIHOMO_MARKER) {
                    EngineKind::Mihomo
                } else {
                    EngineKind::Xray
                };
                tracing::debug!(script = %script.display(), engine = %kind, "Detected engine");
                return kind;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::debug!(script = %script.display(), error = %e, "Unreadable init script");
            }
        }
    }
    EngineKind::default()
}

/// Pid of a process whose `comm` under `proc_root` equals `name`.
pub async fn find_process(proc_root: &Path, name: &str) -> Option<u32> {
    let mut entries = tokio::fs::read_dir(proc_root).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        let Ok(comm) = tokio::fs::read_to_string(entry.path().join("comm")).await else {
            continue;
        };
        if comm.trim_end_matches('\n') == name {
            return Some(pid);
        }
    }
    None
}

/// Whether `kind` currently runs on this host.
pub async fn is_running(kind: EngineKind) -> bool {
    find_process(Path::new("/proc"), kind.name()).await.is_some()
}

/// Engines whose binary exists in `bin_dir`.
pub async fn installed_in(bin_dir: &Path) -> Vec<EngineKind> {
    let mut installed = Vec::new();
    for kind in EngineKind::ALL {
        if tokio::fs::try_exists(bin_dir.join(kind.name()))
            .await
            .unwrap_or(false)
        {
            installed.push(kind);
        }
    }
    installed
}

/// Engines installed in the default binary directory.
pub async fn installed() -> Vec<EngineKind> {
    installed_in(Path::new(BINARY_DIR)).await
}

/// Active engine and whether it runs.
///
/// The configured engine wins unless it is stopped while the other one is
/// running.
pub async fn active(init_scripts: &[PathBuf]) -> (EngineKind, bool) {
    let configured = detect_configured(init_scripts).await;
    if is_running(configured).await {
        return (configured, true);
    }
    let other = configured.other();
    if is_running(other).await {
        return (other, true);
    }
    (configured, false)
}
