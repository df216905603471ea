//! Lifecycle script hooks
//!
//! A hook directory holds executables named `*.sh`. They run one at a time in
//! lexical order with stdio inherited and a per-stage environment overlay.

use crate::error::{BackupError, Result};
use crate::utils::command::run_script;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    PreBackup,
    PostBackup,
    PreRestore,
    PostRestore,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookStage::PreBackup => "pre-backup",
            HookStage::PostBackup => "post-backup",
            HookStage::PreRestore => "pre-restore",
            HookStage::PostRestore => "post-restore",
        })
    }
}

/// Scripts directly under `dir` ending in `.sh`, sorted by name. A missing directory yields none.
pub fn discover_hooks(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        debug!("Hook directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let context = || format!("reading hook directory {}", dir.display());
    let mut scripts = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| BackupError::io(context(), e))? {
        let entry = entry.map_err(|e| BackupError::io(context(), e))?;
        let path = entry.path();
        if entry.file_name().to_string_lossy().ends_with(".sh") && path.is_file() {
            scripts.push(path);
        }
    }

    scripts.sort();
    Ok(scripts)
}

/// Run every hook of `stage` in order, stopping at the first failure
pub async fn run_hooks(
    stage: HookStage,
    dir: Option<&Path>,
    env: &HashMap<String, String>,
) -> Result<()> {
    let Some(dir) = dir else {
        return Ok(());
    };

    let scripts = discover_hooks(dir)?;
    if scripts.is_empty() {
        return Ok(());
    }

    info!("Running {} {} hooks", scripts.len(), stage);

    for script in scripts {
        info!("Running {} hook: {}", stage, script.display());
        let reason = match run_script(&script, env).await {
            Ok(status) if status.success() => continue,
            Ok(status) => status.to_string(),
            Err(e) => format!("{:#}", e),
        };

        error!("{} hook {} failed: {}", stage, script.display(), reason);
        return Err(BackupError::Hook {
            stage,
            script,
            reason,
        });
    }

    Ok(())
}
