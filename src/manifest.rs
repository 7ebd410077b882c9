//! Completion manifests for expensive stages.
//!
//! A bare file-existence check cannot tell a finished artifact from a
//! partially-written one. Instead, each long scan publishes its output
//! atomically and then records a small JSON manifest `{stage, fingerprint,
//! output, status, completed_at}`. A later run skips the stage only when the
//! manifest matches the current input fingerprint *and* the recorded output
//! is still on disk.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Complete,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StageManifest {
    pub stage: String,
    pub fingerprint: String,
    pub output: PathBuf,
    pub status: StageStatus,
    pub completed_at: DateTime<Utc>,
}

/// Fingerprints a set of input files by their sorted paths and sizes.
pub fn fingerprint(paths: &[PathBuf]) -> Result<String> {
    let mut entries: Vec<(String, u64)> = Vec::with_capacity(paths.len());
    for path in paths {
        let len = std::fs::metadata(path)?.len();
        entries.push((path.display().to_string(), len));
    }
    entries.sort();

    let mut hasher = DefaultHasher::new();
    entries.hash(&mut hasher);
    Ok(format!("{:016x}", hasher.finish()))
}

/// True when a complete manifest for `stage` matches `fingerprint` and its
/// recorded output still exists.
pub fn is_satisfied(manifest_path: &Path, stage: &str, fingerprint: &str) -> Result<bool> {
    if !manifest_path.exists() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(manifest_path)?;
    let manifest: StageManifest = match serde_json::from_str(&content) {
        Ok(m) => m,
        // A corrupt manifest means the previous run died mid-publish; rerun.
        Err(e) => {
            debug!(path = %manifest_path.display(), error = %e, "Unreadable manifest, rerunning stage");
            return Ok(false);
        }
    };

    Ok(manifest.status == StageStatus::Complete
        && manifest.stage == stage
        && manifest.fingerprint == fingerprint
        && manifest.output.exists())
}

/// Records a completed stage. Written to a temp file and renamed so the
/// manifest itself can never be observed half-written.
pub fn record_complete(
    manifest_path: &Path,
    stage: &str,
    fingerprint: &str,
    output: &Path,
) -> Result<()> {
    let manifest = StageManifest {
        stage: stage.to_string(),
        fingerprint: fingerprint.to_string(),
        output: output.to_path_buf(),
        status: StageStatus::Complete,
        completed_at: Utc::now(),
    };

    let tmp = manifest_path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(&manifest)?)?;
    std::fs::rename(&tmp, manifest_path)?;
    Ok(())
}
