// Clip import: size/format/duration validation
// Each file is probed independently; one bad file never aborts the batch.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use super::clip::Clip;
use super::scanner::DirectoryScanner;
use crate::audio::decoder::{self, ContainerFormat};
use crate::error::{Error, Result};

pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_DURATION_SECS: f64 = 100.0;

/// Outcome of one import batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    pub added: Vec<Clip>,
    /// One line per rejected file: `Error (<file name>): <reason>`
    pub errors: Vec<String>,
}

impl ImportResult {
    /// `"OK"` when everything was accepted, otherwise the error lines joined.
    pub fn summary(&self) -> String {
        if self.errors.is_empty() {
            "OK".to_string()
        } else {
            self.errors.join("\n")
        }
    }
}

struct Probe {
    duration_secs: f64,
    size_bytes: u64,
}

/// Validate `paths` (directories are expanded) and build clips for the
/// accepted files. `existing` is the current clip count, used in new ids.
pub fn import_files(paths: &[PathBuf], existing: usize) -> ImportResult {
    let files = DirectoryScanner::expand(paths);
    info!(files = files.len(), "Importing clips");

    // Probing decodes every file, so spread it out; collect keeps input order.
    let probes: Vec<(PathBuf, Result<Probe>)> = files
        .into_par_iter()
        .map(|path| {
            let probe = probe(&path);
            (path, probe)
        })
        .collect();

    let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut result = ImportResult::default();

    for (path, probe) in probes {
        let file_name = file_name(&path);
        match probe {
            Ok(probe) => {
                let index = existing + result.added.len();
                result.added.push(Clip::new(
                    format!("{}_{}", stamp, index),
                    file_name,
                    path.to_string_lossy(),
                    "",
                    format!("{:.1}s", probe.duration_secs),
                    format!("{:.2}MB", probe.size_bytes as f64 / 1024.0 / 1024.0),
                ));
            }
            Err(e) => {
                debug!(file = %file_name, error = %e, "Rejected clip");
                result.errors.push(format!("Error ({}): {}", file_name, e));
            }
        }
    }

    info!(
        added = result.added.len(),
        rejected = result.errors.len(),
        "Import finished"
    );
    result
}

fn probe(path: &Path) -> Result<Probe> {
    let size_bytes = fs::metadata(path)?.len();
    if size_bytes > MAX_FILE_BYTES {
        return Err(Error::FileTooLarge {
            size_mb: size_bytes as f64 / 1024.0 / 1024.0,
        });
    }

    ContainerFormat::from_path(path)?;
    let duration_secs = decoder::decode(path)?.duration_secs();
    if duration_secs > MAX_DURATION_SECS {
        return Err(Error::DurationExceeded {
            seconds: duration_secs,
        });
    }

    Ok(Probe {
        duration_secs,
        size_bytes,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
