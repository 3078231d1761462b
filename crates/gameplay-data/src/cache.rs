//! Offline call cache file.
//!
//! The file is a JSON envelope holding the pending calls in submission
//! order plus a SHA-256 checksum of the serialized call list, so a
//! truncated or hand-edited file is rejected instead of replayed.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::GameplayDataError;
use crate::types::ApiCall;

/// Current envelope version.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    checksum: String,
    calls: Vec<ApiCall>,
}

fn checksum(calls: &[ApiCall]) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(calls)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Writes `calls` to `path`, creating parent directories as needed.
pub fn write_cache(path: &Path, calls: &[ApiCall]) -> Result<(), GameplayDataError> {
    let fail = |reason: String| GameplayDataError::CacheWrite {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
    }
    let file = CacheFile {
        version: CACHE_VERSION,
        checksum: checksum(calls).map_err(|e| fail(e.to_string()))?,
        calls: calls.to_vec(),
    };
    let json = serde_json::to_vec(&file).map_err(|e| fail(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| fail(e.to_string()))?;
    debug!(path = %path.display(), count = calls.len(), "wrote call cache");
    Ok(())
}

/// Reads calls from `path`. An empty file holds no calls.
pub fn read_cache(path: &Path) -> Result<Vec<ApiCall>, GameplayDataError> {
    let fail = |reason: String| GameplayDataError::CacheRead {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| fail(e.to_string()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let file: CacheFile = serde_json::from_slice(&bytes).map_err(|e| fail(e.to_string()))?;
    if file.version != CACHE_VERSION {
        return Err(fail(format!("unsupported cache version {}", file.version)));
    }
    let expected = checksum(&file.calls).map_err(|e| fail(e.to_string()))?;
    if expected != file.checksum {
        return Err(fail("checksum mismatch".into()));
    }
    Ok(file.calls)
}

/// Empties the cache file so it is not replayed twice.
pub fn truncate_cache(path: &Path) -> Result<(), GameplayDataError> {
    std::fs::write(path, b"").map_err(|e| GameplayDataError::CacheWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
