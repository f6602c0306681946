//! JSON persistence for [`MemoryStore`].

use std::path::Path;

use tracing::debug;

use crate::error::WorkmateResult;
use crate::store::{MemoryData, MemoryStore};

/// Load a store from `path`. A missing file yields an empty store.
pub fn load(path: &Path) -> WorkmateResult<MemoryStore> {
    if !path.exists() {
        debug!(path = %path.display(), "No snapshot yet, starting empty");
        return Ok(MemoryStore::new());
    }

    let content = std::fs::read_to_string(path)?;
    let data: MemoryData = serde_json::from_str(&content)?;
    Ok(MemoryStore::from_data(data))
}

/// Write the store to `path` through a temporary file and a rename, so a
/// crash never leaves a half-written snapshot behind.
pub async fn save(store: &MemoryStore, path: &Path) -> WorkmateResult<()> {
    let data = store.data().await;
    let content = serde_json::to_string_pretty(&data)?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, content)?;
    std::fs::rename(&temp, path)?;

    debug!(path = %path.display(), "Snapshot saved");
    Ok(())
}
