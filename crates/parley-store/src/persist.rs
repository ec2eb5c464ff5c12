//! Snapshot persistence.
//!
//! The data file holds the whole [`Snapshot`] as pretty-printed JSON. Every
//! save rewrites it completely: the document goes to a sibling temporary
//! file first and is then renamed over the target.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::Snapshot;

/// Read the snapshot at `path`. Returns `None` if the file does not exist.
pub fn load(path: &Path) -> Result<Option<Snapshot>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let snapshot: Snapshot = serde_json::from_slice(&data)?;
    tracing::debug!(
        path = %path.display(),
        users = snapshot.users.len(),
        groups = snapshot.groups.len(),
        "loaded snapshot"
    );
    Ok(Some(snapshot))
}

/// Write `snapshot` to `path`, replacing any previous content.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(snapshot)?;
    let tmp = temp_path(path);
    if let Err(e) = write_synced(&tmp, &json).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    tracing::debug!(path = %path.display(), bytes = json.len(), "persisted snapshot");
    Ok(())
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
