//! File-based storage under each instance's working directory

pub mod bindings;
pub mod params;

use std::path::Path;
use tokio::fs;

pub use bindings::{BindingStore, BINDING_FILE};
pub use params::{ParamStore, PARAMS_FILE};

/// Atomically replace `path` with `data` via a `.tmp` sibling
pub async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await
}
