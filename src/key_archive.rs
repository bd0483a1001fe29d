//! Client bundle packaging: a gzip-compressed tar with one top-level directory.

use anyhow::{anyhow, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::Path;
use tar::{Builder, HeaderMode};

/// Pack every file under `source` into an in-memory `.tar.gz`, stored below a
/// single top-level directory named `entry_name`.
///
/// Headers are written in deterministic mode (no owner, fixed mtime) so the
/// archive content depends only on the files.
pub fn pack_directory(source: &Path, entry_name: &str) -> Result<Vec<u8>> {
    if !source.is_dir() {
        return Err(anyhow!(
            "Failed to pack {}: not a directory",
            source.display()
        ));
    }

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    builder
        .append_dir_all(entry_name, source)
        .map_err(|e| anyhow!("Failed to add {} to archive: {}", source.display(), e))?;

    let encoder = builder
        .into_inner()
        .map_err(|e| anyhow!("Failed to finish tar stream: {}", e))?;
    let bytes = encoder
        .finish()
        .map_err(|e| anyhow!("Failed to finish gzip stream: {}", e))?;
    Ok(bytes)
}
