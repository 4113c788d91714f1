//! Filesystem helpers shared by the feature cache and the API

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};

/// Image extensions accepted for query images
#[cfg_attr(not(feature = "web"), allow(dead_code))]
pub(crate) const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// Ensure a directory exists, creating it if necessary
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Write a file by renaming a fully written temp file over it, so readers
/// never observe a partial write
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| AppError::InvalidInput(format!("no parent directory: {}", path.display())))?;
    ensure_dir_exists(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Validate that a file has an allowed extension
#[cfg_attr(not(feature = "web"), allow(dead_code))]
pub(crate) fn validate_file_extension(filename: &str, allowed_extensions: &[&str]) -> bool {
    if let Some(ext) = Path::new(filename).extension() {
        if let Some(ext_str) = ext.to_str() {
            return allowed_extensions
                .iter()
                .any(|&e| e.eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

/// Resolve a client-supplied relative path under `base`, rejecting absolute
/// paths and any `..` component
#[cfg_attr(not(feature = "web"), allow(dead_code))]
pub(crate) fn resolve_under(base: &Path, relative: &str) -> Result<PathBuf> {
    let normalized = relative.replace('\\', "/");
    let candidate = Path::new(&normalized);

    let mut resolved = base.to_path_buf();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "path must stay inside the upload directory: {}",
                    relative
                )));
            }
        }
    }

    if resolved == base {
        return Err(AppError::InvalidInput("empty image path".to_string()));
    }
    Ok(resolved)
}
