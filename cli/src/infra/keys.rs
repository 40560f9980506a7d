//! Infrastructure implementation of the `KeySource` port.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::KeySource;
use crate::domain::PrivateKey;

/// Reads private keys from the local filesystem, expanding a leading `~`.
pub struct FsKeySource;

impl KeySource for FsKeySource {
    fn read_private_key(&self, path: &str) -> Result<PrivateKey> {
        let path = expand_home(path)?;
        let bytes =
            std::fs::read(&path).with_context(|| format!("cannot read {}", path.display()))?;
        let key = PrivateKey::new(bytes);
        anyhow::ensure!(!key.is_empty(), "{} is empty", path.display());
        Ok(key)
    }
}

/// Expand `~` and `~/...` against the home directory.
///
/// # Errors
///
/// Returns an error if the path needs the home directory and it cannot be
/// determined.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(path)),
    };
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}
