//! Mapping advertised paths onto the local root.

use crate::error::{PatchError, Result};
use std::path::{Component, Path, PathBuf};

/// Join an advertised path onto `root`, refusing anything that could land
/// outside it:
/// 1. absolute paths, root and prefix components
/// 2. parent directory components
/// 3. NUL bytes
/// 4. on Windows, ':' inside a component (ADS)
pub fn normalize_under_root(root: &Path, advertised: &str) -> Result<PathBuf> {
    use Component::{CurDir, Normal, ParentDir, Prefix, RootDir};

    if advertised.contains('\0') {
        return Err(PatchError::format("path contains NUL byte"));
    }

    let mut safe = PathBuf::new();
    for component in Path::new(advertised).components() {
        match component {
            CurDir => {}
            Normal(s) => {
                #[cfg(windows)]
                if s.to_string_lossy().contains(':') {
                    return Err(PatchError::format(format!(
                        "path component contains colon: {}",
                        advertised
                    )));
                }
                safe.push(s);
            }
            ParentDir | RootDir | Prefix(_) => {
                return Err(PatchError::format(format!(
                    "path '{}' escapes the patch root",
                    advertised
                )));
            }
        }
    }

    if safe.as_os_str().is_empty() {
        return Err(PatchError::format(format!("empty path '{}'", advertised)));
    }
    Ok(root.join(safe))
}

/// Create parent directory if needed
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
