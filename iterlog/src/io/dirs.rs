//! Location and creation of the iterations directory.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::filename::temp_file_name;
use crate::error::{LogError, LogResult};

/// Iterations directory, relative to the project root.
pub const ITERATIONS_DIR: &str = ".iterlog/iterations";
/// Config file, relative to the project root.
pub const CONFIG_FILE: &str = ".iterlog/config.toml";

/// Resolve an absolute root. `None` means the process's working directory.
///
/// If the working directory cannot be read the result stays relative to `.`
/// and a warning is emitted.
pub fn resolve_root(base_dir: Option<&Path>) -> PathBuf {
    resolve_root_with(base_dir, env::current_dir)
}

fn resolve_root_with(
    base_dir: Option<&Path>,
    current_dir: impl FnOnce() -> io::Result<PathBuf>,
) -> PathBuf {
    if let Some(base) = base_dir
        && base.is_absolute()
    {
        return base.to_path_buf();
    }
    let cwd = current_dir().unwrap_or_else(|err| {
        warn!(error = %err, "cannot read working directory; resolving against `.`");
        PathBuf::from(".")
    });
    match base_dir {
        Some(base) => cwd.join(base),
        None => cwd,
    }
}

/// Absolute path of the iterations directory under `base_dir`.
pub fn get_iterations_dir(base_dir: Option<&Path>) -> PathBuf {
    resolve_root(base_dir).join(ITERATIONS_DIR)
}

/// Create the iterations directory (and parents) if missing.
pub fn ensure_iterations_dir(base_dir: Option<&Path>) -> LogResult<PathBuf> {
    let dir = get_iterations_dir(base_dir);
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Idempotent `create_dir_all` that rejects non-directory paths.
pub(crate) fn ensure_dir(dir: &Path) -> LogResult<()> {
    if dir.is_dir() {
        return Ok(());
    }
    debug!(path = %dir.display(), "creating iterations directory");
    fs::create_dir_all(dir).map_err(|source| LogError::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write `contents` to a hidden sibling temp file, then rename it over
/// `path`. The temp file is removed if either step fails.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp_path = path.with_file_name(temp_file_name(&file_name.to_string_lossy()));
    let written = fs::write(&tmp_path, contents).and_then(|()| fs::rename(&tmp_path, path));
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}
