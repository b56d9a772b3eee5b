use log::{debug, info, trace};
use std::{fs, io, path::Path};

use crate::{
    config::BuildConfig,
    error::BuildError,
    traits::{Loader, Pipeline},
};

/// Runs the post-build steps in order and shuts the loader down.
pub fn run_post_build(
    config: &BuildConfig,
    pipeline: &mut dyn Pipeline,
    loader: &mut dyn Loader,
) -> Result<(), BuildError> {
    let out_dir = config.out_dir.as_path();
    info!("Running post-build steps");

    pipeline
        .optimize(out_dir, config)
        .map_err(|source| BuildError::Pipeline { step: "optimize", source })?;
    pipeline
        .plugin_optimize(out_dir, config)
        .map_err(|source| BuildError::Pipeline { step: "plugin optimize", source })?;

    let removed = remove_empty_folders(out_dir).map_err(|e| BuildError::fs("prune", out_dir, e))?;
    debug!("Removed {} empty directories", removed);

    pipeline
        .cleanup(out_dir, config)
        .map_err(|source| BuildError::Pipeline { step: "cleanup", source })?;
    loader.shutdown().map_err(|source| BuildError::Pipeline { step: "shutdown", source })
}

/// Removes every empty directory below `root`, keeping `root` itself.
/// Symlinks are never followed. Returns how many directories were removed.
pub fn remove_empty_folders(root: &Path) -> io::Result<usize> {
    if !root.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            prune(&entry.path(), &mut removed)?;
        }
    }
    Ok(removed)
}

/// Returns whether `dir` was removed.
fn prune(dir: &Path, removed: &mut usize) -> io::Result<bool> {
    let mut empty = true;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() || !prune(&entry.path(), removed)? {
            empty = false;
        }
    }
    if empty {
        trace!("Removing empty directory {}", dir.display());
        fs::remove_dir(dir)?;
        *removed += 1;
    }
    Ok(empty)
}
