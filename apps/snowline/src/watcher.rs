use anyhow::{Context, Result};
use log::{debug, trace};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use snowline_build::{BuildConfig, ChangeEvent};
use std::{
    path::{Component, Path, PathBuf},
    sync::mpsc::{self, Receiver},
};

/// Recursive watcher over every mount directory.
///
/// Created and modified files are forwarded as [`ChangeEvent`]s. Dropping
/// the watcher closes the channel.
pub struct MountWatcher {
    _watcher: RecommendedWatcher,
}

impl MountWatcher {
    pub fn new(config: &BuildConfig) -> Result<(Self, Receiver<ChangeEvent>)> {
        let (tx, rx) = mpsc::channel();
        let mount_dirs: Vec<PathBuf> = config.mounts.iter().map(|m| m.dir.clone()).collect();
        let out_dir = config.out_dir.clone();

        let filter_dirs = mount_dirs.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            for path in event.paths {
                if should_ignore(&path, &filter_dirs, &out_dir) || !path.is_file() {
                    continue;
                }
                trace!("File changed: {}", path.display());
                // The receiver is gone only once the watch loop has ended
                let _ = tx.send(ChangeEvent { file_path: path });
            }
        })
        .context("failed to create file watcher")?;

        for dir in &mount_dirs {
            debug!("Watching {}", dir.display());
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
        }

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Paths outside the mounts, inside the output directory, under
/// `node_modules`, or hidden are ignored.
fn should_ignore(path: &Path, mount_dirs: &[PathBuf], out_dir: &Path) -> bool {
    if path.starts_with(out_dir) {
        return true;
    }
    let Some(relative) = mount_dirs.iter().find_map(|dir| path.strip_prefix(dir).ok()) else {
        return true;
    };
    relative.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name == "node_modules" || name.starts_with('.')
        }
        _ => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_ignore() {
        let mounts = vec![PathBuf::from("/project/src"), PathBuf::from("/project/public")];
        let out = Path::new("/project/src/build");

        assert!(!should_ignore(Path::new("/project/src/app.js"), &mounts, out));
        assert!(!should_ignore(Path::new("/project/public/img/logo.svg"), &mounts, out));
        assert!(should_ignore(Path::new("/project/other/app.js"), &mounts, out));
        assert!(should_ignore(Path::new("/project/src/build/app.js"), &mounts, out));
        assert!(should_ignore(Path::new("/project/src/node_modules/x/index.js"), &mounts, out));
        assert!(should_ignore(Path::new("/project/src/.cache/x.js"), &mounts, out));
    }
}
