use ignore::WalkBuilder;
use log::{debug, trace, warn};
use std::{
    io,
    path::{Component, Path, PathBuf},
};

use crate::{
    config::{BuildConfig, Mount},
    error::BuildError,
    traits::UrlMapper,
};

/// Every file under the configured mounts, sorted and deduplicated.
///
/// Hidden files, gitignored files, `node_modules` and the output directory
/// are skipped.
pub fn collect_mount_files(config: &BuildConfig) -> Result<Vec<PathBuf>, BuildError> {
    debug!("Collecting files from {} mounts", config.mounts.len());
    let mut files: Vec<PathBuf> = Vec::new();

    for mount in &config.mounts {
        if !mount.dir.is_dir() {
            warn!("Mount directory {} does not exist, skipping", mount.dir.display());
            continue;
        }
        debug!("Walking mount {} ({})", mount.dir.display(), mount.url);
        let out_dir = config.out_dir.clone();
        let walker = WalkBuilder::new(&mount.dir)
            .hidden(true)
            .ignore(true)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(move |dent| {
                dent.file_name() != "node_modules" && !dent.path().starts_with(&out_dir)
            })
            .build();

        for res in walker {
            let dent = res.map_err(|e| BuildError::fs("walk", &mount.dir, io::Error::other(e)))?;
            if !dent.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            trace!("Found mount file: {}", dent.path().display());
            files.push(dent.into_path());
        }
    }

    files.sort();
    files.dedup();
    debug!("Collected {} mount files", files.len());
    Ok(files)
}

/// Maps files to URLs through the configured mounts, and back.
#[derive(Debug, Clone)]
pub struct MountUrlMapper {
    mounts: Vec<Mount>,
}

impl MountUrlMapper {
    pub fn new(mounts: Vec<Mount>) -> Self {
        let mut mounts = mounts;
        // Longest URL first so nested mounts win in url_to_file
        mounts.sort_by(|a, b| b.url.len().cmp(&a.url.len()).then_with(|| a.url.cmp(&b.url)));
        MountUrlMapper { mounts }
    }

    /// The existing mounted file served at `url`, if any.
    pub fn url_to_file(&self, url: &str) -> Option<PathBuf> {
        self.mounts.iter().find_map(|mount| {
            let rest = strip_url_prefix(url, &mount.url)?;
            let relative = Path::new(rest);
            if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
                return None;
            }
            let candidate = mount.dir.join(relative);
            candidate.is_file().then_some(candidate)
        })
    }
}

impl UrlMapper for MountUrlMapper {
    fn file_to_urls(&self, path: &Path) -> Vec<String> {
        let mut urls: Vec<String> = self
            .mounts
            .iter()
            .filter_map(|mount| {
                let relative = path.strip_prefix(&mount.dir).ok()?;
                let segments: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                if segments.is_empty() {
                    return None;
                }
                Some(format!("{}/{}", mount.url.trim_end_matches('/'), segments.join("/")))
            })
            .collect();
        urls.sort();
        urls.dedup();
        urls
    }
}

/// Remainder of `url` below `prefix`, without a leading slash.
fn strip_url_prefix<'u>(url: &'u str, prefix: &str) -> Option<&'u str> {
    let rest = url.strip_prefix(prefix.trim_end_matches('/'))?;
    if rest.is_empty() {
        return None;
    }
    rest.strip_prefix('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_file;
    use std::fs;
    use tempfile::TempDir;

    fn mount(dir: &Path, url: &str) -> Mount {
        Mount { dir: dir.to_path_buf(), url: url.to_string() }
    }

    #[test]
    fn test_collect_skips_node_modules_hidden_and_out_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "index.html", "");
        create_test_file(root, "src/app.js", "");
        create_test_file(root, "node_modules/react/index.js", "");
        create_test_file(root, ".cache/x.js", "");
        create_test_file(root, "build/old.js", "");
        create_test_file(root, "ignored/skip.js", "");
        fs::write(root.join(".gitignore"), "ignored/\n").unwrap();

        let config = BuildConfig::new(root);
        let files = collect_mount_files(&config).unwrap();
        assert_eq!(files, vec![root.join("index.html"), root.join("src/app.js")]);
    }

    #[test]
    fn test_collect_overlapping_mounts_deduplicates() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "src/a.js", "");
        create_test_file(root, "src/b.js", "");

        let mut config = BuildConfig::new(root);
        config.mounts = vec![mount(root, "/"), mount(&root.join("src"), "/dist")];
        let files = collect_mount_files(&config).unwrap();
        assert_eq!(files, vec![root.join("src/a.js"), root.join("src/b.js")]);
    }

    #[test]
    fn test_missing_mount_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = BuildConfig::new(temp_dir.path());
        config.mounts = vec![mount(&temp_dir.path().join("nope"), "/")];
        assert!(collect_mount_files(&config).unwrap().is_empty());
    }

    #[test]
    fn test_file_to_urls_for_each_mount() {
        let root = Path::new("/project");
        let mapper = MountUrlMapper::new(vec![
            mount(root, "/"),
            mount(&root.join("src"), "/dist"),
            mount(&root.join("public"), "/static/"),
        ]);

        assert_eq!(mapper.file_to_urls(&root.join("src/lib/a.js")), vec!["/dist/lib/a.js", "/src/lib/a.js"]);
        assert_eq!(mapper.file_to_urls(&root.join("public/logo.svg")), vec!["/public/logo.svg", "/static/logo.svg"]);
        assert!(mapper.file_to_urls(Path::new("/elsewhere/a.js")).is_empty());
    }

    #[test]
    fn test_url_to_file_prefers_longest_mount() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let top = create_test_file(root, "dist/a.js", "// top");
        let nested = create_test_file(root, "src/a.js", "// nested");

        let mapper = MountUrlMapper::new(vec![mount(root, "/"), mount(&root.join("src"), "/dist")]);
        assert_eq!(mapper.url_to_file("/dist/a.js"), Some(nested));
        assert_eq!(mapper.url_to_file("/src/a.js"), Some(root.join("src/a.js")));
        assert_ne!(mapper.url_to_file("/dist/a.js"), Some(top));
        assert_eq!(mapper.url_to_file("/missing.js"), None);
        assert_eq!(mapper.url_to_file("/dist/../dist/a.js"), None);
        assert_eq!(mapper.url_to_file("/"), None);
    }
}
