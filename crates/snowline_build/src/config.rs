use clap::Parser;
use log::{debug, info, trace};
use path_clean::PathClean;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::error::BuildError;

pub const CONFIG_FILE_NAME: &str = "snowline.config.json";
pub const DEFAULT_OUT_DIR: &str = "build";
pub const DEFAULT_PACKAGE_URL: &str = "/_snowline/pkg";

/// A source directory served at a URL prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub dir: PathBuf,
    pub url: String,
}

impl FromStr for Mount {
    type Err = String;

    /// Parses `dir=/url`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dir, url) =
            s.split_once('=').ok_or_else(|| format!("expected `dir=/url`, got '{}'", s))?;
        if dir.is_empty() {
            return Err(format!("mount '{}' has an empty directory", s));
        }
        Ok(Mount { dir: PathBuf::from(dir), url: url.to_string() })
    }
}

/// Fully resolved settings for one build or watch session.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub root: PathBuf,
    pub mounts: Vec<Mount>,
    pub out_dir: PathBuf,
    /// URL prefix under which installed packages are emitted
    pub package_url: String,
    pub watch: bool,
    pub clean: bool,
}

impl BuildConfig {
    /// Defaults for `root`: mounted at `/`, output in `root/build`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        BuildConfig {
            mounts: vec![Mount { dir: root.clone(), url: "/".to_string() }],
            out_dir: root.join(DEFAULT_OUT_DIR),
            package_url: DEFAULT_PACKAGE_URL.to_string(),
            watch: false,
            clean: false,
            root,
        }
    }

    /// Directory that mirrors `package_url` inside the output tree.
    pub fn package_dir(&self) -> PathBuf {
        self.out_dir.join(self.package_url.trim_matches('/'))
    }

    pub fn is_package_url(&self, url: &str) -> bool {
        let prefix = self.package_url.trim_end_matches('/');
        url.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    /// Directory (relative to the root) → URL prefix
    #[serde(default)]
    mount: BTreeMap<PathBuf, String>,
    out: Option<PathBuf>,
    package_url: Option<String>,
    clean: Option<bool>,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "build")]
#[command(about = "Build mounted directories into an unbundled ES module tree")]
pub struct Config {
    /// Root directory of the project (defaults to git root)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// JSON config file (defaults to snowline.config.json in the root)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Mount a directory at a URL prefix, as `dir=/url` (repeatable)
    #[arg(long = "mount")]
    pub mounts: Vec<Mount>,

    /// Output directory, relative to the root
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// URL prefix for installed packages
    #[arg(long)]
    pub package_url: Option<String>,

    /// Keep running and rebuild changed files
    #[arg(long)]
    pub watch: bool,

    /// Remove the output directory before building
    #[arg(long)]
    pub clean: bool,
}

impl Config {
    /// Resolve the root, merge the config file and validate everything.
    pub fn initialize(&self) -> Result<BuildConfig, BuildError> {
        let root = if let Some(r) = &self.root {
            debug!("Using provided root directory: {:?}", r);
            r.canonicalize().unwrap_or_else(|_| r.clone())
        } else {
            debug!("No root provided, searching for git root");
            find_git_root()?
        };
        info!("Using root directory: {}", root.display());

        let file = self.read_config_file(&root)?;

        let mounts: Vec<Mount> = if !self.mounts.is_empty() {
            self.mounts.clone()
        } else {
            file.mount.into_iter().map(|(dir, url)| Mount { dir, url }).collect()
        };
        let mut mounts: Vec<Mount> =
            mounts.into_iter().map(|m| Mount { dir: absolute_dir(&root, &m.dir), url: m.url }).collect();
        if mounts.is_empty() {
            debug!("No mounts configured, mounting the root at /");
            mounts.push(Mount { dir: root.clone(), url: "/".to_string() });
        }
        for mount in &mounts {
            if !mount.url.starts_with('/') {
                return Err(BuildError::Config(format!(
                    "mount URL '{}' for {} must start with '/'",
                    mount.url,
                    mount.dir.display()
                )));
            }
            trace!("Mount {} -> {}", mount.dir.display(), mount.url);
        }

        let out = self.out.clone().or(file.out).unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
        let package_url = self
            .package_url
            .clone()
            .or(file.package_url)
            .unwrap_or_else(|| DEFAULT_PACKAGE_URL.to_string());
        if !package_url.starts_with('/') || package_url.trim_matches('/').is_empty() {
            return Err(BuildError::Config(format!(
                "package URL '{}' must be a non-root path starting with '/'",
                package_url
            )));
        }

        let config = BuildConfig {
            out_dir: absolute_dir(&root, &out),
            mounts,
            package_url,
            watch: self.watch,
            clean: self.clean || file.clean.unwrap_or(false),
            root,
        };
        debug!(
            "Resolved config: {} mounts, out_dir={}, package_url={}",
            config.mounts.len(),
            config.out_dir.display(),
            config.package_url
        );
        Ok(config)
    }

    fn read_config_file(&self, root: &Path) -> Result<ConfigFile, BuildError> {
        let path = match &self.config {
            Some(p) => absolute_dir(root, p),
            None => {
                let default = root.join(CONFIG_FILE_NAME);
                if !default.is_file() {
                    trace!("No {} in {}", CONFIG_FILE_NAME, root.display());
                    return Ok(ConfigFile::default());
                }
                default
            }
        };
        debug!("Reading config file: {}", path.display());
        let text = fs::read_to_string(&path).map_err(|e| BuildError::fs("read", &path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| BuildError::Config(format!("{}: {}", path.display(), e)))
    }
}

fn absolute_dir(root: &Path, dir: &Path) -> PathBuf {
    let joined = if dir.is_absolute() { dir.to_path_buf() } else { root.join(dir) };
    let cleaned = joined.clean();
    cleaned.canonicalize().unwrap_or(cleaned)
}

pub fn find_git_root() -> Result<PathBuf, BuildError> {
    debug!("Searching for git root");
    let mut current_dir = env::current_dir().map_err(|e| BuildError::fs("read", ".", e))?;
    trace!("Starting search from: {:?}", current_dir);

    loop {
        if current_dir.join(".git").exists() {
            debug!("Found git root at: {:?}", current_dir);
            return Ok(current_dir);
        }
        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => {
                return Err(BuildError::Config(
                    "no --root given and no .git directory in any parent folder".to_string(),
                ));
            }
        }
    }
}
