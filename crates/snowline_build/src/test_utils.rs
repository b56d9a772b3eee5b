//! In-memory collaborators for exercising the crawler without a real loader.

use anyhow::{Result, bail};
use path_clean::PathClean;
use snowline_core::{SourceFile, rewrite, scan_imports};
use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{
    config::BuildConfig,
    session::ImportMap,
    traits::{LoadOptions, LoadResult, Loader, PackageInstaller, Pipeline, UrlMapper},
};

pub fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Resolves relative specifiers against the importer and maps bare ones
/// through the import map. Nothing else.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: HashMap<String, String>,
    failing: BTreeSet<String>,
    calls: Rc<RefCell<Vec<String>>>,
    shutdowns: Rc<RefCell<usize>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, url: &str, code: &str) -> Self {
        self.sources.insert(url.to_string(), code.to_string());
        self
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn set_source(&mut self, url: &str, code: &str) {
        self.sources.insert(url.to_string(), code.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn shutdown_count(&self) -> Rc<RefCell<usize>> {
        Rc::clone(&self.shutdowns)
    }
}

fn resolve(importer: &str, specifier: &str, import_map: Option<&ImportMap>) -> String {
    if specifier.starts_with("./") || specifier.starts_with("../") {
        let dir = Path::new(importer).parent().unwrap_or(Path::new("/"));
        return dir.join(specifier).clean().to_string_lossy().replace('\\', "/");
    }
    if specifier.starts_with('/') {
        return specifier.to_string();
    }
    match import_map.and_then(|map| map.get(specifier)) {
        Some(url) => url.to_string(),
        None => specifier.to_string(),
    }
}

impl Loader for MemoryLoader {
    fn load(&mut self, url: &str, options: &LoadOptions<'_>) -> Result<LoadResult> {
        self.calls.borrow_mut().push(url.to_string());
        if self.failing.contains(url) {
            bail!("configured to fail on {}", url);
        }
        let Some(code) = self.sources.get(url) else {
            bail!("no source for {}", url);
        };
        let ext = Path::new(url).extension().and_then(|e| e.to_str()).unwrap_or("");
        let file = SourceFile::new(ext, code);
        let resolved = rewrite(&file, |s| resolve(url, s, options.import_map))?;
        let imports = scan_imports(&resolved, ext)?
            .iter()
            .map(|record| record.specifier(&resolved).to_string())
            .collect();
        let contents = if options.is_resolve { resolved } else { code.clone() };
        Ok(LoadResult { contents: contents.into_bytes(), imports })
    }

    fn shutdown(&mut self) -> Result<()> {
        *self.shutdowns.borrow_mut() += 1;
        Ok(())
    }
}

/// Maps each specifier to `/pkg/<specifier>.js` and remembers what it saw.
#[derive(Debug, Clone, Default)]
pub struct RecordingInstaller {
    pub installs: Rc<RefCell<Vec<BTreeSet<String>>>>,
}

impl PackageInstaller for RecordingInstaller {
    fn install(
        &mut self,
        bare_specifiers: &BTreeSet<String>,
        _destination: &Path,
        _config: &BuildConfig,
    ) -> Result<ImportMap> {
        self.installs.borrow_mut().push(bare_specifiers.clone());
        Ok(bare_specifiers.iter().map(|s| (s.clone(), format!("/pkg/{}.js", s))).collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapUrlMapper {
    urls: HashMap<PathBuf, Vec<String>>,
}

impl MapUrlMapper {
    pub fn with(mut self, path: impl Into<PathBuf>, url: &str) -> Self {
        self.urls.entry(path.into()).or_default().push(url.to_string());
        self
    }
}

impl UrlMapper for MapUrlMapper {
    fn file_to_urls(&self, path: &Path) -> Vec<String> {
        self.urls.get(path).cloned().unwrap_or_default()
    }
}

/// Deletes the given output files during `optimize` and logs every step.
#[derive(Debug, Clone, Default)]
pub struct DeletingPipeline {
    pub delete: Vec<PathBuf>,
    pub steps: Rc<RefCell<Vec<&'static str>>>,
}

impl Pipeline for DeletingPipeline {
    fn optimize(&mut self, out_dir: &Path, _config: &BuildConfig) -> Result<()> {
        self.steps.borrow_mut().push("optimize");
        for relative in &self.delete {
            fs::remove_file(out_dir.join(relative))?;
        }
        Ok(())
    }

    fn plugin_optimize(&mut self, _out_dir: &Path, _config: &BuildConfig) -> Result<()> {
        self.steps.borrow_mut().push("plugin_optimize");
        Ok(())
    }

    fn cleanup(&mut self, _out_dir: &Path, _config: &BuildConfig) -> Result<()> {
        self.steps.borrow_mut().push("cleanup");
        Ok(())
    }
}
