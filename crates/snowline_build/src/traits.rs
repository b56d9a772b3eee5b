//! Seams between the crawler and the components it drives.
//!
//! The crawler only ever sees these traits. Default implementations live in
//! [`crate::loader`], [`crate::mount`] and [`crate::installer`].

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use crate::{config::BuildConfig, session::ImportMap};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions<'a> {
    pub is_ssr: bool,
    pub is_hmr: bool,
    /// Rewrite specifiers to their final URLs
    pub is_resolve: bool,
    pub import_map: Option<&'a ImportMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadResult {
    pub contents: Vec<u8>,
    /// Specifiers the loaded file imports. Local ones are `/`-rooted URLs.
    pub imports: Vec<String>,
}

/// Loads one URL and transforms it into its build-output form.
pub trait Loader {
    fn load(&mut self, url: &str, options: &LoadOptions<'_>) -> anyhow::Result<LoadResult>;

    fn shutdown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub trait UrlMapper {
    /// Every URL under which `path` is served. Empty when no mount holds it.
    fn file_to_urls(&self, path: &Path) -> Vec<String>;
}

pub trait PackageInstaller {
    fn install(
        &mut self,
        bare_specifiers: &BTreeSet<String>,
        destination: &Path,
        config: &BuildConfig,
    ) -> anyhow::Result<ImportMap>;
}

/// Post-build steps. Every step defaults to doing nothing.
pub trait Pipeline {
    fn optimize(&mut self, _out_dir: &Path, _config: &BuildConfig) -> anyhow::Result<()> {
        Ok(())
    }

    fn plugin_optimize(&mut self, _out_dir: &Path, _config: &BuildConfig) -> anyhow::Result<()> {
        Ok(())
    }

    fn cleanup(&mut self, _out_dir: &Path, _config: &BuildConfig) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoopPipeline;

impl Pipeline for NoopPipeline {}

/// A file inside a mount was created or modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub file_path: PathBuf,
}
