use log::{debug, trace};
use path_clean::PathClean;
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use crate::{
    config::BuildConfig,
    error::BuildError,
    session::BuildSession,
    traits::{LoadOptions, Loader},
};

/// Loader flags for one crawl. The import map is taken from the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadMode {
    pub is_ssr: bool,
    pub is_hmr: bool,
    pub is_resolve: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub written: usize,
    pub skipped: usize,
}

/// Drains the session queue, loading and writing one URL at a time.
///
/// Local imports that were never seen before are discovered and queued, so
/// the crawl ends once the transitive closure is written. The first failure
/// aborts the crawl and leaves already written files in place.
pub fn flush(
    session: &mut BuildSession,
    loader: &mut dyn Loader,
    config: &BuildConfig,
    ignore_package_urls: bool,
    mode: LoadMode,
) -> Result<FlushStats, BuildError> {
    let mut stats = FlushStats::default();

    while let Some(url) = session.pop() {
        if ignore_package_urls && config.is_package_url(&url) {
            trace!("Skipping package URL {}", url);
            stats.skipped += 1;
            continue;
        }

        let result = {
            let options = LoadOptions {
                is_ssr: mode.is_ssr,
                is_hmr: mode.is_hmr,
                is_resolve: mode.is_resolve,
                import_map: session.import_map(),
            };
            loader
                .load(&url, &options)
                .map_err(|source| BuildError::Load { url: url.clone(), source })?
        };

        let out_path =
            output_path(&config.out_dir, &url).map_err(|e| BuildError::fs("write", &url, e))?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::fs("create", parent, e))?;
        }
        fs::write(&out_path, &result.contents).map_err(|e| BuildError::fs("write", &out_path, e))?;
        trace!("Wrote {} ({} bytes)", out_path.display(), result.contents.len());
        stats.written += 1;

        for specifier in &result.imports {
            if specifier.starts_with('/') {
                session.discover(specifier);
            } else {
                session.record_bare(specifier);
            }
        }
    }

    debug!("Flushed {} files, skipped {} package URLs", stats.written, stats.skipped);
    Ok(stats)
}

/// Location of `url` inside `out_dir`. URLs that would leave it are rejected.
pub fn output_path(out_dir: &Path, url: &str) -> io::Result<PathBuf> {
    let relative = PathBuf::from(url.trim_start_matches('/')).clean();
    let escapes = relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes || relative.as_os_str().is_empty() || relative == Path::new(".") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("URL '{}' does not name a file inside the output directory", url),
        ));
    }
    Ok(out_dir.join(relative))
}
