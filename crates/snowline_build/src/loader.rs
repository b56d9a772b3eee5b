use anyhow::{Context, Result, bail};
use log::{trace, warn};
use path_clean::PathClean;
use snowline_core::{ContentKind, PROXY_SUFFIX, SourceFile, rewrite, scan_imports};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::BuildConfig,
    mount::MountUrlMapper,
    resolver::completions,
    session::ImportMap,
    traits::{LoadOptions, LoadResult, Loader},
};

const REMOTE_PREFIXES: &[&str] = &["http://", "https://", "data:", "//"];

fn is_remote(specifier: &str) -> bool {
    REMOTE_PREFIXES.iter().any(|prefix| specifier.starts_with(prefix))
}

/// `url` without its `?query` or `#hash`.
fn without_query(url: &str) -> &str {
    url.find(['?', '#']).map_or(url, |i| &url[..i])
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Serves mounted files as they are, rewriting only their import specifiers.
///
/// TypeScript and JSX are emitted untranspiled. Anything imported from a
/// script that is not itself a script is served through a `.proxy.js`
/// module.
#[derive(Debug, Clone)]
pub struct PassthroughLoader {
    mapper: MountUrlMapper,
}

impl PassthroughLoader {
    pub fn new(config: &BuildConfig) -> Self {
        PassthroughLoader { mapper: MountUrlMapper::new(config.mounts.clone()) }
    }

    fn load_file(&self, url: &str, path: &Path, options: &LoadOptions<'_>) -> Result<LoadResult> {
        let ext = extension_of(url);
        if ContentKind::from_extension(&ext).is_none() {
            trace!("Copying {} as-is", url);
            let contents =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            return Ok(LoadResult { contents, imports: Vec::new() });
        }

        let code = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let resolved = self.resolve_source(url, &ext, &code, options.import_map)?;
        let imports = scan_imports(&resolved, &ext)?
            .iter()
            .map(|record| record.specifier(&resolved))
            .filter(|s| !is_remote(s))
            .map(without_query)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let contents = if options.is_resolve { resolved } else { code };
        Ok(LoadResult { contents: contents.into_bytes(), imports })
    }

    fn resolve_source(
        &self,
        url: &str,
        ext: &str,
        code: &str,
        import_map: Option<&ImportMap>,
    ) -> Result<String> {
        let file = SourceFile::new(ext, code);
        let resolved = rewrite(&file, |s| self.resolve_specifier(url, s, import_map))
            .with_context(|| format!("failed to rewrite imports in {}", url))?;
        Ok(resolved)
    }

    /// Final URL for `specifier` as imported from `importer`.
    fn resolve_specifier(
        &self,
        importer: &str,
        specifier: &str,
        import_map: Option<&ImportMap>,
    ) -> String {
        if specifier.is_empty() || is_remote(specifier) {
            return specifier.to_string();
        }
        let is_local =
            specifier.starts_with('/') || specifier.starts_with("./") || specifier.starts_with("../");
        if !is_local {
            return match import_map.and_then(|map| map.get(specifier)) {
                Some(url) => url.to_string(),
                None => specifier.to_string(),
            };
        }

        let path = without_query(specifier);
        let suffix = &specifier[path.len()..];
        let joined = if path.starts_with('/') {
            PathBuf::from(path)
        } else {
            Path::new(importer).parent().unwrap_or(Path::new("/")).join(path)
        };
        let mut normalized = joined.clean().to_string_lossy().replace('\\', "/");
        if path.ends_with('/') && !normalized.ends_with('/') {
            normalized.push('/');
        }

        let Some(found) =
            completions(&normalized).into_iter().find(|c| self.mapper.url_to_file(c).is_some())
        else {
            warn!("Unresolved import '{}' in {}", specifier, importer);
            return format!("{}{}", normalized, suffix);
        };

        trace!("Resolved '{}' in {} to {}", specifier, importer, found);
        let kind = ContentKind::from_extension(&extension_of(&found));
        if kind != Some(ContentKind::Script) {
            format!("{}{}{}", found, PROXY_SUFFIX, suffix)
        } else {
            format!("{}{}", found, suffix)
        }
    }

    /// A module standing in for the asset served at `asset_url`.
    fn load_proxy(
        &self,
        asset_url: &str,
        asset: &Path,
        options: &LoadOptions<'_>,
    ) -> Result<LoadResult> {
        let ext = extension_of(asset_url);
        let url_literal = serde_json::to_string(asset_url)?;
        let module = match ext.as_str() {
            "css" => {
                let css = fs::read_to_string(asset)
                    .with_context(|| format!("failed to read {}", asset.display()))?;
                let css = self.resolve_source(asset_url, &ext, &css, options.import_map)?;
                format!(
                    "const code = {};\n\
                     const styleEl = document.createElement(\"style\");\n\
                     styleEl.setAttribute(\"data-href\", {});\n\
                     styleEl.appendChild(document.createTextNode(code));\n\
                     document.head.appendChild(styleEl);\n\
                     export default code;\n",
                    serde_json::to_string(&css)?,
                    url_literal
                )
            }
            "json" => {
                let text = fs::read_to_string(asset)
                    .with_context(|| format!("failed to read {}", asset.display()))?;
                let value: serde_json::Value = serde_json::from_str(&text)
                    .with_context(|| format!("invalid JSON in {}", asset.display()))?;
                format!("export default {};\n", value)
            }
            _ => format!("export default {};\n", url_literal),
        };
        trace!("Generated proxy module for {}", asset_url);
        Ok(LoadResult { contents: module.into_bytes(), imports: vec![asset_url.to_string()] })
    }
}

impl Loader for PassthroughLoader {
    fn load(&mut self, url: &str, options: &LoadOptions<'_>) -> Result<LoadResult> {
        let url = without_query(url);
        if let Some(path) = self.mapper.url_to_file(url) {
            return self.load_file(url, &path, options);
        }
        if let Some(asset_url) = url.strip_suffix(PROXY_SUFFIX)
            && let Some(asset) = self.mapper.url_to_file(asset_url)
        {
            return self.load_proxy(asset_url, &asset, options);
        }
        bail!("no mounted file is served at {}", url)
    }
}
