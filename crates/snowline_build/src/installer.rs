use anyhow::{Context, Result, anyhow, bail};
use dashmap::DashMap;
use log::{debug, info, trace};
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Component, Path, PathBuf},
};

use crate::{
    config::BuildConfig, resolver::resolve_package, session::ImportMap, traits::PackageInstaller,
};

pub const IMPORT_MAP_FILE: &str = "import-map.json";

/// Installs packages by copying their entry file out of `node_modules`.
#[derive(Debug, Default)]
pub struct NodeModulesInstaller {
    cache: DashMap<String, Option<PathBuf>>,
}

impl NodeModulesInstaller {
    pub fn new() -> Self {
        Self::default()
    }
}

/// File name of an installed package below the package directory.
fn output_name(specifier: &str) -> String {
    if specifier.ends_with(".js") || specifier.ends_with(".mjs") {
        specifier.to_string()
    } else {
        format!("{}.js", specifier)
    }
}

fn validate_specifier(specifier: &str) -> Result<()> {
    let is_plain = !specifier.is_empty()
        && Path::new(specifier).components().all(|c| matches!(c, Component::Normal(_)));
    if !is_plain {
        bail!("'{}' is not a valid package specifier", specifier);
    }
    Ok(())
}

/// Fails when two specifiers would be installed to the same file.
fn check_collisions(bare_specifiers: &BTreeSet<String>) -> Result<()> {
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();
    for specifier in bare_specifiers {
        if let Some(other) = owners.insert(output_name(specifier), specifier) {
            bail!(
                "packages '{}' and '{}' would both be installed as {}",
                other,
                specifier,
                output_name(specifier)
            );
        }
    }
    Ok(())
}

impl PackageInstaller for NodeModulesInstaller {
    fn install(
        &mut self,
        bare_specifiers: &BTreeSet<String>,
        destination: &Path,
        config: &BuildConfig,
    ) -> Result<ImportMap> {
        info!("Installing {} packages into {}", bare_specifiers.len(), destination.display());
        let cache = &self.cache;
        let prefix = config.package_url.trim_end_matches('/');
        check_collisions(bare_specifiers)?;

        let entries: Vec<(String, String)> = bare_specifiers
            .par_iter()
            .map(|specifier| -> Result<(String, String)> {
                validate_specifier(specifier)?;
                let entry = resolve_package(&config.root, specifier, cache).ok_or_else(|| {
                    anyhow!("cannot resolve package '{}' from {}", specifier, config.root.display())
                })?;

                let name = output_name(specifier);
                let target = destination.join(&name);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                fs::copy(&entry, &target).with_context(|| {
                    format!("failed to copy {} to {}", entry.display(), target.display())
                })?;
                trace!("Installed '{}' from {}", specifier, entry.display());
                Ok((specifier.clone(), format!("{}/{}", prefix, name)))
            })
            .collect::<Result<_>>()?;

        let import_map: ImportMap = entries.into_iter().collect();
        fs::create_dir_all(destination)
            .with_context(|| format!("failed to create {}", destination.display()))?;
        let map_path = destination.join(IMPORT_MAP_FILE);
        let json = serde_json::to_string_pretty(&import_map)?;
        fs::write(&map_path, json)
            .with_context(|| format!("failed to write {}", map_path.display()))?;
        debug!("Wrote import map with {} entries to {}", import_map.len(), map_path.display());
        Ok(import_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_file;
    use tempfile::TempDir;

    fn specifiers(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("react"), "react.js");
        assert_eq!(output_name("@scope/ui"), "@scope/ui.js");
        assert_eq!(output_name("lodash/fp.js"), "lodash/fp.js");
    }

    #[test]
    fn test_install_copies_entries_and_writes_import_map() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "node_modules/preact/package.json", r#"{ "module": "dist/preact.mjs" }"#);
        create_test_file(root, "node_modules/preact/dist/preact.mjs", "export const h = 1;");
        create_test_file(root, "node_modules/@scope/ui/index.js", "export const ui = 1;");

        let config = BuildConfig::new(root);
        let destination = config.package_dir();
        let map = NodeModulesInstaller::new()
            .install(&specifiers(&["preact", "@scope/ui"]), &destination, &config)
            .unwrap();

        assert_eq!(map.get("preact"), Some("/_snowline/pkg/preact.js"));
        assert_eq!(map.get("@scope/ui"), Some("/_snowline/pkg/@scope/ui.js"));
        assert_eq!(fs::read_to_string(destination.join("preact.js")).unwrap(), "export const h = 1;");
        assert!(destination.join("@scope/ui.js").is_file());

        let written: ImportMap =
            serde_json::from_str(&fs::read_to_string(destination.join(IMPORT_MAP_FILE)).unwrap())
                .unwrap();
        assert_eq!(written, map);
    }

    #[test]
    fn test_unresolvable_package_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = BuildConfig::new(temp_dir.path());
        let err = NodeModulesInstaller::new()
            .install(&specifiers(&["nope"]), &config.package_dir(), &config)
            .unwrap_err();
        assert!(err.to_string().contains("cannot resolve package 'nope'"));
    }

    #[test]
    fn test_rejects_specifiers_sharing_an_output_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_test_file(root, "node_modules/x/index.js", "export default 1;");
        create_test_file(root, "node_modules/x.js/index.js", "export default 2;");

        let config = BuildConfig::new(root);
        let destination = config.package_dir();
        let err = NodeModulesInstaller::new()
            .install(&specifiers(&["x", "x.js"]), &destination, &config)
            .unwrap_err();
        assert!(err.to_string().contains("would both be installed as x.js"));
        assert!(!destination.join("x.js").exists());
    }

    #[test]
    fn test_rejects_escaping_specifier() {
        let temp_dir = TempDir::new().unwrap();
        let config = BuildConfig::new(temp_dir.path());
        let result = NodeModulesInstaller::new().install(
            &specifiers(&["../outside"]),
            &config.package_dir(),
            &config,
        );
        assert!(result.is_err());
    }
}
