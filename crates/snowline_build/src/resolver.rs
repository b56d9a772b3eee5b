use dashmap::DashMap;
use log::trace;
use serde_json::Value;
use snowline_core::{INDEX_FILES, RESOLVE_EXTENSIONS};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// `exports` conditions in the order they are preferred.
const EXPORT_CONDITIONS: &[&str] = &["browser", "import", "module", "default", "require"];

/// Candidate names for `base`: as written, with each resolve extension
/// appended, then as a directory holding an index file.
pub(crate) fn completions(base: &str) -> Vec<String> {
    let trimmed = base.trim_end_matches('/');
    let mut candidates = Vec::with_capacity(1 + RESOLVE_EXTENSIONS.len() + INDEX_FILES.len());
    if !base.ends_with('/') {
        candidates.push(base.to_string());
        candidates.extend(RESOLVE_EXTENSIONS.iter().map(|ext| format!("{}.{}", base, ext)));
    }
    candidates.extend(INDEX_FILES.iter().map(|index| format!("{}/{}", trimmed, index)));
    candidates
}

fn resolve_file(p: &Path) -> Option<PathBuf> {
    completions(&p.to_string_lossy()).into_iter().map(PathBuf::from).find(|c| c.is_file())
}

/// Splits `@scope/name/sub/path` into (`@scope/name`, `sub/path`).
pub(crate) fn split_specifier(specifier: &str) -> (&str, &str) {
    let name_segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut end = 0;
    for (seen, segment) in specifier.split('/').enumerate() {
        if seen == name_segments {
            break;
        }
        end += segment.len() + usize::from(seen > 0);
    }
    let name = &specifier[..end];
    let subpath = specifier[end..].trim_start_matches('/');
    (name, subpath)
}

/// Entry file for a bare specifier, searching `node_modules` from `root`
/// upward.
pub fn resolve_package(
    root: &Path,
    specifier: &str,
    cache: &DashMap<String, Option<PathBuf>>,
) -> Option<PathBuf> {
    if let Some(v) = cache.get(specifier) {
        trace!("Cache hit for package '{}'", specifier);
        return v.clone();
    }

    let (name, subpath) = split_specifier(specifier);
    let mut resolved = None;
    let mut current_dir = Some(root);
    while let Some(dir) = current_dir {
        let nm = dir.join("node_modules").join(name);
        if nm.is_dir() {
            trace!("Checking node_modules at: {:?}", nm);
            resolved = resolve_in_package(&nm, subpath);
            if resolved.is_some() {
                break;
            }
        }
        current_dir = dir.parent();
    }

    match &resolved {
        Some(path) => trace!("Resolved package '{}' to {}", specifier, path.display()),
        None => trace!("Failed to resolve package '{}'", specifier),
    }
    cache.insert(specifier.to_string(), resolved.clone());
    resolved
}

fn resolve_in_package(nm: &Path, subpath: &str) -> Option<PathBuf> {
    let manifest = fs::read_to_string(nm.join("package.json"))
        .ok()
        .and_then(|txt| serde_json::from_str::<Value>(&txt).ok());

    if let Some(manifest) = &manifest
        && let Some(exports) = manifest.get("exports")
    {
        let key = if subpath.is_empty() { ".".to_string() } else { format!("./{}", subpath) };
        let entry = match exports.as_object() {
            Some(obj) if obj.keys().any(|k| k.starts_with('.')) => obj.get(&key),
            // Sugar: `exports` is itself the "." target
            _ if subpath.is_empty() => Some(exports),
            _ => None,
        };
        if let Some(target) = entry.and_then(export_target)
            && let Some(resolved) = resolve_file(&nm.join(target.trim_start_matches("./")))
        {
            return Some(resolved);
        }
    }

    if !subpath.is_empty() {
        return resolve_file(&nm.join(subpath));
    }

    if let Some(manifest) = &manifest {
        for field in ["module", "main"] {
            if let Some(s) = manifest.get(field).and_then(Value::as_str)
                && let Some(resolved) = resolve_file(&nm.join(s.trim_start_matches("./")))
            {
                return Some(resolved);
            }
        }
    }

    INDEX_FILES.iter().map(|index| nm.join(index)).find(|p| p.is_file())
}

/// First string target of an `exports` entry, following nested conditions.
fn export_target(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Array(items) => items.iter().find_map(export_target),
        Value::Object(conditions) => EXPORT_CONDITIONS
            .iter()
            .find_map(|key| conditions.get(*key).and_then(export_target)),
        _ => None,
    }
}
