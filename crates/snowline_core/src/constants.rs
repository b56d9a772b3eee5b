//! Constants for file extensions, resolution order and proxy modules.
//!
//! This module centralizes extension handling so that scanning, rewriting
//! and resolution agree on which files are scripts, markup or stylesheets.
//!
//! ## Content kinds
//!
//! - **Script**: `.ts`, `.tsx`, `.mts`, `.cts`, `.js`, `.jsx`, `.mjs`, `.cjs`
//! - **Markup**: `.html`, `.htm`
//! - **Stylesheet**: `.css`
//!
//! Any other local import is served to scripts through a generated
//! `.proxy.js` module.

/// File extensions whose contents are scanned as JavaScript/TypeScript
pub const SCRIPT_EXTENSIONS: &[&str] = &[
    "ts",  // TypeScript
    "tsx", // TypeScript with JSX
    "mts", // TypeScript module
    "cts", // TypeScript CommonJS
    "js",  // JavaScript
    "jsx", // JavaScript with JSX
    "mjs", // JavaScript module
    "cjs", // JavaScript CommonJS
];

/// File extensions whose contents are scanned as HTML documents
pub const MARKUP_EXTENSIONS: &[&str] = &["html", "htm"];

/// File extensions whose contents are scanned as CSS
pub const STYLESHEET_EXTENSIONS: &[&str] = &["css"];

/// Extensions to try when completing an extensionless local import (in priority order)
pub const RESOLVE_EXTENSIONS: &[&str] = &["js", "mjs", "jsx", "ts", "tsx", "mts", "cjs", "cts"];

/// Index file names to try when a local import names a directory
pub const INDEX_FILES: &[&str] = &[
    "index.js",
    "index.mjs",
    "index.jsx",
    "index.ts",
    "index.tsx",
    "index.mts",
    "index.cjs",
    "index.cts",
];

/// Suffix of the generated module that lets scripts import a non-script asset
pub const PROXY_SUFFIX: &str = ".proxy.js";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_extensions_are_script_extensions() {
        assert_eq!(RESOLVE_EXTENSIONS.len(), SCRIPT_EXTENSIONS.len());
        for ext in RESOLVE_EXTENSIONS {
            assert!(
                SCRIPT_EXTENSIONS.contains(ext),
                "RESOLVE_EXTENSIONS contains '{}' which is not in SCRIPT_EXTENSIONS",
                ext
            );
        }
    }

    #[test]
    fn test_index_files_follow_resolve_order() {
        assert_eq!(INDEX_FILES.len(), RESOLVE_EXTENSIONS.len());
        for (index_file, ext) in INDEX_FILES.iter().zip(RESOLVE_EXTENSIONS) {
            assert_eq!(*index_file, format!("index.{}", ext));
        }
    }

    #[test]
    fn test_content_kinds_do_not_overlap() {
        for ext in MARKUP_EXTENSIONS.iter().chain(STYLESHEET_EXTENSIONS) {
            assert!(!SCRIPT_EXTENSIONS.contains(ext));
        }
    }

    #[test]
    fn test_proxy_suffix_is_a_script() {
        let ext = PROXY_SUFFIX.rsplit('.').next().unwrap();
        assert!(SCRIPT_EXTENSIONS.contains(&ext));
    }
}
