//! Core import scanning and rewriting for snowline.
//!
//! This crate locates import and re-export specifiers inside build sources
//! and rewrites them in place:
//! - Scanning JavaScript/TypeScript with the oxc parser
//! - Scanning HTML `<script>`/`<style>` blocks and CSS `@import` rules
//! - Rewriting specifiers by byte span without touching the surrounding text

mod constants;
mod error;
mod rewriter;
mod scanner;
mod types;

// Re-export public API
pub use constants::{
    INDEX_FILES, MARKUP_EXTENSIONS, PROXY_SUFFIX, RESOLVE_EXTENSIONS, SCRIPT_EXTENSIONS,
    STYLESHEET_EXTENSIONS,
};
pub use error::{RewriteError, ScanError};
pub use rewriter::rewrite;
pub use scanner::scan_imports;
pub use types::{ContentKind, ImportRecord, SourceFile};
