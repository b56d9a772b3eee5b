use log::{debug, trace};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{Visit, walk};
use oxc_parser::{Parser as OxcParser, ParserReturn};
use oxc_span::{SourceType, Span};
use regex::Regex;
use std::sync::LazyLock;

use crate::{
    error::ScanError,
    types::{ContentKind, ImportRecord},
};

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("script block pattern")
});
static STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>(.*?)</style\s*>").expect("style block pattern")
});
static TYPE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)type\s*=\s*["']?([^"'\s>]+)"#).expect("type attribute pattern")
});
static CSS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s*(?:url\(\s*)?(?:"([^"]*)"|'([^']*)')"#).expect("@import pattern")
});

/// `<script type="...">` values whose body is JavaScript
const SCRIPT_TYPES: &[&str] = &[
    "module",
    "text/javascript",
    "application/javascript",
    "text/ecmascript",
    "application/ecmascript",
];

/// Scan source text for import specifiers.
///
/// `file_type` is the content subtype (a file extension such as `js`, `html`
/// or `css`). Records are returned in source order.
pub fn scan_imports(code: &str, file_type: &str) -> Result<Vec<ImportRecord>, ScanError> {
    let ext = file_type.trim_start_matches('.').to_ascii_lowercase();
    let records = match ContentKind::from_extension(&ext) {
        Some(ContentKind::Script) => scan_script(code, &ext)?,
        Some(ContentKind::Markup) => scan_markup(code)?,
        Some(ContentKind::Stylesheet) => scan_stylesheet(code),
        None => return Err(ScanError::UnsupportedFileType(file_type.to_string())),
    };
    debug!("Found {} import specifiers in {} source", records.len(), ext);
    Ok(records)
}

pub(crate) fn scan_script(code: &str, ext: &str) -> Result<Vec<ImportRecord>, ScanError> {
    let allocator = Allocator::default();
    let ParserReturn { program, errors, panicked, .. } =
        OxcParser::new(&allocator, code, source_type_for(ext)).parse();

    if panicked {
        let message = errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unrecoverable syntax error".to_string());
        return Err(ScanError::Parse { file_type: ext.to_string(), message });
    }
    if !errors.is_empty() {
        trace!("Parser recovered from {} errors in {} source", errors.len(), ext);
    }

    let mut collector = SpecifierCollector::default();
    collector.visit_program(&program);

    let mut records = collector.records;
    records.sort_by_key(|r| r.start);
    Ok(records)
}

#[derive(Default)]
struct SpecifierCollector {
    records: Vec<ImportRecord>,
}

impl SpecifierCollector {
    /// Records the value of a string or template literal; `span` covers its delimiters.
    fn push_literal(&mut self, span: Span, is_dynamic: bool) {
        let start = span.start as usize + 1;
        let end = span.end as usize - 1;
        trace!("Found {} specifier at {}..{}", if is_dynamic { "dynamic" } else { "static" }, start, end);
        self.records.push(ImportRecord { start, end, is_dynamic });
    }
}

impl<'a> Visit<'a> for SpecifierCollector {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        self.push_literal(decl.source.span, false);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        self.push_literal(decl.source.span, false);
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &decl.source {
            self.push_literal(source.span, false);
        }
        // Exported declarations can still contain dynamic imports
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        match &expr.source {
            Expression::StringLiteral(lit) => self.push_literal(lit.span, true),
            Expression::TemplateLiteral(tpl) if tpl.expressions.is_empty() => {
                self.push_literal(tpl.span, true)
            }
            _ => trace!("Skipping dynamic import without a literal specifier"),
        }
        walk::walk_import_expression(self, expr);
    }
}

fn source_type_for(ext: &str) -> SourceType {
    SourceType::default()
        .with_jsx(matches!(ext, "tsx" | "jsx"))
        .with_typescript(matches!(ext, "ts" | "tsx" | "mts" | "cts"))
        .with_module(!matches!(ext, "cjs" | "cts"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    Script,
    Style,
}

/// An inline `<script>` or `<style>` body inside an HTML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block {
    pub(crate) kind: BlockKind,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

/// Finds every non-blank inline script and style body, sorted and non-overlapping.
pub(crate) fn markup_blocks(code: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();

    for caps in SCRIPT_BLOCK.captures_iter(code) {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let Some(body) = caps.get(2) else { continue };
        if body.as_str().trim().is_empty() {
            continue;
        }
        if !is_script_type(attrs) {
            trace!("Skipping non-JavaScript script block at {}", body.start());
            continue;
        }
        blocks.push(Block { kind: BlockKind::Script, start: body.start(), end: body.end() });
    }

    for caps in STYLE_BLOCK.captures_iter(code) {
        let Some(body) = caps.get(1) else { continue };
        if body.as_str().trim().is_empty() {
            continue;
        }
        blocks.push(Block { kind: BlockKind::Style, start: body.start(), end: body.end() });
    }

    blocks.sort_by_key(|b| b.start);

    // A "<style>" inside a script string (or the reverse) is not a real block
    let mut last_end = 0;
    blocks.retain(|b| {
        let keep = b.start >= last_end;
        if keep {
            last_end = b.end;
        }
        keep
    });
    blocks
}

fn is_script_type(attrs: &str) -> bool {
    match TYPE_ATTR.captures(attrs).and_then(|caps| caps.get(1)) {
        Some(ty) => SCRIPT_TYPES.contains(&ty.as_str().to_ascii_lowercase().as_str()),
        None => true,
    }
}

fn scan_markup(code: &str) -> Result<Vec<ImportRecord>, ScanError> {
    let mut records = Vec::new();
    for block in markup_blocks(code) {
        let body = &code[block.start..block.end];
        let inner = match block.kind {
            BlockKind::Script => scan_script(body, "js")?,
            BlockKind::Style => scan_stylesheet(body),
        };
        records.extend(inner.into_iter().map(|r| r.shifted(block.start)));
    }
    Ok(records)
}

pub(crate) fn scan_stylesheet(code: &str) -> Vec<ImportRecord> {
    CSS_IMPORT
        .captures_iter(code)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| ImportRecord { start: m.start(), end: m.end(), is_dynamic: false })
        .collect()
}
