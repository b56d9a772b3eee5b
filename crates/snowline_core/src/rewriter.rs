use log::trace;

use crate::{
    constants::PROXY_SUFFIX,
    error::RewriteError,
    scanner::{BlockKind, markup_blocks, scan_script, scan_stylesheet},
    types::{ContentKind, ImportRecord, SourceFile},
};

/// Rewrite every import specifier in `file` through `replace`.
///
/// All text outside the specifier spans is preserved byte for byte, so an
/// identity `replace` returns the input unchanged.
pub fn rewrite<F>(file: &SourceFile<'_>, mut replace: F) -> Result<String, RewriteError>
where
    F: FnMut(&str) -> String,
{
    let ext = file.extension().to_ascii_lowercase();
    let code = file.contents();
    match ContentKind::from_extension(&ext) {
        Some(ContentKind::Script) => rewrite_script(code, &ext, &mut replace),
        Some(ContentKind::Markup) => rewrite_markup(code, &mut replace),
        Some(ContentKind::Stylesheet) => Ok(rewrite_stylesheet(code, &mut replace)),
        None => Err(RewriteError::IncompatibleFileType(file.extension().to_string())),
    }
}

fn rewrite_script<F>(code: &str, ext: &str, replace: &mut F) -> Result<String, RewriteError>
where
    F: FnMut(&str) -> String,
{
    let records = scan_script(code, ext)?;
    Ok(splice(code, &records, |text, record| {
        let replacement = replace(record.specifier(text));
        if !record.is_dynamic {
            return (record.start, record.end, replacement);
        }
        // import() takes an expression: swap the whole literal and keep its delimiter
        let delimiter = text[..record.start].chars().next_back().unwrap_or('"');
        (
            record.start - delimiter.len_utf8(),
            record.end + delimiter.len_utf8(),
            quote_specifier(delimiter, &replacement),
        )
    }))
}

fn rewrite_stylesheet<F>(code: &str, replace: &mut F) -> String
where
    F: FnMut(&str) -> String,
{
    let records = scan_stylesheet(code);
    splice(code, &records, |text, record| {
        let replacement = replace(record.specifier(text));
        let replacement = match replacement.strip_suffix(PROXY_SUFFIX) {
            Some(target) => {
                trace!("Stripping proxy suffix from @import '{}'", replacement);
                target.to_string()
            }
            None => replacement,
        };
        (record.start, record.end, replacement)
    })
}

fn rewrite_markup<F>(code: &str, replace: &mut F) -> Result<String, RewriteError>
where
    F: FnMut(&str) -> String,
{
    let blocks = markup_blocks(code);
    trace!("Rewriting {} inline blocks", blocks.len());
    blocks.iter().rev().try_fold(code.to_string(), |text, block| {
        let body = &text[block.start..block.end];
        let rewritten = match block.kind {
            BlockKind::Script => rewrite_script(body, "js", &mut *replace)?,
            BlockKind::Style => rewrite_stylesheet(body, &mut *replace),
        };
        Ok(join_around(&text, block.start, block.end, &rewritten))
    })
}

/// Applies one replacement per record, highest offset first.
///
/// `edit` returns the span to replace, which may widen the record's own span
/// but must not reach into another record.
fn splice<E>(code: &str, records: &[ImportRecord], mut edit: E) -> String
where
    E: FnMut(&str, &ImportRecord) -> (usize, usize, String),
{
    records.iter().rev().fold(code.to_string(), |text, record| {
        let (start, end, replacement) = edit(&text, record);
        join_around(&text, start, end, &replacement)
    })
}

fn join_around(text: &str, start: usize, end: usize, middle: &str) -> String {
    let mut joined = String::with_capacity(text.len() - (end - start) + middle.len());
    joined.push_str(&text[..start]);
    joined.push_str(middle);
    joined.push_str(&text[end..]);
    joined
}

/// Quotes `specifier` with `delimiter`, escaping unescaped delimiters (and
/// `${` inside template literals).
fn quote_specifier(delimiter: char, specifier: &str) -> String {
    let mut quoted = String::with_capacity(specifier.len() + 2);
    quoted.push(delimiter);
    let mut escaped = false;
    let mut chars = specifier.chars().peekable();
    while let Some(ch) = chars.next() {
        if !escaped {
            let opens_interpolation = delimiter == '`' && ch == '$' && chars.peek() == Some(&'{');
            if ch == delimiter || opens_interpolation {
                quoted.push('\\');
            }
        }
        escaped = ch == '\\' && !escaped;
        quoted.push(ch);
    }
    quoted.push(delimiter);
    quoted
}
