use crate::constants::{MARKUP_EXTENSIONS, SCRIPT_EXTENSIONS, STYLESHEET_EXTENSIONS};

/// One import or re-export specifier found in a source file.
///
/// `start..end` is the byte span of the specifier value, without its quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportRecord {
    pub start: usize,
    pub end: usize,
    pub is_dynamic: bool,
}

impl ImportRecord {
    /// The specifier text this record points at.
    pub fn specifier<'s>(&self, code: &'s str) -> &'s str {
        &code[self.start..self.end]
    }

    pub(crate) fn shifted(self, offset: usize) -> Self {
        Self { start: self.start + offset, end: self.end + offset, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Script,
    Markup,
    Stylesheet,
}

impl ContentKind {
    /// Content kind for a file extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if SCRIPT_EXTENSIONS.contains(&ext.as_str()) {
            Some(ContentKind::Script)
        } else if MARKUP_EXTENSIONS.contains(&ext.as_str()) {
            Some(ContentKind::Markup)
        } else if STYLESHEET_EXTENSIONS.contains(&ext.as_str()) {
            Some(ContentKind::Stylesheet)
        } else {
            None
        }
    }
}

/// Source text handed to the rewriter, tagged with its file extension.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    extension: &'a str,
    contents: &'a str,
}

impl<'a> SourceFile<'a> {
    pub fn new(extension: &'a str, contents: &'a str) -> Self {
        Self { extension: extension.trim_start_matches('.'), contents }
    }

    pub fn extension(&self) -> &'a str {
        self.extension
    }

    pub fn contents(&self) -> &'a str {
        self.contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_from_extension() {
        assert_eq!(ContentKind::from_extension("js"), Some(ContentKind::Script));
        assert_eq!(ContentKind::from_extension(".tsx"), Some(ContentKind::Script));
        assert_eq!(ContentKind::from_extension("HTML"), Some(ContentKind::Markup));
        assert_eq!(ContentKind::from_extension("css"), Some(ContentKind::Stylesheet));
        assert_eq!(ContentKind::from_extension("png"), None);
        assert_eq!(ContentKind::from_extension(""), None);
    }

    #[test]
    fn test_source_file_strips_leading_dot() {
        let file = SourceFile::new(".js", "export {};");
        assert_eq!(file.extension(), "js");
        assert_eq!(file.contents(), "export {};");
    }

    #[test]
    fn test_record_specifier_and_shift() {
        let code = "import './a.js';";
        let record = ImportRecord { start: 8, end: 14, is_dynamic: false };
        assert_eq!(record.specifier(code), "./a.js");

        let outer = format!("<script>{}</script>", code);
        assert_eq!(record.shifted(8).specifier(&outer), "./a.js");
    }
}
