use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The scanner was asked for a content subtype it has no strategy for.
    #[error("unsupported file type for import scanning: '{0}'")]
    UnsupportedFileType(String),

    #[error("failed to parse {file_type} source: {message}")]
    Parse { file_type: String, message: String },
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("incompatible file type for import rewriting: '{0}'")]
    IncompatibleFileType(String),

    #[error(transparent)]
    Scan(#[from] ScanError),
}
