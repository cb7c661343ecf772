use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Unknown playlist type: {0}")]
    UnknownPlaylistType(String),

    #[error("Unsupported scheme in URI '{0}'")]
    UnsupportedScheme(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    /// Returns `true` if the resource is not a playlist this parser reads.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, LibraryError::UnknownPlaylistType(_))
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
