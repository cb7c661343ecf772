//! # Playlist Parser
//!
//! Reads M3U playlists from local files.
//!
//! [`PlaylistParser::parse`] checks the URI and opens the file up front, so
//! "not a playlist", "not a local file" and I/O failures are reported before
//! any entry is produced. Entries are then read one line at a time by the
//! returned [`PlaylistEntries`] iterator:
//!
//! - lines starting with `#` are comments
//! - backslashes are read as `/`
//! - anything containing `://` is already a URI and is passed through
//! - absolute paths become `file://` URIs
//! - relative paths are resolved against the playlist's directory
//!
//! ## Usage
//!
//! ```no_run
//! use core_library::PlaylistParser;
//!
//! let entries = PlaylistParser::new().parse("file:///home/me/Music/mix.m3u")?;
//! for uri in entries {
//!     println!("{}", uri);
//! }
//! # Ok::<(), core_library::LibraryError>(())
//! ```

use crate::error::{LibraryError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

const FILE_SCHEME: &str = "file:";
const M3U_EXTENSION: &str = ".m3u";

#[derive(Debug, Default, Clone, Copy)]
pub struct PlaylistParser;

impl PlaylistParser {
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if `uri` names a playlist format this parser reads.
    pub fn is_playlist(uri: &str) -> bool {
        uri.rfind('.')
            .map(|dot| uri[dot..].eq_ignore_ascii_case(M3U_EXTENSION))
            .unwrap_or(false)
    }

    /// Open the playlist at `uri`.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::UnknownPlaylistType`] unless the URI ends in `.m3u`
    /// - [`LibraryError::UnsupportedScheme`] unless it is a `file:` URI
    /// - [`LibraryError::InvalidUri`] if it does not name a local path
    /// - [`LibraryError::Io`] if the file cannot be opened
    pub fn parse(&self, uri: &str) -> Result<PlaylistEntries> {
        if !Self::is_playlist(uri) {
            return Err(LibraryError::UnknownPlaylistType(uri.to_string()));
        }

        let has_file_scheme = uri
            .get(..FILE_SCHEME.len())
            .map(|scheme| scheme.eq_ignore_ascii_case(FILE_SCHEME))
            .unwrap_or(false);
        if !has_file_scheme {
            return Err(LibraryError::UnsupportedScheme(uri.to_string()));
        }

        let path = file_uri_to_path(uri)?;
        let file = File::open(&path)?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        debug!(path = %path.display(), "Opened playlist");

        Ok(PlaylistEntries {
            lines: BufReader::new(file).lines(),
            base,
            done: false,
        })
    }
}

/// Lazily produced playlist entries.
///
/// Finite and single-pass: reading consumes the underlying file.
pub struct PlaylistEntries {
    lines: Lines<BufReader<File>>,
    base: PathBuf,
    done: bool,
}

impl PlaylistEntries {
    /// Directory relative entries are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, line: &str) -> Option<String> {
        if line.starts_with('#') {
            return None;
        }

        let line = line.replace('\\', "/");
        let line = line.split(['\r', '\n']).next().unwrap_or_default();
        if line.is_empty() {
            return None;
        }

        if line.contains("://") {
            return Some(line.to_string());
        }

        let path = Path::new(line);
        if path.is_absolute() {
            path_to_file_uri(path)
        } else {
            path_to_file_uri(&self.base.join(path))
        }
    }
}

impl Iterator for PlaylistEntries {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while !self.done {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if let Some(entry) = self.resolve(&line) {
                        return Some(entry);
                    }
                    trace!(line = %line, "Skipped playlist line");
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Stopped reading playlist");
                    self.done = true;
                }
                None => self.done = true,
            }
        }
        None
    }
}

impl std::iter::FusedIterator for PlaylistEntries {}

impl std::fmt::Debug for PlaylistEntries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistEntries")
            .field("base", &self.base)
            .field("done", &self.done)
            .finish()
    }
}

/// `file:/p`, `file:///p` and `file://localhost/p` to `/p`, percent-decoded.
fn file_uri_to_path(uri: &str) -> Result<PathBuf> {
    let invalid = || LibraryError::InvalidUri(uri.to_string());

    let rest = uri.get(FILE_SCHEME.len()..).ok_or_else(invalid)?;
    let encoded = match rest.strip_prefix("//") {
        Some(authority) => {
            let slash = authority.find('/').ok_or_else(invalid)?;
            let host = &authority[..slash];
            if !host.is_empty() && !host.eq_ignore_ascii_case("localhost") {
                return Err(invalid());
            }
            &authority[slash..]
        }
        None => rest,
    };

    let decoded = urlencoding::decode(encoded).map_err(|_| invalid())?;
    let path = PathBuf::from(decoded.into_owned());
    if !path.is_absolute() {
        return Err(invalid());
    }
    Ok(path)
}

/// Absolute path to a percent-encoded `file://` URI. `None` for paths that
/// are not valid UTF-8.
fn path_to_file_uri(path: &Path) -> Option<String> {
    let path = path.to_str()?;
    let encoded: Vec<_> = path.split('/').map(urlencoding::encode).collect();
    Some(format!("file://{}", encoded.join("/")))
}
