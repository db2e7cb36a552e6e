use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

use crate::{Error, Result};

/// Reads a text document as a list of lines, without line terminators.
///
/// A document that does not exist is treated as empty; its absence is logged at info level.
///
/// # Errors
///
/// Returns [`Error::Io`] if the document exists but cannot be read or is not valid UTF-8.
///
/// # Examples
///
/// ```
/// use block_timer::fileio::read_all_lines;
///
/// let lines = read_all_lines("there/is/no/such/document.txt").unwrap();
/// assert!(lines.is_empty());
/// ```
pub fn read_all_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();

    match fs::read_to_string(path) {
        Ok(text) => Ok(text.lines().map(str::to_owned).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no document to read, treating it as empty");
            Ok(Vec::new())
        }
        Err(source) => Err(Error::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Looks up the value of `key` on line `index` of a document.
///
/// A line holds whitespace-separated `key=value` pairs. Returns `None` if the line does not
/// exist or has no such key. Surrounding whitespace around the key and value is ignored.
///
/// # Examples
///
/// ```
/// use block_timer::fileio::line_value;
///
/// let lines = vec!["label=init clock=thread_cpu".to_string()];
///
/// assert_eq!(line_value(&lines, 0, "clock"), Some("thread_cpu"));
/// assert_eq!(line_value(&lines, 0, "sink"), None);
/// assert_eq!(line_value(&lines, 1, "clock"), None);
/// ```
#[must_use]
pub fn line_value<'a>(lines: &'a [String], index: usize, key: &str) -> Option<&'a str> {
    lines
        .get(index)?
        .split_whitespace()
        .filter_map(|pair| pair.split_once('='))
        .find(|(candidate, _)| candidate.trim() == key)
        .map(|(_, value)| value.trim())
}
