use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, Result};

/// Whether a directory entry is a file or a directory.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EntryKind {
    /// A regular file, or anything else that is not a directory.
    File,

    /// A directory.
    Directory,
}

/// The immediate contents of one directory, split by kind.
///
/// Both lists hold entry names (not full paths) sorted by name. The `.` and `..` entries are
/// never included.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Listing {
    files: Vec<String>,
    directories: Vec<String>,
}

impl Listing {
    /// Names of the files in the directory.
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Names of the subdirectories of the directory.
    #[must_use]
    pub fn directories(&self) -> &[String] {
        &self.directories
    }
}

/// One entry found while walking a directory tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalkEntry {
    path: PathBuf,
    kind: EntryKind,
    depth: usize,
}

impl WalkEntry {
    /// Full path of the entry.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// What kind of entry this is.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Nesting depth below the walked directory. Immediate children have depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads the entries of a directory, sorted by name. Symbolic links are not followed.
fn sorted_entries(path: &Path) -> Result<Vec<(String, PathBuf, EntryKind)>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(path).map_err(io_error(path))? {
        let entry = entry.map_err(io_error(path))?;
        let file_type = entry.file_type().map_err(io_error(&entry.path()))?;

        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        entries.push((
            entry.file_name().to_string_lossy().into_owned(),
            entry.path(),
            kind,
        ));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Lists the files and subdirectories directly inside a directory.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be read.
pub fn list_entries(path: impl AsRef<Path>) -> Result<Listing> {
    let mut listing = Listing::default();

    for (name, _, kind) in sorted_entries(path.as_ref())? {
        match kind {
            EntryKind::File => listing.files.push(name),
            EntryKind::Directory => listing.directories.push(name),
        }
    }

    Ok(listing)
}

/// Walks a directory tree depth-first.
///
/// Every directory is reported before its contents and the entries of one directory are
/// visited in name order. The walked directory itself is not reported. Symbolic links are
/// reported as files and never followed.
///
/// # Errors
///
/// Returns [`Error::Io`] if any directory in the tree cannot be read.
pub fn walk(path: impl AsRef<Path>) -> Result<Vec<WalkEntry>> {
    let mut found = Vec::new();
    walk_into(path.as_ref(), 0, &mut found)?;
    Ok(found)
}

fn walk_into(path: &Path, depth: usize, found: &mut Vec<WalkEntry>) -> Result<()> {
    for (_, entry_path, kind) in sorted_entries(path)? {
        found.push(WalkEntry {
            path: entry_path.clone(),
            kind,
            depth,
        });

        if kind == EntryKind::Directory {
            let child_depth = depth
                .checked_add(1)
                .expect("walk depth overflows usize - this indicates an unrealistic scenario");
            walk_into(&entry_path, child_depth, found)?;
        }
    }

    Ok(())
}

/// Creates a directory. The parent directory must already exist.
///
/// Permissions are those the operating system assigns by default, which on Unix means the
/// process umask applies.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be created, including when it already exists.
#[expect(
    clippy::create_dir,
    reason = "creating missing parents would hide a mistyped output path"
)]
pub fn make_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir(path).map_err(io_error(path))?;
    debug!(path = %path.display(), "created directory");
    Ok(())
}

/// Removes an empty directory.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory does not exist, is not empty or cannot be removed.
pub fn remove_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::remove_dir(path).map_err(io_error(path))?;
    debug!(path = %path.display(), "removed directory");
    Ok(())
}
