//! Profiler configuration and label filtering.

use std::fs;
use std::path::{Path, PathBuf};

use foldhash::HashSet;
use serde::Deserialize;
use tracing::debug;

use crate::fileio::read_all_lines;
use crate::{ClockKind, Error, MemorySink, ReportSink, Result};

/// Where report lines go, as written in a configuration file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
#[non_exhaustive]
pub enum SinkConfig {
    /// Standard output.
    #[default]
    Stdout,

    /// Standard error.
    Stderr,

    /// Append to a file.
    File {
        /// The file to append to.
        path: PathBuf,
    },

    /// Keep lines in memory.
    Memory,
}

impl SinkConfig {
    /// Creates the sink this configuration describes. Every call to this creates a new
    /// in-memory buffer for [`SinkConfig::Memory`].
    #[must_use]
    pub fn to_sink(&self) -> ReportSink {
        match self {
            Self::Stdout => ReportSink::Stdout,
            Self::Stderr => ReportSink::Stderr,
            Self::File { path } => ReportSink::File(path.clone()),
            Self::Memory => ReportSink::Memory(MemorySink::new()),
        }
    }
}

/// Configuration of a [`Profiler`](crate::Profiler) or [`Session`](crate::Session).
///
/// Usually loaded from TOML; every key is optional.
///
/// ```toml
/// clock = "thread_cpu"
/// session_comment = "solver"
/// report_session_total = true
/// labels = ["init", "compute"]
/// labels_file = "instrumented_labels.txt"
///
/// [sink]
/// kind = "file"
/// path = "timings.log"
/// ```
///
/// # Examples
///
/// ```
/// use block_timer::{ClockKind, ProfilerConfig};
///
/// let config = ProfilerConfig::from_toml_str(
///     r#"
///     clock = "process_cpu"
///     labels = ["init"]
///     "#,
/// )
/// .unwrap();
///
/// assert_eq!(config.clock, ClockKind::ProcessCpu);
/// assert!(!config.report_session_total);
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct ProfilerConfig {
    /// The time base to measure.
    pub clock: ClockKind,

    /// Where report lines are written.
    pub sink: SinkConfig,

    /// Tag of the line reporting the whole session's elapsed time.
    pub session_comment: String,

    /// Whether finalizing a profiling session also reports the whole session's elapsed time.
    /// Off by default.
    pub report_session_total: bool,

    /// Labels to instrument. Combined with the labels listed in `labels_file`; if both are empty
    /// every label is instrumented.
    pub labels: Vec<String>,

    /// Line-oriented document listing labels to instrument, one per line.
    pub labels_file: Option<PathBuf>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            clock: ClockKind::default(),
            sink: SinkConfig::default(),
            session_comment: "session".to_owned(),
            report_session_total: false,
            labels: Vec::new(),
            labels_file: None,
        }
    }
}

impl ProfilerConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the text is not valid TOML or contains unknown keys
    /// or values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|source| Error::InvalidConfig {
            source: Box::new(source),
        })
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::InvalidConfig`] if it
    /// cannot be parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&text)
    }

    /// Builds the label filter described by `labels` and `labels_file`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the labels document exists but cannot be read.
    pub fn label_filter(&self) -> Result<LabelFilter> {
        let mut labels = self.labels.clone();

        if let Some(path) = &self.labels_file {
            labels.extend(parse_label_lines(read_all_lines(path)?));
        }

        if labels.is_empty() {
            debug!("no labels configured, instrumenting every label");
            return Ok(LabelFilter::all());
        }

        Ok(LabelFilter::only(labels))
    }
}

/// Decides which labels are instrumented.
#[derive(Clone, Debug, Default)]
pub struct LabelFilter {
    allowed: Option<HashSet<String>>,
}

impl LabelFilter {
    /// Instruments every label.
    #[must_use]
    pub fn all() -> Self {
        Self { allowed: None }
    }

    /// Instruments only the given labels.
    #[must_use]
    pub fn only<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: Some(labels.into_iter().map(Into::into).collect()),
        }
    }

    /// Reads a line-oriented document listing the labels to instrument.
    ///
    /// Each line holds one label. Surrounding whitespace is ignored, as are blank lines and
    /// lines starting with `#`. A missing or empty document instruments every label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the document exists but cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let labels: Vec<String> = parse_label_lines(read_all_lines(path)?).collect();

        if labels.is_empty() {
            Ok(Self::all())
        } else {
            Ok(Self::only(labels))
        }
    }

    /// Whether a label is instrumented.
    #[must_use]
    pub fn allows(&self, label: &str) -> bool {
        self.allowed
            .as_ref()
            .is_none_or(|allowed| allowed.contains(label))
    }
}

fn parse_label_lines(lines: Vec<String>) -> impl Iterator<Item = String> {
    lines.into_iter().filter_map(|line| {
        let label = line.trim();
        (!label.is_empty() && !label.starts_with('#')).then(|| label.to_owned())
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn empty_text_gives_defaults() {
        let config = ProfilerConfig::from_toml_str("").unwrap();

        assert_eq!(config, ProfilerConfig::default());
        assert_eq!(config.session_comment, "session");
    }

    #[test]
    fn parses_every_key() {
        let config = ProfilerConfig::from_toml_str(
            r#"
            clock = "thread_cpu"
            session_comment = "solver"
            report_session_total = true
            labels = ["init", "compute"]
            labels_file = "labels.txt"

            [sink]
            kind = "file"
            path = "timings.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.clock, ClockKind::ThreadCpu);
        assert_eq!(config.session_comment, "solver");
        assert!(config.report_session_total);
        assert_eq!(config.labels, vec!["init", "compute"]);
        assert_eq!(config.labels_file, Some(PathBuf::from("labels.txt")));
        assert_eq!(
            config.sink,
            SinkConfig::File {
                path: PathBuf::from("timings.log")
            }
        );
    }

    #[test]
    fn rejects_unknown_keys() {
        let result = ProfilerConfig::from_toml_str("colour = \"blue\"");

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn rejects_event_clock() {
        let result = ProfilerConfig::from_toml_str("clock = \"event\"");

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn file_sink_requires_path() {
        let result = ProfilerConfig::from_toml_str("[sink]\nkind = \"file\"");

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = ProfilerConfig::from_file(dir.path().join("absent.toml"));

        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn filter_all_allows_everything() {
        let filter = LabelFilter::all();

        assert!(filter.allows("anything"));
    }

    #[test]
    fn filter_only_allows_listed_labels() {
        let filter = LabelFilter::only(["init"]);

        assert!(filter.allows("init"));
        assert!(!filter.allows("compute"));
    }

    #[test]
    fn filter_from_file_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        fs::write(&path, "# instrumented labels\n\n  init  \ncompute\n").unwrap();

        let filter = LabelFilter::from_file(&path).unwrap();

        assert!(filter.allows("init"));
        assert!(filter.allows("compute"));
        assert!(!filter.allows("# instrumented labels"));
        assert!(!filter.allows("output"));
    }

    #[test]
    fn filter_from_missing_file_allows_everything() {
        let dir = tempfile::tempdir().unwrap();

        let filter = LabelFilter::from_file(dir.path().join("absent.txt")).unwrap();

        assert!(filter.allows("anything"));
    }

    #[test]
    fn config_filter_combines_list_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        fs::write(&path, "compute\n").unwrap();

        let mut config = ProfilerConfig::default();
        config.labels = vec!["init".to_owned()];
        config.labels_file = Some(path);

        let filter = config.label_filter().unwrap();

        assert!(filter.allows("init"));
        assert!(filter.allows("compute"));
        assert!(!filter.allows("output"));
    }

    #[test]
    fn memory_sink_config_creates_fresh_buffers() {
        let config = SinkConfig::Memory;

        let (ReportSink::Memory(a), ReportSink::Memory(b)) = (config.to_sink(), config.to_sink())
        else {
            panic!("memory sink config must create memory sinks");
        };

        a.clear();
        assert!(b.lines().is_empty());
    }
}
