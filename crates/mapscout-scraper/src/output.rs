//! Destinations for per-term result collections.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use mapscout_core::ResultCollection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name prefix shared by every output file.
pub const FILE_PREFIX: &str = "google_maps_data_";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON write failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Receives the finished collection for each search term.
pub trait OutputSink: Send {
    /// Persists `results` for `term`. Called once per term, after extraction.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the results cannot be written.
    fn accept(&mut self, term: &str, results: &ResultCollection) -> Result<(), SinkError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn accept(&mut self, _term: &str, _results: &ResultCollection) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Which file formats [`FileSink`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Both,
}

impl OutputFormat {
    fn writes_csv(self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }

    fn writes_json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }
}

/// Writes `google_maps_data_<term>.{csv,json}` into a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
    format: OutputFormat,
    written: Vec<PathBuf>,
}

impl FileSink {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
            written: Vec::new(),
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Every file written so far, in write order.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

fn write_csv(path: &Path, results: &ResultCollection) -> Result<(), SinkError> {
    let file = create(path)?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    if results.is_empty() {
        // serialize() only emits headers alongside the first row
        writer.write_record(CSV_HEADERS)?;
    }
    for business in results {
        writer.serialize(business)?;
    }
    writer.flush().map_err(|source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn write_json(path: &Path, results: &ResultCollection) -> Result<(), SinkError> {
    let file = create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), results)?;
    Ok(())
}

const CSV_HEADERS: [&str; 8] = [
    "name",
    "address",
    "website",
    "phone_number",
    "reviews_count",
    "reviews_average",
    "latitude",
    "longitude",
];

impl OutputSink for FileSink {
    fn accept(&mut self, term: &str, results: &ResultCollection) -> Result<(), SinkError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| SinkError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        let stem = file_stem(term);

        if self.format.writes_csv() {
            let path = self.output_dir.join(format!("{stem}.csv"));
            write_csv(&path, results)?;
            tracing::info!(term, path = %path.display(), rows = results.len(), "wrote CSV");
            self.written.push(path);
        }
        if self.format.writes_json() {
            let path = self.output_dir.join(format!("{stem}.json"));
            write_json(&path, results)?;
            tracing::info!(term, path = %path.display(), rows = results.len(), "wrote JSON");
            self.written.push(path);
        }
        Ok(())
    }
}

fn create(path: &Path) -> Result<File, SinkError> {
    File::create(path).map_err(|source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// File stem for `term`: whitespace becomes `_`, anything that is not
/// alphanumeric, `-`, `_` or `.` is dropped.
///
/// ```
/// use mapscout_scraper::output::file_stem;
/// assert_eq!(file_stem("pizza in new york"), "google_maps_data_pizza_in_new_york");
/// ```
#[must_use]
pub fn file_stem(term: &str) -> String {
    let mut cleaned = String::with_capacity(term.len());
    for ch in term.trim().chars() {
        if ch.is_whitespace() {
            cleaned.push('_');
        } else if ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            cleaned.push(ch);
        }
    }
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        format!("{FILE_PREFIX}unnamed")
    } else {
        format!("{FILE_PREFIX}{cleaned}")
    }
}
