//! Delimited Artifact Files

use csv::{Writer, WriterBuilder};
use querybench_core::{OutputSink, SinkError, SinkFactory};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Field delimiter of artifact files
pub const ARTIFACT_DELIMITER: u8 = b'|';

/// One artifact file.
///
/// Every row must have as many fields as the header; a short or long row is a
/// write error rather than a misaligned file.
pub struct DelimitedFileSink {
    artifact: String,
    path: PathBuf,
    writer: Writer<File>,
}

impl DelimitedFileSink {
    /// Create `path`, failing if it already exists
    pub fn create(artifact: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let artifact = artifact.into();
        let path = path.into();

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => SinkError::AlreadyExists {
                    artifact: artifact.clone(),
                },
                _ => SinkError::Io {
                    artifact: artifact.clone(),
                    source,
                },
            })?;

        let writer = WriterBuilder::new()
            .delimiter(ARTIFACT_DELIMITER)
            .flexible(false)
            .from_writer(file);

        Ok(Self {
            artifact,
            path,
            writer,
        })
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for DelimitedFileSink {
    fn write_row(&mut self, row: &[String]) -> Result<(), SinkError> {
        self.writer
            .write_record(row)
            .map_err(|e| SinkError::Write {
                artifact: self.artifact.clone(),
                message: e.to_string(),
            })
    }

    fn close(mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(|source| SinkError::Io {
            artifact: self.artifact.clone(),
            source,
        })?;
        info!(path = %self.path.display(), "Wrote artifact");
        Ok(())
    }
}

/// Opens artifact files inside one output directory
#[derive(Debug, Clone)]
pub struct DirectorySinkFactory {
    dir: PathBuf,
}

impl DirectorySinkFactory {
    /// Factory writing into `dir`, created on first use
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SinkFactory for DirectorySinkFactory {
    type Sink = DelimitedFileSink;

    fn create(&self, artifact: &str) -> Result<DelimitedFileSink, SinkError> {
        fs::create_dir_all(&self.dir).map_err(|source| SinkError::Io {
            artifact: artifact.to_string(),
            source,
        })?;
        DelimitedFileSink::create(artifact, self.dir.join(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_writes_pipe_delimited_rows() {
        let dir = tempfile::tempdir().unwrap();
        let factory = DirectorySinkFactory::new(dir.path().join("results"));

        let mut sink = factory.create("hive-smoke.csv").unwrap();
        sink.write_row(&row(&["id", "status"])).unwrap();
        sink.write_row(&row(&["q1", "SUCCESS"])).unwrap();
        sink.close().unwrap();

        let written = fs::read_to_string(dir.path().join("results/hive-smoke.csv")).unwrap();
        assert_eq!(written, "id|status\nq1|SUCCESS\n");
    }

    #[test]
    fn test_quotes_fields_containing_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let factory = DirectorySinkFactory::new(dir.path());

        let mut sink = factory.create("a.csv").unwrap();
        sink.write_row(&row(&["q1", "a|b"])).unwrap();
        sink.close().unwrap();

        let written = fs::read_to_string(dir.path().join("a.csv")).unwrap();
        assert_eq!(written, "q1|\"a|b\"\n");
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let factory = DirectorySinkFactory::new(dir.path());

        let mut sink = factory.create("ragged.csv").unwrap();
        sink.write_row(&row(&["a", "b", "c"])).unwrap();
        let err = sink.write_row(&row(&["a", "b"])).unwrap_err();

        assert!(matches!(err, SinkError::Write { ref artifact, .. } if artifact == "ragged.csv"));
    }

    #[test]
    fn test_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("taken.csv"), "keep me").unwrap();
        let factory = DirectorySinkFactory::new(dir.path());

        let err = factory.create("taken.csv").err().unwrap();

        assert!(matches!(err, SinkError::AlreadyExists { .. }));
        assert_eq!(fs::read_to_string(dir.path().join("taken.csv")).unwrap(), "keep me");
    }
}
