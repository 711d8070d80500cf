//! Query File Ingestion
//!
//! Builds batches from the input directory. A file named
//! `{engine}-{description}.txt` becomes one batch for `engine`, labelled
//! `description`. Its lines are pipe-separated:
//!
//! ```text
//! # comment
//! id|query|count|scale|format        <- header: tag keys start at column 4
//! q1|SELECT count(*) FROM t|3|100|parquet
//! ```
//!
//! Lines with fewer than three fields are skipped, as are blank and `#` lines.

use querybench_core::{ModelError, QueryBatch, QueryRecord, parse_repeat_count};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extension of query files
pub const QUERY_FILE_EXTENSION: &str = "txt";

const FIELD_SEPARATOR: char = '|';
const HEADER_ID: &str = "id";

/// Ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: expected {expected} tag values, found {found}")]
    TagMismatch {
        file: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{file}: {source}")]
    Batch {
        file: PathBuf,
        #[source]
        source: ModelError,
    },
}

/// Load every batch in `dir` belonging to one of `engines`.
///
/// Each requested engine gets an entry, empty when it has no files. Batches
/// are ordered by file name.
pub fn load_batches(
    dir: &Path,
    engines: &[String],
) -> Result<BTreeMap<String, Vec<QueryBatch>>, IngestError> {
    let io_error = |source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let path = entry.path();
        if path.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(QUERY_FILE_EXTENSION)
        {
            files.push(path);
        }
    }
    files.sort();

    let mut batches: BTreeMap<String, Vec<QueryBatch>> = engines
        .iter()
        .map(|engine| (engine.clone(), Vec::new()))
        .collect();

    for path in files {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((engine, description)) = split_file_stem(stem, engines) else {
            debug!(file = %path.display(), "Skipping file for unselected engine");
            continue;
        };

        let content = std::fs::read_to_string(&path).map_err(|source| IngestError::Io {
            path: path.clone(),
            source,
        })?;
        let batch = parse_batch(&path, engine, description, &content)?;
        info!(
            engine = %engine,
            batch = %description,
            records = batch.records().len(),
            "Loaded query file"
        );
        if let Some(list) = batches.get_mut(engine) {
            list.push(batch);
        }
    }

    Ok(batches)
}

/// Split `{engine}-{description}` for the longest matching engine name
fn split_file_stem<'a>(stem: &'a str, engines: &'a [String]) -> Option<(&'a str, &'a str)> {
    engines
        .iter()
        .filter_map(|engine| {
            let description = stem.strip_prefix(engine.as_str())?.strip_prefix('-')?;
            (!description.is_empty()).then_some((engine.as_str(), description))
        })
        .max_by_key(|(engine, _)| engine.len())
}

/// Parse the content of one query file into a batch
pub fn parse_batch(
    file: &Path,
    engine: &str,
    description: &str,
    content: &str,
) -> Result<QueryBatch, IngestError> {
    let mut tag_keys: Option<Vec<String>> = None;
    let mut records = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split(FIELD_SEPARATOR).map(str::trim).collect();
        if fields.len() < 3 {
            warn!(file = %file.display(), line = line_no, "Skipping line with fewer than 3 fields");
            continue;
        }

        if fields[0] == HEADER_ID {
            if tag_keys.is_none() {
                tag_keys = Some(fields[3..].iter().map(|k| k.to_string()).collect());
            }
            continue;
        }

        let tag_values: Vec<String> = fields[3..].iter().map(|v| v.to_string()).collect();
        let expected = tag_keys.as_ref().map_or(0, Vec::len);
        if tag_values.len() != expected {
            return Err(IngestError::TagMismatch {
                file: file.to_path_buf(),
                line: line_no,
                expected,
                found: tag_values.len(),
            });
        }

        let count = parse_repeat_count(fields[2]);
        if fields[2].parse::<u32>().map_or(true, |n| n == 0) {
            warn!(
                file = %file.display(),
                line = line_no,
                count = fields[2],
                "Invalid repeat count, running once"
            );
        }

        records.push(
            QueryRecord::new(fields[0], engine, description, fields[1], count)
                .with_tag_values(tag_values),
        );
    }

    QueryBatch::new(engine, description, tag_keys.unwrap_or_default(), records).map_err(
        |source| IngestError::Batch {
            file: file.to_path_buf(),
            source,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TPCH: &str = "\
# TPC-H subset
id|query|count|scale|format

q1|SELECT count(*) FROM lineitem|3|100|parquet
q2|SELECT 1|x|100|orc
too|short
";

    #[test]
    fn test_parse_batch_with_tags() {
        let batch = parse_batch(Path::new("hive-tpch.txt"), "hive", "tpch", TPCH).unwrap();

        assert_eq!(batch.tag_keys(), ["scale", "format"]);
        assert_eq!(batch.records().len(), 2);

        let q1 = &batch.records()[0];
        assert_eq!(q1.id(), "q1");
        assert_eq!(q1.query(), "SELECT count(*) FROM lineitem");
        assert_eq!(q1.repeat_count(), 3);
        assert_eq!(q1.tag_values(), ["100", "parquet"]);

        // Non-numeric count runs once
        assert_eq!(batch.records()[1].repeat_count(), 1);
    }

    #[test]
    fn test_parse_batch_without_header() {
        let batch = parse_batch(Path::new("x"), "impala", "smoke", "q1|SELECT 1|2\n").unwrap();
        assert!(batch.tag_keys().is_empty());
        assert_eq!(batch.total_attempts(), 2);
    }

    #[test]
    fn test_tag_mismatch_reports_line() {
        let content = "id|query|count|scale\nq1|SELECT 1|1|10|extra\n";
        let err = parse_batch(Path::new("hive-a.txt"), "hive", "a", content).unwrap_err();

        assert!(matches!(
            err,
            IngestError::TagMismatch { line: 2, expected: 1, found: 2, .. }
        ));
    }

    #[test]
    fn test_split_file_stem_prefers_longest_engine() {
        let engines = vec!["spark".to_string(), "spark-sql".to_string()];
        assert_eq!(
            split_file_stem("spark-sql-tpcds", &engines),
            Some(("spark-sql", "tpcds"))
        );
        assert_eq!(split_file_stem("spark-etl", &engines), Some(("spark", "etl")));
        assert_eq!(split_file_stem("presto-etl", &engines), None);
        assert_eq!(split_file_stem("spark-", &engines), None);
    }

    #[test]
    fn test_load_batches_orders_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hive-b.txt"), "q1|SELECT 2|1\n").unwrap();
        fs::write(dir.path().join("hive-a.txt"), "q1|SELECT 1|1\n").unwrap();
        fs::write(dir.path().join("presto-a.txt"), "q1|SELECT 1|1\n").unwrap();
        fs::write(dir.path().join("hive-c.sql"), "q1|SELECT 3|1\n").unwrap();

        let engines = vec!["hive".to_string(), "impala".to_string()];
        let batches = load_batches(dir.path(), &engines).unwrap();

        assert_eq!(batches.len(), 2);
        let hive: Vec<_> = batches["hive"].iter().map(|b| b.description()).collect();
        assert_eq!(hive, ["a", "b"]);
        assert!(batches["impala"].is_empty());
    }

    #[test]
    fn test_load_batches_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_batches(&dir.path().join("nope"), &[]).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
