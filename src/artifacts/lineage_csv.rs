//! Lineage CSV
//!
//! One `;`-separated row per head-commit fragment, the events held as a JSON
//! array in the last cell. Cells are quoted when needed:
//!
//! ```text
//! clone_id;index;file_path;start_line;end_line;start_column;end_column;modification
//! 12;0;orders/api.py;10;20;0;4;"[{""type"":""modified"",""commit"":""9f1c...""}]"
//! 12;1;billing/api.py;3;13;0;4;[]
//! ```

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{ArtifactError, ArtifactResult};
use crate::lineage::LineageResult;
use crate::models::{CloneId, FragmentKey, ModificationEvent};

pub const COLUMNS: [&str; 8] = [
    "clone_id",
    "index",
    "file_path",
    "start_line",
    "end_line",
    "start_column",
    "end_column",
    "modification",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageRow {
    pub clone_id: CloneId,
    pub index: usize,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    pub modification: Vec<ModificationEvent>,
}

impl LineageRow {
    pub fn key(&self) -> FragmentKey {
        FragmentKey::new(self.clone_id, self.index)
    }

    /// One row per head fragment, in key order.
    pub fn from_result(result: &LineageResult) -> Vec<LineageRow> {
        let mut rows: Vec<LineageRow> = result
            .head
            .fragments()
            .map(|(key, frag)| LineageRow {
                clone_id: key.clone_id,
                index: key.index,
                file_path: frag.file_path.clone(),
                start_line: frag.start_line,
                end_line: frag.end_line,
                start_column: frag.start_col,
                end_column: frag.end_col,
                modification: result
                    .lineages
                    .get(&key)
                    .map(|entry| entry.events.clone())
                    .unwrap_or_default(),
            })
            .collect();
        rows.sort_by_key(|r| r.key());
        rows
    }
}

/// A row as it sits in the file: the events are one JSON array cell.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRecord {
    clone_id: CloneId,
    index: usize,
    file_path: String,
    start_line: u32,
    end_line: u32,
    start_column: u32,
    end_column: u32,
    modification: String,
}

fn csv_error(path: &Path, err: csv::Error) -> ArtifactError {
    let line = err.position().map_or(0, |pos| pos.line() as usize);
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => ArtifactError::Io(e),
        _ => ArtifactError::Csv {
            path: path.to_path_buf(),
            line,
            reason,
        },
    }
}

pub fn write_lineage_csv(path: &Path, rows: &[LineageRow]) -> ArtifactResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    // Written by hand so an empty lineage still carries the header
    writer.write_record(COLUMNS).map_err(|e| csv_error(path, e))?;
    for row in rows {
        let modification =
            serde_json::to_string(&row.modification).map_err(|source| ArtifactError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        writer
            .serialize(CsvRecord {
                clone_id: row.clone_id,
                index: row.index,
                file_path: row.file_path.clone(),
                start_line: row.start_line,
                end_line: row.end_line,
                start_column: row.start_column,
                end_column: row.end_column,
                modification,
            })
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_lineage_csv(path: &Path) -> ArtifactResult<Vec<LineageRow>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArtifactError::Missing {
                kind: "lineage CSV",
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut reader = ReaderBuilder::new().delimiter(b';').from_reader(file);
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(path, e))?;
        rows.push(parse_record(path, &record, &headers)?);
    }
    Ok(rows)
}

fn parse_record(path: &Path, record: &StringRecord, headers: &StringRecord) -> ArtifactResult<LineageRow> {
    let malformed = |reason: String| ArtifactError::Csv {
        path: path.to_path_buf(),
        line: record.position().map_or(0, |pos| pos.line() as usize),
        reason,
    };

    let raw: CsvRecord = record
        .deserialize(Some(headers))
        .map_err(|e| malformed(e.to_string()))?;
    let modification: Vec<ModificationEvent> = if raw.modification.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&raw.modification)
            .map_err(|e| malformed(format!("bad modification JSON: {}", e)))?
    };

    Ok(LineageRow {
        clone_id: raw.clone_id,
        index: raw.index,
        file_path: raw.file_path,
        start_line: raw.start_line,
        end_line: raw.end_line,
        start_column: raw.start_column,
        end_column: raw.end_column,
        modification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;

    fn row(path: &str, events: &[(EventKind, &str)]) -> LineageRow {
        LineageRow {
            clone_id: 3,
            index: 1,
            file_path: path.to_string(),
            start_line: 10,
            end_line: 20,
            start_column: 0,
            end_column: 7,
            modification: events
                .iter()
                .map(|(kind, commit)| ModificationEvent {
                    kind: *kind,
                    commit: commit.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_written_format() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lineage.csv");
        write_lineage_csv(&path, &[row("a.py", &[(EventKind::Modified, "c1")])])?;
        let text = std::fs::read_to_string(&path)?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(COLUMNS.join(";").as_str()));
        assert_eq!(
            lines.next(),
            Some(r#"3;1;a.py;10;20;0;7;"[{""type"":""modified"",""commit"":""c1""}]""#)
        );
        Ok(())
    }

    #[test]
    fn test_empty_lineage_keeps_header() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lineage.csv");
        write_lineage_csv(&path, &[])?;
        assert_eq!(std::fs::read_to_string(&path)?.trim_end(), COLUMNS.join(";"));
        assert!(read_lineage_csv(&path)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_reader_handles_quoted_paths() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lineage.csv");
        let rows = vec![
            row("weird;name.py", &[(EventKind::Added, "c2"), (EventKind::Modified, "c3")]),
            row("dir/we\nird \"x\";y.py", &[(EventKind::Modified, "c4")]),
            row("plain.py", &[]),
        ];
        write_lineage_csv(&path, &rows)?;
        assert_eq!(read_lineage_csv(&path)?, rows);
        Ok(())
    }

    #[test]
    fn test_reader_reports_line_of_bad_row() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lineage.csv");
        std::fs::write(&path, format!("{}\n1;0;a.py;x;2;0;0;[]\n", COLUMNS.join(";")))?;
        match read_lineage_csv(&path) {
            Err(ArtifactError::Csv { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected CSV error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_lineage_csv(&dir.path().join("lineage.csv")).expect_err("no file");
        assert!(matches!(err, ArtifactError::Missing { kind: "lineage CSV", .. }));
    }
}
