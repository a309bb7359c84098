//! In-memory tabular data read from a CSV file
//!
//! The reader produces string cells; column types are inferred once, over
//! the whole file, and every cell is converted to a typed [`Value`]. Type
//! detection lives only here so the writer can stay a plain mapping from
//! [`ColumnType`] to SQL.

use crate::error::{IngestError, Result};
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::Path;

/// Name of the column appended to every loaded table
pub const INGESTION_TIMESTAMP_COLUMN: &str = "ingestion_timestamp";

/// Cell contents treated as missing values
pub const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Inferred type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Double,
    Boolean,
    Text,
    Timestamp,
}

impl ColumnType {
    /// PostgreSQL type used when creating the destination table
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Text => "TEXT",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

/// A typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    BigInt(i64),
    Double(f64),
    Boolean(bool),
    Text(String),
    Timestamp(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// Whole-file table: named, typed columns and row-major values
#[derive(Debug, Clone, PartialEq)]
pub struct CsvFrame {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl CsvFrame {
    /// Read and type a CSV file with a header row
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = reader_builder()
            .from_path(path)
            .map_err(|e| IngestError::csv(path, e))?;

        Self::from_reader(reader).map_err(|e| match e {
            FrameError::Csv(source) => IngestError::csv(path, source),
            FrameError::NoHeader => IngestError::EmptySource(path.to_path_buf()),
            FrameError::TooManyFields {
                line,
                expected,
                found,
            } => IngestError::TooManyFields {
                path: path.to_path_buf(),
                line,
                expected,
                found,
            },
        })
    }

    fn from_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
    ) -> std::result::Result<Self, FrameError> {
        let headers = reader.headers().map_err(FrameError::Csv)?.clone();
        if headers.is_empty() {
            return Err(FrameError::NoHeader);
        }
        let names = column_names(headers.iter());

        // Short records are padded with nulls below; long ones have no column to go to
        let mut raw = Vec::new();
        for record in reader.records() {
            let record = record.map_err(FrameError::Csv)?;
            if record.len() > names.len() {
                return Err(FrameError::TooManyFields {
                    line: record.position().map_or(0, |p| p.line()),
                    expected: names.len(),
                    found: record.len(),
                });
            }
            raw.push(record);
        }

        let types: Vec<ColumnType> = (0..names.len())
            .map(|idx| infer_type(raw.iter().filter_map(|record| record.get(idx))))
            .collect();

        let rows = raw
            .iter()
            .map(|record| {
                types
                    .iter()
                    .enumerate()
                    .map(|(idx, ty)| {
                        record
                            .get(idx)
                            .map_or(Value::Null, |cell| parse_cell(cell, *ty))
                    })
                    .collect()
            })
            .collect();

        let columns = names
            .into_iter()
            .zip(types)
            .map(|(name, ty)| Column { name, ty })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Append the ingestion timestamp column, stamping every row with `at`
    ///
    /// A source column of the same name is replaced.
    pub fn with_ingestion_timestamp(mut self, at: NaiveDateTime) -> Self {
        if let Some(idx) = self
            .columns
            .iter()
            .position(|c| c.name == INGESTION_TIMESTAMP_COLUMN)
        {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }

        self.columns.push(Column {
            name: INGESTION_TIMESTAMP_COLUMN.to_string(),
            ty: ColumnType::Timestamp,
        });
        for row in &mut self.rows {
            row.push(Value::Timestamp(at));
        }

        self
    }
}

/// Reader settings shared by every CSV source
///
/// Records may be shorter than the header; the missing trailing cells are
/// read as nulls.
fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true);
    builder
}

#[derive(Debug)]
enum FrameError {
    Csv(csv::Error),
    NoHeader,
    TooManyFields {
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// Normalise header names into unique, non-empty column names
///
/// Blank headers become `Unnamed: <index>`; repeats get `.1`, `.2`, ...
fn column_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for (idx, header) in headers.enumerate() {
        let header = if idx == 0 {
            header.trim_start_matches('\u{feff}')
        } else {
            header
        };
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header.to_string()
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while !seen.insert(name.clone()) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        names.push(name);
    }

    names
}

fn is_null(cell: &str) -> bool {
    NULL_MARKERS.contains(&cell)
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Narrowest type that every non-null cell parses as
pub fn infer_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut int = true;
    let mut float = true;
    let mut boolean = true;
    let mut any = false;

    for cell in cells.filter(|c| !is_null(c)) {
        any = true;
        let cell = cell.trim();
        int = int && cell.parse::<i64>().is_ok();
        float = float && cell.parse::<f64>().is_ok();
        boolean = boolean && parse_bool(cell).is_some();

        if !int && !float && !boolean {
            return ColumnType::Text;
        }
    }

    match (any, int, float, boolean) {
        (false, ..) => ColumnType::Text,
        (true, true, ..) => ColumnType::BigInt,
        (true, false, true, _) => ColumnType::Double,
        (true, false, false, true) => ColumnType::Boolean,
        _ => ColumnType::Text,
    }
}

fn parse_cell(cell: &str, ty: ColumnType) -> Value {
    if is_null(cell) {
        return Value::Null;
    }

    let trimmed = cell.trim();
    match ty {
        ColumnType::BigInt => trimmed.parse().map(Value::BigInt).unwrap_or(Value::Null),
        ColumnType::Double => trimmed.parse().map(Value::Double).unwrap_or(Value::Null),
        ColumnType::Boolean => parse_bool(trimmed).map(Value::Boolean).unwrap_or(Value::Null),
        ColumnType::Text | ColumnType::Timestamp => Value::Text(cell.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn frame(data: &str) -> CsvFrame {
        CsvFrame::from_reader(reader_builder().from_reader(data.as_bytes())).unwrap()
    }

    fn types(frame: &CsvFrame) -> Vec<ColumnType> {
        frame.columns().iter().map(|c| c.ty).collect()
    }

    #[test]
    fn test_infers_column_types() {
        let frame = frame(
            "id,weight,active,name,created_at\n\
             1,70.5,true,Ada,2024-01-02\n\
             2,81,FALSE,Grace,2024-01-03\n",
        );

        assert_eq!(
            types(&frame),
            vec![
                ColumnType::BigInt,
                ColumnType::Double,
                ColumnType::Boolean,
                ColumnType::Text,
                ColumnType::Text,
            ]
        );
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.rows()[1][1], Value::Double(81.0));
        assert_eq!(frame.rows()[1][2], Value::Boolean(false));
    }

    #[test]
    fn test_null_markers_do_not_affect_inference() {
        let frame = frame("id,score,note\n1,,NA\n2,3.5,\nNULL,4,n/a\n");

        assert_eq!(
            types(&frame),
            vec![ColumnType::BigInt, ColumnType::Double, ColumnType::Text]
        );
        assert_eq!(frame.rows()[2][0], Value::Null);
        assert_eq!(frame.rows()[0][1], Value::Null);
        assert_eq!(frame.rows()[1][2], Value::Null);
    }

    #[test]
    fn test_mixed_column_falls_back_to_text() {
        let frame = frame("code\n10\nA7\n");
        assert_eq!(types(&frame), vec![ColumnType::Text]);
        assert_eq!(frame.rows()[0][0], Value::Text("10".to_string()));
    }

    #[test]
    fn test_header_normalisation() {
        let frame = frame("\u{feff}id,,id,id\n1,2,3,4\n");
        let names: Vec<&str> = frame.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "Unnamed: 1", "id.1", "id.2"]);
    }

    #[test]
    fn test_header_only_file_has_no_rows() {
        let frame = frame("id,name\n");
        assert_eq!(frame.row_count(), 0);
        assert_eq!(types(&frame), vec![ColumnType::Text, ColumnType::Text]);
    }

    #[test]
    fn test_ingestion_timestamp_is_appended_to_every_row() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        let frame = frame("id,ingestion_timestamp\n1,old\n2,old\n").with_ingestion_timestamp(at);

        let names: Vec<&str> = frame.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", INGESTION_TIMESTAMP_COLUMN]);
        assert!(frame.rows().iter().all(|row| row.len() == 2));
        assert!(frame.rows().iter().all(|row| row[1] == Value::Timestamp(at)));
    }

    #[test]
    fn test_has_column() {
        let frame = frame("id,created_at\n1,2024-01-01\n");
        assert!(frame.has_column("created_at"));
        assert!(!frame.has_column("updated_at"));
    }

    #[test]
    fn test_short_rows_are_padded_with_nulls() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("visits.csv");
        std::fs::write(&path, "id,score,note\n1,2,x\n3,4\n").unwrap();

        let frame = CsvFrame::read(&path).unwrap();

        assert_eq!(frame.row_count(), 2);
        assert_eq!(
            types(&frame),
            vec![ColumnType::BigInt, ColumnType::BigInt, ColumnType::Text]
        );
        assert_eq!(
            frame.rows()[1],
            vec![Value::BigInt(3), Value::BigInt(4), Value::Null]
        );
    }

    #[test]
    fn test_padded_cells_do_not_affect_inference() {
        let frame = frame("id,score\n1\n2\n");
        assert_eq!(types(&frame), vec![ColumnType::BigInt, ColumnType::Text]);
        assert!(frame.rows().iter().all(|row| row[1] == Value::Null));
    }

    #[test]
    fn test_read_rejects_rows_longer_than_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(&path, "a,b\n1,2\n3,4,5\n").unwrap();

        match CsvFrame::read(&path) {
            Err(IngestError::TooManyFields {
                line,
                expected,
                found,
                ..
            }) => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            },
            other => panic!("expected a too-many-fields error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_empty_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(CsvFrame::read(&path), Err(IngestError::EmptySource(_))));
    }

    #[test]
    fn test_sql_types() {
        assert_eq!(ColumnType::BigInt.sql_type(), "BIGINT");
        assert_eq!(ColumnType::Timestamp.sql_type(), "TIMESTAMP");
    }
}
