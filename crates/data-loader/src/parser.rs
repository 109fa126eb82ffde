//! Parsers and writers for the tab-separated files of the pipeline.
//!
//! All files are headerless TSV with a fixed column order:
//! - ratings: `user_id  item_id  label`
//! - item attributes: `item_id  author  genre  series  publisher  subject`
//! - processed splits: `user_id  item_id  label  user_genres  item_genre`
//! - predictions: `user_id  item_id`
//!
//! Empty fields are legal wherever a value may be missing, so lines are
//! never trimmed of trailing tabs.

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Read a file into lines, converting invalid UTF-8 lossily.
///
/// A missing file is reported as `FileNotFound`: every TSV input of the
/// pipeline is mandatory.
pub(crate) fn read_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DataLoadError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => DataLoadError::IoError(e),
    })?;

    let content = String::from_utf8_lossy(&bytes);
    Ok(content.lines().map(|s| s.to_string()).collect())
}

/// Cursor over the tab-separated fields of one line, carrying enough
/// context to produce a useful `ParseError`.
struct LineFields<'a> {
    file: &'a str,
    line: usize,
    parts: std::str::Split<'a, char>,
}

impl<'a> LineFields<'a> {
    fn new(file: &'a str, line: usize, content: &'a str) -> Self {
        Self {
            file,
            line,
            parts: content.split('\t'),
        }
    }

    fn error(&self, reason: String) -> DataLoadError {
        DataLoadError::ParseError {
            file: self.file.to_string(),
            line: self.line,
            reason,
        }
    }

    fn next_field(&mut self, name: &str) -> Result<&'a str> {
        self.parts
            .next()
            .ok_or_else(|| self.error(format!("Missing {}", name)))
    }

    /// Next field as text; a missing trailing column reads as empty
    fn next_text(&mut self) -> String {
        self.parts.next().map(str::to_string).unwrap_or_default()
    }

    /// Reject columns beyond the `expected` ones already read
    fn finish(self, expected: usize) -> Result<()> {
        let extra = self.parts.count();
        if extra > 0 {
            return Err(DataLoadError::FieldCountMismatch {
                file: self.file.to_string(),
                expected,
                found: expected + extra,
                line: self.line,
            });
        }
        Ok(())
    }

    fn parse<T>(&mut self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.next_field(name)?;
        raw.trim()
            .parse()
            .map_err(|e| self.error(format!("Invalid {}: {}", name, e)))
    }

    fn parse_label(&mut self) -> Result<Label> {
        let label: Label = self.parse("label")?;
        if label > 1 {
            return Err(DataLoadError::InvalidValue {
                field: "label".to_string(),
                value: label.to_string(),
            });
        }
        Ok(label)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Non-empty lines with their 1-based line numbers
fn data_lines(lines: &[String]) -> impl Iterator<Item = (usize, &str)> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| (idx + 1, line.as_str()))
}

/// Parse a ratings split: `user_id  item_id  label`
pub fn parse_ratings(path: &Path) -> Result<Vec<RatingRecord>> {
    let lines = read_lines(path)?;
    let file = file_label(path);
    let mut ratings = Vec::with_capacity(lines.len());

    for (line_no, line) in data_lines(&lines) {
        let mut fields = LineFields::new(&file, line_no, line);
        let rating = RatingRecord {
            user_id: fields.parse("user_id")?,
            item_id: fields.parse("item_id")?,
            label: fields.parse_label()?,
        };
        fields.finish(3)?;
        ratings.push(rating);
    }
    Ok(ratings)
}

/// Parse the item attribute table:
/// `item_id  author  genre  series  publisher  subject`
///
/// Only `item_id` is required; missing attribute columns read as empty.
pub fn parse_item_attributes(path: &Path) -> Result<Vec<ItemAttributes>> {
    let lines = read_lines(path)?;
    let file = file_label(path);
    let mut items = Vec::with_capacity(lines.len());

    for (line_no, line) in data_lines(&lines) {
        let mut fields = LineFields::new(&file, line_no, line);
        let item = ItemAttributes {
            item_id: fields.parse("item_id")?,
            author: fields.next_text(),
            genre: fields.next_text(),
            series: fields.next_text(),
            publisher: fields.next_text(),
            subject: fields.next_text(),
        };
        fields.finish(6)?;
        items.push(item);
    }
    Ok(items)
}

/// Parse a joined split: `user_id  item_id  label  user_genres  item_genre`
pub fn parse_processed_rows(path: &Path) -> Result<Vec<ProcessedRow>> {
    let lines = read_lines(path)?;
    let file = file_label(path);
    let mut rows = Vec::with_capacity(lines.len());

    for (line_no, line) in data_lines(&lines) {
        let mut fields = LineFields::new(&file, line_no, line);
        let row = ProcessedRow {
            user_id: fields.parse("user_id")?,
            item_id: fields.parse("item_id")?,
            label: fields.parse_label()?,
            user_genres: fields.next_text(),
            item_genre: fields.next_text(),
        };
        fields.finish(5)?;
        rows.push(row);
    }
    Ok(rows)
}

/// Parse a prediction file: `user_id  item_id`, one ranked pair per line
pub fn parse_predictions(path: &Path) -> Result<Vec<(UserId, ItemId)>> {
    let lines = read_lines(path)?;
    let file = file_label(path);
    let mut predictions = Vec::with_capacity(lines.len());

    for (line_no, line) in data_lines(&lines) {
        let mut fields = LineFields::new(&file, line_no, line);
        let prediction = (fields.parse("user_id")?, fields.parse("item_id")?);
        fields.finish(2)?;
        predictions.push(prediction);
    }
    Ok(predictions)
}

fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

pub fn write_ratings(path: &Path, ratings: &[RatingRecord]) -> Result<()> {
    let mut out = create_writer(path)?;
    for r in ratings {
        writeln!(out, "{}\t{}\t{}", r.user_id, r.item_id, r.label)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_item_attributes(path: &Path, items: &[ItemAttributes]) -> Result<()> {
    let mut out = create_writer(path)?;
    for item in items {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            item.item_id, item.author, item.genre, item.series, item.publisher, item.subject
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_processed_rows(path: &Path, rows: &[ProcessedRow]) -> Result<()> {
    let mut out = create_writer(path)?;
    for row in rows {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            row.user_id, row.item_id, row.label, row.user_genres, row.item_genre
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_predictions(path: &Path, predictions: &[(UserId, ItemId)]) -> Result<()> {
    let mut out = create_writer(path)?;
    for (user_id, item_id) in predictions {
        writeln!(out, "{}\t{}", user_id, item_id)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_ratings() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "train.tsv", "1\t10\t1\n1\t11\t0\n\n2\t10\t1\n");

        let ratings = parse_ratings(&path).unwrap();
        assert_eq!(ratings.len(), 3);
        assert_eq!(ratings[1], RatingRecord { user_id: 1, item_id: 11, label: 0 });
    }

    #[test]
    fn test_parse_ratings_rejects_bad_label() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "train.tsv", "1\t10\t4\n");

        let err = parse_ratings(&path).unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_ratings_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "train.tsv", "1\t10\t1\n1\tabc\t1\n");

        match parse_ratings(&path).unwrap_err() {
            DataLoadError::ParseError { file, line, .. } => {
                assert_eq!(file, "train.tsv");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = parse_ratings(Path::new("/definitely/not/here.tsv")).unwrap_err();
        assert!(matches!(err, DataLoadError::FileNotFound { .. }));
    }

    #[test]
    fn test_parse_item_attributes_keeps_empty_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "items.tsv",
            "5\tJ._R._R._Tolkien\tHigh_fantasy\t\tAllen_&_Unwin\tEnglish_novels,\n6\t\t\n",
        );

        let items = parse_item_attributes(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].series, "");
        assert_eq!(items[0].subject, "English_novels,");
        assert_eq!(items[1], ItemAttributes::empty(6));
    }

    #[test]
    fn test_parse_ratings_rejects_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "test.tsv", "1\t10\t1\n1\t10\t1\tFantasy, Horror\tFantasy\n");

        match parse_ratings(&path).unwrap_err() {
            DataLoadError::FieldCountMismatch { file, expected, found, line } => {
                assert_eq!(file, "test.tsv");
                assert_eq!((expected, found, line), (3, 5, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_ratings_rejects_missing_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "test.tsv", "1\t10\n");

        let err = parse_ratings(&path).unwrap_err();
        assert!(matches!(err, DataLoadError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_parse_predictions_column_count() {
        let dir = TempDir::new().unwrap();
        let ok = write_file(&dir, "ok.tsv", "1\t10\n2\t11\n");
        assert_eq!(parse_predictions(&ok).unwrap(), vec![(1, 10), (2, 11)]);

        let wide = write_file(&dir, "wide.tsv", "1\t10\t0.93\n");
        assert!(matches!(
            parse_predictions(&wide).unwrap_err(),
            DataLoadError::FieldCountMismatch { expected: 2, found: 3, .. }
        ));

        let short = write_file(&dir, "short.tsv", "1\n");
        assert!(matches!(parse_predictions(&short).unwrap_err(), DataLoadError::ParseError { .. }));
    }

    #[test]
    fn test_optional_columns_have_an_upper_bound() {
        let dir = TempDir::new().unwrap();
        let rows = write_file(&dir, "rows.tsv", "1\t10\t1\n1\t11\t0\tHorror\tFantasy\textra\n");
        assert!(matches!(
            parse_processed_rows(&rows).unwrap_err(),
            DataLoadError::FieldCountMismatch { expected: 5, found: 6, line: 2, .. }
        ));

        let items = write_file(&dir, "items.tsv", "5\ta\tb\tc\td\te\tf\n");
        assert!(matches!(
            parse_item_attributes(&items).unwrap_err(),
            DataLoadError::FieldCountMismatch { expected: 6, found: 7, .. }
        ));
    }

    #[test]
    fn test_quoted_values_are_kept_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.tsv");
        let items = vec![ItemAttributes {
            author: "\"Weird_Al\"".to_string(),
            ..ItemAttributes::empty(3)
        }];

        write_item_attributes(&path, &items).unwrap();
        assert_eq!(parse_item_attributes(&path).unwrap(), items);
    }

    #[test]
    fn test_processed_rows_write_then_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed").join("test.tsv");
        let rows = vec![ProcessedRow {
            user_id: 3,
            item_id: 9,
            label: 0,
            user_genres: String::new(),
            item_genre: "Satire".to_string(),
        }];

        write_processed_rows(&path, &rows).unwrap();
        assert_eq!(parse_processed_rows(&path).unwrap(), rows);
    }
}
