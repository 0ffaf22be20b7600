//! Durable dataset I/O.
//!
//! Every stage boundary is a CSV file. The canonical and scored datasets
//! carry a dynamic set of passthrough columns next to their fixed columns,
//! so their headers are assembled explicitly; the aggregate table has a
//! fixed shape and goes through serde. Writers receive the fully assembled
//! in-memory result and write the final path in one pass.

use csv::{ReaderBuilder, WriterBuilder};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::error::PipelineError;
use crate::records::{CanonicalRecord, DocumentScore, MonthlyAggregate, ScoredRecord, Sentiment};

const CANONICAL_COLUMNS: [&str; 3] = ["text", "category", "date"];
const SCORE_COLUMNS: [&str; 4] = ["sentiment", "pos", "neu", "neg"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Creates the parent directory of an output path if it does not exist.
pub fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Reads one raw partition as a header plus loosely typed rows.
///
/// Rows shorter than the header are tolerated; the missing cells read as
/// absent. A header-only or empty file yields zero rows.
pub fn read_loose_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), PipelineError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!(path = %path.display(), columns = headers.len(), rows = rows.len(), "Raw partition read");
    Ok((headers, rows))
}

/// Union of passthrough column names across a record set, sorted.
fn extra_columns(extras: impl Iterator<Item = impl AsRef<str>>) -> Vec<String> {
    let set: BTreeSet<String> = extras.map(|k| k.as_ref().to_string()).collect();
    set.into_iter().collect()
}

fn format_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn parse_date(cell: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(cell, DATE_FORMAT).ok()
}

/// Writes the canonical dataset: fixed columns, then sorted passthrough
/// columns.
pub fn write_canonical(path: &Path, records: &[CanonicalRecord]) -> Result<(), PipelineError> {
    let extras = extra_columns(records.iter().flat_map(|r| r.extra.keys()));

    let mut writer = WriterBuilder::new().from_path(path)?;

    let mut header: Vec<&str> = CANONICAL_COLUMNS.to_vec();
    header.extend(extras.iter().map(String::as_str));
    writer.write_record(&header)?;

    for record in records {
        let mut row: Vec<String> = vec![
            record.text.clone(),
            record.category.clone(),
            format_date(record.date),
        ];
        for column in &extras {
            row.push(record.extra.get(column).cloned().unwrap_or_default());
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Reads the canonical dataset back into records.
pub fn read_canonical(path: &Path) -> Result<Vec<CanonicalRecord>, PipelineError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new().from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut records = Vec::new();

    for result in reader.records() {
        let row = result?;
        let mut record = CanonicalRecord {
            text: String::new(),
            category: String::new(),
            date: None,
            extra: Default::default(),
        };

        for (column, cell) in headers.iter().zip(row.iter()) {
            match column.as_str() {
                "text" => record.text = cell.to_string(),
                "category" => record.category = cell.to_string(),
                "date" => record.date = parse_date(cell),
                _ => {
                    if !cell.is_empty() {
                        record.extra.insert(column.clone(), cell.to_string());
                    }
                }
            }
        }

        records.push(record);
    }

    Ok(records)
}

/// Writes the scored dataset: canonical fixed columns, score columns, then
/// sorted passthrough columns.
pub fn write_scored(path: &Path, records: &[ScoredRecord]) -> Result<(), PipelineError> {
    let extras = extra_columns(records.iter().flat_map(|r| r.record.extra.keys()));

    let mut writer = WriterBuilder::new().from_path(path)?;

    let mut header: Vec<&str> = CANONICAL_COLUMNS.to_vec();
    header.extend(SCORE_COLUMNS);
    header.extend(extras.iter().map(String::as_str));
    writer.write_record(&header)?;

    for scored in records {
        let mut row: Vec<String> = vec![
            scored.record.text.clone(),
            scored.record.category.clone(),
            format_date(scored.record.date),
            scored.score.sentiment.to_string(),
            scored.score.pos.to_string(),
            scored.score.neu.to_string(),
            scored.score.neg.to_string(),
        ];
        for column in &extras {
            row.push(scored.record.extra.get(column).cloned().unwrap_or_default());
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn parse_score(column: &str, cell: &str) -> Result<f64, PipelineError> {
    cell.parse::<f64>().map_err(|_| {
        PipelineError::Dataset(format!("invalid {column} confidence score: {cell:?}"))
    })
}

/// Reads the scored dataset back into records.
pub fn read_scored(path: &Path) -> Result<Vec<ScoredRecord>, PipelineError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new().from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut records = Vec::new();

    for result in reader.records() {
        let row = result?;
        let mut record = CanonicalRecord {
            text: String::new(),
            category: String::new(),
            date: None,
            extra: Default::default(),
        };
        let mut score = DocumentScore::unknown();

        for (column, cell) in headers.iter().zip(row.iter()) {
            match column.as_str() {
                "text" => record.text = cell.to_string(),
                "category" => record.category = cell.to_string(),
                "date" => record.date = parse_date(cell),
                "sentiment" => score.sentiment = Sentiment::from_label(cell),
                "pos" => score.pos = parse_score("pos", cell)?,
                "neu" => score.neu = parse_score("neu", cell)?,
                "neg" => score.neg = parse_score("neg", cell)?,
                _ => {
                    if !cell.is_empty() {
                        record.extra.insert(column.clone(), cell.to_string());
                    }
                }
            }
        }

        records.push(ScoredRecord { record, score });
    }

    Ok(records)
}

/// Writes the aggregate table consumed by the report renderer.
pub fn write_aggregates(path: &Path, rows: &[MonthlyAggregate]) -> Result<(), PipelineError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    // serialize() only emits headers once a row exists; an empty table
    // still has to be well-formed for the renderer.
    if rows.is_empty() {
        writer.write_record(["category", "month", "pos", "neu", "neg", "count"])?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads the aggregate table.
pub fn read_aggregates(path: &Path) -> Result<Vec<MonthlyAggregate>, PipelineError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new().from_reader(file);

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: MonthlyAggregate = result?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("mention_rater_{name}"))
    }

    fn sample_record(text: &str, extra: &[(&str, &str)]) -> CanonicalRecord {
        CanonicalRecord {
            text: text.to_string(),
            category: "Licensing".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 5),
            extra: extra
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_canonical_round_trip_with_passthrough() {
        let path = temp_path("dataset_canonical.csv");
        let records = vec![
            sample_record("Renewal took ten minutes.", &[("Platform", "reddit")]),
            sample_record("The inspector was on time.", &[("Author", "j_doe")]),
        ];

        write_canonical(&path, &records).unwrap();
        let read = read_canonical(&path).unwrap();

        assert_eq!(read, records);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_canonical_write_is_deterministic() {
        let path_a = temp_path("dataset_det_a.csv");
        let path_b = temp_path("dataset_det_b.csv");
        let records = vec![sample_record("Renewal took ten minutes.", &[("B", "2"), ("A", "1")])];

        write_canonical(&path_a, &records).unwrap();
        write_canonical(&path_b, &records).unwrap();

        assert_eq!(
            fs::read_to_string(&path_a).unwrap(),
            fs::read_to_string(&path_b).unwrap()
        );
        fs::remove_file(&path_a).unwrap();
        fs::remove_file(&path_b).unwrap();
    }

    #[test]
    fn test_scored_round_trip() {
        let path = temp_path("dataset_scored.csv");
        let records = vec![
            ScoredRecord {
                record: sample_record("The inspector was on time.", &[]),
                score: DocumentScore {
                    sentiment: Sentiment::Positive,
                    pos: 0.8,
                    neu: 0.15,
                    neg: 0.05,
                },
            },
            ScoredRecord {
                record: sample_record("Could not reach anyone by phone.", &[]),
                score: DocumentScore::unknown(),
            },
        ];

        write_scored(&path, &records).unwrap();
        let read = read_scored(&path).unwrap();

        assert_eq!(read, records);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_empty_aggregate_table_still_has_header() {
        let path = temp_path("dataset_empty_agg.csv");
        write_aggregates(&path, &[]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("category,month,pos,neu,neg,count"));
        assert_eq!(read_aggregates(&path).unwrap().len(), 0);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_aggregate_round_trip_with_null_month() {
        let path = temp_path("dataset_agg.csv");
        let rows = vec![
            MonthlyAggregate {
                category: "News".to_string(),
                month: NaiveDate::from_ymd_opt(2024, 3, 1),
                pos: 0.5,
                neu: 0.3,
                neg: 0.2,
                count: 4,
            },
            MonthlyAggregate {
                category: "News".to_string(),
                month: None,
                pos: 0.1,
                neu: 0.8,
                neg: 0.1,
                count: 1,
            },
        ];

        write_aggregates(&path, &rows).unwrap();
        assert_eq!(read_aggregates(&path).unwrap(), rows);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_loose_read_tolerates_short_rows() {
        let path = temp_path("dataset_loose.csv");
        fs::write(&path, "a,b,c\n1,2,3\n4,5\n").unwrap();

        let (headers, rows) = read_loose_csv(&path).unwrap();
        assert_eq!(headers, vec!["a", "b", "c"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["4", "5"]);
        fs::remove_file(&path).unwrap();
    }
}
