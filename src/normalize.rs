//! Schema normalizer: merges raw source partitions into the canonical
//! mention dataset.
//!
//! Source connectors write CSV partitions with whatever columns their
//! platform exposes. This stage unions them, folds column-name drift,
//! resolves one text field per row, defaults the category, parses dates
//! permissively, and drops short or duplicate rows.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::NormalizeConfig;
use crate::dataset;
use crate::error::PipelineError;
use crate::records::CanonicalRecord;

const TEXT_COLUMN: &str = "Description";
const TITLE_COLUMN: &str = "Title";
const BODY_COLUMN: &str = "Body";
const CATEGORY_COLUMN: &str = "Program";
const DATE_COLUMN: &str = "Date";

const UNKNOWN_CATEGORY: &str = "Unknown";

/// One loaded raw partition: normalized header plus rows.
type Partition = (Vec<String>, Vec<Vec<String>>);

/// Folds case and whitespace drift in a raw column name.
///
/// Trims the name and title-cases each alphabetic run, so `description`,
/// ` DESCRIPTION ` and `Description` all merge, and `created_utc` becomes
/// `Created_Utc`.
pub fn normalize_column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut start_of_run = true;
    for ch in raw.trim().chars() {
        if ch.is_alphabetic() {
            if start_of_run {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            start_of_run = false;
        } else {
            out.push(ch);
            start_of_run = true;
        }
    }
    out
}

/// Parses a raw date cell, accepting the formats the connectors are known
/// to emit. Unparseable or empty values become `None`, never an error.
pub fn parse_date_permissive(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(cell, format) {
            return Some(date);
        }
    }
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(cell) {
        return Some(datetime.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(cell, format) {
            return Some(datetime.date());
        }
    }
    None
}

/// A way to derive the canonical text from a row, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextSource {
    Description,
    TitleBody,
    Body,
    Title,
}

/// Computes the text-resolution plan once per run from the merged column
/// set. Fails when no text-bearing column exists anywhere in the union.
fn text_plan(columns: &BTreeSet<String>) -> Result<Vec<TextSource>, PipelineError> {
    let has_description = columns.contains(TEXT_COLUMN);
    let has_title = columns.contains(TITLE_COLUMN);
    let has_body = columns.contains(BODY_COLUMN);

    let mut plan = Vec::new();
    if has_description {
        plan.push(TextSource::Description);
    }
    if has_title && has_body {
        plan.push(TextSource::TitleBody);
    }
    if has_body {
        plan.push(TextSource::Body);
    }
    if has_title {
        plan.push(TextSource::Title);
    }

    if plan.is_empty() {
        return Err(PipelineError::Schema(
            "no text-bearing column found: expected a description, title, or body column in at least one raw partition".to_string(),
        ));
    }
    Ok(plan)
}

/// Resolves a row's text as the first plan entry that yields non-empty
/// trimmed text.
fn resolve_text(plan: &[TextSource], row: &BTreeMap<String, String>) -> Option<String> {
    for source in plan {
        let candidate = match source {
            TextSource::Description => row.get(TEXT_COLUMN).cloned(),
            TextSource::TitleBody => {
                let title = row.get(TITLE_COLUMN).map(String::as_str).unwrap_or("");
                let body = row.get(BODY_COLUMN).map(String::as_str).unwrap_or("");
                Some(format!("{title} {body}"))
            }
            TextSource::Body => row.get(BODY_COLUMN).cloned(),
            TextSource::Title => row.get(TITLE_COLUMN).cloned(),
        };
        if let Some(candidate) = candidate {
            let trimmed = candidate.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Unions loaded partitions into canonical records.
///
/// Partition headers must already be normalized via
/// [`normalize_column_name`]; [`run`] does this at load time.
pub fn normalize_partitions(
    partitions: &[Partition],
    min_text_len: usize,
) -> Result<Vec<CanonicalRecord>, PipelineError> {
    let mut columns: BTreeSet<String> = BTreeSet::new();
    for (header, _) in partitions {
        columns.extend(header.iter().cloned());
    }

    let plan = text_plan(&columns)?;

    let mut records = Vec::new();
    for (header, rows) in partitions {
        for cells in rows {
            // Empty cells count as absent; short rows simply lack the
            // trailing columns.
            let row: BTreeMap<String, String> = header
                .iter()
                .zip(cells.iter())
                .filter(|(_, cell)| !cell.is_empty())
                .map(|(column, cell)| (column.clone(), cell.clone()))
                .collect();

            let Some(text) = resolve_text(&plan, &row) else {
                continue;
            };
            if text.chars().count() < min_text_len {
                continue;
            }

            let category = row
                .get(CATEGORY_COLUMN)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
            let date = row
                .get(DATE_COLUMN)
                .and_then(|cell| parse_date_permissive(cell));

            let extra: BTreeMap<String, String> = row
                .into_iter()
                .filter(|(column, _)| {
                    column != TEXT_COLUMN && column != CATEGORY_COLUMN && column != DATE_COLUMN
                })
                .collect();

            records.push(CanonicalRecord {
                text,
                category,
                date,
                extra,
            });
        }
    }

    // Identity is full equality; first occurrence wins.
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(record.clone()));

    Ok(records)
}

/// Runs the normalizer stage: loads every `*.csv` partition under the raw
/// directory, unions them, and persists the canonical dataset.
#[tracing::instrument(skip(cfg), fields(raw_dir = %cfg.raw_dir.display()))]
pub fn run(cfg: &NormalizeConfig) -> Result<usize, PipelineError> {
    if !cfg.raw_dir.is_dir() {
        return Err(PipelineError::Configuration(format!(
            "raw partition directory {} does not exist; run at least one source connector first",
            cfg.raw_dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(&cfg.raw_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("csv"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(PipelineError::Configuration(format!(
            "no raw CSV partitions in {}; run at least one source connector first",
            cfg.raw_dir.display()
        )));
    }

    let mut partitions = Vec::with_capacity(files.len());
    for file in &files {
        let (header, rows) = dataset::read_loose_csv(file)?;
        let normalized: Vec<String> = header.iter().map(|c| normalize_column_name(c)).collect();
        debug!(partition = %file.display(), rows = rows.len(), "Partition loaded");
        partitions.push((normalized, rows));
    }

    let records = normalize_partitions(&partitions, cfg.min_text_len)?;

    dataset::ensure_parent_dir(&cfg.output)?;
    dataset::write_canonical(&cfg.output, &records)?;

    info!(
        partitions = files.len(),
        rows = records.len(),
        output = %cfg.output.display(),
        "Canonical dataset written"
    );
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn partition(header: &[&str], rows: &[&[&str]]) -> Partition {
        (
            header.iter().map(|c| normalize_column_name(c)).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_column_name_normalization() {
        assert_eq!(normalize_column_name("description"), "Description");
        assert_eq!(normalize_column_name(" DESCRIPTION "), "Description");
        assert_eq!(normalize_column_name("Title"), "Title");
        assert_eq!(normalize_column_name("created_utc"), "Created_Utc");
        assert_eq!(normalize_column_name("  body\t"), "Body");
        assert_eq!(normalize_column_name("mIxEd cAsE"), "Mixed Case");
        assert_eq!(normalize_column_name(""), "");
    }

    #[test]
    fn test_date_parsing_is_permissive() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(parse_date_permissive("2024-03-05"), expected);
        assert_eq!(parse_date_permissive("2024/03/05"), expected);
        assert_eq!(parse_date_permissive("03/05/2024"), expected);
        assert_eq!(parse_date_permissive("2024-03-05T10:30:00"), expected);
        assert_eq!(parse_date_permissive("2024-03-05 10:30:00"), expected);
        assert_eq!(parse_date_permissive("2024-03-05T10:30:00+02:00"), expected);

        assert_eq!(parse_date_permissive(""), None);
        assert_eq!(parse_date_permissive("last tuesday"), None);
        assert_eq!(parse_date_permissive("2024-13-40"), None);
    }

    #[test]
    fn test_description_takes_precedence() {
        let parts = vec![partition(
            &["description", "title", "body", "program"],
            &[&[
                "The board approved the fee changes.",
                "ignored title",
                "ignored body",
                "Licensing",
            ]],
        )];

        let records = normalize_partitions(&parts, 15).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "The board approved the fee changes.");
    }

    #[test]
    fn test_title_and_body_concatenate_with_single_space() {
        let parts = vec![partition(
            &["title", "body"],
            &[&["Permit renewal", "took only ten minutes this year."]],
        )];

        let records = normalize_partitions(&parts, 15).unwrap();
        assert_eq!(
            records[0].text,
            "Permit renewal took only ten minutes this year."
        );
    }

    #[test]
    fn test_mixed_partitions_both_contribute() {
        // One source exposes description, another only title/body; rows
        // from both must end up with populated text.
        let parts = vec![
            partition(
                &["title", "body", "program"],
                &[&["Permit renewal", "took only ten minutes.", "Licensing"]],
            ),
            partition(
                &["description", "program"],
                &[&["The licensing board meeting ran long.", "News"]],
            ),
        ];

        let records = normalize_partitions(&parts, 15).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "Permit renewal took only ten minutes.");
        assert_eq!(records[1].text, "The licensing board meeting ran long.");
    }

    #[test]
    fn test_no_text_bearing_column_is_schema_error() {
        let parts = vec![partition(&["author", "url"], &[&["someone", "https://x"]])];

        match normalize_partitions(&parts, 15) {
            Err(PipelineError::Schema(msg)) => assert!(msg.contains("text-bearing")),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_minimum_length_boundary() {
        let parts = vec![partition(
            &["description"],
            &[
                &["12345678901234"],        // 14 chars: dropped
                &["123456789012345"],       // 15 chars: kept
                &["   12345678901234   "],  // 14 after trimming: dropped
            ],
        )];

        let records = normalize_partitions(&parts, 15).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "123456789012345");
    }

    #[test]
    fn test_exact_duplicates_collapse_across_partitions() {
        let row: &[&str] = &["The inspector arrived right on time.", "Licensing"];
        let parts = vec![
            partition(&["description", "program"], &[row, row]),
            partition(&["description", "program"], &[row]),
        ];

        let records = normalize_partitions(&parts, 15).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_category_defaults_and_date_survives_unparseable() {
        let parts = vec![partition(
            &["description", "date"],
            &[
                &["The inspector arrived right on time.", "not a date"],
                &["Still waiting on my permit application.", "2024-03-05"],
            ],
        )];

        let records = normalize_partitions(&parts, 15).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, "Unknown");
        assert_eq!(records[0].date, None);
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn test_empty_partition_contributes_nothing() {
        let parts = vec![
            partition(&["description"], &[]),
            partition(
                &["description"],
                &[&["The inspector arrived right on time."]],
            ),
        ];

        let records = normalize_partitions(&parts, 15).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_passthrough_columns_are_retained() {
        let parts = vec![partition(
            &["description", "platform", "program"],
            &[&["The inspector arrived right on time.", "reddit", "Licensing"]],
        )];

        let records = normalize_partitions(&parts, 15).unwrap();
        assert_eq!(records[0].extra.get("Platform").unwrap(), "reddit");
        assert!(!records[0].extra.contains_key("Description"));
        assert!(!records[0].extra.contains_key("Program"));
    }

    #[test]
    fn test_run_requires_raw_partitions() {
        let dir = std::env::temp_dir().join("mention_rater_norm_empty");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let cfg = NormalizeConfig {
            raw_dir: dir.clone(),
            output: dir.join("clean.csv"),
            min_text_len: 15,
        };

        match run(&cfg) {
            Err(PipelineError::Configuration(msg)) => assert!(msg.contains("source connector")),
            other => panic!("expected configuration error, got {other:?}"),
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_run_is_idempotent() {
        let dir = std::env::temp_dir().join("mention_rater_norm_idem");
        let _ = fs::remove_dir_all(&dir);
        let raw_dir = dir.join("raw");
        fs::create_dir_all(&raw_dir).unwrap();
        fs::write(
            raw_dir.join("social.csv"),
            "title,body,program,date\nPermit renewal,took only ten minutes.,Licensing,2024-03-05\n",
        )
        .unwrap();
        fs::write(
            raw_dir.join("news.csv"),
            "description,program\nThe licensing board meeting ran long.,News\n",
        )
        .unwrap();

        let cfg = NormalizeConfig {
            raw_dir,
            output: dir.join("clean.csv"),
            min_text_len: 15,
        };

        run(&cfg).unwrap();
        let first = fs::read_to_string(&cfg.output).unwrap();
        run(&cfg).unwrap();
        let second = fs::read_to_string(&cfg.output).unwrap();

        assert_eq!(first, second);
        fs::remove_dir_all(&dir).unwrap();
    }
}
