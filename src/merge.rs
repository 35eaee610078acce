//! Слияние исторических логов в один таймлайн
//!
//! Все строки сортируются по ведущей дате MM/DD/YYYY. Сортировка стабильная:
//! строки с одной датой остаются в порядке конкатенации (сначала текущий лог,
//! потом импортированные файлы в порядке передачи).

use std::collections::HashSet;

use chrono::NaiveDate;
use log::{debug, warn};

use crate::error::{LogError, Result};
use crate::log_parser::LogParser;
use crate::types::{MergeOptions, MergePolicy, MergeReport};

/// Пачка строк и откуда она взялась (для сообщений об ошибках)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLines {
    pub origin: String,
    pub lines: Vec<String>,
}

impl SourceLines {
    pub fn new(origin: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            origin: origin.into(),
            lines,
        }
    }
}

struct Entry {
    date: NaiveDate,
    line: String,
}

/// Слить строки и отсортировать по дате.
/// Пустые строки выбрасываются молча; строки без даты — по `options.policy`.
pub fn merge_lines(
    parser: &LogParser,
    existing: SourceLines,
    imported: Vec<SourceLines>,
    options: MergeOptions,
) -> Result<(Vec<String>, MergeReport)> {
    let mut report = MergeReport {
        existing: existing.lines.len(),
        imported: imported.iter().map(|s| s.lines.len()).sum(),
        ..MergeReport::default()
    };

    let mut entries: Vec<Entry> = Vec::with_capacity(report.existing + report.imported);
    for source in std::iter::once(existing).chain(imported) {
        for (idx, line) in source.lines.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parser.parse_date(&line) {
                Some(date) => entries.push(Entry { date, line }),
                None => match options.policy {
                    MergePolicy::Reject => {
                        return Err(LogError::malformed_timestamp(
                            source.origin.as_str(),
                            idx + 1,
                            &line,
                        ));
                    }
                    MergePolicy::SkipInvalid => {
                        warn!(
                            "Skipping line {} of {} without a date: {:?}",
                            idx + 1,
                            source.origin,
                            line
                        );
                        report.skipped += 1;
                    }
                },
            }
        }
    }

    if options.dedupe {
        let mut seen: HashSet<String> = HashSet::with_capacity(entries.len());
        let before = entries.len();
        entries.retain(|e| seen.insert(e.line.clone()));
        report.duplicates = before - entries.len();
        debug!("Removed {} duplicate lines", report.duplicates);
    }

    // sort_by_key стабильный
    entries.sort_by_key(|e| e.date);

    let merged: Vec<String> = entries.into_iter().map(|e| e.line).collect();
    report.written = merged.len();
    Ok((merged, report))
}

/// Текст файла: каждая строка с переводом строки
pub fn to_file_content(lines: &[String]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_sorts_by_date_stably() {
        let parser = LogParser::new();
        let existing = SourceLines::new(
            "chat.txt",
            lines(&["05/02/2024 existing b", "05/01/2024 existing a"]),
        );
        let imported = vec![SourceLines::new(
            "old.txt",
            lines(&["05/01/2024 imported a", "04/30/2024 imported first"]),
        )];

        let (merged, report) =
            merge_lines(&parser, existing, imported, MergeOptions::default()).unwrap();

        assert_eq!(
            merged,
            lines(&[
                "04/30/2024 imported first",
                "05/01/2024 existing a",
                "05/01/2024 imported a",
                "05/02/2024 existing b",
            ])
        );
        assert_eq!(report.existing, 2);
        assert_eq!(report.imported, 2);
        assert_eq!(report.written, 4);
    }

    #[test]
    fn test_merge_sorts_across_years() {
        let parser = LogParser::new();
        let existing = SourceLines::new("chat.txt", lines(&["01/05/2025 new year"]));
        let imported = vec![SourceLines::new("old.txt", lines(&["12/31/2024 old year"]))];

        let (merged, _) =
            merge_lines(&parser, existing, imported, MergeOptions::default()).unwrap();
        assert_eq!(merged, lines(&["12/31/2024 old year", "01/05/2025 new year"]));
    }

    #[test]
    fn test_merge_rejects_bad_date() {
        let parser = LogParser::new();
        let existing = SourceLines::new("chat.txt", lines(&["05/01/2024 ok"]));
        let imported = vec![SourceLines::new(
            "old.txt",
            lines(&["05/01/2024 ok", "garbage line"]),
        )];

        let err = merge_lines(&parser, existing, imported, MergeOptions::default()).unwrap_err();
        match err {
            LogError::MalformedTimestamp {
                origin, line_no, ..
            } => {
                assert_eq!(origin, "old.txt");
                assert_eq!(line_no, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_skip_invalid_and_dedupe() {
        let parser = LogParser::new();
        let existing = SourceLines::new("chat.txt", lines(&["05/01/2024 same", ""]));
        let imported = vec![SourceLines::new(
            "old.txt",
            lines(&["05/01/2024 same", "no date", "05/03/2024 later"]),
        )];
        let options = MergeOptions {
            policy: MergePolicy::SkipInvalid,
            dedupe: true,
            backup: false,
        };

        let (merged, report) = merge_lines(&parser, existing, imported, options).unwrap();

        assert_eq!(merged, lines(&["05/01/2024 same", "05/03/2024 later"]));
        assert_eq!(report.skipped, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.written, 2);
    }

    #[test]
    fn test_to_file_content() {
        assert_eq!(to_file_content(&lines(&["a", "b"])), "a\nb\n");
        assert_eq!(to_file_content(&[]), "");
    }
}
