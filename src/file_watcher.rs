//! Watcher для отслеживания изменений чат-лога
//!
//! Опрашивает mtime файла и дочитывает только новые строки (tail -f поведение).
//! Если уже прочитанное начало файла изменилось (пересоздан, обрезан или
//! перезаписан другим процессом), состояние собирается заново.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, info, warn};

use crate::error::Result;
use crate::log_parser::LogParser;
use crate::merge::{merge_lines, to_file_content, SourceLines};
use crate::persistence::{self, LogContents};
use crate::state::LogState;
use crate::types::{LoadOutcome, MergeOptions, MergeReport};

/// Состояние watcher'а
pub struct LogWatcher {
    /// Путь к файлу лога
    log_path: PathBuf,
    /// Парсер строк
    parser: LogParser,
    /// Обработанные строки и агрегаты
    state: LogState,
    /// mtime на момент последнего успешного чтения
    last_modified: Option<SystemTime>,
    /// Уже сообщили, что файла нет (чтобы не спамить каждый тик)
    missing_reported: bool,
    /// Последняя обработанная строка была без перевода строки
    tail_partial: bool,
}

impl LogWatcher {
    /// Создать новый watcher
    pub fn new(log_path: impl Into<PathBuf>, parser: LogParser) -> Self {
        Self {
            log_path: log_path.into(),
            parser,
            state: LogState::new(),
            last_modified: None,
            missing_reported: false,
            tail_partial: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn parser(&self) -> &LogParser {
        &self.parser
    }

    pub fn state(&self) -> &LogState {
        &self.state
    }

    /// Полная загрузка: сбросить состояние и обработать весь файл,
    /// включая недописанную последнюю строку.
    /// Возвращает число обработанных строк. При ошибке состояние не меняется.
    pub fn load_full(&mut self) -> Result<usize> {
        let modified = self.modified();
        let contents = persistence::read_log(&self.log_path)?;
        self.rebuild(&contents, modified);

        info!(
            "Loaded {} lines from {} (total exp {})",
            self.state.line_count(),
            self.log_path.display(),
            self.state.total_exp()
        );
        Ok(self.state.line_count())
    }

    /// Дочитать строки после уже обработанных.
    ///
    /// Обработанные завершённые строки должны остаться в начале файла без
    /// изменений, иначе файл считается перезаписанным и собирается заново
    /// (`Reloaded`). Недописанная последняя строка откатывается и
    /// обрабатывается ещё раз, когда игра её допишет.
    pub fn load_incremental(&mut self) -> Result<LoadOutcome> {
        let modified = self.modified();
        let contents = persistence::read_log(&self.log_path)?;
        self.missing_reported = false;

        let committed = self.state.line_count() - usize::from(self.tail_partial);
        if !self.prefix_matches(&contents.lines, committed) {
            info!(
                "Chat log was rewritten ({} -> {} lines), reloading from scratch",
                committed,
                contents.lines.len()
            );
            return Ok(self.reload(&contents, modified));
        }

        let mut start = committed;
        if self.tail_partial {
            let previous = self
                .state
                .lines()
                .last()
                .map(|l| l.text.clone())
                .unwrap_or_default();
            match contents.lines.get(committed).or(contents.partial.as_ref()) {
                Some(now) if *now == previous => start += 1,
                Some(now) if now.starts_with(&previous) => {
                    self.state.retract_last(&self.parser);
                }
                _ => {
                    info!("Unterminated last line changed, reloading from scratch");
                    return Ok(self.reload(&contents, modified));
                }
            }
        }

        self.last_modified = modified;
        let new_lines = contents.lines.get(start..).unwrap_or(&[]);
        self.state.accumulate_all(&self.parser, new_lines);
        let mut processed = new_lines.len();

        self.tail_partial = contents.partial.is_some();
        if let Some(tail) = &contents.partial {
            // Хвост, который уже обработан и не изменился, повторно не считаем
            if contents.lines.len() >= start {
                self.state.accumulate(&self.parser, tail);
                processed += 1;
            }
        }

        if processed == 0 {
            return Ok(LoadOutcome::Unchanged);
        }
        debug!(
            "Processed {} new lines, total exp {}",
            processed,
            self.state.total_exp()
        );
        Ok(LoadOutcome::Appended(processed))
    }

    /// Один тик опроса: если mtime изменился — дочитать файл.
    /// Никогда не возвращает ошибку: недоступный файл означает "без изменений".
    pub fn poll(&mut self) -> LoadOutcome {
        let modified = match fs::metadata(&self.log_path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(e) => {
                self.report_missing(&e.to_string());
                return LoadOutcome::Unchanged;
            }
        };

        if self.last_modified == Some(modified) {
            return LoadOutcome::Unchanged;
        }

        match self.load_incremental() {
            Ok(outcome) => outcome,
            Err(e) => {
                self.report_missing(&e.to_string());
                LoadOutcome::Unchanged
            }
        }
    }

    /// Слить текущий лог с импортированными строками, записать результат в файл
    /// и перечитать его. Файл либо заменяется целиком, либо не меняется.
    pub fn merge_and_persist(
        &mut self,
        imported: Vec<SourceLines>,
        options: MergeOptions,
    ) -> Result<MergeReport> {
        // Берём файл как есть (вместе с недописанным хвостом), чтобы ничего не потерять.
        let existing = match persistence::read_log(&self.log_path) {
            Ok(contents) => {
                let mut lines = contents.lines;
                lines.extend(contents.partial);
                lines
            }
            Err(e) if e.is_source_unavailable() => {
                debug!("No existing chat log, merging into an empty one: {}", e);
                self.state.lines().iter().map(|l| l.text.clone()).collect()
            }
            Err(e) => return Err(e),
        };

        let origin = self.log_path.display().to_string();
        let (merged, report) = merge_lines(
            &self.parser,
            SourceLines::new(origin, existing),
            imported,
            options,
        )?;

        if options.backup {
            if let Some(bak) = persistence::backup(&self.log_path)? {
                info!("Backed up chat log to {}", bak.display());
            }
        }
        persistence::atomic_write(&self.log_path, &to_file_content(&merged))?;
        info!(
            "Merged {} imported lines into {} ({} written, {} skipped, {} duplicates)",
            report.imported,
            self.log_path.display(),
            report.written,
            report.skipped,
            report.duplicates
        );

        self.load_full()?;
        Ok(report)
    }

    /// Импортировать файлы с диска и слить их с логом
    pub fn import_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        options: MergeOptions,
    ) -> Result<MergeReport> {
        let mut imported = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let contents = persistence::read_log(path)?;
            let mut lines = contents.lines;
            lines.extend(contents.partial);
            debug!("Read {} lines from {}", lines.len(), path.display());
            imported.push(SourceLines::new(path.display().to_string(), lines));
        }
        self.merge_and_persist(imported, options)
    }

    /// Первые `committed` строк файла совпадают с обработанными
    fn prefix_matches(&self, lines: &[String], committed: usize) -> bool {
        lines.len() >= committed
            && self.state.lines()[..committed]
                .iter()
                .zip(lines)
                .all(|(seen, now)| seen.text == *now)
    }

    fn rebuild(&mut self, contents: &LogContents, modified: Option<SystemTime>) {
        let mut state = LogState::new();
        state.accumulate_all(&self.parser, &contents.lines);
        if let Some(tail) = &contents.partial {
            state.accumulate(&self.parser, tail);
        }
        self.state = state;
        self.tail_partial = contents.partial.is_some();
        self.last_modified = modified;
        self.missing_reported = false;
    }

    fn reload(&mut self, contents: &LogContents, modified: Option<SystemTime>) -> LoadOutcome {
        self.rebuild(contents, modified);
        LoadOutcome::Reloaded(self.state.line_count())
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.log_path)
            .and_then(|m| m.modified())
            .ok()
    }

    fn report_missing(&mut self, reason: &str) {
        if self.missing_reported {
            debug!("Chat log still unavailable: {}", reason);
        } else {
            warn!("Chat log file not found: {}", reason);
            self.missing_reported = true;
        }
    }
}
