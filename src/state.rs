//! Состояние просмотрщика: классифицированные строки и агрегаты
//!
//! Строки и агрегаты растут только вперёд: каждая строка проходит через
//! `accumulate` ровно один раз за жизнь `LogState`. Сбросить всё можно
//! только полной перезагрузкой (`LogState::default()`). Исключение —
//! недописанная последняя строка: её можно откатить через `retract_last`.

use std::collections::HashMap;

use log::debug;

use crate::log_parser::LogParser;
use crate::types::{Category, KillCount, LogLine, StatsSnapshot};

/// Счётчик убийств по монстрам.
/// Хранит порядок первого появления, чтобы топ при равенстве был стабильным.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillTally {
    entries: Vec<KillCount>,
    index: HashMap<String, usize>,
}

impl KillTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Засчитать одно убийство
    pub fn record(&mut self, monster: &str) {
        self.record_many(monster, 1);
    }

    /// Засчитать `kills` убийств
    pub fn record_many(&mut self, monster: &str, kills: u64) {
        let monster = monster.trim();
        if monster.is_empty() || kills == 0 {
            return;
        }
        match self.index.get(monster) {
            Some(&idx) => self.entries[idx].kills += kills,
            None => {
                self.index.insert(monster.to_string(), self.entries.len());
                self.entries.push(KillCount {
                    monster: monster.to_string(),
                    kills,
                });
            }
        }
    }

    pub fn get(&self, monster: &str) -> u64 {
        self.index
            .get(monster)
            .map(|&idx| self.entries[idx].kills)
            .unwrap_or(0)
    }

    /// Снять одно убийство (откат последней обработанной строки)
    fn retract(&mut self, monster: &str) {
        let Some(&idx) = self.index.get(monster) else {
            return;
        };
        self.entries[idx].kills = self.entries[idx].kills.saturating_sub(1);
        if self.entries[idx].kills == 0 {
            self.entries.remove(idx);
            self.index.remove(monster);
            for (i, entry) in self.entries.iter().enumerate().skip(idx) {
                self.index.insert(entry.monster.clone(), i);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Топ-N по убийствам (по убыванию), при равенстве — кто встретился раньше
    pub fn top(&self, n: usize) -> Vec<KillCount> {
        let mut sorted: Vec<&KillCount> = self.entries.iter().collect();
        // sort_by стабильный: порядок первого появления сохраняется при равенстве
        sorted.sort_by(|a, b| b.kills.cmp(&a.kills));
        sorted.into_iter().take(n).cloned().collect()
    }
}

/// Классифицированный лог плюс опыт и убийства
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogState {
    lines: Vec<LogLine>,
    total_exp: i64,
    kills: KillTally,
}

impl LogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Обработать одну новую строку: классифицировать и обновить агрегаты
    pub fn accumulate(&mut self, parser: &LogParser, line: &str) {
        let parsed = parser.parse_line(line);

        if let Some(exp) = parsed.experience {
            self.total_exp = self.total_exp.saturating_add(exp);
            if let Some(monster) = parsed.monster {
                self.kills.record(monster);
                debug!("Kill: {} (+{} exp, total {})", monster, exp, self.total_exp);
            }
        }

        self.lines.push(LogLine {
            text: line.to_string(),
            category: parsed.category,
        });
    }

    /// Откатить последнюю строку вместе с её вкладом в агрегаты
    pub fn retract_last(&mut self, parser: &LogParser) -> Option<LogLine> {
        let line = self.lines.pop()?;
        let parsed = parser.parse_line(&line.text);
        if let Some(exp) = parsed.experience {
            self.total_exp = self.total_exp.saturating_sub(exp);
            if let Some(monster) = parsed.monster {
                self.kills.retract(monster);
            }
        }
        Some(line)
    }

    /// Обработать пачку строк по порядку
    pub fn accumulate_all<I, S>(&mut self, parser: &LogParser, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.accumulate(parser, line.as_ref());
        }
    }

    /// Количество обработанных строк
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Все строки в порядке файла (вкладка [ALL])
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// Строки одного канала
    pub fn lines_in(&self, category: Category) -> impl Iterator<Item = &LogLine> + '_ {
        self.lines.iter().filter(move |l| l.category == category)
    }

    pub fn count(&self, category: Category) -> usize {
        self.lines_in(category).count()
    }

    /// Всего опыта
    pub fn total_exp(&self) -> i64 {
        self.total_exp
    }

    pub fn kills(&self) -> &KillTally {
        &self.kills
    }

    pub fn top_kills(&self, n: usize) -> Vec<KillCount> {
        self.kills.top(n)
    }

    /// Сообщения от конкретного отправителя
    pub fn messages_from<'a>(
        &'a self,
        parser: &'a LogParser,
        sender: &'a str,
    ) -> impl Iterator<Item = &'a LogLine> + 'a {
        self.lines
            .iter()
            .filter(move |l| parser.is_from(&l.text, sender))
    }

    /// Собрать снимок статистики для UI
    pub fn snapshot(&self, top_n: usize) -> StatsSnapshot {
        let mut snapshot = StatsSnapshot {
            total_exp: self.total_exp,
            total_lines: self.lines.len(),
            unique_monsters: self.kills.len(),
            top_kills: self.kills.top(top_n),
            ..StatsSnapshot::default()
        };
        for line in &self.lines {
            match line.category {
                Category::System => snapshot.system_lines += 1,
                Category::Whisper => snapshot.whisper_lines += 1,
                Category::Global => snapshot.global_lines += 1,
            }
        }
        snapshot
    }
}

/// Склеить строки в один текстовый блок (то, что уходит в буфер обмена по "Copy All")
pub fn render<'a, I>(lines: I) -> String
where
    I: IntoIterator<Item = &'a LogLine>,
{
    let mut out = String::new();
    for line in lines {
        out.push_str(&line.text);
        out.push('\n');
    }
    out
}
