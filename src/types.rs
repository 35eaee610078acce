//! Типы данных для просмотрщика чат-лога
//!
//! Этот модуль содержит все основные типы, которые парсер, watcher
//! и слой отображения передают друг другу.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Канал строки лога
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Системные сообщения (опыт, дроп, убийства)
    System,
    /// Личные сообщения
    Whisper,
    /// Всё остальное (глобальный чат)
    Global,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::System, Category::Whisper, Category::Global];

    /// Заголовок вкладки, как в окне просмотрщика
    pub fn tab_label(self) -> &'static str {
        match self {
            Category::System => "[SYSTEM]",
            Category::Whisper => "[WHISPER]",
            Category::Global => "[GLOBAL]",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::System => "system",
            Category::Whisper => "whisper",
            Category::Global => "global",
        };
        f.write_str(name)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" | "s" => Ok(Category::System),
            "whisper" | "w" => Ok(Category::Whisper),
            "global" | "g" => Ok(Category::Global),
            other => Err(format!(
                "unknown category '{}', expected system, whisper or global",
                other
            )),
        }
    }
}

/// Одна строка лога вместе с её каналом
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Текст строки без перевода строки
    pub text: String,
    pub category: Category,
}

/// Результат разбора строки: канал всегда есть, остальное опционально,
/// ошибки разбора не фатальны
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    pub category: Category,
    /// Полученный опыт ("Gained +N exp")
    pub experience: Option<i64>,
    /// Монстр, за которого дали опыт ("from <Monster>,")
    pub monster: Option<&'a str>,
}

/// Маркеры каналов в тексте лога
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMarkers {
    /// Подстрока системного канала
    pub system: String,
    /// Подстрока канала личных сообщений
    pub whisper: String,
}

impl Default for ChannelMarkers {
    fn default() -> Self {
        Self {
            system: "-s".to_string(),
            whisper: "-w".to_string(),
        }
    }
}

/// Количество убийств одного монстра
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillCount {
    pub monster: String,
    pub kills: u64,
}

/// Статистика для UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatsSnapshot {
    /// Всего опыта
    pub total_exp: i64,
    /// Всего строк ([ALL])
    pub total_lines: usize,
    pub system_lines: usize,
    pub whisper_lines: usize,
    pub global_lines: usize,
    /// Уникальных монстров
    pub unique_monsters: usize,
    /// Топ монстров по убийствам
    pub top_kills: Vec<KillCount>,
}

/// Что произошло при очередном чтении файла
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Новых строк нет
    Unchanged,
    /// Обработано N строк в конце лога (включая дописанную недописанную строку)
    Appended(usize),
    /// Файл был перезаписан/укорочен, состояние собрано заново из N строк
    Reloaded(usize),
}

/// Что делать со строками без валидной даты при импорте
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Отклонить весь импорт, файл не трогаем
    #[default]
    Reject,
    /// Пропустить такие строки с предупреждением
    SkipInvalid,
}

/// Параметры импорта логов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOptions {
    pub policy: MergePolicy,
    /// Убирать точные дубликаты строк
    pub dedupe: bool,
    /// Сохранить копию <file>.bak перед перезаписью
    pub backup: bool,
}

/// Итог импорта
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeReport {
    /// Строк было в логе
    pub existing: usize,
    /// Строк пришло из импортированных файлов
    pub imported: usize,
    /// Пропущено строк без даты (только SkipInvalid)
    pub skipped: usize,
    /// Убрано дубликатов (только при dedupe)
    pub duplicates: usize,
    /// Записано строк в итоговый файл
    pub written: usize,
}

/// Настройки приложения
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Путь к чат-логу (ChatLogFilePath)
    #[serde(alias = "ChatLogFilePath")]
    pub chat_log_file_path: Option<String>,
    /// Интервал опроса файла в миллисекундах
    pub poll_interval_ms: u64,
    /// Маркеры каналов
    pub markers: ChannelMarkers,
    /// Сколько монстров показывать в топе
    pub top_kills: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            chat_log_file_path: None,
            poll_interval_ms: 1000,
            markers: ChannelMarkers::default(),
            top_kills: 10,
        }
    }
}
