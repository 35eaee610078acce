//! Работа с файлами: чтение лога, атомарная запись, настройки
//!
//! Настройки лежат в data_local_dir()/eo-chatlog/settings.json.
//! Поверх них применяются переменные окружения (в т.ч. из .env).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{LogError, Result};
use crate::types::AppSettings;

/// Ключ пути к логу, как в старом config.ini
pub const ENV_LOG_PATH: &str = "ChatLogFilePath";
pub const ENV_POLL_MS: &str = "EO_CHATLOG_POLL_MS";
pub const ENV_SYSTEM_MARKER: &str = "EO_CHATLOG_SYSTEM_MARKER";
pub const ENV_WHISPER_MARKER: &str = "EO_CHATLOG_WHISPER_MARKER";

/// Содержимое файла лога
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContents {
    /// Завершённые строки (с переводом строки в файле)
    pub lines: Vec<String>,
    /// Хвост без перевода строки: игра могла ещё не дописать строку
    pub partial: Option<String>,
}

/// Прочитать лог целиком.
/// Невалидный UTF-8 заменяется, чтобы одна битая строка не ломала весь файл.
pub fn read_log(path: &Path) -> Result<LogContents> {
    let bytes = fs::read(path).map_err(|e| LogError::source_unavailable(path, e))?;
    Ok(split_log(&String::from_utf8_lossy(&bytes)))
}

fn split_log(text: &str) -> LogContents {
    let mut contents = LogContents::default();
    for chunk in text.split_inclusive('\n') {
        match chunk.strip_suffix('\n') {
            Some(line) => {
                let line = line.strip_suffix('\r').unwrap_or(line);
                contents.lines.push(line.to_string());
            }
            None => {
                let tail = chunk.strip_suffix('\r').unwrap_or(chunk);
                if !tail.is_empty() {
                    contents.partial = Some(tail.to_string());
                }
            }
        }
    }
    contents
}

/// Атомарная запись: пишем во временный файл в той же папке и подменяем им исходный.
/// Если подмена не удалась, исходный файл остаётся как был, а временный удаляется.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| LogError::write(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| LogError::write(dir, e))?;
    let written = tmp
        .write_all(content.as_bytes())
        .and_then(|()| tmp.as_file().sync_all());
    written.map_err(|e| LogError::write(tmp.path(), e))?;

    tmp.persist(path).map_err(|e| LogError::write(path, e.error))?;
    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Скопировать файл в <file>.bak. Если исходного файла нет, делать нечего.
pub fn backup(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let bak = sibling_with_suffix(path, ".bak");
    fs::copy(path, &bak).map_err(|e| LogError::write(&bak, e))?;
    Ok(Some(bak))
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "chatlog".into());
    name.push(suffix);
    path.with_file_name(name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsFile {
    pub version: u32,
    pub settings: AppSettings,
}

fn app_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("eo-chatlog"))
}

/// Путь к файлу настроек по умолчанию
pub fn settings_path() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("settings.json"))
}

/// Загрузить настройки. Отсутствие файла — не ошибка.
pub fn load_settings(path: &Path) -> Result<Option<AppSettings>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(path).map_err(|e| LogError::source_unavailable(path, e))?;
    if let Ok(parsed) = serde_json::from_str::<SettingsFile>(&data) {
        return Ok(Some(parsed.settings));
    }

    // legacy: AppSettings без обёртки
    let legacy: AppSettings = serde_json::from_str(&data).map_err(|e| LogError::Settings {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(legacy))
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    let file = SettingsFile {
        version: 1,
        settings: settings.clone(),
    };
    let json = serde_json::to_string_pretty(&file).map_err(|e| LogError::Settings {
        path: path.to_path_buf(),
        source: e,
    })?;
    atomic_write(path, &json)
}

/// Применить переопределения из окружения.
/// `lookup` обычно `|k| std::env::var(k).ok()`; в тестах подставляется map.
pub fn apply_env_overrides<F>(settings: &mut AppSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(ENV_LOG_PATH).filter(|p| !p.trim().is_empty()) {
        settings.chat_log_file_path = Some(path.trim().to_string());
    }

    if let Some(raw) = lookup(ENV_POLL_MS) {
        match raw.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => settings.poll_interval_ms = ms,
            _ => warn!("Ignoring invalid {}={:?}", ENV_POLL_MS, raw),
        }
    }

    if let Some(marker) = lookup(ENV_SYSTEM_MARKER) {
        settings.markers.system = marker;
    }
    if let Some(marker) = lookup(ENV_WHISPER_MARKER) {
        settings.markers.whisper = marker;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_split_log() {
        let contents = split_log("a\r\nb\n\nc");
        assert_eq!(contents.lines, vec!["a", "b", ""]);
        assert_eq!(contents.partial.as_deref(), Some("c"));

        let contents = split_log("a\n");
        assert_eq!(contents.lines, vec!["a"]);
        assert!(contents.partial.is_none());

        let contents = split_log("a\nb\r");
        assert_eq!(contents.lines, vec!["a"]);
        assert_eq!(contents.partial.as_deref(), Some("b"));
        assert!(split_log("a\n\r").partial.is_none());

        assert_eq!(split_log(""), LogContents::default());
    }

    #[test]
    fn test_read_missing_log() {
        let dir = tempdir().unwrap();
        let err = read_log(&dir.path().join("nope.txt")).unwrap_err();
        assert!(err.is_source_unavailable());
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.txt");

        atomic_write(&path, "first\n").unwrap();
        atomic_write(&path, "second\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["chat.txt"]);
    }

    #[test]
    fn test_failed_atomic_write_keeps_target() {
        let dir = tempdir().unwrap();
        // На месте лога непустая папка: подмена обязана упасть
        let path = dir.path().join("chat.txt");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep.txt"), "keep me\n").unwrap();

        let err = atomic_write(&path, "new content\n").unwrap_err();
        assert!(matches!(err, LogError::Write { .. }));
        assert_eq!(fs::read_to_string(path.join("keep.txt")).unwrap(), "keep me\n");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["chat.txt"]);
    }

    #[test]
    fn test_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.txt");
        assert!(backup(&path).unwrap().is_none());

        fs::write(&path, "keep me\n").unwrap();
        let bak = backup(&path).unwrap().unwrap();
        assert_eq!(bak, dir.path().join("chat.txt.bak"));
        assert_eq!(fs::read_to_string(bak).unwrap(), "keep me\n");
    }

    #[test]
    fn test_settings_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        assert!(load_settings(&path).unwrap().is_none());

        let settings = AppSettings {
            chat_log_file_path: Some("/tmp/chat.txt".to_string()),
            poll_interval_ms: 250,
            ..AppSettings::default()
        };
        save_settings(&path, &settings).unwrap();

        assert_eq!(load_settings(&path).unwrap(), Some(settings));
    }

    #[test]
    fn test_settings_legacy_and_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        fs::write(&path, r#"{"chat_log_file_path": "chat.txt", "top_kills": 3}"#).unwrap();
        let settings = load_settings(&path).unwrap().unwrap();
        assert_eq!(settings.chat_log_file_path.as_deref(), Some("chat.txt"));
        assert_eq!(settings.top_kills, 3);

        fs::write(&path, "not json").unwrap();
        assert!(matches!(load_settings(&path), Err(LogError::Settings { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_LOG_PATH, " C:/EO/chat.txt "),
            (ENV_POLL_MS, "zero"),
            (ENV_SYSTEM_MARKER, "[sys]"),
        ]);
        let mut settings = AppSettings::default();
        apply_env_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.chat_log_file_path.as_deref(), Some("C:/EO/chat.txt"));
        assert_eq!(settings.poll_interval_ms, 1000);
        assert_eq!(settings.markers.system, "[sys]");
        assert_eq!(settings.markers.whisper, "-w");
    }
}
