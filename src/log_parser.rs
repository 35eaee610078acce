//! Парсер строк чат-лога Endless-Online
//!
//! Строка лога: `MM/DD/YYYY <время/канал> ... текст`.
//! Из неё извлекаются:
//! - Канал (system / whisper / global) по подстроке-маркеру
//! - Опыт из системных строк `Gained +N exp`
//! - Монстр из `... exp from <Monster>, ...`
//! - Отправитель (первое слово после ` > `)

use chrono::NaiveDate;
use log::trace;
use regex::Regex;

use crate::types::{Category, ChannelMarkers, ParsedLine};

/// Разделитель отправителя и текста сообщения
const SENDER_SEPARATOR: &str = " > ";

/// Парсер строк лога
pub struct LogParser {
    // Regex для ведущей даты: 04/17/2024
    date_re: Regex,
    // Regex для монстра после токена exp: "from Goblin, total 10"
    monster_re: Regex,
    /// Маркеры каналов
    markers: ChannelMarkers,
}

impl LogParser {
    /// Создать парсер со стандартными маркерами (-s / -w)
    pub fn new() -> Self {
        Self::with_markers(ChannelMarkers::default())
    }

    /// Создать парсер с маркерами из настроек
    pub fn with_markers(markers: ChannelMarkers) -> Self {
        Self {
            date_re: Regex::new(r"^\s*(\d{2}/\d{2}/\d{4})").expect("date regex"),
            monster_re: Regex::new(r"\bfrom\b([^,]*)").expect("monster regex"),
            markers,
        }
    }

    /// Определить канал строки.
    /// Порядок правил: system, затем whisper, иначе global. Пустой маркер не совпадает ни с чем.
    pub fn classify(&self, line: &str) -> Category {
        if contains_marker(line, &self.markers.system) {
            Category::System
        } else if contains_marker(line, &self.markers.whisper) {
            Category::Whisper
        } else {
            Category::Global
        }
    }

    /// Парсить ведущую дату MM/DD/YYYY
    pub fn parse_date(&self, line: &str) -> Option<NaiveDate> {
        let caps = self.date_re.captures(line)?;
        NaiveDate::parse_from_str(caps.get(1)?.as_str(), "%m/%d/%Y").ok()
    }

    /// Опыт из системной строки с "Gained" и "exp".
    /// Берётся текст между первым '+' и "exp"; если число не парсится, строка просто не считается.
    pub fn extract_experience(&self, line: &str) -> Option<i64> {
        self.experience_span(line).map(|(amount, _)| amount)
    }

    /// Монстр из строки с опытом: текст между "from" и следующей запятой
    pub fn extract_monster<'a>(&self, line: &'a str) -> Option<&'a str> {
        let (_, rest) = self.experience_span(line)?;
        self.monster_in(rest)
    }

    /// Отправитель сообщения: первое слово после " > "
    pub fn sender_of<'a>(&self, line: &'a str) -> Option<&'a str> {
        let (_, message) = line.split_once(SENDER_SEPARATOR)?;
        message.split_whitespace().next()
    }

    /// Проверить, что сообщение отправлено `sender`
    pub fn is_from(&self, line: &str, sender: &str) -> bool {
        self.sender_of(line) == Some(sender)
    }

    /// Разобрать строку целиком
    pub fn parse_line<'a>(&self, line: &'a str) -> ParsedLine<'a> {
        let category = self.classify(line);
        let span = if category == Category::System {
            self.experience_span(line)
        } else {
            None
        };

        ParsedLine {
            category,
            experience: span.map(|(amount, _)| amount),
            monster: span.and_then(|(_, rest)| self.monster_in(rest)),
        }
    }

    fn monster_in<'a>(&self, rest: &'a str) -> Option<&'a str> {
        let caps = self.monster_re.captures(rest)?;
        let name = caps.get(1)?.as_str().trim();
        if name.is_empty() {
            return None;
        }
        Some(name)
    }

    /// Количество опыта и остаток строки после токена "exp"
    fn experience_span<'a>(&self, line: &'a str) -> Option<(i64, &'a str)> {
        if self.classify(line) != Category::System {
            return None;
        }
        if !line.contains("Gained") || !line.contains("exp") {
            return None;
        }

        let (_, after_plus) = line.split_once('+')?;
        // Сегмент до следующего '+', как в исходном формате "+N exp"
        let segment_end = after_plus.find('+').unwrap_or(after_plus.len());
        let segment = &after_plus[..segment_end];

        let (raw_amount, rest) = match segment.find("exp") {
            Some(pos) => (&segment[..pos], &after_plus[pos + "exp".len()..]),
            None => (segment, &after_plus[segment_end..]),
        };

        match raw_amount.trim().parse::<i64>() {
            Ok(amount) => Some((amount, rest)),
            Err(_) => {
                trace!("Skipping unparsable exp amount {:?}", raw_amount.trim());
                None
            }
        }
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_marker(line: &str, marker: &str) -> bool {
    !marker.is_empty() && line.contains(marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_classify() {
        let parser = LogParser::new();

        assert_eq!(
            parser.classify("04/17/2024 10:12 -s Gained +150 exp"),
            Category::System
        );
        assert_eq!(
            parser.classify("04/17/2024 10:12 -w > Vesper hi there"),
            Category::Whisper
        );
        assert_eq!(
            parser.classify("04/17/2024 10:12 -g > Vesper hello"),
            Category::Global
        );
        // Первое совпавшее правило побеждает
        assert_eq!(parser.classify("-w -s both"), Category::System);
        assert_eq!(parser.classify(""), Category::Global);
    }

    #[test]
    fn test_custom_markers() {
        let parser = LogParser::with_markers(ChannelMarkers {
            system: "[sys]".to_string(),
            whisper: String::new(),
        });

        assert_eq!(parser.classify("[sys] Gained +5 exp"), Category::System);
        assert_eq!(parser.classify("-s not a system line anymore"), Category::Global);
        // Пустой маркер не должен совпадать со всем подряд
        assert_eq!(parser.classify("-w whisper"), Category::Global);
        assert_eq!(parser.extract_experience("[sys] Gained +5 exp"), Some(5));
    }

    #[test]
    fn test_extract_experience() {
        let parser = LogParser::new();

        assert_eq!(
            parser.extract_experience("04/17/2024 -s You Gained +150 exp for the kill"),
            Some(150)
        );
        assert_eq!(parser.extract_experience("-g hello"), None);
        // Не системная строка
        assert_eq!(parser.extract_experience("-w Gained +150 exp"), None);
        // Нет "Gained"
        assert_eq!(parser.extract_experience("-s +150 exp"), None);
    }

    #[test]
    fn test_extract_experience_bad_number_is_soft() {
        let parser = LogParser::new();

        assert_eq!(parser.extract_experience("-s Gained +lots exp"), None);
        assert_eq!(parser.extract_experience("-s Gained exp, no plus"), None);
        assert_eq!(parser.extract_monster("-s Gained +lots exp from Goblin,"), None);
    }

    #[test]
    fn test_extract_monster() {
        let parser = LogParser::new();

        assert_eq!(
            parser.extract_monster("-s Gained +10 exp from Goblin, total 10"),
            Some("Goblin")
        );
        assert_eq!(
            parser.extract_monster("05/01/2024 -s Gained +42 exp from  Ancient Wraith , total 99"),
            Some("Ancient Wraith")
        );
        // Без запятой берём остаток строки
        assert_eq!(
            parser.extract_monster("-s Gained +10 exp from Rat"),
            Some("Rat")
        );
        assert_eq!(parser.extract_monster("-s Gained +10 exp"), None);
        assert_eq!(parser.extract_monster("-s Gained +10 exp from , total"), None);
        assert_eq!(parser.extract_monster("-g Gained +10 exp from Goblin,"), None);
    }

    #[test]
    fn test_parse_date() {
        let parser = LogParser::new();

        let date = parser.parse_date("04/17/2024 10:12:01 -s hello").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 4);
        assert_eq!(date.day(), 17);

        assert!(parser.parse_date("13/40/2024 bad").is_none());
        assert!(parser.parse_date("hello 04/17/2024").is_none());
        assert!(parser.parse_date("").is_none());
    }

    #[test]
    fn test_sender() {
        let parser = LogParser::new();
        let line = "04/17/2024 10:12 -g > Vesper hello all";

        assert_eq!(parser.sender_of(line), Some("Vesper"));
        assert!(parser.is_from(line, "Vesper"));
        assert!(!parser.is_from(line, "Vesp"));
        assert!(!parser.is_from("no separator here", "Vesper"));
        assert_eq!(parser.sender_of("no separator here"), None);
    }

    #[test]
    fn test_parse_line() {
        let parser = LogParser::new();
        let parsed = parser.parse_line("04/17/2024 -s Gained +10 exp from Goblin, total 10");

        assert_eq!(parsed.category, Category::System);
        assert_eq!(parsed.experience, Some(10));
        assert_eq!(parsed.monster, Some("Goblin"));

        let parsed = parser.parse_line("04/17/2024 -g > Vesper Gained +10 exp from Goblin,");
        assert_eq!(parsed.category, Category::Global);
        assert_eq!(parsed.experience, None);
        assert_eq!(parsed.monster, None);
    }
}
