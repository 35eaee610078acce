//! Команды CLI — слой отображения поверх watcher'а
//!
//! Каждая команда пишет в переданный `Write`, чтобы её можно было прогнать в тестах.
//! Ошибки возвращаются строкой, как их и показывают пользователю.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use tokio::time::MissedTickBehavior;

use crate::file_watcher::LogWatcher;
use crate::persistence;
use crate::state::render;
use crate::types::{
    AppSettings, Category, KillCount, LoadOutcome, LogLine, MergeOptions, MergeReport,
};

/// Ширина столбца графика убийств
const BAR_WIDTH: usize = 40;

/// Строка для вывода: метка вкладки + текст
pub fn format_line(line: &LogLine) -> String {
    format!("{:<9} {}", line.category.tab_label(), line.text)
}

fn out_err(e: std::io::Error) -> String {
    format!("failed to write output: {}", e)
}

fn print_lines<'a, W, I>(out: &mut W, lines: I, filter: Option<Category>) -> Result<usize, String>
where
    W: Write,
    I: IntoIterator<Item = &'a LogLine>,
{
    let mut printed = 0;
    for line in lines {
        if filter.is_some_and(|c| c != line.category) {
            continue;
        }
        writeln!(out, "{}", format_line(line)).map_err(out_err)?;
        printed += 1;
    }
    Ok(printed)
}

/// Первичная загрузка: отсутствие файла — это "данных пока нет", а не ошибка
pub fn initial_load(watcher: &mut LogWatcher) -> Result<(), String> {
    match watcher.load_full() {
        Ok(_) => Ok(()),
        Err(e) if e.is_source_unavailable() => {
            warn!("{}; showing no data yet", e);
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Показать одну вкладку ([ALL] если категория не указана)
pub fn show<W: Write>(
    watcher: &LogWatcher,
    category: Option<Category>,
    out: &mut W,
) -> Result<(), String> {
    let printed = print_lines(out, watcher.state().lines(), category)?;
    info!("Printed {} lines", printed);
    Ok(())
}

/// Статистика: опыт, количество строк и график топа убийств
pub fn stats<W: Write>(
    watcher: &LogWatcher,
    top: usize,
    json: bool,
    out: &mut W,
) -> Result<(), String> {
    let snapshot = watcher.state().snapshot(top);

    if json {
        let text = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
        writeln!(out, "{}", text).map_err(out_err)?;
        return Ok(());
    }

    writeln!(out, "Total EXP: {}", snapshot.total_exp).map_err(out_err)?;
    writeln!(
        out,
        "Lines: {} (system {}, whisper {}, global {})",
        snapshot.total_lines, snapshot.system_lines, snapshot.whisper_lines, snapshot.global_lines
    )
    .map_err(out_err)?;
    writeln!(out, "Monsters killed: {} kinds", snapshot.unique_monsters).map_err(out_err)?;
    out.write_all(render_bar_chart(&snapshot.top_kills, BAR_WIDTH).as_bytes())
        .map_err(out_err)?;
    Ok(())
}

/// Текстовый столбчатый график: длина столбца пропорциональна числу убийств
pub fn render_bar_chart(kills: &[KillCount], width: usize) -> String {
    let Some(max) = kills.iter().map(|k| k.kills).max().filter(|&m| m > 0) else {
        return String::new();
    };
    let name_width = kills.iter().map(|k| k.monster.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for entry in kills {
        let len = ((entry.kills as f64 / max as f64) * width as f64).round() as usize;
        out.push_str(&format!(
            "{:<name_width$} | {} {}\n",
            entry.monster,
            "#".repeat(len.max(1)),
            entry.kills,
            name_width = name_width
        ));
    }
    out
}

/// Все сообщения отправителя (то, что в окне открывалось по двойному клику)
pub fn sender<W: Write>(watcher: &LogWatcher, name: &str, out: &mut W) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("sender name is empty".to_string());
    }
    let text = render(watcher.state().messages_from(watcher.parser(), name));
    if text.is_empty() {
        info!("No messages from {}", name);
    }
    out.write_all(text.as_bytes()).map_err(out_err)?;
    Ok(())
}

/// Импортировать файлы в лог
pub fn import<W: Write>(
    watcher: &mut LogWatcher,
    files: &[PathBuf],
    options: MergeOptions,
    out: &mut W,
) -> Result<MergeReport, String> {
    info!("Importing {} files into {}", files.len(), watcher.path().display());
    let report = watcher
        .import_files(files, options)
        .map_err(|e| e.to_string())?;

    writeln!(
        out,
        "Merged {} existing + {} imported lines -> {} written ({} skipped, {} duplicates)",
        report.existing, report.imported, report.written, report.skipped, report.duplicates
    )
    .map_err(out_err)?;
    Ok(report)
}

/// Показать (и при необходимости сохранить) итоговые настройки
pub fn config<W: Write>(
    settings: &AppSettings,
    settings_path: Option<&Path>,
    save: bool,
    out: &mut W,
) -> Result<(), String> {
    let text = serde_json::to_string_pretty(settings).map_err(|e| e.to_string())?;
    writeln!(out, "{}", text).map_err(out_err)?;

    if save {
        let path = settings_path.ok_or_else(|| "no settings location available".to_string())?;
        persistence::save_settings(path, settings).map_err(|e| e.to_string())?;
        writeln!(out, "Saved settings to {}", path.display()).map_err(out_err)?;
    }
    Ok(())
}

/// Следить за логом до Ctrl-C
pub async fn watch<W: Write>(
    watcher: &mut LogWatcher,
    interval: Duration,
    category: Option<Category>,
    out: &mut W,
) -> Result<(), String> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    watch_until(watcher, interval, category, out, shutdown).await
}

/// Цикл опроса: на каждом тике дочитываем файл и печатаем новые строки
pub async fn watch_until<W, F>(
    watcher: &mut LogWatcher,
    interval: Duration,
    category: Option<Category>,
    out: &mut W,
    shutdown: F,
) -> Result<(), String>
where
    W: Write,
    F: Future<Output = ()>,
{
    initial_load(watcher)?;
    print_lines(out, watcher.state().lines(), category)?;
    writeln!(out, "Total EXP: {}", watcher.state().total_exp()).map_err(out_err)?;
    out.flush().map_err(out_err)?;

    info!(
        "Watching {} every {} ms",
        watcher.path().display(),
        interval.as_millis()
    );

    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping watcher");
                break;
            }
            _ = ticker.tick() => {
                let before_exp = watcher.state().total_exp();

                match watcher.poll() {
                    LoadOutcome::Unchanged => continue,
                    LoadOutcome::Appended(n) => {
                        // n строк в конце: новые плюс переобработанный недописанный хвост
                        let lines = watcher.state().lines();
                        print_lines(out, &lines[lines.len().saturating_sub(n)..], category)?;
                    }
                    LoadOutcome::Reloaded(n) => {
                        writeln!(out, "--- chat log was rewritten, reloaded {} lines ---", n)
                            .map_err(out_err)?;
                        print_lines(out, watcher.state().lines(), category)?;
                    }
                }

                if watcher.state().total_exp() != before_exp {
                    writeln!(out, "Total EXP: {}", watcher.state().total_exp()).map_err(out_err)?;
                }
                out.flush().map_err(out_err)?;
            }
        }
    }
    Ok(())
}
