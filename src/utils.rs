use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use heck::ToTitleCase;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

pub static SPINNER_TOTALS_TEMPLATE: &str = "{spinner:2.cyan/blue} {msg}: {human_pos}";


pub fn new_spinner_totals(message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(SPINNER_TOTALS_TEMPLATE).expect("Invalid spinner template");
    let spinner = ProgressBar::new_spinner()
        .with_message(message.to_string())
        .with_style(style);

    spinner
}


/// Convert the case of the first word to a title case.
/// This will also replace all unicode whitespaces with ASCII compatible whitespace
/// which means it also works as a sort of normalizer
pub fn titleize_first_word(text: &str) -> String {
    let mut converted: Vec<String> = Vec::new();
    let mut words = text.split_whitespace();

    if let Some(word) = words.next() {
        if is_uppercase(word) {
            converted.push(word.to_title_case());
        }
        else {
            converted.push(word.to_string());
        }
    }
    for word in words {
        converted.push(word.to_string());
    }

    converted.join(" ")
}

pub fn is_uppercase(text: &str) -> bool {
    for chr in text.chars() {
        if chr.is_lowercase() {
            return false;
        }
    }
    true
}


/// Move an existing target directory aside with a timestamp suffix and
/// create a fresh empty one in its place. Prior committed outputs survive a
/// failed rebuild this way.
pub fn backup_and_recreate(target: &Path) -> Result<PathBuf, std::io::Error> {
    if target.exists() {
        let name = target
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "target".to_string());
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let backup = target.with_file_name(format!("{name}_{stamp}"));

        info!(backup = %backup.display(), "Moving existing target aside");
        fs::rename(target, &backup)?;
    }

    fs::create_dir_all(target)?;
    Ok(target.to_path_buf())
}
