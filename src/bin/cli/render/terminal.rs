use wordpractice_lib::practice::{MasteryLevel, MasteryResult};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

const BAR_WIDTH: usize = 10;

fn level_color(level: MasteryLevel) -> &'static str {
    match level {
        MasteryLevel::New => Color::DIM,
        MasteryLevel::Learning => Color::RED,
        MasteryLevel::Familiar => Color::YELLOW,
        MasteryLevel::Proficient => Color::CYAN,
        MasteryLevel::Mastered => Color::GREEN,
    }
}

/// `[#####-----]  52 familiar`
pub fn mastery_bar(mastery: &MasteryResult, use_color: bool) -> String {
    let filled = (mastery.score as usize * BAR_WIDTH + 50) / 100;
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
    let label = format!("{:>3} {}", mastery.score, mastery.level.label());

    if use_color {
        let color = level_color(mastery.level);
        format!("[{}{}{}] {}{}{}", color, bar, Color::RESET, color, label, Color::RESET)
    } else {
        format!("[{}] {}", bar, label)
    }
}

pub fn bold(text: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", Color::BOLD, text, Color::RESET)
    } else {
        text.to_string()
    }
}

pub fn seconds(value: Option<f64>) -> String {
    match value {
        Some(s) => format!("{:.1}s", s),
        None => "-".to_string(),
    }
}
