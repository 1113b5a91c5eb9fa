use crate::ui::theme;
use owo_colors::OwoColorize;

pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const FILE: &str = "📄";
    pub const PACKAGE: &str = "📦";
    pub const LINK: &str = "🔗";
    pub const GLOBE: &str = "🌐";
    pub const DATABASE: &str = "🗄️";
}

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().heading.clone()));
}

/// `icon label: value` with the value dimmed, for paths
pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label, value.style(theme().path.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().ok.clone()));
}

/// Printed on stderr
pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().caution.clone()));
}

pub fn section(title: &str) {
    println!();
    println!("{}", title.style(theme().heading.clone()));
}
