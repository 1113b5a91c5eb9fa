//! Styles for CLI output, chosen once per process.

use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// One style per kind of thing the CLI prints
#[derive(Debug, Clone)]
pub struct Theme {
    pub heading: Style,
    pub ok: Style,
    pub caution: Style,
    /// Counts in summaries
    pub metric: Style,
    /// Paths and other secondary text
    pub path: Style,
}

impl Theme {
    /// Colours when stdout is a terminal and `NO_COLOR` is unset
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self::for_terminal(console::Term::stdout().is_term() && !no_color)
    }

    pub fn for_terminal(colored: bool) -> Self {
        if !colored {
            let plain = Style::new();
            return Self {
                heading: plain.clone(),
                ok: plain.clone(),
                caution: plain.clone(),
                metric: plain.clone(),
                path: plain,
            };
        }
        Self {
            heading: Style::new().cyan().bold(),
            ok: Style::new().green().bold(),
            caution: Style::new().yellow().bold(),
            metric: Style::new().magenta(),
            path: Style::new().bright_black(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
