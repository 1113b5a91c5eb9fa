//! Terminal output for the CLI: progress bars, styled status lines, tables.

pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use output::{header, section, status, success, warn, Icons};
pub use progress::IndexProgress;
pub use progress_message::{ProgressMessage, ProgressPhase};
pub use table::{languages_table, stats_table, store_stats_table};
pub use theme::{theme, Theme};
