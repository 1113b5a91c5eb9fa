use crate::ui::progress_message::{ProgressMessage, ProgressPhase};
use crate::ui::{theme, Icons};
use indicatif::{HumanDuration, MultiProgress, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

const BAR_TEMPLATE: &str = "{spinner} {msg:24} [{bar:30}] {pos}/{len}";

/// Progress bars for one build, fed by the builder over a channel.
pub struct IndexProgress {
    mp: MultiProgress,
    handle: Option<thread::JoinHandle<()>>,
}

impl IndexProgress {
    pub fn new() -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();
        let mp = MultiProgress::new();
        let visible = console::Term::stderr().is_term();

        let make_bar = |phase: ProgressPhase| {
            if !visible {
                return ProgressBar::hidden();
            }
            let bar = mp.add(ProgressBar::new(0).with_message(phase.label()));
            if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        };
        let parsing = make_bar(ProgressPhase::Parsing);
        let resolving = make_bar(ProgressPhase::Resolving);

        let handle = thread::spawn(move || {
            for msg in rx {
                let (bar, phase) = match &msg {
                    ProgressMessage::Started { phase, .. }
                    | ProgressMessage::Progress { phase, .. }
                    | ProgressMessage::Finished { phase } => match phase {
                        ProgressPhase::Parsing => (&parsing, *phase),
                        ProgressPhase::Resolving => (&resolving, *phase),
                    },
                };
                match msg {
                    ProgressMessage::Started { total, .. } => {
                        bar.set_length(total as u64);
                        bar.enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Progress { current, file, .. } => {
                        bar.set_position(current as u64);
                        if let Some(f) = file {
                            bar.set_message(format!("{}: {}", phase.label(), f));
                        }
                    }
                    ProgressMessage::Finished { .. } => {
                        bar.finish_with_message(format!("{}: done", phase.label()));
                    }
                }
            }
        });

        (
            Self {
                mp,
                handle: Some(handle),
            },
            tx,
        )
    }

    /// Wait for the builder's sender to drop, clear the bars, print a summary.
    pub fn finish_with_summary(
        mut self,
        duration: Duration,
        files: usize,
        nodes: usize,
        relationships: usize,
        external: usize,
    ) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.mp.clear().ok();
        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().ok.clone()),
            format!("Complete in {}", HumanDuration(duration)).style(theme().ok.clone())
        );
        println!(
            "  {} {}  {} {}  {} {}  {} {}",
            Icons::FILE.style(theme().metric.clone()),
            files,
            Icons::PACKAGE.style(theme().metric.clone()),
            nodes,
            Icons::LINK.style(theme().metric.clone()),
            relationships,
            Icons::GLOBE.style(theme().metric.clone()),
            external
        );
    }
}
