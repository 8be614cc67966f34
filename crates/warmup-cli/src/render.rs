use indicatif::{ProgressBar, ProgressStyle};
use warmup_core::presenter::{
    ERROR_TEXT, FAILED_MESSAGE, FREE_TIER_NOTE, READY_MESSAGE, TIP_TEXT, TITLE,
};
use warmup_core::{Frame, Outcome, ViewModel};

use crate::output::print_json_line;

/// Where frames of the waiting screen end up.
pub trait Renderer {
    fn render(&mut self, frame: &Frame) -> anyhow::Result<()>;
    fn finish(&mut self, outcome: Outcome) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// TerminalRenderer
// ---------------------------------------------------------------------------

/// Progress bar on stderr plus one-off panels printed above it.
pub struct TerminalRenderer {
    bar: ProgressBar,
    tip_shown: bool,
    note_shown: bool,
    error_shown: bool,
}

impl TerminalRenderer {
    pub fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        bar.println(TITLE);
        Ok(Self {
            bar,
            tip_shown: false,
            note_shown: false,
            error_shown: false,
        })
    }

    fn draw(&mut self, view: &ViewModel) {
        self.bar.set_position(u64::from(view.display_percent()));
        if view.elapsed_seconds > 0 {
            self.bar
                .set_message(format!("{} • {}s", view.message, view.elapsed_seconds));
        } else {
            self.bar.set_message(view.message.clone());
        }

        if view.show_free_tier_note && !self.note_shown {
            self.note_shown = true;
            self.bar.println(format!("  {FREE_TIER_NOTE}"));
        }
        if view.show_tip && !self.tip_shown {
            self.tip_shown = true;
            self.bar.println(format!("  💡 {TIP_TEXT}"));
        }
        if view.show_error && !self.error_shown {
            self.error_shown = true;
            self.bar.println(format!("  {ERROR_TEXT}"));
        }
    }
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, frame: &Frame) -> anyhow::Result<()> {
        if let Some(view) = &frame.view {
            self.draw(view);
        }
        Ok(())
    }

    fn finish(&mut self, outcome: Outcome) -> anyhow::Result<()> {
        match outcome {
            Outcome::Ready => {
                self.bar.set_position(100);
                self.bar.finish_with_message(READY_MESSAGE);
            }
            Outcome::Failed(_) => {
                if !self.error_shown {
                    self.error_shown = true;
                    self.bar.println(format!("  {ERROR_TEXT}"));
                }
                self.bar.abandon_with_message(FAILED_MESSAGE);
            }
            Outcome::Unmounted => self.bar.finish_and_clear(),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonRenderer
// ---------------------------------------------------------------------------

/// One JSON object per frame on stdout, then a final outcome line.
#[derive(Default)]
pub struct JsonRenderer {
    last: Option<Frame>,
    last_view: Option<ViewModel>,
}

impl Renderer for JsonRenderer {
    fn render(&mut self, frame: &Frame) -> anyhow::Result<()> {
        // The watch stream may hand back an unchanged frame after a wake-up.
        if self.last.as_ref() == Some(frame) {
            return Ok(());
        }
        print_json_line(frame)?;
        if let Some(view) = &frame.view {
            self.last_view = Some(view.clone());
        }
        self.last = Some(frame.clone());
        Ok(())
    }

    fn finish(&mut self, outcome: Outcome) -> anyhow::Result<()> {
        let mut line = serde_json::to_value(outcome)?;
        line["last_view"] = serde_json::to_value(&self.last_view)?;
        print_json_line(&line)
    }
}
