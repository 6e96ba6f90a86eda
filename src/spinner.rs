//! Waiting indicator for the suggestion call
//!
//! Renders to stderr so piped stdout stays clean. Long waits (retry backoff
//! plus request timeouts) get an elapsed-seconds suffix so the terminal does
//! not look hung.

use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Spinner animation frames - braille pattern spinner
pub const SPINNER_BRAILLE: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Spinner animation frames - elegant dots
pub const SPINNER_ELEGANT: [&str; 8] = ["·  ", "·· ", "···", " ··", "  ·", "   ", "   ", "·  "];

/// Waits shorter than this still feel instant; no elapsed suffix
const LONG_WAIT_SECS: u64 = 3;

#[derive(Clone, Copy)]
pub enum SpinnerStyle {
    Braille,
    Elegant,
}

impl SpinnerStyle {
    fn frames(self) -> Vec<String> {
        match self {
            SpinnerStyle::Braille => SPINNER_BRAILLE.iter().map(|c| c.to_string()).collect(),
            SpinnerStyle::Elegant => SPINNER_ELEGANT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// An animated wait indicator pinned to one stderr line
pub struct Spinner {
    frames: Vec<String>,
    current_frame: usize,
    message: String,
    started: Instant,
    last_update: Instant,
    frame_duration: Duration,
}

impl Spinner {
    pub fn new(style: SpinnerStyle, message: &str) -> Self {
        Self {
            frames: style.frames(),
            current_frame: 0,
            message: message.to_string(),
            started: Instant::now(),
            last_update: Instant::now(),
            frame_duration: Duration::from_millis(80),
        }
    }

    /// Hide the cursor while the spinner owns the line
    pub fn start(&self) {
        let _ = execute!(io::stderr(), Hide);
    }

    /// Clear the line and restore the cursor
    pub fn stop(&self) {
        let _ = execute!(
            io::stderr(),
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Show
        );
    }

    /// Advance the animation; call from the caller's poll loop
    pub fn tick(&mut self) {
        if self.last_update.elapsed() >= self.frame_duration {
            self.current_frame = (self.current_frame + 1) % self.frames.len();
            self.last_update = Instant::now();
            self.render();
        }
    }

    /// Swap the message without restarting the elapsed clock
    pub fn set_message(&mut self, msg: &str) {
        self.message = msg.to_string();
        self.render();
    }

    fn render(&self) {
        let frame = &self.frames[self.current_frame];
        let line = status_line(&self.message, self.started.elapsed().as_secs());
        let _ = execute!(
            io::stderr(),
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Rgb { r: 140, g: 140, b: 140 }),
            Print(format!("  {} ", frame)),
            SetForegroundColor(Color::Rgb { r: 180, g: 180, b: 180 }),
            Print(&line),
            ResetColor
        );
        let _ = io::stderr().flush();
    }

    /// Replace the spinner line with a final note
    pub fn finish_with_message(&self, msg: &str) {
        let _ = execute!(
            io::stderr(),
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Rgb { r: 140, g: 140, b: 140 }),
            Print("  ✓ "),
            SetForegroundColor(Color::Rgb { r: 180, g: 180, b: 180 }),
            Print(msg),
            ResetColor,
            Print("\n"),
            Show
        );
    }
}

fn status_line(message: &str, waited_secs: u64) -> String {
    if waited_secs >= LONG_WAIT_SECS {
        format!("{} ({}s)", message, waited_secs)
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styles_have_frames() {
        assert!(!Spinner::new(SpinnerStyle::Braille, "x").frames.is_empty());
        assert!(!Spinner::new(SpinnerStyle::Elegant, "x").frames.is_empty());
    }

    #[test]
    fn test_tick_waits_for_frame_duration() {
        let mut spinner = Spinner::new(SpinnerStyle::Braille, "waiting");
        spinner.tick();
        assert_eq!(spinner.current_frame, 0);
    }

    #[test]
    fn test_short_waits_hide_the_elapsed_suffix() {
        assert_eq!(status_line("working", 0), "working");
        assert_eq!(status_line("working", 2), "working");
        assert_eq!(status_line("working", 7), "working (7s)");
    }
}
