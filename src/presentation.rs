use std::io::{self, Write};
use std::sync::Mutex;
use log::debug;

pub use crate::transport::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

/// What the call control should look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    Idle,
    Connecting,
    Active,
    Ending,
}

/// Sink for everything the user sees. Calls are fire-and-forget.
pub trait Presentation: Send + Sync {
    fn update_status(&self, text: &str, kind: StatusKind);
    fn set_visual_state(&self, state: VisualState);
    fn append_log_message(&self, role: Role, text: &str);
    fn show_volume_level(&self, level: f32);
}

/// Line-oriented terminal rendering used by the CLI
pub struct TerminalPresentation {
    last_visual: Mutex<Option<VisualState>>,
    show_meter: bool,
}

impl TerminalPresentation {
    pub fn new(show_meter: bool) -> Self {
        Self {
            last_visual: Mutex::new(None),
            show_meter,
        }
    }

    fn meter(level: f32) -> String {
        let filled = ((level.clamp(0.0, 1.0) * 12.0).round()) as usize;
        format!("[{}{}]", "█".repeat(filled), " ".repeat(12 - filled))
    }
}

impl Presentation for TerminalPresentation {
    fn update_status(&self, text: &str, kind: StatusKind) {
        let prefix = match kind {
            StatusKind::Info => "·",
            StatusKind::Success => "✓",
            StatusKind::Warning => "!",
            StatusKind::Error => "✗",
        };
        println!("{} {}", prefix, text);
    }

    fn set_visual_state(&self, state: VisualState) {
        if let Ok(mut last) = self.last_visual.lock() {
            if *last == Some(state) {
                return;
            }
            *last = Some(state);
        }

        let label = match state {
            VisualState::Idle => "MIC READY",
            VisualState::Connecting => "CONNECTING",
            VisualState::Active => "ON CALL",
            VisualState::Ending => "HANGING UP",
        };
        println!("[{}]", label);
    }

    fn append_log_message(&self, role: Role, text: &str) {
        println!("{:>9}: {}", role, text);
    }

    fn show_volume_level(&self, level: f32) {
        if !self.show_meter {
            debug!("Volume level: {:.2}", level);
            return;
        }
        print!("\rLevel: {}", Self::meter(level));
        let _ = io::stdout().flush();
    }
}
