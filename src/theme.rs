use ratatui::style::{Color, Modifier, Style};

use crate::notification::Severity;
use crate::reader::NarrationState;

#[derive(Clone, Debug)]
pub struct Base16Palette {
    pub base_00: Color, // Background
    pub base_01: Color, // Lighter background
    pub base_02: Color, // Selection background
    pub base_03: Color, // Muted text
    pub base_04: Color, // Dark foreground
    pub base_05: Color, // Default foreground
    pub base_06: Color, // Light foreground
    pub base_07: Color, // Brightest text
    pub base_08: Color, // Red
    pub base_09: Color, // Orange
    pub base_0a: Color, // Yellow
    pub base_0b: Color, // Green
    pub base_0c: Color, // Cyan
    pub base_0d: Color, // Blue
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

pub static OCEANIC_NEXT: Base16Palette = Base16Palette {
    base_00: rgb(0x1B2B34),
    base_01: rgb(0x343D46),
    base_02: rgb(0x4F5B66),
    base_03: rgb(0x65737E),
    base_04: rgb(0xA7ADBA),
    base_05: rgb(0xC0C5CE),
    base_06: rgb(0xCDD3DE),
    base_07: rgb(0xF0F4F8),
    base_08: rgb(0xEC5F67),
    base_09: rgb(0xF99157),
    base_0a: rgb(0xFAC863),
    base_0b: rgb(0x99C794),
    base_0c: rgb(0x5FB3B3),
    base_0d: rgb(0x6699CC),
};

pub fn current_theme() -> &'static Base16Palette {
    &OCEANIC_NEXT
}

impl Base16Palette {
    pub fn text_style(&self) -> Style {
        Style::default().fg(self.base_06).bg(self.base_00)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.base_03)
    }

    pub fn status_style(&self) -> Style {
        Style::default().fg(self.base_05).bg(self.base_01)
    }

    pub fn narration_style(&self, state: NarrationState) -> Style {
        let fg = match state {
            NarrationState::Idle => self.base_04,
            NarrationState::Speaking => self.base_0b,
            NarrationState::Paused => self.base_0a,
        };
        Style::default().fg(fg).bg(self.base_01)
    }

    pub fn notice_style(&self) -> Style {
        Style::default()
            .fg(self.base_00)
            .bg(self.base_0c)
            .add_modifier(Modifier::BOLD)
    }

    pub fn message_style(&self, severity: Severity) -> Style {
        let bg = match severity {
            Severity::Info => self.base_0d,
            Severity::Warning => self.base_09,
            Severity::Error => self.base_08,
        };
        Style::default()
            .fg(self.base_07)
            .bg(bg)
            .add_modifier(Modifier::BOLD)
    }
}
