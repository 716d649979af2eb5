//! Shared UI theme constants.

use ratatui::style::Color;

use crate::sink::ConnectionState;
use crate::types::Severity;

// Chart series, one per axis
pub const AXIS_X: Color = Color::Rgb(59, 130, 246);
pub const AXIS_Y: Color = Color::Rgb(139, 92, 246);
pub const AXIS_Z: Color = Color::Rgb(34, 197, 94);

pub const NO_DATA: Color = Color::DarkGray;

pub fn severity_color(s: Severity) -> Color {
    match s {
        Severity::Normal => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Critical => Color::Red,
    }
}

pub fn connection_color(c: ConnectionState) -> Color {
    match c {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Gray,
        ConnectionState::Disconnected => Color::Red,
    }
}
