//! Top header: connection indicator, update rate and key hints.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::ui::theme::connection_color;
use crate::view::DashboardView;

pub fn draw_header(f: &mut ratatui::Frame<'_>, area: Rect, v: &DashboardView, hints: &str) {
    let dot = Span::styled("● ", Style::default().fg(connection_color(v.connection)));
    let line = Line::from(vec![
        Span::raw("vibwatch — "),
        dot,
        Span::raw(format!("{} | {} upd/s  ({hints})", v.connection_msg, v.rate)),
    ]);
    f.render_widget(
        Paragraph::new(line).block(Block::default().borders(Borders::BOTTOM)),
        area,
    );
}
