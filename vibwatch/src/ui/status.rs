//! Status card, confidence gauge, diagnostics and alert banner.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};

use crate::types::Severity;
use crate::ui::theme::{severity_color, NO_DATA};
use crate::view::DashboardView;

pub fn draw_status(f: &mut ratatui::Frame<'_>, area: Rect, v: &DashboardView) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);

    let (label, color) = match (v.no_data, v.severity) {
        (true, _) => ("No Data", NO_DATA),
        (false, Some(s)) => (s.label(), severity_color(s)),
        (false, None) => ("Connecting", Color::Gray),
    };
    let card = Paragraph::new(vec![
        Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::raw(v.situation())),
    ])
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(card, cols[0]);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Confidence"))
        .gauge_style(Style::default().fg(color))
        .percent(v.diagnostics.confidence_gauge())
        .label(v.diagnostics.confidence_pct());
    f.render_widget(gauge, cols[1]);

    let d = &v.diagnostics;
    let info = Paragraph::new(vec![
        Line::from(format!("Distance:  {}", d.distance_fmt())),
        Line::from(format!("Threshold: {}", d.threshold_fmt())),
        Line::from(format!("Updated:   {}", d.updated_at())),
    ])
    .block(Block::default().borders(Borders::ALL).title("Diagnostics"));
    f.render_widget(info, cols[2]);
}

pub fn draw_alert_banner(f: &mut ratatui::Frame<'_>, area: Rect, v: &DashboardView) {
    let Some((sev, text)) = v.alert_banner() else {
        return;
    };
    let bg = match sev {
        Severity::Critical => Color::Red,
        _ => Color::Yellow,
    };
    let banner = Paragraph::new(Line::from(Span::styled(
        format!(" {text} "),
        Style::default()
            .fg(Color::Black)
            .bg(bg)
            .add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, area);
}
