//! History view: counters, session time, urgent banner and recent events.

use chrono::{Local, TimeZone};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use crate::history::{format_elapsed, EventHistory, EventKind, KeyValueStore};

/// Events listed, newest first.
pub const RECENT_SHOWN: usize = 50;

pub fn draw_history<S: KeyValueStore>(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    h: &EventHistory<S>,
    now_ms: i64,
    confirm_clear: bool,
) {
    let urgent = h.urgent();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(if urgent { 1 } else { 0 }),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    let c = h.counts();
    let totals = Line::from(vec![
        Span::styled(format!("Normal: {}", c.normal), Style::default().fg(Color::Green)),
        Span::raw("   "),
        Span::styled(format!("Alerts: {}", c.alerts), Style::default().fg(Color::Yellow)),
        Span::raw("   "),
        Span::styled(format!("Anomalies: {}", c.anomalies), Style::default().fg(Color::Red)),
        Span::raw(format!("   Session: {}", format_elapsed(h.elapsed(now_ms)))),
    ]);
    f.render_widget(
        Paragraph::new(totals).block(Block::default().borders(Borders::ALL).title("Totals")),
        rows[0],
    );

    if urgent {
        let text = format!(
            " {} anomalies detected - INSPECT THE MACHINE IMMEDIATELY! ",
            c.anomalies
        );
        f.render_widget(
            Paragraph::new(Span::styled(
                text,
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Red)
                    .add_modifier(Modifier::BOLD),
            )),
            rows[1],
        );
    }

    let items: Vec<ListItem> = if h.events().is_empty() {
        vec![ListItem::new("No events recorded yet")]
    } else {
        h.recent(RECENT_SHOWN)
            .into_iter()
            .map(|ev| {
                let color = match ev.kind {
                    EventKind::Anomaly => Color::Red,
                    EventKind::Alert => Color::Yellow,
                };
                let when = Local
                    .timestamp_millis_opt(ev.timestamp)
                    .single()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "—".into());
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<8}", ev.kind.label()),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!(
                        " confidence {:>5.1}% | distance {:.2}  {when}",
                        ev.confidence * 100.0,
                        ev.distance
                    )),
                ]))
            })
            .collect()
    };
    f.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title("Recent events")),
        rows[2],
    );

    let footer = if confirm_clear {
        Span::styled(
            "Clear all history? [y/N]",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )
    } else {
        Span::raw("c: clear history   h: dashboard   q: quit")
    };
    f.render_widget(Paragraph::new(footer), rows[3]);
}
