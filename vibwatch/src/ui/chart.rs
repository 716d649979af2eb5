//! Three-axis vibration chart over the sample window.

use ratatui::{
    layout::Rect,
    style::Style,
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
};

use crate::types::Sample;
use crate::ui::theme::{AXIS_X, AXIS_Y, AXIS_Z};

pub fn draw_chart(f: &mut ratatui::Frame<'_>, area: Rect, samples: &[Sample]) {
    let title = format!("Vibration (samples: {})", samples.len());
    let series = |pick: fn(&Sample) -> f64| -> Vec<(f64, f64)> {
        samples
            .iter()
            .enumerate()
            .map(|(i, s)| (i as f64, pick(s)))
            .collect()
    };
    let xs = series(|s| s.x);
    let ys = series(|s| s.y);
    let zs = series(|s| s.z);

    let (lo, hi) = y_bounds(samples);
    let width = samples.len().max(1) as f64;

    let datasets = vec![
        Dataset::default()
            .name("x")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(AXIS_X))
            .data(&xs),
        Dataset::default()
            .name("y")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(AXIS_Y))
            .data(&ys),
        Dataset::default()
            .name("z")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(AXIS_Z))
            .data(&zs),
    ];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(Axis::default().bounds([0.0, width]))
        .y_axis(
            Axis::default()
                .bounds([lo, hi])
                .labels(vec![
                    Span::raw(format!("{lo:.2}")),
                    Span::raw(format!("{hi:.2}")),
                ]),
        );
    f.render_widget(chart, area);
}

/// Min/max across all axes with a little headroom; a flat or empty window
/// still gets a non-zero span.
pub fn y_bounds(samples: &[Sample]) -> (f64, f64) {
    let (lo, hi) = samples
        .iter()
        .flat_map(|s| [s.x, s.y, s.z])
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = ((hi - lo) * 0.1).max(0.1);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_cover_every_axis() {
        let s = [
            Sample { x: -2.0, y: 0.0, z: 1.0 },
            Sample { x: 0.0, y: 3.0, z: 9.8 },
        ];
        let (lo, hi) = y_bounds(&s);
        assert!(lo < -2.0 && hi > 9.8);
    }

    #[test]
    fn empty_and_flat_windows() {
        assert_eq!(y_bounds(&[]), (-1.0, 1.0));
        let (lo, hi) = y_bounds(&[Sample { x: 1.0, y: 1.0, z: 1.0 }]);
        assert!(hi - lo > 0.0);
    }
}
