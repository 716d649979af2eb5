//! App state and main loop: input handling, draining telemetry, liveness
//! checks and drawing.

use std::{
    io,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::Paragraph,
    Terminal,
};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::history::{EventHistory, KeyValueStore};
use crate::liveness::CHECK_EVERY;
use crate::monitor::Monitor;
use crate::transport::{Feed, TransportChannel, TransportConfig};
use crate::ui::{
    chart::draw_chart,
    header::draw_header,
    history::draw_history,
    status::{draw_alert_banner, draw_status},
};
use crate::view::DashboardView;

const FRAME: Duration = Duration::from_millis(50);

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    History,
}

pub struct App<S: KeyValueStore> {
    monitor: Monitor<S, DashboardView>,
    view: View,
    confirm_clear: bool,
    should_quit: bool,
    last_check: Instant,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(history: EventHistory<S>) -> Self {
        Self {
            monitor: Monitor::new(history, DashboardView::new()),
            view: View::Dashboard,
            confirm_clear: false,
            should_quit: false,
            last_check: Instant::now(),
        }
    }

    pub fn monitor(&self) -> &Monitor<S, DashboardView> {
        &self.monitor
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub async fn run(&mut self, config: TransportConfig) -> anyhow::Result<()> {
        let (mut transport, mut feed) = TransportChannel::new(config);
        transport.start();

        // Terminal setup
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        // Main loop
        let res = self.event_loop(&mut terminal, &mut feed).await;

        // Teardown: timers and tasks first, then the terminal
        transport.stop();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        feed: &mut mpsc::Receiver<Feed>,
    ) -> anyhow::Result<()> {
        loop {
            // Input (non-blocking)
            while event::poll(Duration::from_millis(10))? {
                if let Event::Key(k) = event::read()? {
                    if k.kind == KeyEventKind::Press {
                        self.on_key(k.code, now_ms());
                    }
                }
            }
            if self.should_quit {
                break;
            }

            self.drain(feed);

            if self.last_check.elapsed() >= CHECK_EVERY {
                self.monitor.tick(now_ms());
                self.last_check = Instant::now();
            }
            self.monitor.sink_mut().tick_rate(Instant::now());

            terminal.draw(|f| self.draw(f))?;
            sleep(FRAME).await;
        }
        Ok(())
    }

    /// Apply everything the transport has queued, in arrival order.
    pub fn drain(&mut self, feed: &mut mpsc::Receiver<Feed>) {
        loop {
            match feed.try_recv() {
                Ok(item) => self.monitor.handle(item, now_ms()),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("transport feed closed");
                    break;
                }
            }
        }
    }

    pub fn on_key(&mut self, code: KeyCode, now_ms: i64) {
        if self.confirm_clear {
            self.confirm_clear = false;
            let yes = matches!(code, KeyCode::Char('y') | KeyCode::Char('Y'));
            match self.monitor.clear_history(now_ms, || yes) {
                Ok(true) => info!("history cleared"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "could not clear history"),
            }
            return;
        }
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('h') | KeyCode::Tab => {
                self.view = match self.view {
                    View::Dashboard => {
                        // pick up writes made by other clients of the store
                        if let Err(e) = self.monitor.history_mut().reload() {
                            warn!(error = %e, "could not reload history");
                        }
                        View::History
                    }
                    View::History => View::Dashboard,
                };
            }
            KeyCode::Char('c') if self.view == View::History => self.confirm_clear = true,
            _ => {}
        }
    }

    pub fn draw(&self, f: &mut ratatui::Frame<'_>) {
        let area = f.area();
        let urgent = self.monitor.history().urgent();
        let banner = self.monitor.sink().alert_banner().is_some();

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),                           // header
                Constraint::Length(if urgent { 1 } else { 0 }), // urgent escalation
                Constraint::Length(if banner { 1 } else { 0 }), // alert banner
                Constraint::Min(5),                             // body
            ])
            .split(area);

        let hints = match self.view {
            View::Dashboard => "h: history, q: quit",
            View::History => "h: dashboard, q: quit",
        };
        draw_header(f, rows[0], self.monitor.sink(), hints);

        if urgent {
            let c = self.monitor.history().counts();
            f.render_widget(
                Paragraph::new(Span::styled(
                    format!(" {} anomalies detected - INSPECT THE MACHINE IMMEDIATELY! ", c.anomalies),
                    Style::default()
                        .fg(Color::White)
                        .bg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                )),
                rows[1],
            );
        }
        draw_alert_banner(f, rows[2], self.monitor.sink());

        match self.view {
            View::Dashboard => {
                let body = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(5), Constraint::Min(5)])
                    .split(rows[3]);
                draw_status(f, body[0], self.monitor.sink());
                draw_chart(f, body[1], &self.monitor.sink().chart);
            }
            View::History => draw_history(
                f,
                rows[3],
                self.monitor.history(),
                now_ms(),
                self.confirm_clear,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStore;
    use crate::types::Inbound;
    use ratatui::backend::TestBackend;

    fn app() -> App<MemoryStore> {
        App::new(EventHistory::open(MemoryStore::default(), 0).unwrap())
    }

    fn red() -> Feed {
        Feed::Push(
            Inbound::parse(r#"{"type":"prediction","status":{"status_color":"red","confidence":0.9}}"#)
                .unwrap(),
        )
    }

    #[test]
    fn clear_needs_yes() {
        let mut a = app();
        let (tx, mut rx) = mpsc::channel(4);
        tx.try_send(red()).unwrap();
        a.drain(&mut rx);
        assert_eq!(a.monitor().history().counts().anomalies, 1);

        // 'c' does nothing on the dashboard
        a.on_key(KeyCode::Char('c'), 1);
        a.on_key(KeyCode::Char('y'), 2);
        assert_eq!(a.monitor().history().counts().anomalies, 1);

        a.on_key(KeyCode::Char('h'), 3);
        assert_eq!(a.view(), View::History);
        a.on_key(KeyCode::Char('c'), 4);
        a.on_key(KeyCode::Char('n'), 5);
        assert_eq!(a.monitor().history().counts().anomalies, 1);

        a.on_key(KeyCode::Char('c'), 6);
        a.on_key(KeyCode::Char('y'), 7);
        assert_eq!(a.monitor().history().counts().anomalies, 0);
        assert_eq!(a.monitor().history().session_start(), 7);
    }

    #[test]
    fn quit_keys() {
        let mut a = app();
        a.on_key(KeyCode::Esc, 0);
        assert!(a.should_quit());
    }

    #[test]
    fn renders_both_views() {
        let mut a = app();
        let (tx, mut rx) = mpsc::channel(4);
        tx.try_send(red()).unwrap();
        a.drain(&mut rx);

        let mut term = Terminal::new(TestBackend::new(100, 30)).unwrap();
        term.draw(|f| a.draw(f)).unwrap();
        let text: String = term.backend().buffer().content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("ANOMALY"));
        assert!(text.contains("Anomaly detected!"));

        a.on_key(KeyCode::Char('h'), 0);
        term.draw(|f| a.draw(f)).unwrap();
        let text: String = term.backend().buffer().content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Anomalies: 1"));
    }
}
