//! Telemetry transport: a WebSocket push link with constant-delay reconnect,
//! or HTTP interval polling when the push link cannot even be constructed.
//!
//! While push is active a slow safety poll keeps refreshing samples so a
//! dropped push message never leaves the chart stale. Both producers feed the
//! same channel with no deduplication; consumers treat samples as last write
//! wins. Status only ever comes from one producer at a time.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::sink::ConnectionState;
use crate::types::{Inbound, MessageKind, Ping, Sample, SamplesResponse, StatusPayload};

pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const KEEPALIVE_EVERY: Duration = Duration::from_secs(15);
pub const POLL_EVERY: Duration = Duration::from_millis(200);
pub const SAFETY_POLL_EVERY: Duration = Duration::from_millis(500);
pub const SAMPLE_LIMIT: usize = 200;

const HTTP_TIMEOUT: Duration = Duration::from_secs(2);
const FEED_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid push endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else if err.is_decode() {
            TransportError::Parse(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Everything the transport hands upward, in arrival order per producer.
#[derive(Debug, Clone)]
pub enum Feed {
    Push(Inbound),
    PolledState(StatusPayload),
    /// Samples from fallback polling; counts as telemetry.
    PolledSamples(Vec<Sample>),
    /// Samples from the safety poll beside push, or the startup snapshot.
    /// Chart refresh only.
    SafetySamples(Vec<Sample>),
    Link(ConnectionState, String),
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub push_url: Option<String>,
    pub http_base: Option<Url>,
    /// Skip the push link entirely.
    pub force_polling: bool,
    pub reconnect_delay: Duration,
    pub keepalive_every: Duration,
    pub poll_every: Duration,
    pub safety_poll_every: Duration,
    pub sample_limit: usize,
}

impl TransportConfig {
    /// Push to `url`; the polling base is derived from it when possible.
    pub fn new(url: &str) -> Self {
        let http_base = Url::parse(url).ok().and_then(|u| derive_http_base(&u));
        Self {
            push_url: Some(url.to_string()),
            http_base,
            ..Self::polling_only(None)
        }
    }

    pub fn polling_only(http_base: Option<Url>) -> Self {
        Self {
            push_url: None,
            http_base,
            force_polling: false,
            reconnect_delay: RECONNECT_DELAY,
            keepalive_every: KEEPALIVE_EVERY,
            poll_every: POLL_EVERY,
            safety_poll_every: SAFETY_POLL_EVERY,
            sample_limit: SAMPLE_LIMIT,
        }
    }
}

/// `ws://h:p/ws` -> `http://h:p/`, `wss://` -> `https://`.
pub fn derive_http_base(push: &Url) -> Option<Url> {
    let scheme = match push.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        _ => return None,
    };
    let host = push.host_str()?;
    let mut s = format!("{scheme}://{host}");
    if let Some(port) = push.port() {
        s.push_str(&format!(":{port}"));
    }
    Url::parse(&s).ok()
}

/// Validate a push URL. Failure here is the "cannot construct" case that
/// sends the transport into polling.
pub fn push_endpoint(url: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidEndpoint {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".into()));
    }
    Ok(parsed)
}

/// Push link bookkeeping. At most one reconnect is ever pending; a successful
/// open cancels it.
#[derive(Debug, Clone)]
pub struct Link {
    state: ConnectionState,
    pending: Option<Instant>,
    delay: Duration,
}

impl Link {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: ConnectionState::Connecting,
            pending: None,
            delay,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn opened(&mut self) {
        self.state = ConnectionState::Connected;
        self.pending = None;
    }

    /// Close or error. Schedules a reconnect unless one is already pending;
    /// returns whether a new one was scheduled.
    pub fn lost(&mut self, now: Instant) -> bool {
        self.state = ConnectionState::Disconnected;
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(now + self.delay);
        true
    }

    pub fn reconnect_at(&self) -> Option<Instant> {
        self.pending
    }

    pub fn pending_reconnects(&self) -> usize {
        usize::from(self.pending.is_some())
    }

    /// Consume the pending reconnect if its time has come.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(at) if at <= now => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

/// HTTP reads against the polling surface.
#[derive(Debug, Clone)]
pub struct HttpPoller {
    client: reqwest::Client,
    base: Url,
    limit: usize,
}

impl HttpPoller {
    pub fn new(base: Url, limit: usize) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base,
            limit,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Http(e.to_string()))
    }

    /// `GET /realtime/state` (flat payload).
    pub async fn state(&self) -> Result<StatusPayload, TransportError> {
        let url = self.endpoint("/realtime/state")?;
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(TransportError::Http(format!("API returned status {}", resp.status())));
        }
        resp.json::<StatusPayload>()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))
    }

    /// `GET /realtime/samples?limit=N`.
    pub async fn samples(&self) -> Result<Vec<Sample>, TransportError> {
        let mut url = self.endpoint("/realtime/samples")?;
        url.query_pairs_mut()
            .append_pair("limit", &self.limit.to_string());
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(TransportError::Http(format!("API returned status {}", resp.status())));
        }
        let body: SamplesResponse = resp
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;
        Ok(body.samples)
    }
}

/// Owns every background task of one logical telemetry connection.
pub struct TransportChannel {
    config: TransportConfig,
    tx: mpsc::Sender<Feed>,
    fetch_now: Arc<Notify>,
    push_tasks: Vec<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
    init_task: Option<JoinHandle<()>>,
    started: bool,
}

impl TransportChannel {
    pub fn new(config: TransportConfig) -> (Self, mpsc::Receiver<Feed>) {
        let (tx, rx) = mpsc::channel(FEED_DEPTH);
        let chan = Self {
            config,
            tx,
            fetch_now: Arc::new(Notify::new()),
            push_tasks: Vec::new(),
            poll_task: None,
            init_task: None,
            started: false,
        };
        (chan, rx)
    }

    /// Spawn the transport tasks. Must run inside a tokio runtime; calling it
    /// again is a no-op.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let poller = self.poller();
        if let Some(p) = poller.clone() {
            let tx = self.tx.clone();
            self.init_task = Some(tokio::spawn(async move {
                fetch_once(&p, &tx).await;
            }));
        }

        if self.config.force_polling {
            self.activate_polling();
            return;
        }

        let endpoint = match self.config.push_url.as_deref() {
            Some(u) => push_endpoint(u),
            None => Err(TransportError::InvalidEndpoint {
                url: String::new(),
                reason: "no push url configured".into(),
            }),
        };
        match endpoint {
            Ok(url) => {
                info!(%url, "starting push transport");
                let cfg = self.config.clone();
                let tx = self.tx.clone();
                let fetch_now = Arc::clone(&self.fetch_now);
                self.push_tasks
                    .push(tokio::spawn(run_push(url, cfg, tx, fetch_now)));
                if let Some(p) = poller {
                    let tx = self.tx.clone();
                    let every = self.config.safety_poll_every;
                    let fetch_now = Arc::clone(&self.fetch_now);
                    self.push_tasks
                        .push(tokio::spawn(run_safety_poll(p, every, tx, fetch_now)));
                }
            }
            Err(e) => {
                warn!(error = %e, "push transport unavailable, falling back to polling");
                self.activate_polling();
            }
        }
    }

    /// Switch to interval polling. Idempotent: returns true only for the call
    /// that actually started it. Any push tasks are stopped first so the two
    /// modes never drive the display together.
    pub fn activate_polling(&mut self) -> bool {
        if self.poll_task.is_some() {
            return false;
        }
        let Some(poller) = self.poller() else {
            warn!("polling requested but no HTTP base is configured");
            return false;
        };
        for t in self.push_tasks.drain(..) {
            t.abort();
        }
        info!(base = %poller.base(), "starting polling transport");
        let tx = self.tx.clone();
        let every = self.config.poll_every;
        self.poll_task = Some(tokio::spawn(run_polling(poller, every, tx)));
        true
    }

    pub fn is_polling(&self) -> bool {
        self.poll_task.is_some()
    }

    pub fn is_pushing(&self) -> bool {
        !self.push_tasks.is_empty()
    }

    /// Cancel every timer and task. Safe to call repeatedly.
    pub fn stop(&mut self) {
        for t in self.push_tasks.drain(..) {
            t.abort();
        }
        if let Some(t) = self.poll_task.take() {
            t.abort();
        }
        if let Some(t) = self.init_task.take() {
            t.abort();
        }
    }

    fn poller(&self) -> Option<HttpPoller> {
        let base = self.config.http_base.clone()?;
        match HttpPoller::new(base, self.config.sample_limit) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "could not build HTTP client");
                None
            }
        }
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn emit_link(tx: &mpsc::Sender<Feed>, state: ConnectionState, msg: &str) -> bool {
    tx.send(Feed::Link(state, msg.to_string())).await.is_ok()
}

async fn fetch_once(p: &HttpPoller, tx: &mpsc::Sender<Feed>) {
    match p.samples().await {
        Ok(s) if !s.is_empty() => {
            let _ = tx.send(Feed::SafetySamples(s)).await;
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "initial samples read failed"),
    }
    match p.state().await {
        Ok(st) => {
            let _ = tx.send(Feed::PolledState(st)).await;
        }
        Err(e) => debug!(error = %e, "initial state read failed"),
    }
}

enum SessionEnd {
    Closed,
    Failed(String),
    ReceiverGone,
}

async fn run_push(url: Url, cfg: TransportConfig, tx: mpsc::Sender<Feed>, fetch_now: Arc<Notify>) {
    let mut link = Link::new(cfg.reconnect_delay);
    loop {
        link.connecting();
        if !emit_link(&tx, link.state(), "Connecting...").await {
            return;
        }

        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                link.opened();
                info!(%url, "push link open");
                if !emit_link(&tx, link.state(), "Server connected").await {
                    return;
                }
                let (sink, stream) = ws.split();
                match run_session(sink, stream, &cfg, &tx, &fetch_now).await {
                    SessionEnd::ReceiverGone => return,
                    SessionEnd::Closed => info!("push link closed"),
                    SessionEnd::Failed(e) => {
                        warn!(error = %e, "push link error");
                        if !emit_link(&tx, ConnectionState::Disconnected, "Connection error").await {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "push connect failed");
                if !emit_link(&tx, ConnectionState::Disconnected, "Connection error").await {
                    return;
                }
            }
        }

        link.lost(Instant::now());
        if !emit_link(&tx, link.state(), "Reconnecting...").await {
            return;
        }
        while let Some(at) = link.reconnect_at() {
            sleep_until(at).await;
            if link.take_due(Instant::now()) {
                break;
            }
        }
    }
}

/// One open push session. Keepalive pings go through a one-slot queue to a
/// writer task; a ping that finds the slot taken is dropped, so a backed-up
/// socket never stalls reading.
async fn run_session<W, R>(
    sink: W,
    mut stream: R,
    cfg: &TransportConfig,
    tx: &mpsc::Sender<Feed>,
    fetch_now: &Notify,
) -> SessionEnd
where
    W: Sink<Message> + Send + 'static,
    W::Error: std::fmt::Display,
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let (out_tx, out_rx) = mpsc::channel::<Message>(1);
    let writer = tokio::spawn(write_loop(sink, out_rx));
    let mut keepalive = interval_at(Instant::now() + cfg.keepalive_every, cfg.keepalive_every);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let end = loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match Inbound::parse(&text) {
                    Ok(m) => {
                        if m.kind() == MessageKind::Prediction {
                            fetch_now.notify_one();
                        }
                        if tx.send(Feed::Push(m)).await.is_err() {
                            break SessionEnd::ReceiverGone;
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping malformed push message"),
                },
                Some(Ok(Message::Close(_))) | None => break SessionEnd::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => break SessionEnd::Failed(e.to_string()),
            },
            _ = keepalive.tick() => {
                if out_tx.try_send(Message::Text(Ping::json())).is_err() {
                    debug!("previous keepalive still queued, skipping ping");
                }
            }
        }
    };
    writer.abort();
    end
}

async fn write_loop<W>(sink: W, mut rx: mpsc::Receiver<Message>)
where
    W: Sink<Message>,
    W::Error: std::fmt::Display,
{
    let mut sink = Box::pin(sink);
    while let Some(msg) = rx.recv().await {
        if let Err(e) = sink.send(msg).await {
            debug!(error = %e, "keepalive ping not sent");
            return;
        }
    }
}

async fn run_safety_poll(p: HttpPoller, every: Duration, tx: mpsc::Sender<Feed>, fetch_now: Arc<Notify>) {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = fetch_now.notified() => {}
        }
        match p.samples().await {
            Ok(s) if !s.is_empty() => {
                if tx.send(Feed::SafetySamples(s)).await.is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "safety samples poll failed"),
        }
    }
}

async fn run_polling(p: HttpPoller, every: Duration, tx: mpsc::Sender<Feed>) {
    let msg = format!("Polling {}", p.base());
    if !emit_link(&tx, ConnectionState::Connected, &msg).await {
        return;
    }
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tick.tick().await;
        match p.state().await {
            Ok(st) => {
                if tx.send(Feed::PolledState(st)).await.is_err() {
                    return;
                }
            }
            Err(e) => debug!(error = %e, "state poll failed"),
        }
        match p.samples().await {
            Ok(s) if !s.is_empty() => {
                if tx.send(Feed::PolledSamples(s)).await.is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "samples poll failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_base_from_push_url() {
        let u = Url::parse("ws://10.0.0.5:8000/ws").unwrap();
        assert_eq!(derive_http_base(&u).unwrap().as_str(), "http://10.0.0.5:8000/");
        let u = Url::parse("wss://sensors.example.com/ws").unwrap();
        assert_eq!(derive_http_base(&u).unwrap().as_str(), "https://sensors.example.com/");
        let u = Url::parse("ftp://x/").unwrap();
        assert!(derive_http_base(&u).is_none());
    }

    #[test]
    fn push_endpoint_rejects_unbuildable_urls() {
        assert!(push_endpoint("ws://127.0.0.1:8000/ws").is_ok());
        assert!(matches!(
            push_endpoint("not a url"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            push_endpoint("http://127.0.0.1:8000/ws"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn reconnect_is_single_pending() {
        let t0 = Instant::now();
        let mut link = Link::new(RECONNECT_DELAY);
        // error then close for the same failure
        assert!(link.lost(t0));
        assert!(!link.lost(t0 + Duration::from_millis(1)));
        assert_eq!(link.pending_reconnects(), 1);
        assert_eq!(link.reconnect_at(), Some(t0 + RECONNECT_DELAY));

        // rapid open -> close -> open -> close
        for i in 0..10u64 {
            link.opened();
            assert_eq!(link.pending_reconnects(), 0);
            assert_eq!(link.state(), ConnectionState::Connected);
            let t = t0 + Duration::from_millis(10 * i);
            link.lost(t);
            link.lost(t);
            assert_eq!(link.pending_reconnects(), 1);
            assert_eq!(link.state(), ConnectionState::Disconnected);
        }
    }

    #[test]
    fn reconnect_fires_after_fixed_delay() {
        let t0 = Instant::now();
        let mut link = Link::new(RECONNECT_DELAY);
        link.lost(t0);
        assert!(!link.take_due(t0 + Duration::from_millis(1999)));
        assert!(link.take_due(t0 + RECONNECT_DELAY));
        assert_eq!(link.pending_reconnects(), 0);
        assert!(!link.take_due(t0 + Duration::from_secs(10)));
        // same constant delay every time
        link.lost(t0 + Duration::from_secs(10));
        assert_eq!(
            link.reconnect_at(),
            Some(t0 + Duration::from_secs(10) + RECONNECT_DELAY)
        );
    }

    #[tokio::test]
    async fn stuck_writer_does_not_block_reading() {
        // a sink whose first send never completes
        let sink = futures_util::sink::unfold((), |_, _m: Message| {
            futures_util::future::pending::<Result<(), WsError>>()
        });
        let frames: Vec<Result<Message, WsError>> = (0..5)
            .map(|_| Ok(Message::Text(r#"{"type":"state","status":{"status_color":"red"}}"#.to_string())))
            .collect();
        let stream = futures_util::stream::iter(frames).chain(futures_util::stream::pending());

        let mut cfg = TransportConfig::polling_only(None);
        cfg.keepalive_every = Duration::from_millis(1);
        let (tx, mut rx) = mpsc::channel(16);
        let session = tokio::spawn(async move {
            let notify = Notify::new();
            run_session(sink, stream, &cfg, &tx, &notify).await;
        });

        for _ in 0..5 {
            let item = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("inbound keeps flowing while pings are stuck");
            assert!(matches!(item, Some(Feed::Push(_))));
        }
        session.abort();
    }

    #[tokio::test]
    async fn unbuildable_push_url_falls_back_to_polling_once() {
        let mut cfg = TransportConfig::new("definitely not a url");
        cfg.http_base = Some(Url::parse("http://127.0.0.1:9").unwrap());
        let (mut chan, _rx) = TransportChannel::new(cfg);
        chan.start();
        assert!(chan.is_polling());
        assert!(!chan.is_pushing());
        assert!(!chan.activate_polling());
        chan.stop();
        assert!(!chan.is_polling());
    }

    #[tokio::test]
    async fn forced_polling_never_pushes() {
        let mut cfg = TransportConfig::new("ws://127.0.0.1:9/ws");
        cfg.force_polling = true;
        let (mut chan, _rx) = TransportChannel::new(cfg);
        chan.start();
        assert!(chan.is_polling());
        assert!(!chan.is_pushing());
    }

    #[tokio::test]
    async fn valid_push_url_starts_push_and_safety_poll() {
        let cfg = TransportConfig::new("ws://127.0.0.1:9/ws");
        let (mut chan, mut rx) = TransportChannel::new(cfg);
        chan.start();
        assert!(chan.is_pushing());
        assert!(!chan.is_polling());
        match rx.recv().await {
            Some(Feed::Link(ConnectionState::Connecting, _)) => {}
            other => panic!("expected Connecting, got {other:?}"),
        }
    }
}
