// =============================================================================
// Kline Ingestion Session — one logical feed connection, reconnecting forever
// =============================================================================
//
// State machine:
//
//   Disconnected → Connecting → Subscribed ─┐
//        ↑                                  │ transport error / peer close
//        └──── fixed delay ←── Disconnected ┘
//
//   Closing is entered only on deliberate shutdown and ends the loop.
//
// The session owns the only writer handle to the CandleWindow. Reconnects
// happen inside the same task, so there is never a second writer.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::candle_window::CandleWindow;
use super::kline::{parse_kline_message, stream_name, subscribe_request};

// =============================================================================
// Transport seam
// =============================================================================

/// Opens connections to the feed.
#[async_trait]
pub trait FeedConnector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedConnection>>;
}

/// A live, bidirectional text connection to the feed.
#[async_trait]
pub trait FeedConnection: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next inbound text message. `None` once the peer has closed the stream.
    async fn next_text(&mut self) -> Option<Result<String>>;

    /// Close the connection. Errors are logged, not returned.
    async fn close(&mut self);
}

/// Production connector backed by `tokio-tungstenite`.
pub struct WebSocketConnector;

#[async_trait]
impl FeedConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedConnection>> {
        let (stream, _response) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to kline WebSocket at {url}"))?;
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedConnection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .context("failed to write to kline WebSocket")
    }

    async fn next_text(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!(frame = ?frame, "kline WebSocket close frame received");
                    return None;
                }
                // Ping / Pong / Binary -- tungstenite queues pong replies itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "error while closing kline WebSocket");
        }
    }
}

/// Upper bound on the close handshake during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long [`IngestionHandle::shutdown`] waits for the task before aborting it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Connection state machine
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Closing,
}

#[derive(Debug)]
struct ConnectionMachine {
    state: ConnectionState,
    /// Consecutive failures since the last successful subscription.
    retry_count: u32,
    /// Total connection attempts over the session's lifetime.
    attempts: u64,
    reconnect_delay: Duration,
}

impl ConnectionMachine {
    fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_count: 0,
            attempts: 0,
            reconnect_delay,
        }
    }

    /// Disconnected → Connecting. Returns `false` once closing.
    fn begin_connect(&mut self) -> bool {
        if self.state == ConnectionState::Closing {
            return false;
        }
        self.state = ConnectionState::Connecting;
        self.attempts += 1;
        true
    }

    /// Connecting → Subscribed.
    fn on_subscribed(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Subscribed;
            self.retry_count = 0;
        }
    }

    /// Connecting | Subscribed → Disconnected. Returns the wait before the
    /// next attempt; the delay is flat and retries are unbounded.
    fn on_transport_failure(&mut self) -> Duration {
        if self.state != ConnectionState::Closing {
            self.state = ConnectionState::Disconnected;
            self.retry_count = self.retry_count.saturating_add(1);
        }
        self.next_retry_delay()
    }

    fn begin_shutdown(&mut self) {
        self.state = ConnectionState::Closing;
    }

    fn next_retry_delay(&self) -> Duration {
        self.reconnect_delay
    }
}

// =============================================================================
// Session
// =============================================================================

/// Static parameters of one ingestion session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub symbol: String,
    pub interval: String,
    pub subscription_id: u64,
    pub reconnect_delay: Duration,
}

/// Why the receive loop returned.
enum PumpExit {
    Shutdown,
    Closed,
    Failed(anyhow::Error),
}

/// Keeps one kline subscription alive and feeds parsed candles into a
/// [`CandleWindow`]. Run it with [`spawn`](Self::spawn).
pub struct IngestionSession<C: FeedConnector> {
    config: SessionConfig,
    connector: C,
    window: Arc<CandleWindow>,
    machine: ConnectionMachine,
}

impl<C: FeedConnector> IngestionSession<C> {
    pub fn new(config: SessionConfig, connector: C, window: Arc<CandleWindow>) -> Self {
        let machine = ConnectionMachine::new(config.reconnect_delay);
        Self {
            config,
            connector,
            window,
            machine,
        }
    }

    /// Start the session as a background task.
    pub fn spawn(self) -> IngestionHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        IngestionHandle { shutdown_tx, task }
    }

    /// Returns the final machine state, which is always `Closing`.
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ConnectionState {
        let stream = stream_name(&self.config.symbol, &self.config.interval);

        while self.machine.begin_connect() {
            info!(
                url = %self.config.url,
                stream = %stream,
                attempt = self.machine.attempts,
                "connecting to kline feed"
            );

            let opened = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    self.machine.begin_shutdown();
                    continue;
                }
                opened = self.open_subscribed() => opened,
            };

            let failure = match opened {
                Ok(mut conn) => {
                    self.machine.on_subscribed();
                    info!(stream = %stream, "kline feed subscribed");

                    match self.pump(&mut conn, &mut shutdown).await {
                        PumpExit::Shutdown => {
                            self.machine.begin_shutdown();
                            close_with_timeout(conn.as_mut()).await;
                            continue;
                        }
                        PumpExit::Closed => None,
                        PumpExit::Failed(e) => Some(e),
                    }
                }
                Err(e) => Some(e),
            };

            let delay = self.machine.on_transport_failure();
            match failure {
                Some(e) => error!(
                    error = %format!("{e:#}"),
                    failures = self.machine.retry_count,
                    retry_in = ?delay,
                    "kline feed transport error, reconnecting"
                ),
                None => warn!(
                    stream = %stream,
                    failures = self.machine.retry_count,
                    retry_in = ?delay,
                    "kline feed closed, reconnecting"
                ),
            }

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => self.machine.begin_shutdown(),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(
            stream = %stream,
            attempts = self.machine.attempts,
            state = ?self.machine.state,
            "kline ingestion stopped"
        );
        self.machine.state
    }

    /// Connect and send the subscription request.
    async fn open_subscribed(&self) -> Result<Box<dyn FeedConnection>> {
        let mut conn = self.connector.connect(&self.config.url).await?;
        let request = subscribe_request(
            &self.config.symbol,
            &self.config.interval,
            self.config.subscription_id,
        );
        conn.send_text(request)
            .await
            .context("failed to send kline subscription request")?;
        Ok(conn)
    }

    /// Receive loop for a subscribed connection.
    async fn pump(
        &self,
        conn: &mut Box<dyn FeedConnection>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PumpExit {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => return PumpExit::Shutdown,
                next = conn.next_text() => next,
            };

            match next {
                Some(Ok(text)) => self.handle_message(&text),
                Some(Err(e)) => return PumpExit::Failed(e),
                None => return PumpExit::Closed,
            }
        }
    }

    /// Parse failures only drop the message; the connection stays up.
    fn handle_message(&self, text: &str) {
        match parse_kline_message(text) {
            Ok(Some(candle)) => {
                self.window.append(candle);
                debug!(
                    time = ?candle.time(),
                    close = candle.close,
                    window_len = self.window.len(),
                    "candle update"
                );
            }
            Ok(None) => debug!(message = %text, "ignoring non-kline message"),
            Err(e) => warn!(error = %format!("{e:#}"), "failed to parse kline message"),
        }
    }
}

/// Close `conn`, giving up after [`CLOSE_TIMEOUT`] so a stuck peer cannot
/// hold up shutdown.
async fn close_with_timeout(conn: &mut dyn FeedConnection) {
    if tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await.is_err() {
        warn!(timeout = ?CLOSE_TIMEOUT, "kline WebSocket close timed out, dropping connection");
    }
}

/// Resolves once shutdown has been requested or the handle was dropped.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Owner handle for a running session. Dropping it also stops the session.
pub struct IngestionHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<ConnectionState>,
}

impl IngestionHandle {
    /// Request shutdown and wait for the background task to exit. The task is
    /// aborted if it has not finished within [`JOIN_TIMEOUT`].
    pub async fn shutdown(mut self) {
        // Err only means the task has already exited.
        let _ = self.shutdown_tx.send(true);
        match tokio::time::timeout(JOIN_TIMEOUT, &mut self.task).await {
            Ok(Ok(state)) => debug!(state = ?state, "kline ingestion task joined"),
            Ok(Err(e)) => error!(error = %e, "kline ingestion task failed"),
            Err(_) => {
                warn!(timeout = ?JOIN_TIMEOUT, "kline ingestion task did not stop, aborting");
                self.task.abort();
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
