//! HTTP transport
//!
//! Talks to a lumber receiver over HTTP. Each `begin` spawns the request on
//! the current tokio runtime and hands the result to the completion callback.
//!
//! `Close` is graceful: new operations are refused at once, and the close
//! completes after every operation already in flight has finished.
//! `HttpTransport::abort` closes the channel and cancels in-flight work.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use lumber_core::schema::{SCHEMA_HEADER, SCHEMA_VERSION};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;

use super::{OnComplete, Outcome, Request, Transport, TransportError};
use crate::config::ClientConfig;

/// Path of the receiver's batch endpoint
pub const BATCHES_PATH: &str = "/api/v1/batches";

/// Path probed when opening the channel
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Created,
    Opening,
    Opened,
    Closed,
}

#[derive(Debug)]
struct Channel {
    state: Mutex<ChannelState>,
    shutdown: CancellationToken,
    in_flight: TaskTracker,
}

impl Channel {
    fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState::Created),
            shutdown: CancellationToken::new(),
            in_flight: TaskTracker::new(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_open(&self) -> Result<TaskTrackerToken, TransportError> {
        let mut state = self.state();
        match *state {
            ChannelState::Closed => return Err(TransportError::Closed),
            ChannelState::Opened => {}
            _ => *state = ChannelState::Opening,
        }
        Ok(self.in_flight.token())
    }

    fn finish_open(&self, succeeded: bool) {
        let mut state = self.state();
        if *state == ChannelState::Opening {
            *state = if succeeded {
                ChannelState::Opened
            } else {
                ChannelState::Created
            };
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        match *self.state() {
            ChannelState::Opened => Ok(()),
            ChannelState::Closed => Err(TransportError::Closed),
            _ => Err(TransportError::NotOpen),
        }
    }

    /// Admits a send; the token keeps a pending close waiting until dropped
    fn begin_send(&self) -> Result<TaskTrackerToken, TransportError> {
        let state = self.state();
        match *state {
            ChannelState::Opened => Ok(self.in_flight.token()),
            ChannelState::Closed => Err(TransportError::Closed),
            _ => Err(TransportError::NotOpen),
        }
    }

    fn begin_close(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        if *state == ChannelState::Closed {
            return Err(TransportError::Closed);
        }
        *state = ChannelState::Closed;
        self.in_flight.close();
        Ok(())
    }

    fn abort(&self) {
        *self.state() = ChannelState::Closed;
        self.in_flight.close();
        // In-flight operations observe this and finish as cancelled
        self.shutdown.cancel();
    }
}

/// Pending handle of an HTTP operation
#[derive(Debug)]
pub struct HttpPending {
    outcome: Outcome,
}

/// Transport posting encoded batches to a lumber receiver
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Base URL of the receiver (e.g., "http://localhost:4080")
    base_url: String,
    /// HTTP client instance
    client: Client,
    channel: Arc<Channel>,
}

impl HttpTransport {
    /// Create a transport for the receiver at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a transport with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            channel: Arc::new(Channel::new()),
        }
    }

    /// Create a transport for the receiver named in `config`
    ///
    /// Applies the configured request timeout, and keeps cookies set by the
    /// receiver across requests when `cookie_store` is enabled.
    pub fn from_config(config: &ClientConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(config.cookie_store)
            .build()?;
        Ok(Self::with_client(config.collector_url.clone(), client))
    }

    /// Get the base URL of the receiver
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_open(&self) -> bool {
        self.channel.ensure_open().is_ok()
    }

    /// Close the channel and cancel every operation still in flight
    ///
    /// Cancelled operations complete with `Outcome::Cancelled`; a pending
    /// graceful close completes once they have. Calling it again is a no-op.
    pub fn abort(&self) {
        self.channel.abort();
        tracing::debug!("Aborted transport channel to {}", self.base_url);
    }

    /// Runs `operation`, then the callback; `in_flight` is held until both are done
    fn spawn<F>(
        runtime: &Handle,
        in_flight: Option<TaskTrackerToken>,
        on_complete: OnComplete<HttpPending>,
        operation: F,
    ) where
        F: Future<Output = Outcome> + Send + 'static,
    {
        runtime.spawn(async move {
            let outcome = operation.await;
            on_complete(HttpPending { outcome });
            drop(in_flight);
        });
    }
}

impl Transport for HttpTransport {
    type Pending = HttpPending;

    fn begin(
        &self,
        request: Request,
        on_complete: OnComplete<HttpPending>,
    ) -> Result<(), TransportError> {
        let runtime = Handle::try_current()
            .map_err(|e| TransportError::Unavailable(format!("no async runtime: {}", e)))?;

        match request {
            Request::Open => {
                let in_flight = self.channel.begin_open()?;
                let url = format!("{}{}", self.base_url, HEALTH_PATH);
                let client = self.client.clone();
                let channel = Arc::clone(&self.channel);

                Self::spawn(&runtime, Some(in_flight), on_complete, async move {
                    let result = tokio::select! {
                        _ = channel.shutdown.cancelled() => return Outcome::Cancelled,
                        result = execute(client.get(&url).send()) => result,
                    };
                    channel.finish_open(result.is_ok());
                    match result {
                        Ok(()) => Outcome::Completed,
                        Err(e) => Outcome::Failed(e),
                    }
                });
            }
            Request::Close => {
                self.channel.begin_close()?;
                let in_flight = self.channel.in_flight.clone();
                let base_url = self.base_url.clone();

                Self::spawn(&runtime, None, on_complete, async move {
                    in_flight.wait().await;
                    tracing::debug!("Closed transport channel to {}", base_url);
                    Outcome::Completed
                });
            }
            Request::SendBatch(payload) => {
                let in_flight = self.channel.begin_send()?;
                let url = format!("{}{}", self.base_url, BATCHES_PATH);
                let send = self
                    .client
                    .post(&url)
                    .header(CONTENT_TYPE, "application/json")
                    .header(SCHEMA_HEADER, SCHEMA_VERSION.to_string())
                    .body(payload)
                    .send();
                let shutdown = self.channel.shutdown.clone();

                Self::spawn(&runtime, Some(in_flight), on_complete, async move {
                    tokio::select! {
                        _ = shutdown.cancelled() => Outcome::Cancelled,
                        result = execute(send) => match result {
                            Ok(()) => Outcome::Completed,
                            Err(e) => Outcome::Failed(e),
                        },
                    }
                });
            }
        }

        Ok(())
    }

    fn end(&self, pending: HttpPending) -> Outcome {
        pending.outcome
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Awaits a request and checks its response status
async fn execute<F>(send: F) -> Result<(), TransportError>
where
    F: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let response = send.await?;
    check_status(response).await
}

/// Turns a non-success response into a `TransportError::Status`
async fn check_status(response: reqwest::Response) -> Result<(), TransportError> {
    let status = response.status();

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        return Err(TransportError::status(status.as_u16(), message));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Response given to every request other than the health probe
    #[derive(Clone, Copy)]
    struct Reply {
        status_line: &'static str,
        body: &'static str,
        delay: Duration,
    }

    impl Reply {
        fn fixed(status_line: &'static str, body: &'static str) -> Self {
            Self {
                status_line,
                body,
                delay: Duration::ZERO,
            }
        }

        fn after(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::fixed("200 OK", r#"{"accepted":0}"#)
            }
        }
    }

    struct TestServer {
        url: String,
        heads: Arc<Mutex<Vec<String>>>,
    }

    impl TestServer {
        /// Lowercased request heads seen so far, in arrival order
        fn heads(&self) -> Vec<String> {
            self.heads.lock().unwrap().clone()
        }

        async fn wait_for_post(&self) -> String {
            for _ in 0..200 {
                if let Some(head) = self.heads().into_iter().find(|h| h.starts_with("post ")) {
                    return head;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("no POST reached the server");
        }
    }

    /// Minimal HTTP server: `GET /health` answers 200 and sets a session
    /// cookie, everything else gets `reply`.
    async fn serve(reply: Reply) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let heads = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&heads);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let head = loop {
                        let n = socket.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                            let length = head
                                .lines()
                                .find_map(|line| line.strip_prefix("content-length:"))
                                .and_then(|v| v.trim().parse::<usize>().ok())
                                .unwrap_or(0);
                            if buf.len() >= end + 4 + length {
                                break head;
                            }
                        }
                    };
                    let is_health = head.starts_with("get /health");
                    seen.lock().unwrap().push(head);

                    let (status, body, extra) = if is_health {
                        ("200 OK", "OK", "set-cookie: session=abc; Path=/\r\n")
                    } else {
                        tokio::time::sleep(reply.delay).await;
                        (reply.status_line, reply.body, "")
                    };
                    let response = format!(
                        "HTTP/1.1 {}\r\ncontent-type: application/json\r\n{}content-length: {}\r\nconnection: close\r\n\r\n{}",
                        status,
                        extra,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        TestServer {
            url: format!("http://{}", addr),
            heads,
        }
    }

    async fn serve_fixed(status_line: &'static str, body: &'static str) -> String {
        serve(Reply::fixed(status_line, body)).await.url
    }

    /// Begins `request`, returning a receiver for its outcome
    fn start(transport: &HttpTransport, request: Request) -> oneshot::Receiver<HttpPending> {
        let (tx, rx) = oneshot::channel();
        transport
            .begin(
                request,
                Box::new(move |pending| {
                    let _ = tx.send(pending);
                }),
            )
            .unwrap();
        rx
    }

    async fn run(transport: &HttpTransport, request: Request) -> Outcome {
        let rx = start(transport, request);
        transport.end(rx.await.unwrap())
    }

    #[test]
    fn test_transport_trims_trailing_slash() {
        let transport = HttpTransport::new("http://localhost:4080/");
        assert_eq!(transport.base_url(), "http://localhost:4080");
        assert!(!transport.is_open());
    }

    #[test]
    fn test_begin_without_runtime_is_rejected() {
        let transport = HttpTransport::new("http://localhost:4080");
        let result = transport.begin(Request::Open, Box::new(|_| {}));
        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_send_before_open_fails_synchronously() {
        let transport = HttpTransport::new("http://localhost:4080");
        let result = transport.begin(Request::SendBatch(Bytes::from_static(b"{}")), Box::new(|_| {}));
        assert!(matches!(result, Err(TransportError::NotOpen)));
    }

    #[tokio::test]
    async fn test_open_send_close() {
        let url = serve_fixed("200 OK", r#"{"accepted":0}"#).await;
        let transport = HttpTransport::new(url);

        assert!(run(&transport, Request::Open).await.is_completed());
        assert!(transport.is_open());

        let payload = Bytes::from_static(br#"{"bts":0}"#);
        assert!(run(&transport, Request::SendBatch(payload)).await.is_completed());

        assert!(run(&transport, Request::Close).await.is_completed());
        assert!(!transport.is_open());

        let again = transport.begin(Request::Open, Box::new(|_| {}));
        assert!(matches!(again, Err(TransportError::Closed)));
        let twice = transport.begin(Request::Close, Box::new(|_| {}));
        assert!(matches!(twice, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let url = serve_fixed("400 Bad Request", r#"{"error":"malformed batch: bad"}"#).await;
        let transport = HttpTransport::new(url);
        assert!(run(&transport, Request::Open).await.is_completed());

        let outcome = run(&transport, Request::SendBatch(Bytes::from_static(b"x"))).await;
        match outcome {
            Outcome::Failed(err) => {
                assert!(err.is_rejected());
                assert!(matches!(
                    err,
                    TransportError::Status { status: 400, ref message } if message == "malformed batch: bad"
                ));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_against_unreachable_receiver_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(format!("http://{}", addr));
        let outcome = run(&transport, Request::Open).await;
        assert!(matches!(outcome, Outcome::Failed(TransportError::Request(_))));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_close_waits_for_in_flight_send() {
        let server = serve(Reply::after(Duration::from_millis(200))).await;
        let transport = HttpTransport::new(server.url.clone());
        assert!(run(&transport, Request::Open).await.is_completed());

        let order = Arc::new(Mutex::new(Vec::new()));
        let (send_tx, send_rx) = oneshot::channel();
        let (close_tx, close_rx) = oneshot::channel();

        let log = Arc::clone(&order);
        transport
            .begin(
                Request::SendBatch(Bytes::from_static(br#"{"bts":0}"#)),
                Box::new(move |pending| {
                    log.lock().unwrap().push("send");
                    let _ = send_tx.send(pending);
                }),
            )
            .unwrap();
        server.wait_for_post().await;

        let log = Arc::clone(&order);
        transport
            .begin(
                Request::Close,
                Box::new(move |pending| {
                    log.lock().unwrap().push("close");
                    let _ = close_tx.send(pending);
                }),
            )
            .unwrap();

        let late = transport.begin(Request::SendBatch(Bytes::from_static(b"{}")), Box::new(|_| {}));
        assert!(matches!(late, Err(TransportError::Closed)));

        assert!(transport.end(send_rx.await.unwrap()).is_completed());
        assert!(transport.end(close_rx.await.unwrap()).is_completed());
        assert_eq!(*order.lock().unwrap(), ["send", "close"]);
    }

    #[tokio::test]
    async fn test_abort_cancels_in_flight_send() {
        let server = serve(Reply::after(Duration::from_secs(3600))).await;
        let transport = HttpTransport::new(server.url.clone());
        assert!(run(&transport, Request::Open).await.is_completed());

        let send = start(&transport, Request::SendBatch(Bytes::from_static(br#"{"bts":0}"#)));
        server.wait_for_post().await;
        let close = start(&transport, Request::Close);

        transport.abort();

        assert!(matches!(transport.end(send.await.unwrap()), Outcome::Cancelled));
        assert!(transport.end(close.await.unwrap()).is_completed());
        assert!(!transport.is_open());

        transport.abort();
        let again = transport.begin(Request::Open, Box::new(|_| {}));
        assert!(matches!(again, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_cookie_store_replays_receiver_cookies() {
        let server = serve(Reply::fixed("200 OK", r#"{"accepted":0}"#)).await;
        let mut config = ClientConfig::new("web-01".to_string(), server.url.clone());
        config.cookie_store = true;
        let transport = HttpTransport::from_config(&config).unwrap();

        assert!(run(&transport, Request::Open).await.is_completed());
        let payload = Bytes::from_static(br#"{"bts":0}"#);
        assert!(run(&transport, Request::SendBatch(payload)).await.is_completed());

        let post = server.wait_for_post().await;
        assert!(post.lines().any(|line| line == "cookie: session=abc"));
    }

    #[tokio::test]
    async fn test_cookies_are_dropped_without_cookie_store() {
        let server = serve(Reply::fixed("200 OK", r#"{"accepted":0}"#)).await;
        let config = ClientConfig::new("web-01".to_string(), server.url.clone());
        assert!(!config.cookie_store);
        let transport = HttpTransport::from_config(&config).unwrap();

        assert!(run(&transport, Request::Open).await.is_completed());
        let payload = Bytes::from_static(br#"{"bts":0}"#);
        assert!(run(&transport, Request::SendBatch(payload)).await.is_completed());

        let post = server.wait_for_post().await;
        assert!(!post.contains("cookie:"));
    }
}
