//! Asynchronous dispatch bridge
//!
//! Adapts a begin/end `Transport` into two calling styles:
//! - awaitable calls (`open`, `close`, `send_batch`) that resolve when the
//!   operation reaches a terminal state
//! - event-style calls (`open_async`, `close_async`, `send_batch_async`) that
//!   return at once and later deliver exactly one `CompletionEvent`, carrying
//!   the caller's correlation token, to the subscriber channel
//!
//! Every call owns a single-assignment completion slot. The first terminal
//! transition empties the slot and delivers the notification; later attempts
//! find it empty and do nothing. If a transport drops its callback without
//! invoking it, the slot resolves as cancelled.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::transport::{OnComplete, Operation, Outcome, Request, Transport, TransportError};

/// Identifier assigned to each initiated call
pub type CallId = u64;

/// Lifecycle of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Initiated,
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallState::Completed | CallState::Failed | CallState::Cancelled
        )
    }
}

impl From<&Outcome> for CallState {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Completed => CallState::Completed,
            Outcome::Failed(_) => CallState::Failed,
            Outcome::Cancelled => CallState::Cancelled,
        }
    }
}

/// Errors reported by the awaitable calls
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The transport refused to start the operation
    #[error("failed to start operation: {0}")]
    Initiation(#[source] TransportError),

    /// The operation started but failed
    #[error(transparent)]
    Transport(TransportError),

    /// The operation was cancelled before it finished
    #[error("operation cancelled")]
    Cancelled,
}

/// Notification delivered once per event-style call
#[derive(Debug)]
pub struct CompletionEvent<T> {
    pub call_id: CallId,
    pub operation: Operation,
    pub token: T,
    pub outcome: Outcome,
}

impl<T> CompletionEvent<T> {
    /// Transport error, absent on success and on cancellation
    pub fn error(&self) -> Option<&TransportError> {
        match &self.outcome {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, Outcome::Cancelled)
    }

    pub fn state(&self) -> CallState {
        CallState::from(&self.outcome)
    }
}

/// Where a call's single notification goes
enum Listener<T> {
    Event {
        token: T,
        events: mpsc::UnboundedSender<CompletionEvent<T>>,
    },
    Reply(oneshot::Sender<Outcome>),
}

struct SlotInner<T> {
    state: CallState,
    /// Callback dropped before `begin` returned
    abandoned: bool,
    listener: Option<Listener<T>>,
}

/// Single-assignment completion slot of one call
struct CallSlot<T> {
    id: CallId,
    operation: Operation,
    inner: Mutex<SlotInner<T>>,
    in_flight: Arc<AtomicUsize>,
}

impl<T> CallSlot<T> {
    fn new(id: CallId, operation: Operation, listener: Listener<T>, in_flight: Arc<AtomicUsize>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            id,
            operation,
            inner: Mutex::new(SlotInner {
                state: CallState::Initiated,
                abandoned: false,
                listener: Some(listener),
            }),
            in_flight,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves an accepted call to `Pending`
    ///
    /// Returns true when the callback was already dropped unused, in which
    /// case the caller must resolve the call as cancelled.
    fn mark_pending(&self) -> bool {
        let mut inner = self.lock();
        if inner.listener.is_none() {
            return false;
        }
        inner.state = CallState::Pending;
        inner.abandoned
    }

    /// Records that the transport dropped the callback
    ///
    /// Returns true when the call is pending and must resolve as cancelled.
    fn abandon(&self) -> bool {
        let mut inner = self.lock();
        if inner.listener.is_none() {
            return false;
        }
        match inner.state {
            CallState::Initiated => {
                inner.abandoned = true;
                false
            }
            _ => true,
        }
    }

    /// Withdraws a call the transport refused; no notification is sent
    fn disarm(&self) {
        if self.lock().listener.take().is_some() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Terminal transition, delivering the notification at most once
    fn resolve(&self, outcome: Outcome) -> bool {
        let listener = {
            let mut inner = self.lock();
            let Some(listener) = inner.listener.take() else {
                return false;
            };
            inner.state = CallState::from(&outcome);
            listener
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        debug!(
            "Call {} ({}) finished: {:?}",
            self.id,
            self.operation,
            CallState::from(&outcome)
        );

        match listener {
            Listener::Event { token, events } => {
                let event = CompletionEvent {
                    call_id: self.id,
                    operation: self.operation,
                    token,
                    outcome,
                };
                if events.send(event).is_err() {
                    debug!("No subscriber for completion of call {}", self.id);
                }
            }
            Listener::Reply(reply) => {
                let _ = reply.send(outcome);
            }
        }
        true
    }
}

/// Owned by the transport callback; resolves the slot exactly once
struct CallGuard<T> {
    slot: Arc<CallSlot<T>>,
}

impl<T> CallGuard<T> {
    fn complete(self, outcome: Outcome) {
        self.slot.resolve(outcome);
    }
}

impl<T> Drop for CallGuard<T> {
    fn drop(&mut self) {
        if self.slot.abandon() {
            self.slot.resolve(Outcome::Cancelled);
        }
    }
}

/// Bridge from a begin/end transport to correlated completions
///
/// `T` is the correlation token type of event-style calls.
pub struct DispatchBridge<X: Transport, T> {
    transport: Arc<X>,
    next_id: AtomicU64,
    in_flight: Arc<AtomicUsize>,
    events: mpsc::UnboundedSender<CompletionEvent<T>>,
    subscriber: Mutex<Option<mpsc::UnboundedReceiver<CompletionEvent<T>>>>,
}

impl<X: Transport, T: Send + 'static> DispatchBridge<X, T> {
    pub fn new(transport: X) -> Self {
        let (events, subscriber) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(transport),
            next_id: AtomicU64::new(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
            events,
            subscriber: Mutex::new(Some(subscriber)),
        }
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    /// Takes the completion event stream
    ///
    /// There is a single subscriber: the first call gets the receiver, later
    /// calls get `None`. Events raised before subscribing are kept.
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<CompletionEvent<T>>> {
        self.subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Number of calls that have not reached a terminal state
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    // =============================================================================
    // Event-style calls
    // =============================================================================

    pub fn open_async(&self, token: T) -> Result<CallId, DispatchError> {
        self.initiate(Request::Open, self.event_listener(token))
    }

    pub fn close_async(&self, token: T) -> Result<CallId, DispatchError> {
        self.initiate(Request::Close, self.event_listener(token))
    }

    pub fn send_batch_async(&self, payload: Bytes, token: T) -> Result<CallId, DispatchError> {
        self.initiate(Request::SendBatch(payload), self.event_listener(token))
    }

    // =============================================================================
    // Awaitable calls
    // =============================================================================

    pub async fn open(&self) -> Result<(), DispatchError> {
        self.call(Request::Open).await
    }

    pub async fn close(&self) -> Result<(), DispatchError> {
        self.call(Request::Close).await
    }

    pub async fn send_batch(&self, payload: Bytes) -> Result<(), DispatchError> {
        self.call(Request::SendBatch(payload)).await
    }

    async fn call(&self, request: Request) -> Result<(), DispatchError> {
        let (reply, outcome) = oneshot::channel();
        self.initiate(request, Listener::Reply(reply))?;

        match outcome.await {
            Ok(Outcome::Completed) => Ok(()),
            Ok(Outcome::Failed(err)) => Err(DispatchError::Transport(err)),
            Ok(Outcome::Cancelled) | Err(_) => Err(DispatchError::Cancelled),
        }
    }

    fn event_listener(&self, token: T) -> Listener<T> {
        Listener::Event {
            token,
            events: self.events.clone(),
        }
    }

    fn initiate(&self, request: Request, listener: Listener<T>) -> Result<CallId, DispatchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let operation = request.operation();
        let slot = Arc::new(CallSlot::new(
            id,
            operation,
            listener,
            Arc::clone(&self.in_flight),
        ));

        let guard = CallGuard {
            slot: Arc::clone(&slot),
        };
        let transport = Arc::clone(&self.transport);
        let on_complete: OnComplete<X::Pending> = Box::new(move |pending| {
            let outcome = transport.end(pending);
            guard.complete(outcome);
        });

        match self.transport.begin(request, on_complete) {
            Ok(()) => {
                debug!("Call {} ({}) pending", id, operation);
                if slot.mark_pending() {
                    slot.resolve(Outcome::Cancelled);
                }
                Ok(id)
            }
            Err(err) => {
                debug!("Call {} ({}) refused: {}", id, operation, err);
                slot.disarm();
                Err(DispatchError::Initiation(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    /// What the scripted transport does with each begin
    #[derive(Clone, Copy)]
    enum Script {
        Succeed,
        Fail,
        Cancel,
        Refuse,
        DropCallback,
        Inline,
    }

    struct ScriptedTransport {
        script: Script,
        ended: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Script) -> Self {
            Self {
                script,
                ended: AtomicUsize::new(0),
            }
        }
    }

    impl Transport for ScriptedTransport {
        type Pending = Outcome;

        fn begin(
            &self,
            _request: Request,
            on_complete: OnComplete<Outcome>,
        ) -> Result<(), TransportError> {
            let outcome = match self.script {
                Script::Refuse => return Err(TransportError::NotOpen),
                Script::DropCallback => return Ok(()),
                Script::Inline => {
                    on_complete(Outcome::Completed);
                    return Ok(());
                }
                Script::Succeed => Outcome::Completed,
                Script::Fail => Outcome::Failed(TransportError::status(503, "unavailable")),
                Script::Cancel => Outcome::Cancelled,
            };
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                on_complete(outcome);
            });
            Ok(())
        }

        fn end(&self, pending: Outcome) -> Outcome {
            self.ended.fetch_add(1, Ordering::SeqCst);
            pending
        }
    }

    fn bridge(script: Script) -> DispatchBridge<ScriptedTransport, u32> {
        DispatchBridge::new(ScriptedTransport::new(script))
    }

    #[tokio::test]
    async fn test_awaitable_success() {
        let bridge = bridge(Script::Succeed);
        bridge.open().await.unwrap();
        bridge.send_batch(Bytes::from_static(b"{}")).await.unwrap();
        bridge.close().await.unwrap();
        assert_eq!(bridge.transport().ended.load(Ordering::SeqCst), 3);
        assert_eq!(bridge.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_awaitable_failure_keeps_transport_error() {
        let bridge = bridge(Script::Fail);
        let err = bridge.send_batch(Bytes::new()).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Transport(TransportError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_awaitable_cancellation() {
        let bridge = bridge(Script::Cancel);
        assert!(matches!(bridge.open().await, Err(DispatchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_refused_call_reports_synchronously_without_event() {
        let bridge = bridge(Script::Refuse);
        let mut events = bridge.subscribe().unwrap();

        let err = bridge.send_batch_async(Bytes::new(), 7).unwrap_err();
        assert!(matches!(err, DispatchError::Initiation(TransportError::NotOpen)));
        assert_eq!(bridge.in_flight(), 0);

        drop(bridge);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_event_carries_token_and_outcome() {
        let bridge = bridge(Script::Fail);
        let mut events = bridge.subscribe().unwrap();

        let id = bridge.send_batch_async(Bytes::new(), 42).unwrap();
        let event = events.recv().await.unwrap();

        assert_eq!(event.call_id, id);
        assert_eq!(event.token, 42);
        assert_eq!(event.operation, Operation::SendBatch);
        assert_eq!(event.state(), CallState::Failed);
        assert!(event.error().is_some());
        assert!(!event.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_is_a_normal_completion() {
        let bridge = bridge(Script::Cancel);
        let mut events = bridge.subscribe().unwrap();

        bridge.close_async(1).unwrap();
        let event = events.recv().await.unwrap();
        assert!(event.is_cancelled());
        assert!(event.error().is_none());
        assert_eq!(event.operation, Operation::Close);
    }

    #[tokio::test]
    async fn test_dropped_callback_resolves_as_cancelled_once() {
        let bridge = bridge(Script::DropCallback);
        let mut events = bridge.subscribe().unwrap();

        bridge.open_async(5).unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.token, 5);
        assert!(event.is_cancelled());
        assert_eq!(bridge.in_flight(), 0);

        drop(bridge);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_inline_completion_before_begin_returns() {
        let bridge = bridge(Script::Inline);
        let mut events = bridge.subscribe().unwrap();

        bridge.open_async(9).unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.state(), CallState::Completed);

        drop(bridge);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_once() {
        let bridge = bridge(Script::Succeed);
        assert!(bridge.subscribe().is_some());
        assert!(bridge.subscribe().is_none());
    }

    #[tokio::test]
    async fn test_events_raised_before_subscribe_are_kept() {
        let bridge = bridge(Script::Inline);
        bridge.open_async(3).unwrap();
        let mut events = bridge.subscribe().unwrap();
        assert_eq!(events.recv().await.unwrap().token, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_complete_exactly_once() {
        const CALLS: u32 = 64;
        let bridge = Arc::new(bridge(Script::Succeed));
        let mut events = bridge.subscribe().unwrap();

        let mut handles = Vec::new();
        for token in 0..CALLS {
            let bridge = Arc::clone(&bridge);
            handles.push(tokio::spawn(async move {
                let payload = Bytes::from(token.to_string());
                bridge.send_batch_async(payload, token).unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), CALLS as usize);

        let mut tokens = HashSet::new();
        for _ in 0..CALLS {
            let event = events.recv().await.unwrap();
            assert!(ids.contains(&event.call_id));
            assert!(tokens.insert(event.token), "token delivered twice");
        }
        assert_eq!(tokens.len(), CALLS as usize);
        assert_eq!(bridge.in_flight(), 0);

        let extra = tokio::time::timeout(Duration::from_millis(50), events.recv()).await;
        assert!(extra.is_err(), "unexpected extra completion");
    }

    #[test]
    fn test_slot_resolves_once() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let slot = CallSlot::new(
            1,
            Operation::Open,
            Listener::Event { token: (), events: tx },
            Arc::clone(&in_flight),
        );
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);

        assert!(!slot.mark_pending());
        assert!(slot.resolve(Outcome::Completed));
        assert!(!slot.resolve(Outcome::Cancelled));
        assert!(!slot.abandon());
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_abandoned_before_pending() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let (reply, _outcome) = oneshot::channel();
        let slot: CallSlot<()> = CallSlot::new(
            1,
            Operation::Close,
            Listener::Reply(reply),
            Arc::clone(&in_flight),
        );

        assert!(!slot.abandon());
        assert!(slot.mark_pending());
        assert!(slot.resolve(Outcome::Cancelled));
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CallState::Initiated.is_terminal());
        assert!(!CallState::Pending.is_terminal());
        assert!(CallState::Completed.is_terminal());
        assert!(CallState::Failed.is_terminal());
        assert!(CallState::Cancelled.is_terminal());
    }
}
