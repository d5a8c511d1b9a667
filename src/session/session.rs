use super::config::SessionConfig;
use super::events::{Diagnostic, OutboundFrame, SessionEvent};
use super::state::ConnectionState;
use super::stats::SessionStats;
use crate::audio::{CaptureBackend, CpalCapture};
use crate::error::{DeviceError, TransportError};
use crate::protocol::{self, MessageKind, END_OF_INPUT, PING};
use crate::transport::{SessionTransport, TransportEvent, WsTransport};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A live voice-stream session to the phishing-analysis backend
///
/// Orchestrates the three leaf components: pumps captured audio frames into
/// the transport, decodes inbound frames into typed events, keeps the
/// connection alive with heartbeats, and runs the two-phase shutdown
/// handshake. Exclusive owner of the `ConnectionState`.
pub struct RealtimeSession {
    shared: Arc<Shared>,

    /// Consumer event stream, handed out once
    event_rx: StdMutex<Option<mpsc::Receiver<SessionEvent>>>,

    /// Diagnostics stream, handed out once
    diag_rx: StdMutex<Option<mpsc::Receiver<Diagnostic>>>,

    /// Shutdown request channel into the run task
    shutdown_tx: Mutex<Option<oneshot::Sender<oneshot::Sender<()>>>>,

    /// Handle for the run task
    run_handle: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    config: SessionConfig,
    transport: Arc<dyn SessionTransport>,

    /// The capture backend parks here between sessions; the pump task takes
    /// it for the duration of a run and returns it on teardown.
    capture: Mutex<Option<Box<dyn CaptureBackend>>>,

    state: StdMutex<ConnectionState>,
    event_tx: mpsc::Sender<SessionEvent>,
    diag_tx: mpsc::Sender<Diagnostic>,
    counters: Counters,
    started_at: StdMutex<Option<DateTime<Utc>>>,
}

#[derive(Default)]
struct Counters {
    frames_sent: AtomicUsize,
    bytes_sent: AtomicUsize,
    messages_received: AtomicUsize,
    last_message_t: StdMutex<Option<f64>>,
}

struct PumpTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<Box<dyn CaptureBackend>>,
}

struct HeartbeatTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RealtimeSession {
    /// Create a session backed by the platform microphone and a WebSocket
    /// transport.
    pub fn new(config: SessionConfig) -> Self {
        let capture = Box::new(CpalCapture::new(config.capture_config()));
        Self::with_backends(config, Arc::new(WsTransport::new()), capture)
    }

    /// Create a session with explicit transport and capture backends.
    ///
    /// This is the seam tests use to substitute doubles; embedders can use
    /// it to plug in alternative transports.
    pub fn with_backends(
        config: SessionConfig,
        transport: Arc<dyn SessionTransport>,
        capture: Box<dyn CaptureBackend>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let (diag_tx, diag_rx) = mpsc::channel(config.event_capacity);

        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                capture: Mutex::new(Some(capture)),
                state: StdMutex::new(ConnectionState::Idle),
                event_tx,
                diag_tx,
                counters: Counters::default(),
                started_at: StdMutex::new(None),
            }),
            event_rx: StdMutex::new(Some(event_rx)),
            diag_rx: StdMutex::new(Some(diag_rx)),
            shutdown_tx: Mutex::new(None),
            run_handle: Mutex::new(None),
        }
    }

    /// Take the consumer event stream. Returns `None` after the first call.
    pub fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        lock(&self.event_rx).take()
    }

    /// Take the diagnostics stream. Returns `None` after the first call.
    pub fn take_diagnostics(&self) -> Option<mpsc::Receiver<Diagnostic>> {
        lock(&self.diag_rx).take()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }

    /// Snapshot of the session's progress.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.state(),
            started_at: *lock(&self.shared.started_at),
            frames_sent: self.shared.counters.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.shared.counters.bytes_sent.load(Ordering::Relaxed),
            messages_received: self
                .shared
                .counters
                .messages_received
                .load(Ordering::Relaxed),
            last_message_t: *lock(&self.shared.counters.last_message_t),
        }
    }

    /// Open the transport and begin streaming once it reports open.
    ///
    /// A no-op while a session is already connecting, open, or closing;
    /// after a clean close or a failure, `start()` begins a fresh session.
    pub async fn start(&self) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.shared.state);
            if !state.can_start() {
                warn!("start() ignored: session is {:?}", *state);
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        info!("Starting session to {}", self.shared.config.endpoint);
        *lock(&self.shared.started_at) = Some(Utc::now());
        self.shared.counters.reset();

        // A previous run (if any) has already terminated; reap its handle.
        if let Some(handle) = self.run_handle.lock().await.take() {
            let _ = handle.await;
        }

        // Install the shutdown channel before the connect await so a stop()
        // racing a slow connect is queued rather than lost.
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        let transport_config = match self.shared.config.transport_config() {
            Ok(config) => config,
            Err(e) => {
                self.fail_on_start(&e).await;
                return Err(e);
            }
        };

        let events = match self.shared.transport.connect(&transport_config).await {
            Ok(rx) => rx,
            Err(e) => {
                error!("Connect failed: {}", e);
                self.fail_on_start(&e).await;
                return Err(e);
            }
        };

        let handle = tokio::spawn(run(self.shared.clone(), events, shutdown_rx));
        *self.run_handle.lock().await = Some(handle);

        Ok(())
    }

    /// Stop the session: release the capture device, signal end-of-input,
    /// wait the grace interval, close the transport.
    ///
    /// Does not return until the audio pump and heartbeat have observably
    /// stopped. A no-op while idle, closed, or failed.
    pub async fn stop(&self) {
        let state = self.state();
        if !state.can_stop() {
            debug!("stop() ignored: session is {:?}", state);
            return;
        }

        let sender = self.shutdown_tx.lock().await.take();
        if let Some(tx) = sender {
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx.send(ack_tx).is_ok() {
                let _ = ack_rx.await;
            }
        }

        if let Some(handle) = self.run_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Session task panicked: {}", e);
            }
        }
    }

    async fn fail_on_start(&self, cause: &TransportError) {
        *self.shutdown_tx.lock().await = None;
        set_state(&self.shared, ConnectionState::Failed);
        let _ = self
            .shared
            .event_tx
            .send(SessionEvent::Failed {
                reason: cause.to_string(),
            })
            .await;
    }
}

impl Counters {
    fn reset(&self) {
        self.frames_sent.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.messages_received.store(0, Ordering::Relaxed);
        *lock(&self.last_message_t) = None;
    }
}

/// Lock a mutex, riding over poisoning (a panicked holder already logged).
fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn get_state(shared: &Shared) -> ConnectionState {
    *lock(&shared.state)
}

fn set_state(shared: &Shared, next: ConnectionState) {
    let mut state = lock(&shared.state);
    if *state != next {
        debug!("Session state: {:?} -> {:?}", *state, next);
        *state = next;
    }
}

/// Controller run loop: drives the state machine off transport events and
/// owns the pump and heartbeat tasks.
async fn run(
    shared: Arc<Shared>,
    mut events: mpsc::Receiver<TransportEvent>,
    mut shutdown_rx: oneshot::Receiver<oneshot::Sender<()>>,
) {
    // Producer-side faults that must fail the session (device loss) arrive
    // here; a sender stays in scope so recv() never ends early.
    let (fault_tx, mut fault_rx) = mpsc::channel::<String>(4);
    let mut pump: Option<PumpTask> = None;
    let mut heartbeat: Option<HeartbeatTask> = None;

    loop {
        tokio::select! {
            ack = &mut shutdown_rx => {
                graceful_shutdown(&shared, &mut events, &mut pump, &mut heartbeat).await;
                if let Ok(ack) = ack {
                    let _ = ack.send(());
                }
                return;
            }
            Some(reason) = fault_rx.recv() => {
                fail(&shared, &mut pump, &mut heartbeat, reason).await;
                return;
            }
            ev = events.recv() => match ev {
                Some(TransportEvent::Open) => {
                    if get_state(&shared) != ConnectionState::Connecting {
                        debug!("Spurious open event ignored");
                        continue;
                    }
                    set_state(&shared, ConnectionState::Open);
                    info!("Session open, starting audio stream");
                    let _ = shared.event_tx.send(SessionEvent::Connected).await;

                    match start_pump(&shared, fault_tx.clone()).await {
                        Ok(task) => pump = Some(task),
                        Err(e) => {
                            fail(&shared, &mut pump, &mut heartbeat, e.to_string()).await;
                            return;
                        }
                    }
                    heartbeat = Some(start_heartbeat(&shared));
                }
                Some(TransportEvent::Text(text)) => on_text(&shared, text).await,
                Some(TransportEvent::Binary(bytes)) => {
                    // No binary payload is defined inbound; accept and drop.
                    debug!("Ignoring {}-byte inbound binary frame", bytes.len());
                }
                Some(TransportEvent::Closing { code, reason }) => {
                    info!("Server closing connection: {} / {}", code, reason);
                }
                Some(TransportEvent::Closed { code, reason }) => {
                    fail(
                        &shared,
                        &mut pump,
                        &mut heartbeat,
                        format!("connection closed unexpectedly ({} / {})", code, reason),
                    )
                    .await;
                    return;
                }
                Some(TransportEvent::Failed(reason)) => {
                    fail(&shared, &mut pump, &mut heartbeat, reason).await;
                    return;
                }
                None => {
                    fail(
                        &shared,
                        &mut pump,
                        &mut heartbeat,
                        "transport event stream ended".to_string(),
                    )
                    .await;
                    return;
                }
            }
        }
    }
}

/// Decode an inbound text frame and republish it to the consumer.
async fn on_text(shared: &Arc<Shared>, text: String) {
    match protocol::decode(&text) {
        Ok(msg) => {
            if msg.kind == MessageKind::Unknown {
                debug!("Ignoring message of unrecognized kind");
                return;
            }
            shared
                .counters
                .messages_received
                .fetch_add(1, Ordering::Relaxed);
            *lock(&shared.counters.last_message_t) = Some(msg.timestamp);

            if shared.event_tx.send(SessionEvent::Message(msg)).await.is_err() {
                debug!("Event consumer gone, message dropped");
            }
        }
        Err(e) => {
            warn!("Dropping malformed message: {}", e);
            let _ = shared.diag_tx.try_send(Diagnostic::DecodeFailed {
                reason: e.to_string(),
                payload: text,
            });
        }
    }
}

/// Open the capture backend and spawn the audio pump task.
///
/// The pump forwards frames as binary transport frames in capture order;
/// send failures are diagnostics, only losing the device fails the session.
async fn start_pump(
    shared: &Arc<Shared>,
    fault_tx: mpsc::Sender<String>,
) -> Result<PumpTask, DeviceError> {
    let mut backend = match shared.capture.lock().await.take() {
        Some(backend) => backend,
        None => return Err(DeviceError::Stream("capture backend unavailable".into())),
    };

    let mut frames = match backend.open().await {
        Ok(rx) => rx,
        Err(e) => {
            // Device never opened; park the backend for a future session.
            *shared.capture.lock().await = Some(backend);
            return Err(e);
        }
    };

    info!("Audio pump started ({})", backend.name());

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let task_shared = shared.clone();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                frame = frames.recv() => match frame {
                    None => {
                        let _ = fault_tx.send("capture stream ended".to_string()).await;
                        break;
                    }
                    Some(frame) if frame.samples.is_empty() => {
                        // Transient starvation; back off instead of spinning.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    Some(frame) => {
                        let len = frame.byte_len();
                        match task_shared.transport.send_binary(frame.to_le_bytes()).await {
                            Ok(()) => {
                                task_shared.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
                                task_shared.counters.bytes_sent.fetch_add(len, Ordering::Relaxed);
                            }
                            Err(e) => {
                                warn!("Audio frame not sent: {}", e);
                                let _ = task_shared.diag_tx.try_send(Diagnostic::SendFailed {
                                    frame: OutboundFrame::Audio,
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }

        if let Err(e) = backend.close().await {
            warn!("Capture close failed: {}", e);
        }
        backend
    });

    Ok(PumpTask {
        stop: stop_tx,
        handle,
    })
}

/// Spawn the heartbeat task: one `"ping"` per interval while open.
fn start_heartbeat(shared: &Arc<Shared>) -> HeartbeatTask {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let task_shared = shared.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(task_shared.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {
                    if get_state(&task_shared) != ConnectionState::Open {
                        break;
                    }
                    if let Err(e) = task_shared.transport.send_text(PING).await {
                        warn!("Heartbeat not sent: {}", e);
                        let _ = task_shared.diag_tx.try_send(Diagnostic::SendFailed {
                            frame: OutboundFrame::Heartbeat,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    });

    HeartbeatTask {
        stop: stop_tx,
        handle,
    }
}

/// Cancel the pump, wait for it to exit, and park the capture backend.
/// The device is released before this returns.
async fn stop_pump(shared: &Arc<Shared>, pump: &mut Option<PumpTask>) {
    if let Some(task) = pump.take() {
        let _ = task.stop.send(true);
        match task.handle.await {
            Ok(backend) => {
                *shared.capture.lock().await = Some(backend);
            }
            Err(e) => error!("Audio pump panicked: {}", e),
        }
    }
}

async fn stop_heartbeat(heartbeat: &mut Option<HeartbeatTask>) {
    if let Some(task) = heartbeat.take() {
        let _ = task.stop.send(true);
        if let Err(e) = task.handle.await {
            error!("Heartbeat task panicked: {}", e);
        }
    }
}

/// The shutdown handshake. Every step runs even if an earlier one fails:
/// stop capture, signal end-of-input, wait the grace interval, close.
async fn graceful_shutdown(
    shared: &Arc<Shared>,
    events: &mut mpsc::Receiver<TransportEvent>,
    pump: &mut Option<PumpTask>,
    heartbeat: &mut Option<HeartbeatTask>,
) {
    info!("Stopping session");
    set_state(shared, ConnectionState::Closing);

    // (1) No more frames may follow the end-of-input sentinel, so the pump
    // must be fully stopped first.
    stop_pump(shared, pump).await;

    // (2) Tell the backend the stream is complete.
    match shared.transport.send_text(END_OF_INPUT).await {
        Ok(()) => info!("End-of-input sentinel sent"),
        Err(e) => {
            warn!("End-of-input sentinel not sent: {}", e);
            let _ = shared.diag_tx.try_send(Diagnostic::SendFailed {
                frame: OutboundFrame::EndOfInput,
                reason: e.to_string(),
            });
        }
    }

    // (3) Fixed grace interval; the protocol has no flush acknowledgment to
    // wait on. The backend flushes trailing results after the sentinel, so
    // keep draining inbound frames until the deadline.
    let deadline = tokio::time::sleep(shared.config.shutdown_grace);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            ev = events.recv() => match ev {
                Some(TransportEvent::Text(text)) => on_text(shared, text).await,
                Some(_) => {}
                None => {
                    deadline.as_mut().await;
                    break;
                }
            }
        }
    }

    // (4) Normal closure.
    if let Err(e) = shared.transport.close(1000, "session complete").await {
        warn!("Transport close failed: {}", e);
    }
    stop_heartbeat(heartbeat).await;

    set_state(shared, ConnectionState::Closed);
    let _ = shared.event_tx.send(SessionEvent::Closed).await;
    info!("Session closed");
}

/// Teardown after a transport or device fault. No reconnection: the session
/// ends in `Failed` and the consumer decides whether to start a new one.
async fn fail(
    shared: &Arc<Shared>,
    pump: &mut Option<PumpTask>,
    heartbeat: &mut Option<HeartbeatTask>,
    reason: String,
) {
    error!("Session failed: {}", reason);

    stop_pump(shared, pump).await;
    stop_heartbeat(heartbeat).await;

    if let Err(e) = shared.transport.close(1001, "session failed").await {
        debug!("Transport close after failure: {}", e);
    }

    set_state(shared, ConnectionState::Failed);
    let _ = shared.event_tx.send(SessionEvent::Failed { reason }).await;
}
