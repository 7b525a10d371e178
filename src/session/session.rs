use super::config::SessionConfig;
use super::history::EmotionHistory;
use super::stats::{CaptureOutcome, SessionState, SessionStats};
use crate::capture::{CaptureDevice, Frame};
use crate::error::TransmitError;
use crate::stream::{decode_inbound, Connection, Connector, EmotionReading, FrameSink, FrameSlot, OutboundMessage};
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long a stop waits for an in-flight send before dropping the connection
const SEND_GRACE: Duration = Duration::from_millis(500);

/// Upper bound on the close handshake
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// One recording engagement: a connection to the inference service, the
/// capture schedule feeding it, and the history of results coming back.
///
/// `set_recording` is the only way to open or close the connection. Each
/// screen that shows live emotions owns its own session.
pub struct EmotionSession {
    /// Session configuration
    config: SessionConfig,

    /// Opens connections to the inference service
    connector: Arc<dyn Connector>,

    /// Camera collaborator
    device: Arc<dyn CaptureDevice>,

    /// When the session was created
    created_at: DateTime<Utc>,

    /// State shared with the streaming worker
    shared: Arc<Shared>,

    /// Running worker, if any. Held across transitions so they never interleave.
    worker: Mutex<Option<Worker>>,
}

/// Streaming worker for one connection
struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Worker {
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!("Streaming worker panicked: {}", e);
        }
    }
}

struct Shared {
    session_id: String,
    is_recording: AtomicBool,
    state: RwLock<SessionState>,
    history: Mutex<EmotionHistory>,

    /// Present only while a connection is open and ready
    outbound: RwLock<Option<Arc<FrameSlot>>>,

    last_error: Mutex<Option<String>>,
    connect_attempts: AtomicUsize,
    frames_sent: AtomicUsize,
    frames_dropped: AtomicUsize,
    ticks_skipped: AtomicUsize,
    results_received: AtomicUsize,
    malformed_messages: AtomicUsize,
}

impl EmotionSession {
    /// Create an idle session. No connection is opened until recording starts.
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        device: Arc<dyn CaptureDevice>,
    ) -> Self {
        info!(
            "Creating emotion session: {} (endpoint={}, device={}, transport={})",
            config.session_id,
            config.endpoint,
            device.name(),
            connector.name()
        );

        let shared = Arc::new(Shared {
            session_id: config.session_id.clone(),
            is_recording: AtomicBool::new(false),
            state: RwLock::new(SessionState::Idle),
            history: Mutex::new(EmotionHistory::new(config.history_capacity)),
            outbound: RwLock::new(None),
            last_error: Mutex::new(None),
            connect_attempts: AtomicUsize::new(0),
            frames_sent: AtomicUsize::new(0),
            frames_dropped: AtomicUsize::new(0),
            ticks_skipped: AtomicUsize::new(0),
            results_received: AtomicUsize::new(0),
            malformed_messages: AtomicUsize::new(0),
        });

        Self {
            config,
            connector,
            device,
            created_at: Utc::now(),
            shared,
            worker: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Turn recording on or off
    ///
    /// On: opens a fresh connection and starts the capture schedule once it
    /// is open. Off: cancels the schedule and closes the connection before
    /// returning; if the connection is still opening, it is closed as soon as
    /// the open settles. Both directions are idempotent. Connection failures
    /// are logged and reflected in `state()`, never returned.
    pub async fn set_recording(&self, on: bool) -> SessionState {
        let mut worker = self.worker.lock().await;

        if on {
            if self.shared.is_recording.load(Ordering::SeqCst) {
                debug!("Session {} already recording", self.config.session_id);
                return self.state().await;
            }

            info!("Starting recording: {}", self.config.session_id);

            // Worker left over from a connection that already dropped
            if let Some(stale) = worker.take() {
                stale.stop().await;
            }

            self.shared.is_recording.store(true, Ordering::SeqCst);
            self.shared.set_state(SessionState::Connecting).await;

            let cancel = CancellationToken::new();
            let handle = tokio::spawn(run_worker(
                self.config.clone(),
                Arc::clone(&self.connector),
                Arc::clone(&self.device),
                Arc::clone(&self.shared),
                cancel.clone(),
            ));
            *worker = Some(Worker { cancel, handle });
        } else {
            if !self.shared.is_recording.load(Ordering::SeqCst) && worker.is_none() {
                debug!("Session {} not recording", self.config.session_id);
                return self.state().await;
            }

            info!("Stopping recording: {}", self.config.session_id);

            self.shared.set_state(SessionState::Closing).await;
            self.shared.is_recording.store(false, Ordering::SeqCst);

            if let Some(running) = worker.take() {
                running.stop().await;
            }

            self.shared.set_state(SessionState::Idle).await;
            info!("Recording stopped: {}", self.config.session_id);
        }

        self.state().await
    }

    /// Flip the recording flag
    pub async fn toggle_recording(&self) -> SessionState {
        let on = !self.is_recording();
        self.set_recording(on).await
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> SessionState {
        *self.shared.state.read().await
    }

    /// Whether the capture device may be used
    pub fn permission_granted(&self) -> bool {
        self.device.permission_granted()
    }

    /// Request device access if not yet granted
    pub async fn ensure_permission(&self) -> bool {
        if self.device.permission_granted() {
            return true;
        }

        match self.device.request_permission().await {
            Ok(granted) => granted,
            Err(e) => {
                error!("Permission request failed on {}: {:#}", self.device.name(), e);
                self.shared
                    .record_error(format!("Permission request failed: {:#}", e))
                    .await;
                false
            }
        }
    }

    /// Capture and send one frame now, outside the periodic schedule
    ///
    /// Subject to the same readiness checks as a scheduled tick.
    pub async fn capture_now(&self) -> CaptureOutcome {
        if !self.is_recording() || !self.device.permission_granted() {
            return CaptureOutcome::Skipped;
        }

        let Some(slot) = self.shared.outbound.read().await.clone() else {
            return CaptureOutcome::Skipped;
        };

        match transmit(self.device.as_ref(), self.config.quality, &slot).await {
            Ok(true) => CaptureOutcome::Sent,
            Ok(false) => CaptureOutcome::Skipped,
            Err(e) => {
                error!("Manual capture failed: {}", e);
                let message = e.to_string();
                self.shared.record_error(message.clone()).await;
                CaptureOutcome::Failed(message)
            }
        }
    }

    /// Most recent classification
    pub async fn current_emotion(&self) -> Option<EmotionReading> {
        self.shared.history.lock().await.current().cloned()
    }

    /// Snapshot of the classification history, newest first
    pub async fn history(&self) -> EmotionHistory {
        self.shared.history.lock().await.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().await.clone()
    }

    /// Get current session statistics
    pub async fn stats(&self) -> SessionStats {
        let pending_dropped = match self.shared.outbound.read().await.as_ref() {
            Some(slot) => slot.dropped(),
            None => 0,
        };

        SessionStats {
            session_id: self.config.session_id.clone(),
            state: self.state().await,
            is_recording: self.is_recording(),
            created_at: self.created_at,
            connect_attempts: self.shared.connect_attempts.load(Ordering::SeqCst),
            frames_sent: self.shared.frames_sent.load(Ordering::SeqCst),
            frames_dropped: self.shared.frames_dropped.load(Ordering::SeqCst) + pending_dropped,
            ticks_skipped: self.shared.ticks_skipped.load(Ordering::SeqCst),
            results_received: self.shared.results_received.load(Ordering::SeqCst),
            malformed_messages: self.shared.malformed_messages.load(Ordering::SeqCst),
            last_error: self.last_error().await,
        }
    }

    /// Tear down: stop recording and close the connection. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.set_recording(false).await;
    }
}

impl Drop for EmotionSession {
    fn drop(&mut self) {
        // The worker closes its own connection once cancelled
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}

impl Shared {
    async fn set_state(&self, state: SessionState) {
        let mut current = self.state.write().await;
        if *current != state {
            debug!("Session {}: {:?} -> {:?}", self.session_id, *current, state);
            *current = state;
        }
    }

    async fn record_error(&self, message: String) {
        *self.last_error.lock().await = Some(message);
    }

    /// Decode one inbound payload and fold any classification into the history
    async fn handle_inbound(&self, payload: &str) {
        let result = match decode_inbound(payload) {
            Ok(result) => result,
            Err(e) => {
                warn!("Failed to parse inbound message: {}", e);
                self.malformed_messages.fetch_add(1, Ordering::SeqCst);
                return;
            }
        };

        let Some(reading) = result.reading() else {
            debug!("Inbound message without classification: {:?}", result);
            return;
        };

        info!(
            "Emotion: {} (index={:?}) [{}]",
            reading.label, reading.class_index, self.session_id
        );

        // Prepend and truncate under one lock, before the next message is read
        self.history.lock().await.record(reading.clone());
        self.results_received.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Cancelled,
    Dropped,
}

/// Own one connection for its whole life: open it, run the capture schedule,
/// read results, then close it.
///
/// Frames go out on a separate sender task, so neither a slow send nor a
/// stalled peer can keep the worker from seeing cancellation.
async fn run_worker(
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    device: Arc<dyn CaptureDevice>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    if let Err(e) = config.validate() {
        error!("Invalid session configuration [{}]: {:#}", config.session_id, e);
        shared.record_error(format!("Invalid configuration: {:#}", e)).await;
        if !cancel.is_cancelled() {
            shared.set_state(SessionState::Disconnected).await;
        }
        return;
    }

    shared.connect_attempts.fetch_add(1, Ordering::SeqCst);

    // Not raced against cancellation: a connection that opens after recording
    // stopped is closed below instead of being left dangling.
    let connected = tokio::time::timeout(config.connect_timeout, connector.connect(&config.endpoint)).await;

    let Connection { mut sink, mut inbound } = match connected {
        Ok(Ok(connection)) => connection,
        Ok(Err(e)) => {
            error!("Failed to connect to {}: {:#}", config.endpoint, e);
            shared.record_error(format!("Connection failed: {:#}", e)).await;
            if !cancel.is_cancelled() {
                shared.set_state(SessionState::Disconnected).await;
            }
            return;
        }
        Err(_) => {
            error!(
                "Timed out connecting to {} after {:?}",
                config.endpoint, config.connect_timeout
            );
            shared.record_error("Connection timed out".to_string()).await;
            if !cancel.is_cancelled() {
                shared.set_state(SessionState::Disconnected).await;
            }
            return;
        }
    };

    if cancel.is_cancelled() {
        info!("Recording stopped while connecting, closing connection");
        close_sink(&mut sink).await;
        return;
    }

    let slot = Arc::new(FrameSlot::new());
    let mut sender = tokio::spawn(run_sender(sink, Arc::clone(&slot), Arc::clone(&shared)));
    *shared.outbound.write().await = Some(Arc::clone(&slot));
    shared.set_state(SessionState::Streaming).await;

    info!(
        "Streaming frames every {:?} to {} [{}]",
        config.frame_interval, config.endpoint, config.session_id
    );

    // First tick one period after streaming starts; late ticks are skipped, not queued
    let mut ticker = tokio::time::interval_at(Instant::now() + config.frame_interval, config.frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let reason = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break StopReason::Cancelled,

            message = inbound.next() => match message {
                Some(Ok(payload)) => shared.handle_inbound(&payload).await,
                Some(Err(e)) => {
                    error!("Connection error: {:#}", e);
                    shared.record_error(format!("Connection error: {:#}", e)).await;
                    break StopReason::Dropped;
                }
                None => {
                    warn!("Connection closed by server [{}]", config.session_id);
                    break StopReason::Dropped;
                }
            },

            _ = ticker.tick() => {
                // A capture that hangs must not hold up a stop
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break StopReason::Cancelled,
                    _ = tick(device.as_ref(), config.quality, &shared, &slot) => {}
                }
            },
        }
    };

    slot.close();
    shared.frames_dropped.fetch_add(slot.dropped(), Ordering::SeqCst);
    *shared.outbound.write().await = None;

    // The pending frame is already discarded; an in-flight send gets a short grace
    match tokio::time::timeout(SEND_GRACE, &mut sender).await {
        Ok(Ok(mut sink)) => close_sink(&mut sink).await,
        Ok(Err(e)) => error!("Frame sender failed: {}", e),
        Err(_) => {
            warn!(
                "Frame send still pending after {:?}, dropping connection [{}]",
                SEND_GRACE, config.session_id
            );
            sender.abort();
        }
    }

    if reason == StopReason::Dropped && !cancel.is_cancelled() {
        // No reconnect: the user toggles recording off and on to resume
        shared.set_state(SessionState::Disconnected).await;
    }

    debug!("Streaming worker finished ({:?}) [{}]", reason, config.session_id);
}

/// Send each frame put in `slot` until it closes, then hand the sink back
async fn run_sender(mut sink: Box<dyn FrameSink>, slot: Arc<FrameSlot>, shared: Arc<Shared>) -> Box<dyn FrameSink> {
    while let Some(message) = slot.next().await {
        match sink.send_text(message).await {
            Ok(()) => {
                shared.frames_sent.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                let e = TransmitError::Send(e);
                error!("{}", e);
                shared.record_error(e.to_string()).await;
            }
        }
    }

    sink
}

/// One scheduled capture; a silent no-op unless recording with device access
async fn tick(device: &dyn CaptureDevice, quality: f32, shared: &Shared, slot: &FrameSlot) {
    if !shared.is_recording.load(Ordering::SeqCst) || !device.permission_granted() || slot.is_closed() {
        shared.ticks_skipped.fetch_add(1, Ordering::SeqCst);
        return;
    }

    if let Err(e) = transmit(device, quality, slot).await {
        error!("{}", e);
        shared.record_error(e.to_string()).await;
    }
}

/// Capture one still and hand it to the outbound slot
///
/// `Ok(false)` when the device had no image or the slot closed meanwhile.
async fn transmit(device: &dyn CaptureDevice, quality: f32, slot: &FrameSlot) -> Result<bool, TransmitError> {
    let Some(image) = device.capture_still(quality).await.map_err(TransmitError::Capture)? else {
        return Ok(false);
    };

    let message = serde_json::to_string(&OutboundMessage::from(Frame::now(image)))?;

    Ok(slot.put(message))
}

async fn close_sink(sink: &mut Box<dyn FrameSink>) {
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to close connection: {:#}", e),
        Err(_) => warn!("Connection close timed out after {:?}", CLOSE_TIMEOUT),
    }
}
