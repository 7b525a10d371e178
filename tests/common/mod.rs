// Shared in-memory collaborators for integration tests
#![allow(dead_code)]

use anyhow::{bail, Result};
use emotion_stream::capture::CaptureDevice;
use emotion_stream::session::{EmotionSession, SessionConfig, SessionState};
use emotion_stream::stream::{Connection, Connector, FrameSink};
use futures::channel::mpsc;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every connection, sent message and close
#[derive(Default)]
pub struct MockConnector {
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
    releases: Arc<AtomicUsize>,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<Result<String>>>>,
    fail: AtomicBool,
    connect_delay: Mutex<Option<Duration>>,
    send_delay: Mutex<Option<Duration>>,
    stall_sends: AtomicBool,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let connector = Self::default();
        connector.fail.store(true, Ordering::SeqCst);
        Arc::new(connector)
    }

    /// Every open takes `delay` before it resolves
    pub fn slow_connect(delay: Duration) -> Arc<Self> {
        let connector = Self::default();
        *connector.connect_delay.lock().unwrap() = Some(delay);
        Arc::new(connector)
    }

    /// Every send takes `delay` before it completes
    pub fn slow_send(delay: Duration) -> Arc<Self> {
        let connector = Self::default();
        *connector.send_delay.lock().unwrap() = Some(delay);
        Arc::new(connector)
    }

    /// Sends never complete, like a peer that stopped reading
    pub fn stalled_send() -> Arc<Self> {
        let connector = Self::default();
        connector.stall_sends.store(true, Ordering::SeqCst);
        Arc::new(connector)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Sinks released, whether closed or just dropped
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Deliver a payload on the most recent connection
    pub fn push_inbound(&self, payload: &str) {
        let tx = self.inbound_tx.lock().unwrap();
        tx.as_ref()
            .expect("no connection opened")
            .unbounded_send(Ok(payload.to_string()))
            .unwrap();
    }

    /// Simulate the server hanging up
    pub fn drop_connection(&self) {
        self.inbound_tx.lock().unwrap().take();
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Connection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            bail!("connection refused");
        }

        let (tx, rx) = mpsc::unbounded();
        *self.inbound_tx.lock().unwrap() = Some(tx);

        Ok(Connection {
            sink: Box::new(MockSink {
                sent: Arc::clone(&self.sent),
                closes: Arc::clone(&self.closes),
                releases: Arc::clone(&self.releases),
                delay: *self.send_delay.lock().unwrap(),
                stall: self.stall_sends.load(Ordering::SeqCst),
            }),
            inbound: rx.boxed(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockSink {
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    delay: Option<Duration>,
    stall: bool,
}

#[async_trait::async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.stall {
            futures::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Camera stand-in producing "frame-N" payloads
pub struct MockDevice {
    granted: AtomicBool,
    fail: AtomicBool,
    stall: AtomicBool,
    captures: AtomicUsize,
}

impl MockDevice {
    pub fn granted() -> Arc<Self> {
        Arc::new(Self {
            granted: AtomicBool::new(true),
            fail: AtomicBool::new(false),
            stall: AtomicBool::new(false),
            captures: AtomicUsize::new(0),
        })
    }

    pub fn denied() -> Arc<Self> {
        let device = Self::granted();
        device.granted.store(false, Ordering::SeqCst);
        device
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Captures never complete
    pub fn set_stalled(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureDevice for MockDevice {
    async fn request_permission(&self) -> Result<bool> {
        self.granted.store(true, Ordering::SeqCst);
        Ok(true)
    }

    fn permission_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    async fn capture_still(&self, _quality: f32) -> Result<Option<String>> {
        if self.stall.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            bail!("camera busy");
        }
        let n = self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!("frame-{}", n)))
    }

    fn name(&self) -> &str {
        "mock-camera"
    }
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        session_id: "test-session".to_string(),
        endpoint: "ws://inference.test/ws/emotion".to_string(),
        ..SessionConfig::default()
    }
}

pub fn new_session(connector: &Arc<MockConnector>, device: &Arc<MockDevice>) -> EmotionSession {
    EmotionSession::new(test_config(), connector.clone(), device.clone())
}

/// Poll until the session reaches `state`, a millisecond at a time
pub async fn wait_for_state(session: &EmotionSession, state: SessionState) {
    for _ in 0..100 {
        if session.state().await == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("session never reached {:?}, stuck in {:?}", state, session.state().await);
}

/// Let the worker drain pending inbound messages and sends
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
