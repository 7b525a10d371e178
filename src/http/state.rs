use crate::capture::CaptureDevice;
use crate::config::StreamConfig;
use crate::session::{EmotionSession, SessionConfig};
use crate::stream::Connector;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Builds a fresh capture device for each new session
pub type DeviceProvider = Arc<dyn Fn() -> Result<Arc<dyn CaptureDevice>> + Send + Sync>;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active sessions (screen_id → session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<EmotionSession>>>>,

    /// Connection and cadence settings applied to every new session
    pub stream: StreamConfig,

    pub connector: Arc<dyn Connector>,

    pub devices: DeviceProvider,
}

impl AppState {
    pub fn new(stream: StreamConfig, connector: Arc<dyn Connector>, devices: DeviceProvider) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            stream,
            connector,
            devices,
        }
    }

    pub async fn session(&self, screen_id: &str) -> Option<Arc<EmotionSession>> {
        self.sessions.read().await.get(screen_id).cloned()
    }

    /// The screen's session, created (with a permission request) on first use
    pub async fn session_or_create(&self, screen_id: &str) -> Result<Arc<EmotionSession>> {
        if let Some(session) = self.session(screen_id).await {
            return Ok(session);
        }

        let device = (self.devices)()?;
        let config = SessionConfig::from_stream_config(screen_id, &self.stream);
        let candidate = Arc::new(EmotionSession::new(config, Arc::clone(&self.connector), device));

        let session = {
            let mut sessions = self.sessions.write().await;
            Arc::clone(
                sessions
                    .entry(screen_id.to_string())
                    .or_insert_with(|| Arc::clone(&candidate)),
            )
        };

        if Arc::ptr_eq(&session, &candidate) {
            info!("Session created for screen {}", screen_id);
            if !session.ensure_permission().await {
                warn!("Capture permission not granted for screen {}", screen_id);
            }
        }

        Ok(session)
    }

    /// Remove the screen's session and tear it down
    pub async fn remove(&self, screen_id: &str) -> Option<Arc<EmotionSession>> {
        let session = self.sessions.write().await.remove(screen_id)?;
        session.shutdown().await;
        Some(session)
    }

    /// Tear down every session
    pub async fn shutdown_all(&self) {
        let sessions: Vec<_> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.shutdown().await;
        }
    }
}
