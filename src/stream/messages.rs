use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capture::Frame;

/// Message sent to the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Frame {
        /// Base64-encoded still
        data: String,
        /// Capture time, Unix millis
        timestamp: i64,
    },
}

impl From<Frame> for OutboundMessage {
    fn from(frame: Frame) -> Self {
        OutboundMessage::Frame {
            data: frame.image_data,
            timestamp: frame.captured_at_millis,
        }
    }
}

/// One classification reported by the inference service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionReading {
    pub label: String,
    /// Model class index; absent on the legacy protocol
    pub class_index: Option<i64>,
    pub received_at: DateTime<Utc>,
}

impl EmotionReading {
    pub fn new(label: impl Into<String>, class_index: Option<i64>) -> Self {
        Self {
            label: label.into(),
            class_index,
            received_at: Utc::now(),
        }
    }

    /// Same label and index, ignoring arrival time
    pub fn same_classification(&self, label: &str, class_index: Option<i64>) -> bool {
        self.label == label && self.class_index == class_index
    }
}

/// A decoded server message
#[derive(Debug, Clone)]
pub enum InboundResult {
    /// Current protocol: the most common emotion in the frame, plus every detection
    Classification {
        most_common: EmotionReading,
        detections: Vec<EmotionReading>,
    },
    /// Legacy `{"type":"emotion","emotion":…}` protocol
    Legacy(EmotionReading),
    /// Current protocol, but no face was detected in the frame
    NoDetection,
    /// Valid JSON of a shape this client does not know
    Unrecognized,
}

impl InboundResult {
    /// The reading that should become the current emotion, if any
    pub fn reading(&self) -> Option<&EmotionReading> {
        match self {
            InboundResult::Classification { most_common, .. } => Some(most_common),
            InboundResult::Legacy(reading) => Some(reading),
            InboundResult::NoDetection | InboundResult::Unrecognized => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    name: Option<String>,
    index: Option<i64>,
}

/// Union of both protocol shapes; every field optional
#[derive(Debug, Deserialize)]
struct WireInbound {
    #[serde(rename = "type")]
    kind: Option<String>,
    emotion: Option<String>,
    most_common: Option<WireDetection>,
    emotions: Option<Vec<WireDetection>>,
}

/// Decode one inbound payload
///
/// Returns `Err` only for non-JSON or non-object payloads; callers log and
/// drop those.
pub fn decode_inbound(payload: &str) -> Result<InboundResult, serde_json::Error> {
    let wire: WireInbound = serde_json::from_str(payload)?;

    if let Some(most_common) = wire.most_common {
        let Some(label) = most_common.name else {
            return Ok(InboundResult::Unrecognized);
        };
        let detections = wire
            .emotions
            .unwrap_or_default()
            .into_iter()
            .filter_map(|d| d.name.map(|name| EmotionReading::new(name, d.index)))
            .collect();

        return Ok(InboundResult::Classification {
            most_common: EmotionReading::new(label, most_common.index),
            detections,
        });
    }

    if wire.kind.as_deref() == Some("emotion") {
        if let Some(label) = wire.emotion {
            debug!("Inbound message uses legacy emotion protocol");
            return Ok(InboundResult::Legacy(EmotionReading::new(label, None)));
        }
    }

    if wire.emotions.is_some() {
        return Ok(InboundResult::NoDetection);
    }

    warn!("Unrecognized inbound message shape");
    Ok(InboundResult::Unrecognized)
}
