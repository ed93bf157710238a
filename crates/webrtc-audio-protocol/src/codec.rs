//! String payload encoding for events handed to the embedding application.
//!
//! Every payload is a JSON object of the form
//! `{"emitted_at": "<rfc3339>", "data": {...}}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::events::*;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown event name: {0}")]
    UnknownEvent(String),

    #[error("Malformed payload for {name}: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {name}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Serialize)]
struct OutgoingEnvelope<'a, T> {
    emitted_at: String,
    data: &'a T,
}

#[derive(Deserialize)]
struct IncomingEnvelope<T> {
    data: T,
}

/// An event encoded for emission: the event name plus its string payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent {
    pub name: &'static str,
    pub payload: String,
}

fn wrap<T: Serialize>(name: &'static str, data: &T) -> ProtocolResult<EncodedEvent> {
    let envelope = OutgoingEnvelope {
        emitted_at: chrono::Utc::now().to_rfc3339(),
        data,
    };
    let payload = serde_json::to_string(&envelope).map_err(|source| ProtocolError::Serialize {
        name: name.to_string(),
        source,
    })?;
    Ok(EncodedEvent { name, payload })
}

fn unwrap_payload<T: DeserializeOwned>(name: &str, payload: &str) -> ProtocolResult<T> {
    serde_json::from_str::<IncomingEnvelope<T>>(payload)
        .map(|envelope| envelope.data)
        .map_err(|source| ProtocolError::Malformed {
            name: name.to_string(),
            source,
        })
}

/// Encode an event into its name and string payload
pub fn encode_event(event: &RouteEvent) -> ProtocolResult<EncodedEvent> {
    let name = event.name();
    let encoded = match event {
        RouteEvent::RouteChanged(p) => wrap(name, p),
        RouteEvent::FocusChanged(p) => wrap(name, p),
        RouteEvent::DeviceChanged(p) => wrap(name, p),
        RouteEvent::RecordStarted(p) | RouteEvent::RecordStopped(p) => wrap(name, p),
        RouteEvent::ModuleCreated(p) => wrap(name, p),
        RouteEvent::ModuleReleased(p) => wrap(name, p),
    }?;
    debug!("Encoded {} ({} bytes)", name, encoded.payload.len());
    Ok(encoded)
}

/// Decode a named string payload back into an event
pub fn decode_event(name: &str, payload: &str) -> ProtocolResult<RouteEvent> {
    match name {
        AUDIO_ROUTE_CHANGED => unwrap_payload(name, payload).map(RouteEvent::RouteChanged),
        AUDIO_FOCUS_CHANGED => unwrap_payload(name, payload).map(RouteEvent::FocusChanged),
        AUDIO_DEVICE_CHANGED => unwrap_payload(name, payload).map(RouteEvent::DeviceChanged),
        AUDIO_RECORD_STARTED => unwrap_payload(name, payload).map(RouteEvent::RecordStarted),
        AUDIO_RECORD_STOPPED => unwrap_payload(name, payload).map(RouteEvent::RecordStopped),
        AUDIO_DEVICE_MODULE_CREATED => unwrap_payload(name, payload).map(RouteEvent::ModuleCreated),
        AUDIO_DEVICE_MODULE_RELEASED => unwrap_payload(name, payload).map(RouteEvent::ModuleReleased),
        other => Err(ProtocolError::UnknownEvent(other.to_string())),
    }
}
