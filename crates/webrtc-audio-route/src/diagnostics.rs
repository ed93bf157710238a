//! Event emission to the embedding application.
//!
//! A sink failure is logged here and goes no further.

use tracing::{error, info};
use webrtc_audio_protocol::{encode_event, RouteEvent};

use crate::error::AudioRouteResult;

/// One-way emitter of named events with a string payload
pub trait DiagnosticsSink: Send + Sync + 'static {
    fn emit(&self, name: &str, payload: &str) -> AudioRouteResult<()>;
}

/// Writes events to the log instead of an application
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&self, name: &str, payload: &str) -> AudioRouteResult<()> {
        info!(target: "webrtc_audio_route::events", "{name}: {payload}");
        Ok(())
    }
}

/// Encode and emit an event, logging any failure
pub fn emit_event(sink: Option<&dyn DiagnosticsSink>, event: RouteEvent) {
    let Some(sink) = sink else {
        return;
    };

    let encoded = match encode_event(&event) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("Failed to encode {}: {e}", event.name());
            return;
        }
    };

    if let Err(e) = sink.emit(encoded.name, &encoded.payload) {
        error!("Failed to emit {} event: {e}", encoded.name);
    }
}
