use tokio::sync::mpsc;
use tracing::warn;
use webrtc_audio_protocol::decode_event;
use webrtc_audio_route::{AudioRouteError, AudioRouteResult, DiagnosticsSink};

/// An event as handed to the application
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: String,
}

/// Forwards emitted events to the printer task
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EmittedEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<EmittedEvent>) -> Self {
        Self { tx }
    }
}

impl DiagnosticsSink for ChannelSink {
    fn emit(&self, name: &str, payload: &str) -> AudioRouteResult<()> {
        self.tx
            .send(EmittedEvent {
                name: name.to_string(),
                payload: payload.to_string(),
            })
            .map_err(|e| AudioRouteError::Emit {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Print events as `name payload` lines until every sender is gone
pub async fn print_events(mut rx: mpsc::UnboundedReceiver<EmittedEvent>) -> usize {
    let mut count = 0;
    while let Some(event) = rx.recv().await {
        if let Err(e) = decode_event(&event.name, &event.payload) {
            warn!("Emitted event does not decode: {e}");
        }
        println!("{} {}", event.name, event.payload);
        count += 1;
    }
    count
}
