//! Capability interface over the platform audio service.
//!
//! Implementations wrap the host's audio manager (JNI-bridged on Android,
//! in-memory in [`crate::simulated`]). Every method is a single platform call;
//! callers decide how failures are handled.

use std::sync::Arc;

use crate::error::AudioRouteResult;
use crate::types::{AudioEndpoint, AudioMode, FocusChange, FocusGain, FocusRequestResult, StreamType};

/// Receives focus changes for a granted focus request
pub trait FocusChangeListener: Send + Sync + 'static {
    fn on_audio_focus_change(&self, change: FocusChange);
}

/// The platform audio service used for routing.
pub trait AudioDeviceService: Send + Sync + 'static {
    fn mode(&self) -> AudioRouteResult<AudioMode>;

    fn set_mode(&self, mode: AudioMode) -> AudioRouteResult<()>;

    fn is_speakerphone_on(&self) -> AudioRouteResult<bool>;

    fn set_speakerphone_on(&self, on: bool) -> AudioRouteResult<()>;

    /// Whether [`devices`](Self::devices) is available. Older platforms only
    /// answer [`is_wired_headset_on`](Self::is_wired_headset_on).
    fn supports_device_enumeration(&self) -> bool {
        true
    }

    /// Enumerate all connected input and output endpoints
    fn devices(&self) -> AudioRouteResult<Vec<AudioEndpoint>>;

    /// Legacy headset probe for platforms without endpoint enumeration
    fn is_wired_headset_on(&self) -> AudioRouteResult<bool>;

    fn stream_volume(&self, stream: StreamType) -> AudioRouteResult<i32>;

    fn stream_max_volume(&self, stream: StreamType) -> AudioRouteResult<i32>;

    fn request_audio_focus(
        &self,
        listener: Arc<dyn FocusChangeListener>,
        stream: StreamType,
        gain: FocusGain,
    ) -> AudioRouteResult<FocusRequestResult>;

    fn abandon_audio_focus(&self) -> AudioRouteResult<()>;
}
