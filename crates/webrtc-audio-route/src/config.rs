//! Configuration for the route manager and the forced-speaker device module.

use tracing::warn;

use crate::types::{AudioMode, FocusGain, StreamType};

pub const ENV_SPEAKER_DEFAULT: &str = "WEBRTC_AUDIO_SPEAKER_DEFAULT";
pub const ENV_FOCUS_GAIN: &str = "WEBRTC_AUDIO_FOCUS_GAIN";
pub const ENV_EMIT_EVENTS: &str = "WEBRTC_AUDIO_EMIT_EVENTS";
pub const ENV_HW_AEC: &str = "WEBRTC_AUDIO_HW_AEC";
pub const ENV_HW_NS: &str = "WEBRTC_AUDIO_HW_NS";

/// Route manager configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteConfig {
    /// Initial speaker preference
    pub speaker_wanted: bool,
    /// Mode entered on `start()`
    pub session_mode: AudioMode,
    /// Mode restored on `stop()`
    pub idle_mode: AudioMode,
    pub focus_stream: StreamType,
    pub focus_gain: FocusGain,
    /// Emit events to the configured sink
    pub emit_events: bool,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            speaker_wanted: true,
            session_mode: AudioMode::InCommunication,
            idle_mode: AudioMode::Normal,
            focus_stream: StreamType::VoiceCall,
            focus_gain: FocusGain::Transient,
            emit_events: true,
        }
    }
}

impl RouteConfig {
    /// Load overrides from environment variables
    /// Set WEBRTC_AUDIO_SPEAKER_DEFAULT=false to start on the earpiece
    /// Set WEBRTC_AUDIO_FOCUS_GAIN=transient_exclusive
    /// Set WEBRTC_AUDIO_EMIT_EVENTS=false to silence the event sink
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let focus_gain = match std::env::var(ENV_FOCUS_GAIN).ok() {
            Some(raw) => FocusGain::parse(&raw).unwrap_or_else(|| {
                warn!("Ignoring {}={:?}, using {:?}", ENV_FOCUS_GAIN, raw, defaults.focus_gain);
                defaults.focus_gain
            }),
            None => defaults.focus_gain,
        };

        Self {
            speaker_wanted: env_flag(ENV_SPEAKER_DEFAULT, defaults.speaker_wanted),
            focus_gain,
            emit_events: env_flag(ENV_EMIT_EVENTS, defaults.emit_events),
            ..defaults
        }
    }

    pub fn with_speaker_wanted(mut self, wanted: bool) -> Self {
        self.speaker_wanted = wanted;
        self
    }

    pub fn with_focus_gain(mut self, gain: FocusGain) -> Self {
        self.focus_gain = gain;
        self
    }

    pub fn with_emit_events(mut self, enabled: bool) -> Self {
        self.emit_events = enabled;
        self
    }
}

/// Options for the wrapped native audio device module
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceModuleOptions {
    pub use_hardware_acoustic_echo_canceler: bool,
    pub use_hardware_noise_suppressor: bool,
    pub emit_events: bool,
}

impl Default for DeviceModuleOptions {
    fn default() -> Self {
        Self {
            use_hardware_acoustic_echo_canceler: true,
            use_hardware_noise_suppressor: true,
            emit_events: true,
        }
    }
}

impl DeviceModuleOptions {
    /// Load overrides from WEBRTC_AUDIO_HW_AEC, WEBRTC_AUDIO_HW_NS and
    /// WEBRTC_AUDIO_EMIT_EVENTS
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            use_hardware_acoustic_echo_canceler: env_flag(
                ENV_HW_AEC,
                defaults.use_hardware_acoustic_echo_canceler,
            ),
            use_hardware_noise_suppressor: env_flag(ENV_HW_NS, defaults.use_hardware_noise_suppressor),
            emit_events: env_flag(ENV_EMIT_EVENTS, defaults.emit_events),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw).unwrap_or_else(|| {
            warn!("Ignoring {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
