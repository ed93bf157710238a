use tracing::warn;
use webrtc_audio_protocol::EndpointPayload;

/// Physical output destination for call audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Speaker,
    WiredHeadset,
    Earpiece,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Speaker => "speaker",
            Route::WiredHeadset => "wired_headset",
            Route::Earpiece => "earpiece",
        }
    }

    /// Speakerphone flag that realizes this route
    pub fn speakerphone_on(self) -> bool {
        matches!(self, Route::Speaker)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform audio mode (`AudioManager.MODE_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    Normal,
    Ringtone,
    InCall,
    InCommunication,
}

impl AudioMode {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => AudioMode::Ringtone,
            2 => AudioMode::InCall,
            3 => AudioMode::InCommunication,
            0 => AudioMode::Normal,
            other => {
                warn!("Unknown audio mode {other}, treating as normal");
                AudioMode::Normal
            }
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            AudioMode::Normal => 0,
            AudioMode::Ringtone => 1,
            AudioMode::InCall => 2,
            AudioMode::InCommunication => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AudioMode::Normal => "normal",
            AudioMode::Ringtone => "ringtone",
            AudioMode::InCall => "in_call",
            AudioMode::InCommunication => "in_communication",
        }
    }
}

/// Platform audio stream (`AudioManager.STREAM_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    VoiceCall,
    Ring,
    Music,
}

impl StreamType {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(StreamType::VoiceCall),
            2 => Some(StreamType::Ring),
            3 => Some(StreamType::Music),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            StreamType::VoiceCall => 0,
            StreamType::Ring => 2,
            StreamType::Music => 3,
        }
    }
}

/// Requested audio focus gain (`AudioManager.AUDIOFOCUS_GAIN*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusGain {
    Gain,
    Transient,
    TransientMayDuck,
    TransientExclusive,
}

impl FocusGain {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(FocusGain::Gain),
            2 => Some(FocusGain::Transient),
            3 => Some(FocusGain::TransientMayDuck),
            4 => Some(FocusGain::TransientExclusive),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            FocusGain::Gain => 1,
            FocusGain::Transient => 2,
            FocusGain::TransientMayDuck => 3,
            FocusGain::TransientExclusive => 4,
        }
    }

    /// Parse a config value such as `transient_may_duck`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gain" => Some(FocusGain::Gain),
            "transient" => Some(FocusGain::Transient),
            "transient_may_duck" => Some(FocusGain::TransientMayDuck),
            "transient_exclusive" => Some(FocusGain::TransientExclusive),
            _ => None,
        }
    }
}

/// Outcome of a focus request (`AudioManager.AUDIOFOCUS_REQUEST_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusRequestResult {
    Failed,
    Granted,
    Delayed,
}

impl FocusRequestResult {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => FocusRequestResult::Granted,
            2 => FocusRequestResult::Delayed,
            _ => FocusRequestResult::Failed,
        }
    }

    pub fn is_granted(self) -> bool {
        matches!(self, FocusRequestResult::Granted)
    }
}

/// Focus change delivered by the platform after a request was made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    Gain,
    Loss,
    LossTransient,
    LossTransientCanDuck,
}

impl FocusChange {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 | 2 | 3 | 4 => Some(FocusChange::Gain),
            -1 => Some(FocusChange::Loss),
            -2 => Some(FocusChange::LossTransient),
            -3 => Some(FocusChange::LossTransientCanDuck),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FocusChange::Gain => "gain",
            FocusChange::Loss => "loss",
            FocusChange::LossTransient => "loss_transient",
            FocusChange::LossTransientCanDuck => "loss_transient_can_duck",
        }
    }
}

/// Endpoint classification (`AudioDeviceInfo.TYPE_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioDeviceKind {
    BuiltinEarpiece,
    BuiltinSpeaker,
    BuiltinMic,
    WiredHeadset,
    WiredHeadphones,
    BluetoothSco,
    BluetoothA2dp,
    UsbDevice,
    UsbHeadset,
    Unknown,
}

impl AudioDeviceKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => AudioDeviceKind::BuiltinEarpiece,
            2 => AudioDeviceKind::BuiltinSpeaker,
            3 => AudioDeviceKind::WiredHeadset,
            4 => AudioDeviceKind::WiredHeadphones,
            7 => AudioDeviceKind::BluetoothSco,
            8 => AudioDeviceKind::BluetoothA2dp,
            11 => AudioDeviceKind::UsbDevice,
            15 => AudioDeviceKind::BuiltinMic,
            22 => AudioDeviceKind::UsbHeadset,
            _ => AudioDeviceKind::Unknown,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            AudioDeviceKind::BuiltinEarpiece => 1,
            AudioDeviceKind::BuiltinSpeaker => 2,
            AudioDeviceKind::WiredHeadset => 3,
            AudioDeviceKind::WiredHeadphones => 4,
            AudioDeviceKind::BluetoothSco => 7,
            AudioDeviceKind::BluetoothA2dp => 8,
            AudioDeviceKind::UsbDevice => 11,
            AudioDeviceKind::BuiltinMic => 15,
            AudioDeviceKind::UsbHeadset => 22,
            AudioDeviceKind::Unknown => 0,
        }
    }

    /// Wired headsets and wired headphones both count; USB headsets do not.
    pub fn is_wired_headset(self) -> bool {
        matches!(self, AudioDeviceKind::WiredHeadset | AudioDeviceKind::WiredHeadphones)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AudioDeviceKind::BuiltinEarpiece => "builtin_earpiece",
            AudioDeviceKind::BuiltinSpeaker => "builtin_speaker",
            AudioDeviceKind::BuiltinMic => "builtin_mic",
            AudioDeviceKind::WiredHeadset => "wired_headset",
            AudioDeviceKind::WiredHeadphones => "wired_headphones",
            AudioDeviceKind::BluetoothSco => "bluetooth_sco",
            AudioDeviceKind::BluetoothA2dp => "bluetooth_a2dp",
            AudioDeviceKind::UsbDevice => "usb_device",
            AudioDeviceKind::UsbHeadset => "usb_headset",
            AudioDeviceKind::Unknown => "unknown",
        }
    }
}

/// A connected audio endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioEndpoint {
    pub id: u32,
    pub kind: AudioDeviceKind,
    pub name: String,
}

impl AudioEndpoint {
    pub fn new(id: u32, kind: AudioDeviceKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
        }
    }

    pub fn to_payload(&self) -> EndpointPayload {
        EndpointPayload {
            id: self.id,
            kind: self.kind.as_str().to_string(),
            name: self.name.clone(),
        }
    }
}

/// Whether the route manager holds focus and a hardware listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Inactive,
    Active,
}

/// Lifecycle of the forced-speaker device module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Constructed,
    Released,
}

/// Point-in-time view of the hardware relevant to routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareSnapshot {
    pub wired_headset: bool,
}

/// The application's speaker preference for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingPreference {
    pub speaker_wanted: bool,
}

impl RoutingPreference {
    pub fn new(speaker_wanted: bool) -> Self {
        Self { speaker_wanted }
    }
}

impl Default for RoutingPreference {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kind_raw_values() {
        for kind in [
            AudioDeviceKind::BuiltinEarpiece,
            AudioDeviceKind::BuiltinSpeaker,
            AudioDeviceKind::WiredHeadset,
            AudioDeviceKind::WiredHeadphones,
            AudioDeviceKind::BluetoothSco,
            AudioDeviceKind::UsbHeadset,
        ] {
            assert_eq!(AudioDeviceKind::from_raw(kind.to_raw()), kind);
        }
        assert_eq!(AudioDeviceKind::from_raw(3), AudioDeviceKind::WiredHeadset);
        assert_eq!(AudioDeviceKind::from_raw(4), AudioDeviceKind::WiredHeadphones);
        assert_eq!(AudioDeviceKind::from_raw(999), AudioDeviceKind::Unknown);
    }

    #[test]
    fn test_mode_and_stream_constants() {
        assert_eq!(AudioMode::InCommunication.to_raw(), 3);
        assert_eq!(AudioMode::from_raw(0), AudioMode::Normal);
        assert_eq!(StreamType::VoiceCall.to_raw(), 0);
        assert_eq!(StreamType::from_raw(3), Some(StreamType::Music));
        assert_eq!(StreamType::from_raw(42), None);
        assert_eq!(FocusGain::Transient.to_raw(), 2);
    }

    #[test]
    fn test_raw_conversions_both_ways() {
        for gain in [
            FocusGain::Gain,
            FocusGain::Transient,
            FocusGain::TransientMayDuck,
            FocusGain::TransientExclusive,
        ] {
            assert_eq!(FocusGain::from_raw(gain.to_raw()), Some(gain));
        }
        assert_eq!(FocusGain::from_raw(0), None);

        for mode in [AudioMode::Normal, AudioMode::Ringtone, AudioMode::InCall, AudioMode::InCommunication] {
            assert_eq!(AudioMode::from_raw(mode.to_raw()), mode);
        }
        assert_eq!(AudioMode::from_raw(4), AudioMode::Normal);
        assert_eq!(AudioMode::from_raw(-2), AudioMode::Normal);
    }

    #[test]
    fn test_focus_values() {
        assert_eq!(FocusRequestResult::from_raw(1), FocusRequestResult::Granted);
        assert!(!FocusRequestResult::from_raw(0).is_granted());
        assert_eq!(FocusChange::from_raw(-2), Some(FocusChange::LossTransient));
        assert_eq!(FocusChange::from_raw(2), Some(FocusChange::Gain));
        assert_eq!(FocusChange::from_raw(0), None);
        assert_eq!(FocusGain::parse(" Transient_May_Duck "), Some(FocusGain::TransientMayDuck));
    }

    #[test]
    fn test_route_speakerphone_flag() {
        assert!(Route::Speaker.speakerphone_on());
        assert!(!Route::Earpiece.speakerphone_on());
        assert!(!Route::WiredHeadset.speakerphone_on());
        assert_eq!(Route::WiredHeadset.to_string(), "wired_headset");
    }

    #[test]
    fn test_endpoint_payload() {
        let payload = AudioEndpoint::new(5, AudioDeviceKind::BluetoothSco, "Car").to_payload();
        assert_eq!(payload.kind, "bluetooth_sco");
        assert_eq!(payload.kind, AudioDeviceKind::BluetoothSco.as_str());
        assert_eq!(payload.name, "Car");
        assert_eq!(payload.id, 5);
    }
}
