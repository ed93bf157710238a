use serde::{Deserialize, Serialize};

/// Event names as seen by the embedding application's event emitter.
pub const AUDIO_ROUTE_CHANGED: &str = "audioRouteChanged";
pub const AUDIO_FOCUS_CHANGED: &str = "audioFocusChanged";
pub const AUDIO_DEVICE_CHANGED: &str = "audioDeviceChanged";
pub const AUDIO_RECORD_STARTED: &str = "audioRecordStarted";
pub const AUDIO_RECORD_STOPPED: &str = "audioRecordStopped";
pub const AUDIO_DEVICE_MODULE_CREATED: &str = "audioDeviceModuleCreated";
pub const AUDIO_DEVICE_MODULE_RELEASED: &str = "audioDeviceModuleReleased";

/// All event names, in emission-table order
pub const ALL_EVENT_NAMES: [&str; 7] = [
    AUDIO_ROUTE_CHANGED,
    AUDIO_FOCUS_CHANGED,
    AUDIO_DEVICE_CHANGED,
    AUDIO_RECORD_STARTED,
    AUDIO_RECORD_STOPPED,
    AUDIO_DEVICE_MODULE_CREATED,
    AUDIO_DEVICE_MODULE_RELEASED,
];

/// A connected audio endpoint as reported to the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPayload {
    pub id: u32,
    pub kind: String,
    pub name: String,
}

/// The route manager applied a route different from the previous one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteChangedPayload {
    pub route: String,
    pub speaker_wanted: bool,
    pub wired_headset: bool,
    pub speakerphone_on: bool,
}

/// The platform reported an audio focus change for the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusChangedPayload {
    pub focus_change: String,
}

/// The wrapped device module reported a device change and speakerphone was forced back on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceChangedPayload {
    pub selected: Option<EndpointPayload>,
    pub available: Vec<EndpointPayload>,
    pub speakerphone_on: bool,
}

/// Audio capture started or stopped inside the wrapped module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub recording: bool,
}

/// Device state captured when the forced-speaker module is constructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshotPayload {
    pub mode: String,
    pub speakerphone_on: bool,
    pub wired_headset: bool,
    pub voice_call_volume: i32,
    pub voice_call_max_volume: i32,
    pub devices: Vec<EndpointPayload>,
}

/// Final notification of a released module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReleasedPayload {
    pub was_recording: bool,
}

/// Events emitted to the embedding application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEvent {
    RouteChanged(RouteChangedPayload),
    FocusChanged(FocusChangedPayload),
    DeviceChanged(DeviceChangedPayload),
    RecordStarted(RecordPayload),
    RecordStopped(RecordPayload),
    ModuleCreated(DeviceSnapshotPayload),
    ModuleReleased(ModuleReleasedPayload),
}

impl RouteEvent {
    /// Name under which the event is emitted
    pub fn name(&self) -> &'static str {
        match self {
            RouteEvent::RouteChanged(_) => AUDIO_ROUTE_CHANGED,
            RouteEvent::FocusChanged(_) => AUDIO_FOCUS_CHANGED,
            RouteEvent::DeviceChanged(_) => AUDIO_DEVICE_CHANGED,
            RouteEvent::RecordStarted(_) => AUDIO_RECORD_STARTED,
            RouteEvent::RecordStopped(_) => AUDIO_RECORD_STOPPED,
            RouteEvent::ModuleCreated(_) => AUDIO_DEVICE_MODULE_CREATED,
            RouteEvent::ModuleReleased(_) => AUDIO_DEVICE_MODULE_RELEASED,
        }
    }

    pub fn is_known_name(name: &str) -> bool {
        ALL_EVENT_NAMES.contains(&name)
    }
}
