//! Speakerphone routing policy for WebRTC calls on mobile hosts.
//!
//! [`AudioRouteManager`] keeps call audio on the speaker, earpiece or wired
//! headset according to the application's preference and the attached
//! hardware. [`ForcedSpeakerDeviceModule`] wraps the native audio device
//! module and keeps audio on the loudspeaker no matter what is plugged in.

pub mod config;
pub mod device;
pub mod device_module;
pub mod diagnostics;
pub mod error;
pub mod notifications;
pub mod policy;
pub mod route_manager;
pub mod simulated;
pub mod types;

pub use config::{DeviceModuleOptions, RouteConfig};
pub use device::{AudioDeviceService, FocusChangeListener};
pub use device_module::{
    AudioDeviceEventsListener, AudioDeviceModuleFactory, ForcedSpeakerDeviceModule, NativeAudioDeviceModule,
    NativeModuleHandle,
};
pub use diagnostics::{emit_event, DiagnosticsSink, TracingSink};
pub use error::{AudioRouteError, AudioRouteResult};
pub use notifications::{HardwareAction, HardwareChangeListener, HardwareChangeSource, Registration, SubscriptionId};
pub use policy::{compute_route, has_wired_headset, probe_hardware};
pub use route_manager::AudioRouteManager;
pub use types::*;
