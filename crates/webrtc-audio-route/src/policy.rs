//! The route decision.
//!
//! [`compute_route`] is pure; [`probe_hardware`] is the only part that talks
//! to the platform, and it never fails.

use tracing::warn;

use crate::device::AudioDeviceService;
use crate::types::{AudioEndpoint, HardwareSnapshot, Route, RoutingPreference};

/// Decide the output route. A wired headset always wins over the preference.
pub fn compute_route(preference: RoutingPreference, hardware: HardwareSnapshot) -> Route {
    if hardware.wired_headset {
        Route::WiredHeadset
    } else if preference.speaker_wanted {
        Route::Speaker
    } else {
        Route::Earpiece
    }
}

/// True iff any endpoint is a wired headset or wired headphones
pub fn has_wired_headset(endpoints: &[AudioEndpoint]) -> bool {
    endpoints.iter().any(|e| e.kind.is_wired_headset())
}

/// Poll the platform for the current hardware state.
///
/// A failed query is logged and treated as "no headset".
pub fn probe_hardware(service: &dyn AudioDeviceService) -> HardwareSnapshot {
    let wired_headset = if service.supports_device_enumeration() {
        match service.devices() {
            Ok(devices) => has_wired_headset(&devices),
            Err(e) => {
                warn!("Failed to enumerate audio devices: {e}");
                false
            }
        }
    } else {
        match service.is_wired_headset_on() {
            Ok(on) => on,
            Err(e) => {
                warn!("Failed to query wired headset state: {e}");
                false
            }
        }
    };

    HardwareSnapshot { wired_headset }
}
