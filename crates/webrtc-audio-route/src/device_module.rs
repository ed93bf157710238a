//! Forced-speaker wrapper around the native WebRTC audio device module.
//!
//! The wrapped module is built with a device-events listener that puts the
//! speakerphone back on after every device change. No headset exception.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use webrtc_audio_protocol::{
    DeviceChangedPayload, DeviceSnapshotPayload, ModuleReleasedPayload, RecordPayload, RouteEvent,
};

use crate::config::DeviceModuleOptions;
use crate::device::AudioDeviceService;
use crate::diagnostics::{emit_event, DiagnosticsSink};
use crate::error::{AudioRouteError, AudioRouteResult};
use crate::policy::probe_hardware;
use crate::types::{AudioEndpoint, AudioMode, ModuleState, StreamType};

/// Opaque pointer to the native module, handed to the peer connection factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeModuleHandle(pub i64);

/// The native audio device module being wrapped
pub trait NativeAudioDeviceModule: Send {
    fn native_handle(&self) -> NativeModuleHandle;

    fn release(&mut self);
}

/// Callbacks from the native module.
///
/// # Arguments (`on_audio_device_changed`)
/// * `selected` - The device audio is now routed to, if known
/// * `available` - All devices the module can route to
pub trait AudioDeviceEventsListener: Send + Sync + 'static {
    fn on_audio_device_changed(&self, selected: Option<&AudioEndpoint>, available: &[AudioEndpoint]);

    fn on_record_start(&self);

    fn on_record_stop(&self);
}

/// Builds the native module with the given listener installed
pub trait AudioDeviceModuleFactory {
    fn create(
        &self,
        options: &DeviceModuleOptions,
        listener: Arc<dyn AudioDeviceEventsListener>,
    ) -> AudioRouteResult<Box<dyn NativeAudioDeviceModule>>;
}

struct ModuleInner {
    state: ModuleState,
    recording: bool,
}

struct ForcedSpeakerEvents {
    service: Arc<dyn AudioDeviceService>,
    sink: Option<Arc<dyn DiagnosticsSink>>,
    inner: Mutex<ModuleInner>,
}

impl ForcedSpeakerEvents {
    fn lock(&self) -> MutexGuard<'_, ModuleInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sink(&self) -> Option<&dyn DiagnosticsSink> {
        self.sink.as_deref()
    }

    /// Communication mode plus speakerphone on. Returns whether speakerphone
    /// was set successfully.
    fn force_speakerphone(&self) -> bool {
        if let Err(e) = self.service.set_mode(AudioMode::InCommunication) {
            warn!("Failed to set communication mode: {e}");
        }
        match self.service.set_speakerphone_on(true) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to force speakerphone: {e}");
                false
            }
        }
    }

    fn snapshot(&self) -> DeviceSnapshotPayload {
        let service = self.service.as_ref();
        let mode = service.mode().unwrap_or_else(|e| {
            warn!("Failed to read audio mode: {e}");
            AudioMode::Normal
        });
        let speakerphone_on = service.is_speakerphone_on().unwrap_or_else(|e| {
            warn!("Failed to read speakerphone state: {e}");
            false
        });
        let voice_call_volume = service.stream_volume(StreamType::VoiceCall).unwrap_or(-1);
        let voice_call_max_volume = service.stream_max_volume(StreamType::VoiceCall).unwrap_or(-1);
        let devices = if service.supports_device_enumeration() {
            service.devices().unwrap_or_default()
        } else {
            Vec::new()
        };

        DeviceSnapshotPayload {
            mode: mode.as_str().to_string(),
            speakerphone_on,
            wired_headset: probe_hardware(service).wired_headset,
            voice_call_volume,
            voice_call_max_volume,
            devices: devices.iter().map(AudioEndpoint::to_payload).collect(),
        }
    }
}

impl AudioDeviceEventsListener for ForcedSpeakerEvents {
    fn on_audio_device_changed(&self, selected: Option<&AudioEndpoint>, available: &[AudioEndpoint]) {
        let inner = self.lock();
        if inner.state == ModuleState::Released {
            debug!("Device change after release, ignoring");
            return;
        }

        debug!(
            "Audio device changed to {:?} ({} available), forcing speakerphone",
            selected.map(|d| d.kind.as_str()),
            available.len()
        );
        let speakerphone_on = self.force_speakerphone();
        emit_event(
            self.sink(),
            RouteEvent::DeviceChanged(DeviceChangedPayload {
                selected: selected.map(AudioEndpoint::to_payload),
                available: available.iter().map(AudioEndpoint::to_payload).collect(),
                speakerphone_on,
            }),
        );
    }

    fn on_record_start(&self) {
        let mut inner = self.lock();
        if inner.state == ModuleState::Released {
            return;
        }
        inner.recording = true;
        info!("Audio recording started");
        emit_event(self.sink(), RouteEvent::RecordStarted(RecordPayload { recording: true }));
    }

    fn on_record_stop(&self) {
        let mut inner = self.lock();
        if inner.state == ModuleState::Released {
            return;
        }
        inner.recording = false;
        info!("Audio recording stopped");
        emit_event(self.sink(), RouteEvent::RecordStopped(RecordPayload { recording: false }));
    }
}

/// Audio device module that keeps audio on the loudspeaker.
///
/// Wraps the native module and releases it exactly once, on
/// [`release`](Self::release) or drop.
pub struct ForcedSpeakerDeviceModule {
    wrapped: Mutex<Option<Box<dyn NativeAudioDeviceModule>>>,
    handle: NativeModuleHandle,
    events: Arc<ForcedSpeakerEvents>,
}

impl ForcedSpeakerDeviceModule {
    /// Build the wrapped module, force the speakerphone on and report the
    /// initial device state.
    pub fn new(
        service: Arc<dyn AudioDeviceService>,
        factory: &dyn AudioDeviceModuleFactory,
        options: DeviceModuleOptions,
        sink: Option<Arc<dyn DiagnosticsSink>>,
    ) -> AudioRouteResult<Self> {
        let sink = if options.emit_events { sink } else { None };
        let events = Arc::new(ForcedSpeakerEvents {
            service,
            sink,
            inner: Mutex::new(ModuleInner {
                state: ModuleState::Constructed,
                recording: false,
            }),
        });

        let wrapped = factory.create(&options, events.clone())?;
        let handle = wrapped.native_handle();
        info!(
            "Audio device module created (aec={}, ns={})",
            options.use_hardware_acoustic_echo_canceler, options.use_hardware_noise_suppressor
        );

        {
            let _inner = events.lock();
            events.force_speakerphone();
            emit_event(events.sink(), RouteEvent::ModuleCreated(events.snapshot()));
        }

        Ok(Self {
            wrapped: Mutex::new(Some(wrapped)),
            handle,
            events,
        })
    }

    /// Pointer to pass to the peer connection factory
    pub fn native_handle(&self) -> AudioRouteResult<NativeModuleHandle> {
        match self.state() {
            ModuleState::Constructed => Ok(self.handle),
            ModuleState::Released => Err(AudioRouteError::Released),
        }
    }

    pub fn state(&self) -> ModuleState {
        self.events.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.events.lock().recording
    }

    /// Release the wrapped module. Terminal; later calls do nothing.
    pub fn release(&self) {
        let was_recording = {
            let mut inner = self.events.lock();
            if inner.state == ModuleState::Released {
                debug!("Audio device module already released");
                return;
            }
            inner.state = ModuleState::Released;
            std::mem::replace(&mut inner.recording, false)
        };

        // Outside the event lock: the native module may call back while stopping.
        let wrapped = self
            .wrapped
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(mut wrapped) = wrapped {
            wrapped.release();
        }

        info!("Audio device module released");
        emit_event(
            self.events.sink(),
            RouteEvent::ModuleReleased(ModuleReleasedPayload { was_recording }),
        );
    }
}

impl Drop for ForcedSpeakerDeviceModule {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{RecordingSink, SimulatedAudioService, SimulatedDeviceModuleFactory};
    use crate::types::AudioDeviceKind;
    use webrtc_audio_protocol::{
        AUDIO_DEVICE_CHANGED, AUDIO_DEVICE_MODULE_CREATED, AUDIO_DEVICE_MODULE_RELEASED,
        AUDIO_RECORD_STARTED,
    };

    struct Harness {
        service: Arc<SimulatedAudioService>,
        factory: SimulatedDeviceModuleFactory,
        sink: Arc<RecordingSink>,
        module: ForcedSpeakerDeviceModule,
    }

    fn harness(options: DeviceModuleOptions) -> Harness {
        let service = Arc::new(SimulatedAudioService::new());
        let factory = SimulatedDeviceModuleFactory::new();
        let sink = Arc::new(RecordingSink::new());
        let module =
            ForcedSpeakerDeviceModule::new(service.clone(), &factory, options, Some(sink.clone()))
                .unwrap();
        Harness {
            service,
            factory,
            sink,
            module,
        }
    }

    #[test]
    fn test_construction_forces_speaker() {
        let h = harness(DeviceModuleOptions::default());

        assert_eq!(h.module.state(), ModuleState::Constructed);
        assert_eq!(h.service.mode().unwrap(), AudioMode::InCommunication);
        assert!(h.service.is_speakerphone_on().unwrap());
        assert!(h.module.native_handle().is_ok());

        let options = h.factory.last_options().unwrap();
        assert!(options.use_hardware_acoustic_echo_canceler);
        assert!(options.use_hardware_noise_suppressor);
    }

    #[test]
    fn test_initial_snapshot_reported() {
        let h = harness(DeviceModuleOptions::default());

        assert_eq!(h.sink.names(), vec![AUDIO_DEVICE_MODULE_CREATED.to_string()]);
        match h.sink.events().remove(0) {
            RouteEvent::ModuleCreated(snapshot) => {
                assert_eq!(snapshot.mode, "in_communication");
                assert!(snapshot.speakerphone_on);
                assert!(!snapshot.wired_headset);
                assert_eq!(snapshot.voice_call_volume, 4);
                assert_eq!(snapshot.voice_call_max_volume, 5);
                assert_eq!(snapshot.devices.len(), 3);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_device_change_forces_speaker_even_with_headset() {
        let h = harness(DeviceModuleOptions::default());
        let id = h.service.plug_wired_headset();
        h.service.set_speakerphone_on(false).unwrap();

        let available = h.service.endpoints();
        let headset = available.iter().find(|d| d.id == id).cloned();
        h.factory.device_changed(headset.as_ref(), &available);

        assert!(h.service.is_speakerphone_on().unwrap());
        let last = h.sink.events().pop().unwrap();
        match last {
            RouteEvent::DeviceChanged(p) => {
                assert!(p.speakerphone_on);
                assert_eq!(p.selected.unwrap().kind, AudioDeviceKind::WiredHeadset.as_str());
                assert_eq!(p.available.len(), 4);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_every_device_change_reapplies() {
        let h = harness(DeviceModuleOptions::default());
        for _ in 0..3 {
            h.service.set_speakerphone_on(false).unwrap();
            h.factory.device_changed(None, &[]);
            assert!(h.service.is_speakerphone_on().unwrap());
        }
        let changes = h.sink.names().iter().filter(|n| *n == AUDIO_DEVICE_CHANGED).count();
        assert_eq!(changes, 3);
    }

    #[test]
    fn test_recording_tracked() {
        let h = harness(DeviceModuleOptions::default());
        h.factory.record_start();
        assert!(h.module.is_recording());
        assert!(h.sink.names().contains(&AUDIO_RECORD_STARTED.to_string()));

        h.factory.record_stop();
        assert!(!h.module.is_recording());
    }

    #[test]
    fn test_release_is_terminal() {
        let h = harness(DeviceModuleOptions::default());
        h.factory.record_start();
        h.module.release();

        assert_eq!(h.module.state(), ModuleState::Released);
        assert!(h.factory.is_released());
        assert!(matches!(h.module.native_handle(), Err(AudioRouteError::Released)));
        assert!(!h.module.is_recording());

        match h.sink.events().pop().unwrap() {
            RouteEvent::ModuleReleased(p) => assert!(p.was_recording),
            other => panic!("unexpected event {other:?}"),
        }

        h.module.release();
        let released = h
            .sink
            .names()
            .iter()
            .filter(|n| *n == AUDIO_DEVICE_MODULE_RELEASED)
            .count();
        assert_eq!(released, 1);
    }

    #[test]
    fn test_callbacks_after_release_ignored() {
        let factory = SimulatedDeviceModuleFactory::new();
        let service = Arc::new(SimulatedAudioService::new());
        let module =
            ForcedSpeakerDeviceModule::new(service.clone(), &factory, DeviceModuleOptions::default(), None)
                .unwrap();
        let listener = factory.last_listener().unwrap();
        module.release();
        let before = service.call_count("set_speakerphone_on");

        listener.on_audio_device_changed(None, &[]);
        listener.on_record_start();
        assert_eq!(service.call_count("set_speakerphone_on"), before);
        assert!(!module.is_recording());
    }

    #[test]
    fn test_creation_failure() {
        let factory = SimulatedDeviceModuleFactory::new();
        factory.fail_creation(true);
        let result = ForcedSpeakerDeviceModule::new(
            Arc::new(SimulatedAudioService::new()),
            &factory,
            DeviceModuleOptions::default(),
            None,
        );
        assert!(matches!(result, Err(AudioRouteError::ModuleCreation(_))));
    }

    #[test]
    fn test_drop_releases_wrapped_module() {
        let factory = SimulatedDeviceModuleFactory::new();
        {
            let _module = ForcedSpeakerDeviceModule::new(
                Arc::new(SimulatedAudioService::new()),
                &factory,
                DeviceModuleOptions::default(),
                None,
            )
            .unwrap();
        }
        assert!(factory.is_released());
    }

    #[test]
    fn test_emit_disabled_and_failing_sink() {
        let h = harness(DeviceModuleOptions {
            emit_events: false,
            ..DeviceModuleOptions::default()
        });
        h.factory.device_changed(None, &[]);
        assert!(h.sink.names().is_empty());

        let h = harness(DeviceModuleOptions::default());
        h.sink.fail(true);
        h.service.set_speakerphone_on(false).unwrap();
        h.factory.device_changed(None, &[]);
        assert!(h.service.is_speakerphone_on().unwrap());
    }
}
