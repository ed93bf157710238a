//! In-memory platform: audio service, headset broadcasts, a wrapped device
//! module and a recording event sink.
//!
//! Used by the simulator host and by tests. Callbacks are always invoked
//! outside the simulator's own locks, like a platform dispatching from its
//! own thread.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use webrtc_audio_protocol::{decode_event, RouteEvent};

use crate::config::DeviceModuleOptions;
use crate::device::{AudioDeviceService, FocusChangeListener};
use crate::device_module::{
    AudioDeviceEventsListener, AudioDeviceModuleFactory, NativeAudioDeviceModule, NativeModuleHandle,
};
use crate::diagnostics::DiagnosticsSink;
use crate::error::{AudioRouteError, AudioRouteResult};
use crate::notifications::{HardwareAction, HardwareChangeListener, HardwareChangeSource, SubscriptionId};
use crate::types::{
    AudioDeviceKind, AudioEndpoint, AudioMode, FocusChange, FocusGain, FocusRequestResult, StreamType,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ─── Audio service ─────────────────────────────────────────────────────────

struct ServiceState {
    mode: AudioMode,
    speakerphone_on: bool,
    speakerphone_history: Vec<bool>,
    devices: Vec<AudioEndpoint>,
    next_device_id: u32,
    focus_listener: Option<Arc<dyn FocusChangeListener>>,
    focus_result: FocusRequestResult,
    volumes: HashMap<StreamType, (i32, i32)>,
    fail: bool,
    calls: HashMap<&'static str, usize>,
}

/// In-memory audio manager with a built-in earpiece, speaker and mic
pub struct SimulatedAudioService {
    enumeration: bool,
    state: Mutex<ServiceState>,
}

impl SimulatedAudioService {
    pub fn new() -> Self {
        Self::with_enumeration(true)
    }

    /// A platform without endpoint enumeration
    pub fn legacy() -> Self {
        Self::with_enumeration(false)
    }

    fn with_enumeration(enumeration: bool) -> Self {
        let devices = vec![
            AudioEndpoint::new(1, AudioDeviceKind::BuiltinEarpiece, "Earpiece"),
            AudioEndpoint::new(2, AudioDeviceKind::BuiltinSpeaker, "Speaker"),
            AudioEndpoint::new(3, AudioDeviceKind::BuiltinMic, "Microphone"),
        ];
        let volumes = HashMap::from([
            (StreamType::VoiceCall, (4, 5)),
            (StreamType::Ring, (5, 7)),
            (StreamType::Music, (8, 15)),
        ]);
        Self {
            enumeration,
            state: Mutex::new(ServiceState {
                mode: AudioMode::Normal,
                speakerphone_on: false,
                speakerphone_history: Vec::new(),
                devices,
                next_device_id: 100,
                focus_listener: None,
                focus_result: FocusRequestResult::Granted,
                volumes,
                fail: false,
                calls: HashMap::new(),
            }),
        }
    }

    /// Record a call and fail it if failures are switched on
    fn call(&self, name: &'static str) -> AudioRouteResult<MutexGuard<'_, ServiceState>> {
        let mut state = lock(&self.state);
        *state.calls.entry(name).or_insert(0) += 1;
        if state.fail {
            return Err(AudioRouteError::Platform(format!("{name} unavailable")));
        }
        Ok(state)
    }

    pub fn add_device(&self, kind: AudioDeviceKind, name: &str) -> u32 {
        let mut state = lock(&self.state);
        let id = state.next_device_id;
        state.next_device_id += 1;
        state.devices.push(AudioEndpoint::new(id, kind, name));
        debug!("Simulated device attached: {} ({})", name, kind.as_str());
        id
    }

    pub fn remove_device(&self, id: u32) -> bool {
        let mut state = lock(&self.state);
        let before = state.devices.len();
        state.devices.retain(|d| d.id != id);
        state.devices.len() != before
    }

    pub fn plug_wired_headset(&self) -> u32 {
        self.add_device(AudioDeviceKind::WiredHeadset, "Wired headset")
    }

    /// Detach every wired headset and wired headphones endpoint
    pub fn unplug_wired_headset(&self) {
        lock(&self.state).devices.retain(|d| !d.kind.is_wired_headset());
    }

    pub fn endpoints(&self) -> Vec<AudioEndpoint> {
        lock(&self.state).devices.clone()
    }

    pub fn set_focus_result(&self, result: FocusRequestResult) {
        lock(&self.state).focus_result = result;
    }

    /// Make every platform call fail from now on
    pub fn fail_calls(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    pub fn call_count(&self, name: &str) -> usize {
        lock(&self.state).calls.get(name).copied().unwrap_or(0)
    }

    pub fn speakerphone_history(&self) -> Vec<bool> {
        lock(&self.state).speakerphone_history.clone()
    }

    pub fn focus_held(&self) -> bool {
        lock(&self.state).focus_listener.is_some()
    }

    /// Deliver a focus change to the current focus holder
    pub fn deliver_focus_change(&self, change: FocusChange) {
        let listener = lock(&self.state).focus_listener.clone();
        if let Some(listener) = listener {
            listener.on_audio_focus_change(change);
        }
    }
}

impl Default for SimulatedAudioService {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDeviceService for SimulatedAudioService {
    fn mode(&self) -> AudioRouteResult<AudioMode> {
        Ok(self.call("mode")?.mode)
    }

    fn set_mode(&self, mode: AudioMode) -> AudioRouteResult<()> {
        self.call("set_mode")?.mode = mode;
        Ok(())
    }

    fn is_speakerphone_on(&self) -> AudioRouteResult<bool> {
        Ok(self.call("is_speakerphone_on")?.speakerphone_on)
    }

    fn set_speakerphone_on(&self, on: bool) -> AudioRouteResult<()> {
        let mut state = self.call("set_speakerphone_on")?;
        state.speakerphone_on = on;
        state.speakerphone_history.push(on);
        Ok(())
    }

    fn supports_device_enumeration(&self) -> bool {
        self.enumeration
    }

    fn devices(&self) -> AudioRouteResult<Vec<AudioEndpoint>> {
        if !self.enumeration {
            return Err(AudioRouteError::Platform("device enumeration not supported".into()));
        }
        Ok(self.call("devices")?.devices.clone())
    }

    fn is_wired_headset_on(&self) -> AudioRouteResult<bool> {
        let state = self.call("is_wired_headset_on")?;
        Ok(state.devices.iter().any(|d| d.kind.is_wired_headset()))
    }

    fn stream_volume(&self, stream: StreamType) -> AudioRouteResult<i32> {
        let state = self.call("stream_volume")?;
        Ok(state.volumes.get(&stream).map(|v| v.0).unwrap_or(0))
    }

    fn stream_max_volume(&self, stream: StreamType) -> AudioRouteResult<i32> {
        let state = self.call("stream_max_volume")?;
        Ok(state.volumes.get(&stream).map(|v| v.1).unwrap_or(0))
    }

    fn request_audio_focus(
        &self,
        listener: Arc<dyn FocusChangeListener>,
        stream: StreamType,
        gain: FocusGain,
    ) -> AudioRouteResult<FocusRequestResult> {
        let mut state = self.call("request_audio_focus")?;
        debug!("Focus requested on stream {} with gain {}", stream.to_raw(), gain.to_raw());
        let result = state.focus_result;
        if result.is_granted() {
            state.focus_listener = Some(listener);
        }
        Ok(result)
    }

    fn abandon_audio_focus(&self) -> AudioRouteResult<()> {
        self.call("abandon_audio_focus")?.focus_listener = None;
        Ok(())
    }
}

// ─── Headset broadcasts ────────────────────────────────────────────────────

struct BroadcastState {
    listeners: BTreeMap<SubscriptionId, Arc<dyn HardwareChangeListener>>,
    next_id: u64,
    sticky: Option<HardwareAction>,
    subscribes: usize,
    unsubscribes: usize,
}

/// Headset plug broadcast source
pub struct SimulatedHeadsetBroadcasts {
    state: Mutex<BroadcastState>,
}

impl SimulatedHeadsetBroadcasts {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BroadcastState {
                listeners: BTreeMap::new(),
                next_id: 1,
                sticky: None,
                subscribes: 0,
                unsubscribes: 0,
            }),
        }
    }

    /// Action delivered to every new subscriber from inside `subscribe`
    pub fn set_sticky(&self, action: Option<HardwareAction>) {
        lock(&self.state).sticky = action;
    }

    /// Deliver an action to all current listeners
    pub fn broadcast(&self, action: &HardwareAction) {
        for listener in self.listeners() {
            listener.on_hardware_changed(action);
        }
    }

    pub fn listeners(&self) -> Vec<Arc<dyn HardwareChangeListener>> {
        lock(&self.state).listeners.values().cloned().collect()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    pub fn subscribe_count(&self) -> usize {
        lock(&self.state).subscribes
    }

    pub fn unsubscribe_count(&self) -> usize {
        lock(&self.state).unsubscribes
    }

    /// Drop all listeners without telling their owners
    pub fn forget_all(&self) {
        lock(&self.state).listeners.clear();
    }
}

impl Default for SimulatedHeadsetBroadcasts {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareChangeSource for SimulatedHeadsetBroadcasts {
    fn subscribe(&self, listener: Arc<dyn HardwareChangeListener>) -> AudioRouteResult<SubscriptionId> {
        let (id, sticky) = {
            let mut state = lock(&self.state);
            let id = SubscriptionId(state.next_id);
            state.next_id += 1;
            state.subscribes += 1;
            state.listeners.insert(id, listener.clone());
            (id, state.sticky.clone())
        };
        if let Some(action) = sticky {
            listener.on_hardware_changed(&action);
        }
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> AudioRouteResult<()> {
        let mut state = lock(&self.state);
        state.unsubscribes += 1;
        match state.listeners.remove(&id) {
            Some(_) => Ok(()),
            None => Err(AudioRouteError::NotRegistered),
        }
    }
}

// ─── Wrapped device module ─────────────────────────────────────────────────

struct FactoryShared {
    listener: Mutex<Option<Arc<dyn AudioDeviceEventsListener>>>,
    /// Survives release, for callbacks the native side fires late
    last_listener: Mutex<Option<Arc<dyn AudioDeviceEventsListener>>>,
    options: Mutex<Option<DeviceModuleOptions>>,
    released: AtomicBool,
    fail_creation: AtomicBool,
    next_handle: AtomicI64,
}

/// Builds [`SimulatedDeviceModule`]s and lets tests fire their callbacks
#[derive(Clone)]
pub struct SimulatedDeviceModuleFactory {
    shared: Arc<FactoryShared>,
}

impl SimulatedDeviceModuleFactory {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(FactoryShared {
                listener: Mutex::new(None),
                last_listener: Mutex::new(None),
                options: Mutex::new(None),
                released: AtomicBool::new(false),
                fail_creation: AtomicBool::new(false),
                next_handle: AtomicI64::new(0x7f00_1000),
            }),
        }
    }

    pub fn fail_creation(&self, fail: bool) {
        self.shared.fail_creation.store(fail, Ordering::SeqCst);
    }

    /// Options the last module was built with
    pub fn last_options(&self) -> Option<DeviceModuleOptions> {
        lock(&self.shared.options).clone()
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Listener the last module was built with, even after release
    pub fn last_listener(&self) -> Option<Arc<dyn AudioDeviceEventsListener>> {
        lock(&self.shared.last_listener).clone()
    }

    fn listener(&self) -> Option<Arc<dyn AudioDeviceEventsListener>> {
        lock(&self.shared.listener).clone()
    }

    /// Fire a device change callback as the native module would
    pub fn device_changed(&self, selected: Option<&AudioEndpoint>, available: &[AudioEndpoint]) {
        if let Some(listener) = self.listener() {
            listener.on_audio_device_changed(selected, available);
        }
    }

    pub fn record_start(&self) {
        if let Some(listener) = self.listener() {
            listener.on_record_start();
        }
    }

    pub fn record_stop(&self) {
        if let Some(listener) = self.listener() {
            listener.on_record_stop();
        }
    }
}

impl Default for SimulatedDeviceModuleFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDeviceModuleFactory for SimulatedDeviceModuleFactory {
    fn create(
        &self,
        options: &DeviceModuleOptions,
        listener: Arc<dyn AudioDeviceEventsListener>,
    ) -> AudioRouteResult<Box<dyn NativeAudioDeviceModule>> {
        if self.shared.fail_creation.load(Ordering::SeqCst) {
            return Err(AudioRouteError::ModuleCreation("simulated failure".into()));
        }
        *lock(&self.shared.options) = Some(options.clone());
        *lock(&self.shared.last_listener) = Some(listener.clone());
        *lock(&self.shared.listener) = Some(listener);
        self.shared.released.store(false, Ordering::SeqCst);
        let handle = NativeModuleHandle(self.shared.next_handle.fetch_add(0x100, Ordering::SeqCst));
        Ok(Box::new(SimulatedDeviceModule {
            handle,
            factory: self.clone(),
        }))
    }
}

/// Native module stand-in; stops recording when released like the real one
pub struct SimulatedDeviceModule {
    handle: NativeModuleHandle,
    factory: SimulatedDeviceModuleFactory,
}

impl NativeAudioDeviceModule for SimulatedDeviceModule {
    fn native_handle(&self) -> NativeModuleHandle {
        self.handle
    }

    fn release(&mut self) {
        self.factory.record_stop();
        self.factory.shared.released.store(true, Ordering::SeqCst);
        *lock(&self.factory.shared.listener) = None;
    }
}

// ─── Event sink ────────────────────────────────────────────────────────────

#[derive(Default)]
struct SinkState {
    emitted: Vec<(String, String)>,
    fail: bool,
    failed: usize,
}

/// Sink that keeps every emitted event
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every emit from now on
    pub fn fail(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    pub fn failed_count(&self) -> usize {
        lock(&self.state).failed
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.state).emitted.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Emitted events decoded back from their payloads
    pub fn events(&self) -> Vec<RouteEvent> {
        lock(&self.state)
            .emitted
            .iter()
            .filter_map(|(name, payload)| decode_event(name, payload).ok())
            .collect()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn emit(&self, name: &str, payload: &str) -> AudioRouteResult<()> {
        let mut state = lock(&self.state);
        if state.fail {
            state.failed += 1;
            return Err(AudioRouteError::Emit {
                name: name.to_string(),
                reason: "event emitter unavailable".to_string(),
            });
        }
        state.emitted.push((name.to_string(), payload.to_string()));
        Ok(())
    }
}
