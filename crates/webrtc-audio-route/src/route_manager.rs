//! Audio route manager.
//!
//! Owns the speaker preference, the audio focus request and the headset
//! listener for one call session. Start, preference changes and headset
//! notifications all run the route decision under the same lock, so the
//! route applied last always reflects the latest inputs.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, info, warn};
use webrtc_audio_protocol::{FocusChangedPayload, RouteChangedPayload, RouteEvent};

use crate::config::RouteConfig;
use crate::device::{AudioDeviceService, FocusChangeListener};
use crate::diagnostics::{emit_event, DiagnosticsSink};
use crate::error::{AudioRouteError, AudioRouteResult};
use crate::notifications::{HardwareAction, HardwareChangeListener, HardwareChangeSource, Registration};
use crate::policy::{compute_route, probe_hardware};
use crate::types::{FocusChange, Route, RoutingPreference, SessionState};

struct SessionInner {
    state: SessionState,
    preference: RoutingPreference,
    /// Last route applied, used only to decide whether to emit an event
    last_route: Option<Route>,
    registration: Option<Registration>,
    /// Bumped on every start so late notifications from an old session are ignored
    generation: u64,
}

struct Shared {
    service: Arc<dyn AudioDeviceService>,
    sink: Option<Arc<dyn DiagnosticsSink>>,
    config: RouteConfig,
    inner: Mutex<SessionInner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sink(&self) -> Option<&dyn DiagnosticsSink> {
        if self.config.emit_events {
            self.sink.as_deref()
        } else {
            None
        }
    }

    /// Request focus on the configured stream. Anything but a grant is an error.
    fn request_focus(&self, listener: Arc<dyn FocusChangeListener>) -> AudioRouteResult<()> {
        let result = self
            .service
            .request_audio_focus(listener, self.config.focus_stream, self.config.focus_gain)?;
        if result.is_granted() {
            Ok(())
        } else {
            Err(AudioRouteError::FocusDenied(result))
        }
    }

    /// Recompute the route and apply it. Callers hold the session lock.
    fn update_audio_route(&self, inner: &mut SessionInner) -> Route {
        let hardware = probe_hardware(self.service.as_ref());
        let route = compute_route(inner.preference, hardware);
        let speakerphone_on = route.speakerphone_on();

        if let Err(e) = self.service.set_speakerphone_on(speakerphone_on) {
            warn!("Failed to set speakerphone {}: {e}", speakerphone_on);
        }

        if inner.last_route == Some(route) {
            debug!("Audio route unchanged: {}", route);
            return route;
        }

        info!(
            "Audio route -> {} (speaker_wanted={}, wired_headset={})",
            route, inner.preference.speaker_wanted, hardware.wired_headset
        );
        inner.last_route = Some(route);
        emit_event(
            self.sink(),
            RouteEvent::RouteChanged(RouteChangedPayload {
                route: route.as_str().to_string(),
                speaker_wanted: inner.preference.speaker_wanted,
                wired_headset: hardware.wired_headset,
                speakerphone_on,
            }),
        );
        route
    }
}

/// Re-evaluates the route on headset plug/unplug
struct HeadsetPlugListener {
    shared: Weak<Shared>,
    generation: u64,
}

impl HardwareChangeListener for HeadsetPlugListener {
    fn on_hardware_changed(&self, action: &HardwareAction) {
        if *action != HardwareAction::HeadsetPlug {
            debug!("Ignoring hardware action {:?}", action);
            return;
        }

        let Some(shared) = self.shared.upgrade() else {
            debug!("Headset notification after route manager was dropped");
            return;
        };

        let mut inner = shared.lock();
        if inner.state != SessionState::Active || inner.generation != self.generation {
            debug!("Headset notification for an inactive session, ignoring");
            return;
        }
        shared.update_audio_route(&mut inner);
    }
}

/// Reports focus changes. Routing does not depend on focus.
struct SessionFocusListener {
    shared: Weak<Shared>,
}

impl FocusChangeListener for SessionFocusListener {
    fn on_audio_focus_change(&self, change: FocusChange) {
        info!("Audio focus changed: {}", change.as_str());
        if let Some(shared) = self.shared.upgrade() {
            emit_event(
                shared.sink(),
                RouteEvent::FocusChanged(FocusChangedPayload {
                    focus_change: change.as_str().to_string(),
                }),
            );
        }
    }
}

/// Keeps call audio on the speaker, earpiece or wired headset.
///
/// A wired headset always takes the audio. Otherwise the speaker preference
/// decides between speaker and earpiece.
pub struct AudioRouteManager {
    shared: Arc<Shared>,
    source: Arc<dyn HardwareChangeSource>,
}

impl AudioRouteManager {
    pub fn new(
        service: Arc<dyn AudioDeviceService>,
        source: Arc<dyn HardwareChangeSource>,
        config: RouteConfig,
        sink: Option<Arc<dyn DiagnosticsSink>>,
    ) -> Self {
        let preference = RoutingPreference::new(config.speaker_wanted);
        Self {
            shared: Arc::new(Shared {
                service,
                sink,
                config,
                inner: Mutex::new(SessionInner {
                    state: SessionState::Inactive,
                    preference,
                    last_route: None,
                    registration: None,
                    generation: 0,
                }),
            }),
            source,
        }
    }

    /// Enter communication mode, take focus, apply the route and listen for
    /// headset changes. No-op while already active.
    pub fn start(&self) {
        let generation = {
            let mut inner = self.shared.lock();
            if inner.state == SessionState::Active {
                debug!("Route manager already started");
                return;
            }

            let config = &self.shared.config;
            if let Err(e) = self.shared.service.set_mode(config.session_mode) {
                warn!("Failed to set audio mode {}: {e}", config.session_mode.as_str());
            }

            let focus_listener = Arc::new(SessionFocusListener {
                shared: Arc::downgrade(&self.shared),
            });
            match self.shared.request_focus(focus_listener) {
                Ok(()) => debug!("Audio focus granted"),
                Err(e) => warn!("{e}, routing anyway"),
            }

            inner.state = SessionState::Active;
            inner.generation += 1;
            inner.last_route = None;
            self.shared.update_audio_route(&mut inner);
            inner.generation
        };

        // Registered outside the lock: the platform may deliver a sticky
        // notification from inside subscribe.
        let listener = Arc::new(HeadsetPlugListener {
            shared: Arc::downgrade(&self.shared),
            generation,
        });
        let registration = match Registration::acquire(self.source.clone(), listener) {
            Ok(registration) => registration,
            Err(e) => {
                warn!("Failed to register headset listener: {e}");
                return;
            }
        };

        let mut inner = self.shared.lock();
        if inner.state == SessionState::Active && inner.generation == generation {
            inner.registration = Some(registration);
            // A headset plugged between the first route and the subscription
            // produced no notification for us.
            self.shared.update_audio_route(&mut inner);
            info!("Route manager started");
        } else {
            drop(inner);
            debug!("Session stopped while registering, releasing listener");
            drop(registration);
        }
    }

    /// Restore normal mode, abandon focus and stop listening. No-op while inactive.
    pub fn stop(&self) {
        let registration = {
            let mut inner = self.shared.lock();
            if inner.state == SessionState::Inactive {
                debug!("Route manager not started");
                return;
            }

            let config = &self.shared.config;
            if let Err(e) = self.shared.service.set_mode(config.idle_mode) {
                warn!("Failed to set audio mode {}: {e}", config.idle_mode.as_str());
            }
            if let Err(e) = self.shared.service.abandon_audio_focus() {
                warn!("Failed to abandon audio focus: {e}");
            }

            inner.state = SessionState::Inactive;
            inner.registration.take()
        };

        if let Some(mut registration) = registration {
            registration.release();
        }
        info!("Route manager stopped");
    }

    /// Store the speaker preference and re-apply the route, in any session state
    pub fn set_speaker_wanted(&self, wanted: bool) {
        let mut inner = self.shared.lock();
        debug!("Speaker wanted: {}", wanted);
        inner.preference = RoutingPreference::new(wanted);
        self.shared.update_audio_route(&mut inner);
    }

    pub fn session_state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn speaker_wanted(&self) -> bool {
        self.shared.lock().preference.speaker_wanted
    }
}

impl Drop for AudioRouteManager {
    fn drop(&mut self) {
        if self.session_state() == SessionState::Active {
            debug!("Dropping active route manager");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{RecordingSink, SimulatedAudioService, SimulatedHeadsetBroadcasts};
    use crate::notifications::{SubscriptionId, ACTION_HEADSET_PLUG};
    use crate::types::{AudioMode, FocusRequestResult};

    /// Source that sees a headset plugged while the listener is being
    /// registered and never broadcasts it
    struct PlugDuringSubscribe {
        service: Arc<SimulatedAudioService>,
        inner: SimulatedHeadsetBroadcasts,
    }

    impl HardwareChangeSource for PlugDuringSubscribe {
        fn subscribe(&self, listener: Arc<dyn HardwareChangeListener>) -> AudioRouteResult<SubscriptionId> {
            self.service.plug_wired_headset();
            self.inner.subscribe(listener)
        }

        fn unsubscribe(&self, id: SubscriptionId) -> AudioRouteResult<()> {
            self.inner.unsubscribe(id)
        }
    }

    struct Harness {
        service: Arc<SimulatedAudioService>,
        broadcasts: Arc<SimulatedHeadsetBroadcasts>,
        sink: Arc<RecordingSink>,
        manager: AudioRouteManager,
    }

    fn harness(config: RouteConfig) -> Harness {
        let service = Arc::new(SimulatedAudioService::new());
        let broadcasts = Arc::new(SimulatedHeadsetBroadcasts::new());
        let sink = Arc::new(RecordingSink::new());
        let manager = AudioRouteManager::new(
            service.clone(),
            broadcasts.clone(),
            config,
            Some(sink.clone()),
        );
        Harness {
            service,
            broadcasts,
            sink,
            manager,
        }
    }

    impl Harness {
        fn plug(&self) {
            self.service.plug_wired_headset();
            self.broadcasts.broadcast(&HardwareAction::HeadsetPlug);
        }

        fn unplug(&self) {
            self.service.unplug_wired_headset();
            self.broadcasts.broadcast(&HardwareAction::HeadsetPlug);
        }

        fn last_route(&self) -> Option<String> {
            self.sink.events().into_iter().rev().find_map(|event| match event {
                RouteEvent::RouteChanged(p) => Some(p.route),
                _ => None,
            })
        }
    }

    #[test]
    fn test_start_enters_communication_mode() {
        let h = harness(RouteConfig::default());
        h.manager.start();

        assert_eq!(h.manager.session_state(), SessionState::Active);
        assert_eq!(h.service.mode().unwrap(), AudioMode::InCommunication);
        assert!(h.service.focus_held());
        assert!(h.service.is_speakerphone_on().unwrap());
        assert_eq!(h.broadcasts.listener_count(), 1);
        assert_eq!(h.last_route().as_deref(), Some("speaker"));
    }

    #[test]
    fn test_start_twice_is_noop() {
        let h = harness(RouteConfig::default());
        h.manager.start();
        h.manager.start();

        assert_eq!(h.service.call_count("request_audio_focus"), 1);
        assert_eq!(h.broadcasts.subscribe_count(), 1);
        assert_eq!(h.broadcasts.listener_count(), 1);
    }

    #[test]
    fn test_stop_restores_normal_mode() {
        let h = harness(RouteConfig::default());
        h.manager.start();
        h.manager.stop();

        assert_eq!(h.manager.session_state(), SessionState::Inactive);
        assert_eq!(h.service.mode().unwrap(), AudioMode::Normal);
        assert!(!h.service.focus_held());
        assert_eq!(h.broadcasts.listener_count(), 0);
    }

    #[test]
    fn test_stop_without_start() {
        let h = harness(RouteConfig::default());
        h.manager.stop();
        h.manager.stop();

        assert_eq!(h.manager.session_state(), SessionState::Inactive);
        assert_eq!(h.broadcasts.unsubscribe_count(), 0);
        assert_eq!(h.service.call_count("abandon_audio_focus"), 0);
    }

    #[test]
    fn test_stop_tolerates_listener_already_gone() {
        let h = harness(RouteConfig::default());
        h.manager.start();
        h.broadcasts.forget_all();

        h.manager.stop();
        assert_eq!(h.manager.session_state(), SessionState::Inactive);
    }

    #[test]
    fn test_headset_overrides_preference() {
        let h = harness(RouteConfig::default());
        h.manager.start();

        h.plug();
        assert_eq!(h.last_route().as_deref(), Some("wired_headset"));
        assert!(!h.service.is_speakerphone_on().unwrap());

        h.manager.set_speaker_wanted(true);
        assert_eq!(h.last_route().as_deref(), Some("wired_headset"));
        assert!(!h.service.is_speakerphone_on().unwrap());

        h.unplug();
        assert_eq!(h.last_route().as_deref(), Some("speaker"));
        assert!(h.service.is_speakerphone_on().unwrap());
    }

    #[test]
    fn test_speaker_not_wanted_with_headset() {
        let h = harness(RouteConfig::default());
        h.service.plug_wired_headset();
        h.manager.start();

        h.manager.set_speaker_wanted(false);
        assert_eq!(h.last_route().as_deref(), Some("wired_headset"));

        h.unplug();
        assert_eq!(h.last_route().as_deref(), Some("earpiece"));
        assert!(!h.service.is_speakerphone_on().unwrap());
    }

    #[test]
    fn test_repeated_update_does_not_toggle() {
        let h = harness(RouteConfig::default().with_speaker_wanted(false));
        h.manager.start();
        h.manager.set_speaker_wanted(false);
        h.manager.set_speaker_wanted(false);

        // Two applications during start, one per preference call
        assert_eq!(h.service.speakerphone_history(), vec![false, false, false, false]);
        assert_eq!(h.sink.names().len(), 1);
    }

    #[test]
    fn test_preference_applies_while_inactive() {
        let h = harness(RouteConfig::default());
        h.manager.set_speaker_wanted(false);

        assert!(!h.manager.speaker_wanted());
        assert_eq!(h.manager.session_state(), SessionState::Inactive);
        assert!(!h.service.is_speakerphone_on().unwrap());

        h.manager.start();
        assert_eq!(h.last_route().as_deref(), Some("earpiece"));
    }

    #[test]
    fn test_notifications_after_stop_are_ignored() {
        let h = harness(RouteConfig::default());
        h.manager.start();
        let listener = h.broadcasts.listeners().pop().unwrap();
        h.manager.stop();

        h.service.plug_wired_headset();
        let before = h.service.call_count("set_speakerphone_on");
        listener.on_hardware_changed(&HardwareAction::HeadsetPlug);
        assert_eq!(h.service.call_count("set_speakerphone_on"), before);
    }

    #[test]
    fn test_other_broadcasts_ignored() {
        let h = harness(RouteConfig::default());
        h.manager.start();
        let before = h.service.call_count("set_speakerphone_on");

        h.broadcasts
            .broadcast(&HardwareAction::from_intent("android.intent.action.SCREEN_OFF"));
        assert_eq!(h.service.call_count("set_speakerphone_on"), before);

        h.broadcasts.broadcast(&HardwareAction::from_intent(ACTION_HEADSET_PLUG));
        assert_eq!(h.service.call_count("set_speakerphone_on"), before + 1);
    }

    #[test]
    fn test_focus_denied_still_routes() {
        let h = harness(RouteConfig::default());
        h.service.set_focus_result(FocusRequestResult::Failed);
        h.manager.start();

        assert_eq!(h.manager.session_state(), SessionState::Active);
        assert!(h.service.is_speakerphone_on().unwrap());
    }

    #[test]
    fn test_denied_focus_is_an_error() {
        let h = harness(RouteConfig::default());
        h.service.set_focus_result(FocusRequestResult::Delayed);
        let listener = Arc::new(SessionFocusListener { shared: Weak::new() });

        let err = h.manager.shared.request_focus(listener).unwrap_err();
        assert!(matches!(err, AudioRouteError::FocusDenied(FocusRequestResult::Delayed)));
    }

    #[test]
    fn test_headset_plugged_while_registering() {
        let service = Arc::new(SimulatedAudioService::new());
        let source = Arc::new(PlugDuringSubscribe {
            service: service.clone(),
            inner: SimulatedHeadsetBroadcasts::new(),
        });
        let sink = Arc::new(RecordingSink::new());
        let manager = AudioRouteManager::new(service.clone(), source, RouteConfig::default(), Some(sink.clone()));
        manager.start();

        assert_eq!(manager.session_state(), SessionState::Active);
        assert!(!service.is_speakerphone_on().unwrap());
        let routes: Vec<String> = sink
            .events()
            .into_iter()
            .filter_map(|event| match event {
                RouteEvent::RouteChanged(p) => Some(p.route),
                _ => None,
            })
            .collect();
        assert_eq!(routes, vec!["speaker".to_string(), "wired_headset".to_string()]);
    }

    #[test]
    fn test_platform_failures_do_not_escape() {
        let h = harness(RouteConfig::default());
        h.service.fail_calls(true);
        h.manager.start();
        h.manager.set_speaker_wanted(false);
        h.manager.stop();

        assert_eq!(h.manager.session_state(), SessionState::Inactive);
    }

    #[test]
    fn test_sink_failure_does_not_block_routing() {
        let h = harness(RouteConfig::default());
        h.sink.fail(true);
        h.manager.start();
        h.plug();

        assert!(!h.service.is_speakerphone_on().unwrap());
        assert!(h.sink.failed_count() >= 2);
    }

    #[test]
    fn test_focus_changes_are_reported() {
        let h = harness(RouteConfig::default());
        h.manager.start();
        h.service.deliver_focus_change(FocusChange::LossTransient);

        let reported = h.sink.events().into_iter().any(|event| {
            matches!(event, RouteEvent::FocusChanged(p) if p.focus_change == "loss_transient")
        });
        assert!(reported);
        assert!(h.service.is_speakerphone_on().unwrap());
    }

    #[test]
    fn test_events_disabled() {
        let h = harness(RouteConfig::default().with_emit_events(false));
        h.manager.start();
        h.plug();
        assert!(h.sink.names().is_empty());
    }

    #[test]
    fn test_sticky_broadcast_during_start() {
        let h = harness(RouteConfig::default());
        h.service.plug_wired_headset();
        h.broadcasts.set_sticky(Some(HardwareAction::HeadsetPlug));
        h.manager.start();

        assert_eq!(h.manager.session_state(), SessionState::Active);
        assert_eq!(h.broadcasts.listener_count(), 1);
        assert_eq!(h.last_route().as_deref(), Some("wired_headset"));
    }

    #[test]
    fn test_restart_registers_fresh_listener() {
        let h = harness(RouteConfig::default());
        h.manager.start();
        let stale = h.broadcasts.listeners().pop().unwrap();
        h.manager.stop();
        h.manager.start();

        h.service.plug_wired_headset();
        let before = h.service.call_count("set_speakerphone_on");
        stale.on_hardware_changed(&HardwareAction::HeadsetPlug);
        assert_eq!(h.service.call_count("set_speakerphone_on"), before);

        h.broadcasts.broadcast(&HardwareAction::HeadsetPlug);
        assert_eq!(h.last_route().as_deref(), Some("wired_headset"));
    }

    #[test]
    fn test_concurrent_triggers_settle_on_final_inputs() {
        let h = harness(RouteConfig::default());
        h.manager.start();
        let manager = Arc::new(h.manager);
        let service = h.service.clone();
        let broadcasts = h.broadcasts.clone();

        let toggler = {
            let manager = manager.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    manager.set_speaker_wanted(i % 2 == 0);
                }
            })
        };
        let plugger = std::thread::spawn(move || {
            for i in 0..200 {
                if i % 2 == 0 {
                    service.plug_wired_headset();
                } else {
                    service.unplug_wired_headset();
                }
                broadcasts.broadcast(&HardwareAction::HeadsetPlug);
            }
        });
        toggler.join().unwrap();
        plugger.join().unwrap();

        // The last update ran after the last input change, so it saw both
        let expected = compute_route(
            RoutingPreference::new(manager.speaker_wanted()),
            probe_hardware(h.service.as_ref()),
        );
        assert!(!manager.speaker_wanted());
        assert_eq!(expected, Route::Earpiece);
        assert_eq!(h.service.is_speakerphone_on().unwrap(), expected.speakerphone_on());
        let last_route = h.sink.events().into_iter().rev().find_map(|event| match event {
            RouteEvent::RouteChanged(p) => Some(p.route),
            _ => None,
        });
        assert_eq!(last_route.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_drop_stops_session() {
        let h = harness(RouteConfig::default());
        h.manager.start();
        let Harness {
            service,
            broadcasts,
            manager,
            ..
        } = h;
        drop(manager);

        assert_eq!(broadcasts.listener_count(), 0);
        assert!(!service.focus_held());
        assert_eq!(service.mode().unwrap(), AudioMode::Normal);
    }
}
