//! Simulated Android host wiring the route manager and the device module
//! to in-memory platform services.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use webrtc_audio_route::simulated::{SimulatedAudioService, SimulatedDeviceModuleFactory, SimulatedHeadsetBroadcasts};
use webrtc_audio_route::{
    AudioDeviceService, AudioRouteManager, DeviceModuleOptions, DiagnosticsSink, ForcedSpeakerDeviceModule,
    HardwareAction, RouteConfig,
};

use crate::script::Command;

pub struct SimHost {
    service: Arc<SimulatedAudioService>,
    broadcasts: Arc<SimulatedHeadsetBroadcasts>,
    factory: SimulatedDeviceModuleFactory,
    sink: Option<Arc<dyn DiagnosticsSink>>,
    options: DeviceModuleOptions,
    manager: AudioRouteManager,
    module: Option<ForcedSpeakerDeviceModule>,
    pending: Vec<JoinHandle<()>>,
}

impl SimHost {
    pub fn new(config: RouteConfig, options: DeviceModuleOptions, sink: Option<Arc<dyn DiagnosticsSink>>) -> Self {
        let service = Arc::new(SimulatedAudioService::new());
        let broadcasts = Arc::new(SimulatedHeadsetBroadcasts::new());
        let manager = AudioRouteManager::new(service.clone(), broadcasts.clone(), config, sink.clone());

        Self {
            service,
            broadcasts,
            factory: SimulatedDeviceModuleFactory::new(),
            sink,
            options,
            manager,
            module: None,
            pending: Vec::new(),
        }
    }

    /// Deliver a broadcast on a blocking thread, as the platform would
    fn dispatch(&mut self, action: HardwareAction) {
        let broadcasts = self.broadcasts.clone();
        self.pending
            .push(tokio::task::spawn_blocking(move || broadcasts.broadcast(&action)));
    }

    pub async fn wait(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                error!("Broadcast delivery panicked: {e}");
            }
        }
    }

    pub async fn execute(&mut self, command: Command) {
        match command {
            Command::Start => self.manager.start(),
            Command::Stop => self.manager.stop(),
            Command::Speaker(wanted) => self.manager.set_speaker_wanted(wanted),
            Command::Plug => {
                let id = self.service.plug_wired_headset();
                info!("Wired headset attached as device {id}");
                self.dispatch(HardwareAction::HeadsetPlug);
            }
            Command::Unplug => {
                self.service.unplug_wired_headset();
                self.dispatch(HardwareAction::HeadsetPlug);
            }
            Command::Attach { kind, name } => {
                let id = self.service.add_device(kind, &name);
                info!("Attached {} '{name}' as device {id}", kind.as_str());
            }
            Command::Detach(id) => {
                if !self.service.remove_device(id) {
                    warn!("No device with id {id}");
                }
            }
            Command::Broadcast(action) => self.dispatch(HardwareAction::from_intent(&action)),
            Command::Focus(change) => self.service.deliver_focus_change(change),
            Command::AdmCreate => self.create_module(),
            Command::AdmDeviceChange => {
                let available = self.service.endpoints();
                let selected = available.iter().find(|d| d.kind.is_wired_headset());
                self.factory.device_changed(selected, &available);
            }
            Command::AdmRecord(true) => self.factory.record_start(),
            Command::AdmRecord(false) => self.factory.record_stop(),
            Command::AdmRelease => match self.module.take() {
                Some(module) => module.release(),
                None => warn!("No audio device module to release"),
            },
            Command::Status => self.log_status(),
            Command::Wait => self.wait().await,
        }
    }

    fn create_module(&mut self) {
        if self.module.is_some() {
            warn!("Audio device module already created");
            return;
        }
        match ForcedSpeakerDeviceModule::new(
            self.service.clone(),
            &self.factory,
            self.options.clone(),
            self.sink.clone(),
        ) {
            Ok(module) => {
                if let Ok(handle) = module.native_handle() {
                    info!("Audio device module handle {:#x}", handle.0);
                }
                self.module = Some(module);
            }
            Err(e) => error!("Failed to create audio device module: {e}"),
        }
    }

    fn log_status(&self) {
        let mode = self.service.mode().map(|m| m.as_str()).unwrap_or("unknown");
        let speakerphone = self.service.is_speakerphone_on().unwrap_or(false);
        info!(
            "session={:?} speaker_wanted={} mode={mode} speakerphone={speakerphone} devices={} module={:?} focus_held={}",
            self.manager.session_state(),
            self.manager.speaker_wanted(),
            self.service.endpoints().len(),
            self.module.as_ref().map(|m| m.state()),
            self.service.focus_held(),
        );
    }

    pub fn speakerphone_on(&self) -> bool {
        self.service.is_speakerphone_on().unwrap_or(false)
    }

    /// Release the module, stop the session and wait for in-flight work
    pub async fn shutdown(mut self) {
        self.wait().await;
        if let Some(module) = self.module.take() {
            module.release();
        }
        self.manager.stop();
    }
}
