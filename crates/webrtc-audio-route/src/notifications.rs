//! Hardware attach/detach notifications and the scoped listener registration.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AudioRouteError, AudioRouteResult};

/// Broadcast action for wired headset plug/unplug
pub const ACTION_HEADSET_PLUG: &str = "android.intent.action.HEADSET_PLUG";

/// Action carried by a hardware notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareAction {
    HeadsetPlug,
    Other(String),
}

impl HardwareAction {
    pub fn from_intent(action: &str) -> Self {
        if action == ACTION_HEADSET_PLUG {
            HardwareAction::HeadsetPlug
        } else {
            HardwareAction::Other(action.to_string())
        }
    }
}

/// Receives hardware notifications. There is no payload beyond the action;
/// a listener is expected to re-query the hardware.
pub trait HardwareChangeListener: Send + Sync + 'static {
    fn on_hardware_changed(&self, action: &HardwareAction);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Subscribe/unsubscribe mechanism for headset plug notifications.
///
/// Notifications may be delivered on any thread, including synchronously
/// from inside `subscribe` (sticky broadcasts).
pub trait HardwareChangeSource: Send + Sync + 'static {
    fn subscribe(&self, listener: Arc<dyn HardwareChangeListener>) -> AudioRouteResult<SubscriptionId>;

    /// Returns [`AudioRouteError::NotRegistered`] for an unknown id
    fn unsubscribe(&self, id: SubscriptionId) -> AudioRouteResult<()>;
}

/// A live subscription, released exactly once on [`release`](Self::release) or drop.
pub struct Registration {
    source: Arc<dyn HardwareChangeSource>,
    id: Option<SubscriptionId>,
}

impl Registration {
    pub fn acquire(
        source: Arc<dyn HardwareChangeSource>,
        listener: Arc<dyn HardwareChangeListener>,
    ) -> AudioRouteResult<Self> {
        let id = source.subscribe(listener)?;
        debug!("Hardware listener registered ({:?})", id);
        Ok(Self { source, id: Some(id) })
    }

    pub fn id(&self) -> Option<SubscriptionId> {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    /// Unsubscribe. Already-released and not-registered are both fine.
    pub fn release(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match self.source.unsubscribe(id) {
            Ok(()) => debug!("Hardware listener unregistered ({:?})", id),
            Err(AudioRouteError::NotRegistered) => {
                debug!("Hardware listener {:?} was not registered", id)
            }
            Err(e) => warn!("Failed to unregister hardware listener {:?}: {e}", id),
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}
