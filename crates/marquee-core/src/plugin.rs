//! Plugin hooks
//!
//! Plugins observe committed state transitions and may veto play/pause
//! before the action reaches the surface. All hooks run synchronously
//! inside the player's event-processing context, so implementations
//! must return quickly and must not call back into the dispatcher.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::config::PlayerConfig;
use crate::state::PlayerSnapshot;
use crate::types::PlayerId;

/// Everything a plugin sees at init time
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub player_id: PlayerId,
    pub config: PlayerConfig,
    pub snapshot: PlayerSnapshot,
}

/// Hooks a player plugin may implement
///
/// Every hook has a default no-op body; implement only what you need.
pub trait PlayerPlugin: Send + Sync {
    /// Stable name used in logs and veto errors
    fn name(&self) -> &str;

    /// Called once when the owning player is constructed
    fn init(&self, _ctx: &PluginContext) {}

    /// Called once when the owning player is torn down
    fn destroy(&self) {}

    /// Observes every committed state transition
    fn on_state_change(&self, _previous: &PlayerSnapshot, _current: &PlayerSnapshot) {}

    /// Return false to veto a play action
    fn before_play(&self, _snapshot: &PlayerSnapshot) -> bool {
        true
    }

    /// Return false to veto a pause action
    fn before_pause(&self, _snapshot: &PlayerSnapshot) -> bool {
        true
    }
}

/// Shared set of plugins attached to one player
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Arc<RwLock<Vec<Arc<dyn PlayerPlugin>>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, plugin: Arc<dyn PlayerPlugin>) {
        debug!(plugin = plugin.name(), "registering plugin");
        self.write().push(plugin);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Run `init` on every registered plugin
    pub fn init_all(&self, ctx: &PluginContext) {
        for plugin in self.read().iter() {
            plugin.init(ctx);
        }
    }

    /// Run `destroy` on every registered plugin
    pub fn destroy_all(&self) {
        for plugin in self.read().iter() {
            plugin.destroy();
        }
    }

    /// Fan a committed transition out to every observer
    pub fn notify_state_change(&self, previous: &PlayerSnapshot, current: &PlayerSnapshot) {
        for plugin in self.read().iter() {
            plugin.on_state_change(previous, current);
        }
    }

    /// First plugin vetoing play, if any
    pub fn check_before_play(&self, snapshot: &PlayerSnapshot) -> Result<(), String> {
        for plugin in self.read().iter() {
            if !plugin.before_play(snapshot) {
                return Err(plugin.name().to_string());
            }
        }
        Ok(())
    }

    /// First plugin vetoing pause, if any
    pub fn check_before_pause(&self, snapshot: &PlayerSnapshot) -> Result<(), String> {
        for plugin in self.read().iter() {
            if !plugin.before_pause(snapshot) {
                return Err(plugin.name().to_string());
            }
        }
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn PlayerPlugin>>> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn PlayerPlugin>>> {
        self.plugins.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingPlugin {
        inits: AtomicUsize,
        destroys: AtomicUsize,
        transitions: AtomicUsize,
        allow_play: AtomicBool,
    }

    impl RecordingPlugin {
        fn allowing() -> Self {
            let plugin = Self::default();
            plugin.allow_play.store(true, Ordering::SeqCst);
            plugin
        }
    }

    impl PlayerPlugin for RecordingPlugin {
        fn name(&self) -> &str {
            "recording"
        }

        fn init(&self, _ctx: &PluginContext) {
            self.inits.fetch_add(1, Ordering::SeqCst);
        }

        fn destroy(&self) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }

        fn on_state_change(&self, _previous: &PlayerSnapshot, _current: &PlayerSnapshot) {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }

        fn before_play(&self, _snapshot: &PlayerSnapshot) -> bool {
            self.allow_play.load(Ordering::SeqCst)
        }
    }

    fn context() -> PluginContext {
        PluginContext {
            player_id: PlayerId::new(),
            config: PlayerConfig::default(),
            snapshot: PlayerSnapshot::default(),
        }
    }

    #[test]
    fn lifecycle_hooks_run_once_per_plugin() {
        let registry = PluginRegistry::new();
        let plugin = Arc::new(RecordingPlugin::allowing());
        registry.register(plugin.clone());

        registry.init_all(&context());
        registry.destroy_all();

        assert_eq!(plugin.inits.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.destroys.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn veto_reports_the_plugin_name() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(RecordingPlugin::default()));

        let snapshot = PlayerSnapshot::default();
        assert_eq!(registry.check_before_play(&snapshot), Err("recording".to_string()));
        assert_eq!(registry.check_before_pause(&snapshot), Ok(()));
    }

    #[test]
    fn observers_see_every_notification() {
        let registry = PluginRegistry::new();
        let plugin = Arc::new(RecordingPlugin::allowing());
        registry.register(plugin.clone());

        let snapshot = PlayerSnapshot::default();
        registry.notify_state_change(&snapshot, &snapshot);
        registry.notify_state_change(&snapshot, &snapshot);

        assert_eq!(plugin.transitions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_registry_approves_everything() {
        let registry = PluginRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.check_before_play(&PlayerSnapshot::default()).is_ok());
    }
}
