//! Player instance
//!
//! Wires one playback surface to the full reconciliation stack: state
//! store, action dispatcher, event bridge, controls timer, and shortcut
//! router. Each collaborator is injected with exactly what it needs;
//! there is no ambient registry or global state, so two players on one
//! page never share anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::actions::ActionDispatcher;
use crate::analytics::{AnalyticsEmitter, EventSink};
use crate::config::PlayerConfig;
use crate::events::EventBridge;
use crate::idle::ControlsTimer;
use crate::keyboard::ShortcutRouter;
use crate::plugin::{PluginContext, PluginRegistry};
use crate::state::{PlayerSnapshot, StateStore};
use crate::surface::PlaybackSurface;
use crate::types::PlayerId;

/// One player instance around one playback surface
pub struct Player {
    id: PlayerId,
    config: PlayerConfig,
    surface: Arc<dyn PlaybackSurface>,
    store: StateStore,
    sink: EventSink,
    dispatcher: Arc<ActionDispatcher>,
    bridge: Arc<EventBridge>,
    controls: ControlsTimer,
    shortcuts: ShortcutRouter,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

impl Player {
    /// Player without plugins
    pub fn new(surface: Arc<dyn PlaybackSurface>, config: PlayerConfig) -> Self {
        Self::with_plugins(surface, config, PluginRegistry::new())
    }

    /// Player with a pre-registered plugin set
    ///
    /// Plugin `init` hooks run here, before any event can flow.
    pub fn with_plugins(
        surface: Arc<dyn PlaybackSurface>,
        config: PlayerConfig,
        plugins: PluginRegistry,
    ) -> Self {
        let id = PlayerId::new();
        let config = config.normalized();
        let store = StateStore::with_plugins(&config, plugins);
        let sink = EventSink::new();
        let dispatcher = Arc::new(ActionDispatcher::new(
            Arc::clone(&surface),
            store.clone(),
            sink.clone(),
            config.clone(),
        ));
        let bridge = Arc::new(EventBridge::new(Arc::clone(&dispatcher)));
        let controls = ControlsTimer::new(store.clone(), &config);
        let shortcuts = ShortcutRouter::new(Arc::clone(&dispatcher));

        store.plugins().init_all(&PluginContext {
            player_id: id,
            config: config.clone(),
            snapshot: store.snapshot(),
        });
        info!(player_id = %id, "player created");

        Self {
            id,
            config,
            surface,
            store,
            sink,
            dispatcher,
            bridge,
            controls,
            shortcuts,
            tasks: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Start the background machinery: the bridge pump over the
    /// surface's event stream and the controls phase watcher
    ///
    /// Requires a tokio runtime; calling again while running is a no-op.
    pub fn spawn(&self) {
        let mut tasks = self.lock_tasks();
        if !tasks.is_empty() {
            return;
        }
        tasks.push(tokio::spawn(
            Arc::clone(&self.bridge).run(self.surface.events()),
        ));
        tasks.push(tokio::spawn(
            self.controls.clone().follow(self.store.subscribe()),
        ));
        debug!(player_id = %self.id, "background tasks started");
    }

    /// Subscribe an analytics emitter to the normalized event stream
    pub fn attach_analytics(&self, emitter: Arc<AnalyticsEmitter>) {
        self.sink.add_listener(emitter);
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn surface(&self) -> &Arc<dyn PlaybackSurface> {
        &self.surface
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn sink(&self) -> &EventSink {
        &self.sink
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }

    pub fn bridge(&self) -> &Arc<EventBridge> {
        &self.bridge
    }

    pub fn controls(&self) -> &ControlsTimer {
        &self.controls
    }

    pub fn shortcuts(&self) -> &ShortcutRouter {
        &self.shortcuts
    }

    /// Mutable router access for rebinding keys
    pub fn shortcuts_mut(&mut self) -> &mut ShortcutRouter {
        &mut self.shortcuts
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.store.snapshot()
    }

    /// Watch receiver over state snapshots
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.store.subscribe()
    }

    /// Tear the player down: stop background tasks and run plugin
    /// `destroy` hooks
    ///
    /// Idempotent; also runs on drop.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
        self.store.plugins().destroy_all();
        info!(player_id = %self.id, "player destroyed");
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.destroy();
    }
}
