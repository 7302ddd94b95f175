//! Player factory.
//!
//! The factory is the entry point most callers want. It owns a
//! [`PlayerBackend`] (the thing that knows how to bootstrap the remote player
//! implementation and construct players), bootstraps it at most once, and
//! hands out [`PlayerProxy`] values already wired to their emitters.
//!
//! # Lifecycle of a mounted player
//!
//! ```text
//! mount(id)
//!   ├─ id unknown to backend ─────────────► Err(MountNotFound)
//!   └─ Ok(proxy)             (handle pending, calls queue up)
//!        │
//!        ▼ background task
//!      backend.load()   (first mount only, outcome shared)
//!        ├─ Err ─► latch + emit `error`, handle stays pending
//!        ▼
//!      backend.create(id, options, listeners)
//!        ├─ Err ─► latch + emit `error`, handle stays pending
//!        ▼
//!      player emits `ready` ─► handle resolves, queued calls run
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::config::ProxyConfig;
use crate::emitter::Handler;
use crate::error::ProxyError;
use crate::events::{proxy_events, EventPayload, ListenerMap, PlayerEmitter, PlayerEvent};
use crate::player::{deferred, DeferredPlayer, Player, PlayerResolver};
use crate::policy::PolicyTable;
use crate::proxy::PlayerProxy;

/// Construction options passed through to the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Backend-specific player parameters, forwarded untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub player_vars: serde_json::Map<String, serde_json::Value>,
}

impl PlayerOptions {
    pub fn with_video(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.player_vars.insert(key.into(), value);
        self
    }
}

/// Bootstraps the remote player implementation and constructs players.
#[async_trait]
pub trait PlayerBackend: Send + Sync + 'static {
    type Player: Player;

    /// Make the remote implementation available. Called at most once per
    /// factory; the outcome is shared by every mount.
    async fn load(&self) -> anyhow::Result<()>;

    /// Whether `mount` names a place a player can be created in.
    fn mount_exists(&self, mount: &str) -> bool;

    /// Construct a player. The player must deliver its notifications to the
    /// matching entries of `listeners` (keyed `onReady`, `onStateChange`, ...).
    fn create(
        &self,
        mount: &str,
        options: &PlayerOptions,
        listeners: ListenerMap,
    ) -> anyhow::Result<Arc<Self::Player>>;
}

/// Outcome of the one-time bootstrap, shared by every mount.
type LoadOutcome = Result<(), String>;

/// Produces state-confirmed proxies over a backend's players.
pub struct PlayerFactory<B: PlayerBackend> {
    backend: Arc<B>,
    loaded: Arc<OnceCell<LoadOutcome>>,
    policies: PolicyTable,
    strict_state: bool,
}

impl<B: PlayerBackend> PlayerFactory<B> {
    /// Factory with the standard policy table and strict mode off.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            loaded: Arc::new(OnceCell::new()),
            policies: PolicyTable::standard(),
            strict_state: false,
        }
    }

    /// Factory configured from a [`ProxyConfig`].
    pub fn from_config(backend: B, config: &ProxyConfig) -> Self {
        Self::new(backend).with_strict_state(config.strict_state)
    }

    /// Wait for acceptable states on governed commands.
    pub fn with_strict_state(mut self, strict_state: bool) -> Self {
        self.strict_state = strict_state;
        self
    }

    /// Replace the policy table.
    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create a player in `mount` and return its proxy.
    ///
    /// Returns immediately; calls made on the proxy wait until the player has
    /// been created and reported `ready`. Bootstrap and construction failures
    /// are emitted as `error` notifications on the proxy, and replayed to
    /// `error` handlers registered after the fact. Fails with
    /// [`ProxyError::NoRuntime`] outside a tokio runtime.
    pub fn mount(
        &self,
        mount: &str,
        options: PlayerOptions,
    ) -> Result<PlayerProxy<B::Player>, ProxyError> {
        if !self.backend.mount_exists(mount) {
            return Err(ProxyError::MountNotFound(mount.to_string()));
        }

        let runtime =
            Handle::try_current().map_err(|e| ProxyError::NoRuntime(e.to_string()))?;

        let emitter = PlayerEmitter::new();
        let (resolver, handle) = deferred();
        let session = Arc::new(Mutex::new(ReadySession::new(resolver)));

        emitter.on(PlayerEvent::Ready, {
            let session = session.clone();
            Handler::new(move |_: &EventPayload| lock(&session).mark_ready())
        });

        let proxy = PlayerProxy::new(
            handle,
            emitter.clone(),
            self.policies.clone(),
            self.strict_state,
        );

        let listeners = proxy_events(&emitter);
        let backend = Arc::clone(&self.backend);
        let loaded = Arc::clone(&self.loaded);
        let mount = mount.to_string();
        let reporter = proxy.clone();

        runtime.spawn(async move {
            let outcome = loaded
                .get_or_init(|| async {
                    info!("loading player backend");
                    backend.load().await.map_err(|e| format!("{e:#}"))
                })
                .await;

            if let Err(message) = outcome {
                error!(%mount, error = %message, "player backend failed to load");
                reporter.report_failure(json!({ "message": message }));
                return;
            }

            match backend.create(&mount, &options, listeners) {
                Ok(player) => {
                    debug!(%mount, "player created, waiting for ready");
                    lock(&session).attach(player);
                }
                Err(e) => {
                    error!(%mount, error = %e, "player creation failed");
                    reporter.report_failure(json!({ "message": format!("{e:#}") }));
                }
            }
        });

        Ok(proxy)
    }

    /// Wrap a player that already exists.
    ///
    /// The handle is resolved immediately. The proxy's listeners are added to
    /// the player with [`Player::add_listeners`], so its notifications are
    /// re-emitted and can confirm governed calls.
    pub fn attach(&self, player: Arc<B::Player>) -> PlayerProxy<B::Player> {
        let emitter = PlayerEmitter::new();
        player.add_listeners(&proxy_events(&emitter));
        debug!("attached existing player");

        PlayerProxy::new(
            DeferredPlayer::ready(player),
            emitter,
            self.policies.clone(),
            self.strict_state,
        )
    }
}

impl<B: PlayerBackend> fmt::Debug for PlayerFactory<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerFactory")
            .field("loaded", &self.loaded.initialized())
            .field("strict_state", &self.strict_state)
            .finish_non_exhaustive()
    }
}

/// Resolves a mount's handle once the player exists *and* has reported
/// `ready`, in whichever order those happen.
struct ReadySession<P> {
    player: Option<Arc<P>>,
    ready: bool,
    resolver: Option<PlayerResolver<P>>,
}

impl<P: Player> ReadySession<P> {
    fn new(resolver: PlayerResolver<P>) -> Self {
        Self {
            player: None,
            ready: false,
            resolver: Some(resolver),
        }
    }

    fn attach(&mut self, player: Arc<P>) {
        self.player = Some(player);
        self.try_resolve();
    }

    fn mark_ready(&mut self) {
        self.ready = true;
        self.try_resolve();
    }

    fn try_resolve(&mut self) {
        if !self.ready {
            return;
        }
        if let Some(player) = &self.player {
            if let Some(resolver) = self.resolver.take() {
                debug!("player ready");
                resolver.resolve(Arc::clone(player));
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("ready session mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandName, CommandValue, PlayerCommand, PlayerCommands};
    use crate::state::PlayerState;
    use crate::testing::{drain, MockBackend, MockPlayer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn backend(state: PlayerState) -> (MockBackend, Arc<MockPlayer>) {
        let player = Arc::new(MockPlayer::new(state));
        (MockBackend::new(player.clone()).with_mount("player"), player)
    }

    #[tokio::test]
    async fn test_unknown_mount_is_rejected() {
        let (backend, _) = backend(PlayerState::UNSTARTED);
        let factory = PlayerFactory::new(backend);

        let err = factory.mount("missing", PlayerOptions::default()).unwrap_err();
        assert!(matches!(err, ProxyError::MountNotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_calls_wait_for_ready() {
        let (backend, player) = backend(PlayerState::CUED);
        player.respond_with(CommandName::GetDuration, CommandValue::Number(212.0));
        let factory = PlayerFactory::new(backend);

        let proxy = factory
            .mount("player", PlayerOptions::default().with_video("M7lc1UVf-VE"))
            .unwrap();
        let call = tokio::spawn({
            let proxy = proxy.clone();
            async move { proxy.get_duration().await }
        });
        drain().await;

        // Created but not ready yet.
        assert_eq!(factory.backend().created(), 1);
        assert!(!call.is_finished());
        assert!(player.calls().is_empty());

        factory.backend().fire("onReady", json!(null));

        assert_eq!(call.await.unwrap().unwrap(), 212.0);
        assert_eq!(player.calls(), vec![PlayerCommand::GetDuration {}]);
        assert_eq!(
            factory.backend().last_options().unwrap().video_id.as_deref(),
            Some("M7lc1UVf-VE")
        );
    }

    #[tokio::test]
    async fn test_backend_loads_once_across_mounts() {
        let (backend, _) = backend(PlayerState::UNSTARTED);
        let factory = PlayerFactory::new(backend.with_mount("second"));

        let _a = factory.mount("player", PlayerOptions::default()).unwrap();
        let _b = factory.mount("second", PlayerOptions::default()).unwrap();
        drain().await;

        assert_eq!(factory.backend().load_count(), 1);
        assert_eq!(factory.backend().created(), 2);
    }

    #[tokio::test]
    async fn test_load_failure_emits_error_and_leaves_calls_pending() {
        let (backend, player) = backend(PlayerState::UNSTARTED);
        let factory = PlayerFactory::new(backend.failing_load("script blocked"));

        let proxy = factory.mount("player", PlayerOptions::default()).unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        proxy.on(PlayerEvent::Error, {
            let errors = errors.clone();
            Handler::new(move |payload: &EventPayload| errors.lock().unwrap().push(payload.clone()))
        });

        let call = tokio::spawn({
            let proxy = proxy.clone();
            async move { proxy.play_video().await }
        });
        drain().await;

        assert_eq!(
            *errors.lock().unwrap(),
            vec![json!({ "message": "script blocked" })]
        );
        assert_eq!(factory.backend().created(), 0);
        assert!(!call.is_finished());
        assert!(player.calls().is_empty());
        call.abort();
    }

    #[tokio::test]
    async fn test_create_failure_emits_error() {
        let (backend, _) = backend(PlayerState::UNSTARTED);
        let factory = PlayerFactory::new(backend.failing_create("no surface"));

        let proxy = factory.mount("player", PlayerOptions::default()).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        proxy.on(PlayerEvent::Error, {
            let count = count.clone();
            Handler::new(move |_: &EventPayload| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        });
        drain().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!proxy.player().is_resolved());
    }

    #[tokio::test]
    async fn test_mounted_player_confirms_through_its_listeners() {
        let (backend, player) = backend(PlayerState::PLAYING);
        let factory = PlayerFactory::new(backend).with_strict_state(true);

        let proxy = factory.mount("player", PlayerOptions::default()).unwrap();
        drain().await;
        factory.backend().fire("onReady", json!(null));

        let call = tokio::spawn({
            let proxy = proxy.clone();
            async move { proxy.pause_video().await }
        });
        drain().await;
        assert!(!call.is_finished());

        player.set_state(PlayerState::PAUSED);
        factory.backend().fire("onStateChange", json!(2));

        call.await.unwrap().unwrap();
        assert_eq!(proxy.emitter().listener_count(&PlayerEvent::StateChange), 0);
    }

    #[tokio::test]
    async fn test_attach_resolves_immediately() {
        let (backend, _) = backend(PlayerState::PAUSED);
        let factory = PlayerFactory::from_config(
            backend,
            &ProxyConfig {
                strict_state: true,
                ..ProxyConfig::default()
            },
        );

        let existing = Arc::new(MockPlayer::new(PlayerState::PAUSED));
        let proxy = factory.attach(existing.clone());

        assert!(proxy.strict_state());
        proxy.pause_video().await.unwrap();
        assert_eq!(existing.calls(), vec![PlayerCommand::PauseVideo {}]);
        assert_eq!(factory.backend().load_count(), 0);
    }

    #[tokio::test]
    async fn test_attached_player_confirms_through_added_listeners() {
        let (backend, _) = backend(PlayerState::UNSTARTED);
        let factory = PlayerFactory::new(backend).with_strict_state(true);

        let existing = Arc::new(MockPlayer::new(PlayerState::PLAYING));
        let proxy = factory.attach(existing.clone());

        let call = tokio::spawn({
            let proxy = proxy.clone();
            async move { proxy.pause_video().await }
        });
        drain().await;
        assert!(!call.is_finished());
        assert_eq!(proxy.emitter().listener_count(&PlayerEvent::StateChange), 1);

        existing.set_state(PlayerState::PAUSED);
        assert_eq!(existing.fire("onStateChange", json!(2)), 1);

        call.await.unwrap().unwrap();
        assert_eq!(proxy.emitter().listener_count(&PlayerEvent::StateChange), 0);
    }

    #[tokio::test]
    async fn test_late_error_handler_receives_bootstrap_failure() {
        let (backend, _) = backend(PlayerState::UNSTARTED);
        let factory = PlayerFactory::new(backend.failing_load("script blocked"));

        let proxy = factory.mount("player", PlayerOptions::default()).unwrap();
        drain().await;
        assert_eq!(
            proxy.bootstrap_error(),
            Some(json!({ "message": "script blocked" }))
        );

        let errors = Arc::new(Mutex::new(Vec::new()));
        proxy.on(PlayerEvent::Error, {
            let errors = errors.clone();
            Handler::new(move |payload: &EventPayload| errors.lock().unwrap().push(payload.clone()))
        });

        assert_eq!(
            *errors.lock().unwrap(),
            vec![json!({ "message": "script blocked" })]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_error_reaches_handler_registered_after_mount() {
        let (backend, _) = backend(PlayerState::UNSTARTED);
        let factory = PlayerFactory::new(backend.failing_load("blocked"));

        for _ in 0..200 {
            let proxy = factory.mount("player", PlayerOptions::default()).unwrap();
            let count = Arc::new(AtomicUsize::new(0));
            proxy.on(PlayerEvent::Error, {
                let count = count.clone();
                Handler::new(move |_: &EventPayload| {
                    count.fetch_add(1, Ordering::SeqCst);
                })
            });

            tokio::time::timeout(Duration::from_secs(5), async {
                while count.load(Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
            .await
            .expect("error notification never delivered");

            tokio::time::sleep(Duration::from_millis(2)).await;
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }

        assert_eq!(factory.backend().load_count(), 1);
    }

    #[test]
    fn test_mount_outside_runtime_is_an_error() {
        let (backend, _) = backend(PlayerState::UNSTARTED);
        let factory = PlayerFactory::new(backend);

        let err = factory.mount("player", PlayerOptions::default()).unwrap_err();
        assert!(matches!(err, ProxyError::NoRuntime(_)));
        assert_eq!(factory.backend().created(), 0);
    }

    #[test]
    fn test_options_serialize_camel_case() {
        let options = PlayerOptions::default()
            .with_video("abc")
            .with_size(640, 390)
            .with_var("autoplay", json!(1));

        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({
                "videoId": "abc",
                "width": 640,
                "height": 390,
                "playerVars": { "autoplay": 1 },
            })
        );
    }
}
