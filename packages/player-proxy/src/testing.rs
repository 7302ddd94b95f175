//! Test doubles for players and backends.
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! player-proxy = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use player_proxy::testing::{drain, MockBackend, MockPlayer};
//!
//! let player = Arc::new(MockPlayer::new(PlayerState::PLAYING));
//! let factory = PlayerFactory::new(MockBackend::new(player.clone()).with_mount("player"))
//!     .with_strict_state(true);
//!
//! let proxy = factory.mount("player", PlayerOptions::default())?;
//! drain().await;
//! factory.backend().fire("onReady", json!(null));
//!
//! let pause = tokio::spawn(async move { proxy.pause_video().await });
//! drain().await;
//!
//! player.set_state(PlayerState::PAUSED);
//! factory.backend().fire("onStateChange", json!(2));
//! pause.await??;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::commands::{CommandName, CommandValue, PlayerCommand};
use crate::events::{EventPayload, ListenerMap};
use crate::factory::{PlayerBackend, PlayerOptions};
use crate::player::Player;
use crate::state::PlayerState;

type InvokeHook = Arc<dyn Fn(&PlayerCommand) + Send + Sync>;

/// Yield to the scheduler enough times for spawned tasks to reach their
/// next suspension point.
pub async fn drain() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scriptable in-memory [`Player`].
///
/// Records every invoked command. State only changes when the test says so.
#[derive(Default)]
pub struct MockPlayer {
    state: Mutex<PlayerState>,
    calls: Mutex<Vec<PlayerCommand>>,
    responses: Mutex<HashMap<CommandName, CommandValue>>,
    failures: Mutex<HashMap<CommandName, String>>,
    hook: Mutex<Option<InvokeHook>>,
    listeners: Mutex<Vec<ListenerMap>>,
}

impl MockPlayer {
    pub fn new(state: PlayerState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    pub fn set_state(&self, state: PlayerState) {
        *lock(&self.state) = state;
    }

    /// Answer `command` with `value` from now on.
    pub fn respond_with(&self, command: CommandName, value: CommandValue) {
        lock(&self.responses).insert(command, value);
    }

    /// Fail `command` with `message` from now on.
    pub fn fail_on(&self, command: CommandName, message: impl Into<String>) {
        lock(&self.failures).insert(command, message.into());
    }

    /// Run `hook` inside every invocation, before it returns.
    pub fn on_invoke<F>(&self, hook: F)
    where
        F: Fn(&PlayerCommand) + Send + Sync + 'static,
    {
        *lock(&self.hook) = Some(Arc::new(hook));
    }

    /// Commands invoked so far, oldest first.
    pub fn calls(&self) -> Vec<PlayerCommand> {
        lock(&self.calls).clone()
    }

    /// Deliver a native notification to every listener named `listener_name`
    /// added through [`Player::add_listeners`]. Returns how many were called.
    pub fn fire(&self, listener_name: &str, payload: EventPayload) -> usize {
        let targets: Vec<_> = lock(&self.listeners)
            .iter()
            .filter_map(|listeners| listeners.get(listener_name).cloned())
            .collect();

        for listener in &targets {
            listener.call(&payload);
        }
        targets.len()
    }
}

impl Player for MockPlayer {
    fn player_state(&self) -> PlayerState {
        *lock(&self.state)
    }

    fn invoke(&self, command: PlayerCommand) -> anyhow::Result<CommandValue> {
        let name = command.name();
        lock(&self.calls).push(command.clone());

        let hook = lock(&self.hook).clone();
        if let Some(hook) = hook {
            hook(&command);
        }

        if let Some(message) = lock(&self.failures).get(&name) {
            return Err(anyhow!("{message}"));
        }

        if let Some(value) = lock(&self.responses).get(&name) {
            return Ok(value.clone());
        }

        Ok(match name {
            CommandName::GetPlayerState => CommandValue::State(self.player_state()),
            _ => CommandValue::Unit,
        })
    }

    fn add_listeners(&self, listeners: &ListenerMap) {
        lock(&self.listeners).push(listeners.clone());
    }
}

/// In-memory [`PlayerBackend`] that hands out one shared [`MockPlayer`].
pub struct MockBackend {
    player: Arc<MockPlayer>,
    mounts: HashSet<String>,
    load_error: Option<String>,
    create_error: Option<String>,
    loads: AtomicUsize,
    created: Mutex<Vec<(PlayerOptions, ListenerMap)>>,
}

impl MockBackend {
    pub fn new(player: Arc<MockPlayer>) -> Self {
        Self {
            player,
            mounts: HashSet::new(),
            load_error: None,
            create_error: None,
            loads: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mounts.insert(mount.into());
        self
    }

    pub fn failing_load(mut self, message: impl Into<String>) -> Self {
        self.load_error = Some(message.into());
        self
    }

    pub fn failing_create(mut self, message: impl Into<String>) -> Self {
        self.create_error = Some(message.into());
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of players created.
    pub fn created(&self) -> usize {
        lock(&self.created).len()
    }

    /// Options of the most recently created player.
    pub fn last_options(&self) -> Option<PlayerOptions> {
        lock(&self.created).last().map(|(options, _)| options.clone())
    }

    /// Deliver a native notification to the most recently created player's
    /// listener `listener_name` (e.g. `onReady`). Returns `false` if there is
    /// no such listener.
    pub fn fire(&self, listener_name: &str, payload: EventPayload) -> bool {
        let listener = lock(&self.created)
            .last()
            .and_then(|(_, listeners)| listeners.get(listener_name).cloned());

        match listener {
            Some(listener) => {
                listener.call(&payload);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PlayerBackend for MockBackend {
    type Player = MockPlayer;

    async fn load(&self) -> anyhow::Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.load_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn mount_exists(&self, mount: &str) -> bool {
        self.mounts.contains(mount)
    }

    fn create(
        &self,
        _mount: &str,
        options: &PlayerOptions,
        listeners: ListenerMap,
    ) -> anyhow::Result<Arc<MockPlayer>> {
        if let Some(message) = &self.create_error {
            return Err(anyhow!("{message}"));
        }

        lock(&self.created).push((options.clone(), listeners));
        Ok(self.player.clone())
    }
}
