//! Player Simulator
//!
//! Mounts a simulated remote player behind the proxy and runs a short
//! play / seek / pause script, logging every notification and how long each
//! call took to confirm.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use player_proxy::{
    async_trait, CommandName, CommandValue, EventPayload, Handler, ListenerMap, Player,
    PlayerBackend, PlayerCommand, PlayerCommands, PlayerEvent, PlayerFactory, PlayerOptions,
    PlayerState, ProxyConfig,
};
use serde_json::json;
use tokio::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time the simulated player spends buffering before settling.
const TRANSITION_DELAY: Duration = Duration::from_millis(400);

/// Time between creation and the `ready` notification.
const READY_DELAY: Duration = Duration::from_millis(150);

/// A player that acts on commands after a short buffering phase and reports
/// every transition through its listeners.
struct SimPlayer {
    state: Arc<Mutex<PlayerState>>,
    listeners: Listeners,
    volume: Mutex<u32>,
}

/// Every listener map registered on a player, in registration order.
type Listeners = Arc<Mutex<Vec<ListenerMap>>>;

impl SimPlayer {
    fn new(listeners: ListenerMap) -> Self {
        Self {
            state: Arc::new(Mutex::new(PlayerState::UNSTARTED)),
            listeners: Arc::new(Mutex::new(vec![listeners])),
            volume: Mutex::new(100),
        }
    }

    fn transition_to(&self, target: PlayerState) {
        set_state(&self.state, &self.listeners, PlayerState::BUFFERING);

        let state = Arc::clone(&self.state);
        let listeners = Arc::clone(&self.listeners);
        tokio::spawn(async move {
            tokio::time::sleep(TRANSITION_DELAY).await;
            set_state(&state, &listeners, target);
        });
    }
}

fn set_state(state: &Mutex<PlayerState>, listeners: &Listeners, next: PlayerState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    notify(listeners, PlayerEvent::StateChange, json!(next.code()));
}

fn notify(listeners: &Listeners, event: PlayerEvent, payload: EventPayload) {
    let name = event.listener_name();
    let targets: Vec<_> = listeners
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter_map(|map| map.get(&name).cloned())
        .collect();

    for listener in targets {
        listener.call(&payload);
    }
}

impl Player for SimPlayer {
    fn player_state(&self) -> PlayerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn invoke(&self, command: PlayerCommand) -> Result<CommandValue> {
        match command {
            PlayerCommand::PlayVideo {} => self.transition_to(PlayerState::PLAYING),
            PlayerCommand::PauseVideo {} => self.transition_to(PlayerState::PAUSED),
            PlayerCommand::StopVideo {} => self.transition_to(PlayerState::ENDED),
            PlayerCommand::SeekTo { .. } => {
                let resume = self.player_state();
                self.transition_to(resume);
            }
            PlayerCommand::SetVolume { volume } => {
                *self.volume.lock().unwrap_or_else(PoisonError::into_inner) = volume;
                notify(
                    &self.listeners,
                    PlayerEvent::VolumeChange,
                    json!({ "volume": volume, "muted": false }),
                );
            }
            PlayerCommand::GetVolume {} => {
                let volume = *self.volume.lock().unwrap_or_else(PoisonError::into_inner);
                return Ok(CommandValue::Number(f64::from(volume)));
            }
            PlayerCommand::GetPlayerState {} => {
                return Ok(CommandValue::State(self.player_state()));
            }
            other => anyhow::bail!("{} is not supported by the simulator", other.name()),
        }

        Ok(CommandValue::Unit)
    }

    fn add_listeners(&self, listeners: &ListenerMap) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listeners.clone());
    }
}

/// Backend with a fixed set of mount points.
struct SimBackend {
    mounts: HashSet<String>,
}

#[async_trait]
impl PlayerBackend for SimBackend {
    type Player = SimPlayer;

    async fn load(&self) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }

    fn mount_exists(&self, mount: &str) -> bool {
        self.mounts.contains(mount)
    }

    fn create(
        &self,
        mount: &str,
        options: &PlayerOptions,
        listeners: ListenerMap,
    ) -> Result<Arc<SimPlayer>> {
        tracing::info!(mount, video_id = ?options.video_id, "creating simulated player");

        let player = Arc::new(SimPlayer::new(listeners));
        let ready = Arc::clone(&player.listeners);
        tokio::spawn(async move {
            tokio::time::sleep(READY_DELAY).await;
            notify(&ready, PlayerEvent::Ready, json!(null));
        });

        Ok(player)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,player_proxy=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let config = ProxyConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(strict_state = config.strict_state, mount = %config.mount, "Starting player simulator");

    let backend = SimBackend {
        mounts: HashSet::from([config.mount.clone()]),
    };
    let factory = PlayerFactory::from_config(backend, &config);

    let player = factory
        .mount(
            &config.mount,
            PlayerOptions::default()
                .with_video("M7lc1UVf-VE")
                .with_size(640, 390),
        )
        .context("Failed to mount player")?;

    for event in PlayerEvent::ALL {
        player.on(
            event,
            Handler::new(move |payload: &EventPayload| {
                tracing::info!(%event, %payload, "notification");
            }),
        );
    }

    let started = Instant::now();
    player.play_video().await?;
    tracing::info!(elapsed = ?started.elapsed(), "play confirmed");

    let started = Instant::now();
    player.seek_to(42.0, true).await?;
    tracing::info!(elapsed = ?started.elapsed(), "seek confirmed");

    player.set_volume(35).await?;
    let volume = player.get_volume().await?;
    tracing::info!(volume, "volume set");

    let started = Instant::now();
    player.pause_video().await?;
    tracing::info!(elapsed = ?started.elapsed(), "pause confirmed");

    let state = player.get_player_state().await?;
    tracing::info!(%state, "final state");

    match player.call(PlayerCommand::NextVideo {}).await {
        Ok(_) => tracing::warn!("unsupported command succeeded"),
        Err(e) => tracing::info!(command = %CommandName::NextVideo, error = %e, "command rejected as expected"),
    }

    Ok(())
}
