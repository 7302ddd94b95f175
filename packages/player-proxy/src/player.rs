//! The wrapped player and the deferred handle used to reach it.
//!
//! The player becomes available some time after the proxy is built (its
//! remote implementation has to bootstrap first). [`deferred`] returns a
//! resolver/handle pair: the bootstrap side resolves once, and every wrapper
//! awaits the handle before touching the player.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::commands::{CommandValue, PlayerCommand};
use crate::events::ListenerMap;
use crate::state::PlayerState;

/// A remote, callback-driven player.
///
/// `invoke` only enqueues work on the player; completion is observed later
/// through state-change notifications.
pub trait Player: Send + Sync + 'static {
    /// Current state code.
    fn player_state(&self) -> PlayerState;

    /// Invoke a command and return its immediate value.
    fn invoke(&self, command: PlayerCommand) -> anyhow::Result<CommandValue>;

    /// Register notification listeners on a player that already exists.
    ///
    /// Keys follow the player's listener naming (`onReady`, `onStateChange`,
    /// ...). Listeners added here receive notifications in addition to any
    /// the player was created with.
    fn add_listeners(&self, listeners: &ListenerMap);
}

/// Create a single-resolution player handle.
pub fn deferred<P: Player>() -> (PlayerResolver<P>, DeferredPlayer<P>) {
    let (sender, receiver) = watch::channel(None);
    (PlayerResolver { sender }, DeferredPlayer { receiver })
}

/// Resolving side of a [`DeferredPlayer`]. Consumed on use, so a handle can
/// only ever resolve once.
pub struct PlayerResolver<P> {
    sender: watch::Sender<Option<Arc<P>>>,
}

impl<P: Player> PlayerResolver<P> {
    /// Make `player` available to every waiter.
    pub fn resolve(self, player: Arc<P>) {
        self.sender.send_replace(Some(player));
    }
}

impl<P> fmt::Debug for PlayerResolver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerResolver")
            .field("waiters", &self.sender.receiver_count())
            .finish()
    }
}

/// Shared handle to a player that may not exist yet.
pub struct DeferredPlayer<P> {
    receiver: watch::Receiver<Option<Arc<P>>>,
}

impl<P: Player> DeferredPlayer<P> {
    /// A handle that is already resolved.
    pub fn ready(player: Arc<P>) -> Self {
        let (resolver, handle) = deferred();
        resolver.resolve(player);
        handle
    }

    /// Wait for the player.
    ///
    /// If the resolver is dropped without resolving (bootstrap failed), this
    /// never completes. The failure is reported out of band through the
    /// `error` notification.
    pub async fn wait(&self) -> Arc<P> {
        let mut receiver = self.receiver.clone();

        let resolved = match receiver.wait_for(|player| player.is_some()).await {
            Ok(player) => Option::clone(&player),
            Err(_) => None,
        };

        match resolved {
            Some(player) => player,
            None => {
                warn!("player handle abandoned before resolving");
                std::future::pending().await
            }
        }
    }

    /// The player, if the handle has already resolved.
    pub fn get(&self) -> Option<Arc<P>> {
        Option::clone(&self.receiver.borrow())
    }

    pub fn is_resolved(&self) -> bool {
        self.receiver.borrow().is_some()
    }
}

impl<P> Clone for DeferredPlayer<P> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
        }
    }
}

impl<P> fmt::Debug for DeferredPlayer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredPlayer")
            .field("resolved", &self.receiver.borrow().is_some())
            .finish()
    }
}
