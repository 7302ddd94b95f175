//! # Player Proxy
//!
//! A state-confirmed async command proxy for remote, callback-driven media
//! players.
//!
//! The wrapped player executes commands asynchronously: calling `pauseVideo`
//! only enqueues the pause, and the only way to learn that it happened is a
//! later `stateChange` notification. This crate gives every command an async
//! wrapper whose result is ready once the player has actually reached a state
//! consistent with the command.
//!
//! ## Architecture
//!
//! ```text
//! PlayerFactory::mount()
//!     │
//!     ├─► proxy_events(emitter) ──► listeners handed to the player
//!     │                                   │
//!     │                                   ▼ onStateChange, onReady, ...
//!     │                              Emitter.trigger(stateChange, payload)
//!     │                                   │
//!     ▼                                   ▼
//! PlayerProxy ── call(PlayerCommand) ── PendingConfirmation (listener + timer)
//!     │                                   │
//!     └─► DeferredPlayer.wait() ──► Player.invoke()
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Ordered emitter** - Handlers for one event fire in registration order
//! 2. **Single resolution** - The deferred player resolves at most once
//! 3. **No leaked listeners** - A pending confirmation removes its listener
//!    whether it settles by notification, by timeout or by being dropped
//! 4. **Timeouts succeed** - A confirmation timeout resolves the call with the
//!    command's value; it is not an error
//! 5. **Failures propagate** - A command the player rejects is returned to the
//!    caller, never retried
//!
//! ## Example
//!
//! ```ignore
//! use player_proxy::{PlayerCommands, PlayerFactory, PlayerOptions, ProxyConfig};
//!
//! let config = ProxyConfig::from_env()?;
//! let factory = PlayerFactory::from_config(MyBackend::new(), &config);
//!
//! let player = factory.mount(&config.mount, PlayerOptions::default().with_video("M7lc1UVf-VE"))?;
//!
//! // Resolves once the player reports PLAYING (or ENDED).
//! player.play_video().await?;
//!
//! // Resolves on the next acceptable state change, or after 3 seconds.
//! player.seek_to(42.0, true).await?;
//! ```

mod commands;
mod config;
mod confirm;
mod emitter;
mod error;
mod events;
mod factory;
mod player;
mod policy;
mod proxy;
mod state;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Scenario tests (test-only)
#[cfg(test)]
mod scenario_tests;

pub use crate::commands::{
    CommandName, CommandValue, FromCommandValue, PlayerCommand, PlayerCommands,
    SphericalProperties, UnknownCommand,
};
pub use crate::config::ProxyConfig;
pub use crate::confirm::{CallId, PendingConfirmation, Settlement};
pub use crate::emitter::{Emitter, Handler};
pub use crate::error::ProxyError;
pub use crate::events::{
    proxy_events, EventPayload, ListenerMap, PlayerEmitter, PlayerEvent, UnknownEvent,
    LISTENER_PREFIX,
};
pub use crate::factory::{PlayerBackend, PlayerFactory, PlayerOptions};
pub use crate::player::{deferred, DeferredPlayer, Player, PlayerResolver};
pub use crate::policy::{PolicyTable, StatePolicy, SEEK_CONFIRMATION_TIMEOUT};
pub use crate::proxy::PlayerProxy;
pub use crate::state::PlayerState;

// Re-export commonly used external types
pub use async_trait::async_trait;
