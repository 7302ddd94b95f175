//! The state-confirmed command proxy.
//!
//! [`PlayerProxy`] exposes every player command as an async call (through
//! [`PlayerCommands`]). What a call waits for depends on the command and on
//! strict mode:
//!
//! | Command                     | Strict off | Strict on                                  |
//! |-----------------------------|------------|--------------------------------------------|
//! | Not in the [`PolicyTable`]  | raw value  | raw value                                  |
//! | Governed                    | raw value  | raw value once the player confirms the state |
//!
//! A governed call in strict mode:
//!
//! 1. awaits the deferred player
//! 2. reads the pre-call state
//! 3. decides whether confirmation is required (the policy forces a state
//!    change, or the pre-call state is not acceptable)
//! 4. subscribes to `stateChange` if it is, then invokes the command
//! 5. resolves with the invocation's value immediately, or once a
//!    notification leaves the player in an acceptable state, or once the
//!    policy's timeout elapses
//!
//! Subscribing before invoking means a notification pushed while the command
//! runs cannot slip past the call. Nothing suspends between the two steps.
//!
//! A bootstrap failure is latched on the proxy. `error` handlers added with
//! [`PlayerProxy::on`] after it was reported receive it once on registration,
//! so a failure that races ahead of the caller is never lost.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::commands::{CommandValue, PlayerCommand, PlayerCommands};
use crate::confirm::{CallId, PendingConfirmation, Settlement};
use crate::emitter::Handler;
use crate::error::ProxyError;
use crate::events::{proxy_events, EventPayload, ListenerMap, PlayerEmitter, PlayerEvent};
use crate::player::{DeferredPlayer, Player};
use crate::policy::PolicyTable;

/// Async, state-confirmed view of a player.
///
/// Cloning is cheap; clones share the player handle, the emitter and the
/// policy table.
pub struct PlayerProxy<P> {
    player: DeferredPlayer<P>,
    emitter: PlayerEmitter,
    policies: Arc<PolicyTable>,
    strict_state: bool,
    failure: Arc<Mutex<Option<EventPayload>>>,
}

impl<P: Player> PlayerProxy<P> {
    /// Build a proxy over a deferred player.
    ///
    /// `emitter` must be the emitter the player's notifications are re-emitted
    /// on (see [`proxy_events`]). With `strict_state` off every command is a
    /// pass-through.
    pub fn new(
        player: DeferredPlayer<P>,
        emitter: PlayerEmitter,
        policies: PolicyTable,
        strict_state: bool,
    ) -> Self {
        Self {
            player,
            emitter,
            policies: Arc::new(policies),
            strict_state,
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Listen for a re-emitted player notification.
    ///
    /// An `error` handler registered after a bootstrap failure was reported
    /// is invoked with that failure right away.
    pub fn on(&self, event: PlayerEvent, handler: Handler<EventPayload>) {
        if event != PlayerEvent::Error {
            self.emitter.on(event, handler);
            return;
        }

        let replay = {
            let failure = self.lock_failure();
            self.emitter.on(event, handler.clone());
            failure.clone()
        };

        if let Some(payload) = replay {
            debug!(?payload, "replaying bootstrap failure to late error handler");
            handler.call(&payload);
        }
    }

    /// Stop listening. Removing an unknown handler is a no-op.
    pub fn off(&self, event: PlayerEvent, handler: &Handler<EventPayload>) -> bool {
        self.emitter.off(&event, handler)
    }

    /// Listener map that feeds this proxy's emitter.
    pub fn listeners(&self) -> ListenerMap {
        proxy_events(&self.emitter)
    }

    pub fn emitter(&self) -> &PlayerEmitter {
        &self.emitter
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn strict_state(&self) -> bool {
        self.strict_state
    }

    /// The deferred player handle shared by every call.
    pub fn player(&self) -> &DeferredPlayer<P> {
        &self.player
    }

    /// Payload of the bootstrap failure, if one was reported.
    pub fn bootstrap_error(&self) -> Option<EventPayload> {
        self.lock_failure().clone()
    }

    /// Latch a bootstrap failure and emit it as `error`.
    ///
    /// The latch and the handler snapshot are taken under one lock, so every
    /// `error` handler sees the failure exactly once, whether it was
    /// registered before or after this call.
    pub(crate) fn report_failure(&self, payload: EventPayload) {
        let handlers = {
            let mut failure = self.lock_failure();
            *failure = Some(payload.clone());
            self.emitter.handlers(&PlayerEvent::Error)
        };

        for handler in &handlers {
            handler.call(&payload);
        }
    }

    fn lock_failure(&self) -> MutexGuard<'_, Option<EventPayload>> {
        match self.failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("bootstrap failure mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    async fn invoke(&self, command: PlayerCommand) -> Result<CommandValue, ProxyError> {
        let name = command.name();
        let player = self.player.wait().await;

        let Some(policy) = self.policies.get(name).filter(|_| self.strict_state) else {
            trace!(command = %name, "invoking ungoverned command");
            return player
                .invoke(command)
                .map_err(|e| ProxyError::command(name, e));
        };

        let call_id = CallId::new();
        let pre_call_state = player.player_state();

        if !policy.requires_confirmation(pre_call_state) {
            debug!(
                %call_id,
                command = %name,
                state = %pre_call_state,
                "state already acceptable, no confirmation needed"
            );
            return player
                .invoke(command)
                .map_err(|e| ProxyError::command(name, e));
        }

        let pending = PendingConfirmation::subscribe(call_id, &self.emitter, player.clone(), policy);

        // On failure `pending` drops here and its listener goes with it.
        let value = player
            .invoke(command)
            .map_err(|e| ProxyError::command(name, e))?;

        debug!(
            %call_id,
            command = %name,
            state = %pre_call_state,
            timeout = ?policy.timeout,
            "awaiting state confirmation"
        );

        match pending.settle().await {
            Settlement::Confirmed(state) => {
                debug!(%call_id, command = %name, %state, "command confirmed");
            }
            Settlement::TimedOut => {
                debug!(%call_id, command = %name, "no confirming state change, resolving anyway");
            }
        }

        Ok(value)
    }
}

#[async_trait]
impl<P: Player> PlayerCommands for PlayerProxy<P> {
    async fn call(&self, command: PlayerCommand) -> Result<CommandValue, ProxyError> {
        self.invoke(command).await
    }
}

impl<P> Clone for PlayerProxy<P> {
    fn clone(&self) -> Self {
        Self {
            player: self.player.clone(),
            emitter: self.emitter.clone(),
            policies: Arc::clone(&self.policies),
            strict_state: self.strict_state,
            failure: Arc::clone(&self.failure),
        }
    }
}

impl<P> fmt::Debug for PlayerProxy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerProxy")
            .field("player", &self.player)
            .field("strict_state", &self.strict_state)
            .field("governed", &self.policies.len())
            .finish()
    }
}
