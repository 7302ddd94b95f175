//! Pending confirmations.
//!
//! A governed call that must wait for the player subscribes a state-change
//! listener through [`PendingConfirmation::subscribe`] and then settles it:
//!
//! ```text
//!            qualifying stateChange
//!   Waiting ─────────────────────────► Settled(Confirmed(state))
//!      │
//!      │      timeout elapsed
//!      └─────────────────────────────► Settled(TimedOut)
//! ```
//!
//! Whichever edge fires first wins; the other can no longer be observed.
//! Both edges (and dropping the call's future) run the same cleanup: the
//! listener is removed from the emitter and the timer is discarded.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::emitter::Handler;
use crate::events::{EventPayload, PlayerEmitter, PlayerEvent};
use crate::player::Player;
use crate::policy::StatePolicy;
use crate::state::PlayerState;

/// Identifies one wrapped call in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a pending confirmation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// A state-change notification reported an acceptable state.
    Confirmed(PlayerState),
    /// The policy's timeout elapsed first.
    TimedOut,
}

/// Settlement slot shared with the listener. Taking the sender is the
/// waiting -> settled transition, so it happens at most once.
type Slot = Arc<Mutex<Option<oneshot::Sender<PlayerState>>>>;

/// Listener and timer bookkeeping for one wrapped call.
pub struct PendingConfirmation {
    call_id: CallId,
    emitter: PlayerEmitter,
    listener: Handler<EventPayload>,
    receiver: oneshot::Receiver<PlayerState>,
    timeout: Option<Duration>,
}

impl PendingConfirmation {
    /// Register a state-change listener that settles on the first
    /// notification after which the player reports an acceptable state.
    pub fn subscribe<P: Player>(
        call_id: CallId,
        emitter: &PlayerEmitter,
        player: Arc<P>,
        policy: &StatePolicy,
    ) -> Self {
        let (sender, receiver) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(sender)));
        let acceptable = policy.acceptable_states.clone();

        let listener = Handler::new(move |_payload: &EventPayload| {
            // The payload is informational; the player is the source of truth.
            let state = player.player_state();

            if !acceptable.contains(&state) {
                trace!(%call_id, %state, "state change does not confirm call");
                return;
            }

            let sender = match slot.lock() {
                Ok(mut guard) => guard.take(),
                Err(poisoned) => {
                    warn!(%call_id, "confirmation slot mutex was poisoned, recovering");
                    poisoned.into_inner().take()
                }
            };

            if let Some(sender) = sender {
                let _ = sender.send(state);
            }
        });

        emitter.on(PlayerEvent::StateChange, listener.clone());

        Self {
            call_id,
            emitter: emitter.clone(),
            listener,
            receiver,
            timeout: policy.timeout,
        }
    }

    /// Wait until a qualifying notification arrives or the timeout elapses.
    ///
    /// Without a timeout this waits for as long as it takes.
    pub async fn settle(mut self) -> Settlement {
        let receiver = &mut self.receiver;
        let confirmation = async move {
            match receiver.await {
                Ok(state) => state,
                // Listener gone without confirming; only the timer can end
                // the wait now.
                Err(_) => std::future::pending().await,
            }
        };

        let settlement = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, confirmation).await {
                Ok(state) => Settlement::Confirmed(state),
                Err(_) => Settlement::TimedOut,
            },
            None => Settlement::Confirmed(confirmation.await),
        };

        debug!(call_id = %self.call_id, ?settlement, "confirmation settled");
        settlement
    }
}

impl Drop for PendingConfirmation {
    fn drop(&mut self) {
        self.emitter.off(&PlayerEvent::StateChange, &self.listener);
    }
}

impl fmt::Debug for PendingConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingConfirmation")
            .field("call_id", &self.call_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
