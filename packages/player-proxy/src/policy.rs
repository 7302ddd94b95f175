//! Per-command confirmation policies.
//!
//! A command listed in the [`PolicyTable`] is *governed*: in strict mode its
//! wrapper does not resolve until the player reports one of the policy's
//! acceptable states (or the policy's timeout elapses). Commands missing from
//! the table resolve on the player's raw return value.

use std::collections::HashMap;
use std::time::Duration;

use smallvec::SmallVec;

use crate::commands::CommandName;
use crate::state::PlayerState;

/// How long a seek waits for a confirming transition.
///
/// A seek that needs no buffering may leave the state unchanged, so no
/// notification is guaranteed.
pub const SEEK_CONFIRMATION_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Confirmation policy for one governed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePolicy {
    /// States that confirm the command took effect, in priority order.
    pub acceptable_states: SmallVec<[PlayerState; 4]>,

    /// Wait for a notification even when the pre-call state is already
    /// acceptable.
    pub state_change_required: bool,

    /// Resolve anyway after this long without a qualifying notification.
    pub timeout: Option<Duration>,
}

impl StatePolicy {
    /// Policy accepting `states`, with no forced change and no timeout.
    pub fn new(states: impl IntoIterator<Item = PlayerState>) -> Self {
        let mut acceptable_states = SmallVec::new();
        for state in states {
            if !acceptable_states.contains(&state) {
                acceptable_states.push(state);
            }
        }

        Self {
            acceptable_states,
            state_change_required: false,
            timeout: None,
        }
    }

    /// Always wait for a notification, even from an acceptable state.
    pub fn require_state_change(mut self) -> Self {
        self.state_change_required = true;
        self
    }

    /// Resolve after `timeout` if no qualifying notification arrives.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether `state` confirms the command.
    pub fn accepts(&self, state: PlayerState) -> bool {
        self.acceptable_states.contains(&state)
    }

    /// Whether a call issued from `pre_call_state` must wait for confirmation.
    pub fn requires_confirmation(&self, pre_call_state: PlayerState) -> bool {
        self.state_change_required || !self.accepts(pre_call_state)
    }
}

/// Static mapping from governed command to its [`StatePolicy`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    policies: HashMap<CommandName, StatePolicy>,
}

impl PolicyTable {
    /// A table that governs nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The player's standard policies for `pauseVideo`, `playVideo` and
    /// `seekTo`.
    pub fn standard() -> Self {
        Self::empty()
            .with(
                CommandName::PauseVideo,
                StatePolicy::new([PlayerState::ENDED, PlayerState::PAUSED]),
            )
            .with(
                CommandName::PlayVideo,
                StatePolicy::new([PlayerState::ENDED, PlayerState::PLAYING]),
            )
            .with(
                CommandName::SeekTo,
                StatePolicy::new([PlayerState::ENDED, PlayerState::PLAYING, PlayerState::PAUSED])
                    .require_state_change()
                    .with_timeout(SEEK_CONFIRMATION_TIMEOUT),
            )
    }

    /// Add or replace the policy for `command`.
    pub fn with(mut self, command: CommandName, policy: StatePolicy) -> Self {
        self.policies.insert(command, policy);
        self
    }

    /// Policy for `command`, if it is governed.
    pub fn get(&self, command: CommandName) -> Option<&StatePolicy> {
        self.policies.get(&command)
    }

    /// Whether `command` is governed.
    pub fn governs(&self, command: CommandName) -> bool {
        self.policies.contains_key(&command)
    }

    /// Governed commands in command-table order.
    pub fn governed(&self) -> impl Iterator<Item = CommandName> + '_ {
        CommandName::ALL
            .iter()
            .copied()
            .filter(|command| self.governs(*command))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
