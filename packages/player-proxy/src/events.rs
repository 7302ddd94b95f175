//! Player notifications and the re-emission adapter.
//!
//! The wrapped player pushes notifications to listeners registered under its
//! own naming convention (`onStateChange`, `onReady`, ...). [`proxy_events`]
//! builds that listener map so every native notification is re-emitted on an
//! [`Emitter`] under its canonical name (`stateChange`, `ready`, ...).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::emitter::{Emitter, Handler};

/// Prefix the player expects in front of a capitalized event name.
pub const LISTENER_PREFIX: &str = "on";

/// Opaque payload of a native player notification.
pub type EventPayload = serde_json::Value;

/// Emitter keyed by player notification.
pub type PlayerEmitter = Emitter<PlayerEvent, EventPayload>;

/// Listener map handed to the player, keyed by listener name (`onReady`).
pub type ListenerMap = BTreeMap<String, Handler<EventPayload>>;

/// Notifications the wrapped player can emit.
///
/// `VolumeChange` is not part of the documented event set but is emitted in
/// practice with a `{ "volume": f64, "muted": bool }` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerEvent {
    ApiChange,
    Error,
    PlaybackQualityChange,
    PlaybackRateChange,
    Ready,
    StateChange,
    VolumeChange,
}

impl PlayerEvent {
    /// Every notification, in declaration order.
    pub const ALL: [PlayerEvent; 7] = [
        PlayerEvent::ApiChange,
        PlayerEvent::Error,
        PlayerEvent::PlaybackQualityChange,
        PlayerEvent::PlaybackRateChange,
        PlayerEvent::Ready,
        PlayerEvent::StateChange,
        PlayerEvent::VolumeChange,
    ];

    /// Canonical (lower camel case, unprefixed) name.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerEvent::ApiChange => "apiChange",
            PlayerEvent::Error => "error",
            PlayerEvent::PlaybackQualityChange => "playbackQualityChange",
            PlayerEvent::PlaybackRateChange => "playbackRateChange",
            PlayerEvent::Ready => "ready",
            PlayerEvent::StateChange => "stateChange",
            PlayerEvent::VolumeChange => "volumeChange",
        }
    }

    /// Name the player uses when registering a listener for this event.
    pub fn listener_name(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => format!(
                "{LISTENER_PREFIX}{}{}",
                first.to_ascii_uppercase(),
                chars.as_str()
            ),
            None => LISTENER_PREFIX.to_string(),
        }
    }
}

impl fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlayerEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// Returned when parsing an unrecognized event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown player event \"{0}\"")]
pub struct UnknownEvent(pub String);

/// Build the listener map that forwards native notifications to `emitter`.
///
/// Each listener is registered under [`PlayerEvent::listener_name`] and
/// triggers the canonical event with the payload it receives.
pub fn proxy_events(emitter: &PlayerEmitter) -> ListenerMap {
    PlayerEvent::ALL
        .into_iter()
        .map(|event| {
            let listener_name = event.listener_name();
            let emitter = emitter.clone();
            let name = listener_name.clone();

            let listener = Handler::new(move |payload: &EventPayload| {
                debug!(listener = %name, ?payload, "event");
                emitter.trigger(&event, payload);
            });

            (listener_name, listener)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_listener_names_follow_prefix_convention() {
        assert_eq!(PlayerEvent::StateChange.listener_name(), "onStateChange");
        assert_eq!(PlayerEvent::Ready.listener_name(), "onReady");
        assert_eq!(
            PlayerEvent::PlaybackQualityChange.listener_name(),
            "onPlaybackQualityChange"
        );
    }

    #[test]
    fn test_parse_canonical_names() {
        for event in PlayerEvent::ALL {
            assert_eq!(event.as_str().parse::<PlayerEvent>().unwrap(), event);
        }
        assert_eq!(
            "onReady".parse::<PlayerEvent>(),
            Err(UnknownEvent("onReady".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let json = serde_json::to_value(PlayerEvent::VolumeChange).unwrap();
        assert_eq!(json, json!("volumeChange"));
    }

    #[test]
    fn test_proxy_events_covers_every_event() {
        let emitter = PlayerEmitter::new();
        let listeners = proxy_events(&emitter);

        assert_eq!(listeners.len(), PlayerEvent::ALL.len());
        for event in PlayerEvent::ALL {
            assert!(listeners.contains_key(&event.listener_name()));
        }
    }

    #[test]
    fn test_listener_reemits_under_canonical_name() {
        let emitter = PlayerEmitter::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        {
            let received = received.clone();
            emitter.on(
                PlayerEvent::VolumeChange,
                Handler::new(move |payload: &EventPayload| {
                    received.lock().unwrap().push(payload.clone());
                }),
            );
        }

        let listeners = proxy_events(&emitter);
        let payload = json!({ "volume": 82.5, "muted": false });
        listeners["onVolumeChange"].call(&payload);
        listeners["onReady"].call(&json!(null));

        assert_eq!(*received.lock().unwrap(), vec![payload]);
    }
}
