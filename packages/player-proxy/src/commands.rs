//! The player's command set.
//!
//! Every command the wrapped player exposes is declared once in the table at
//! the bottom of this file. The table generates:
//!
//! - [`CommandName`]: the ordered list of command names
//! - [`PlayerCommand`]: one variant per command with typed arguments
//! - [`PlayerCommands`]: one typed async wrapper per command
//!
//! Wrappers delegate to [`PlayerCommands::call`] and convert the player's raw
//! [`CommandValue`] into the command's result type.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;
use crate::state::PlayerState;

// =============================================================================
// Raw Values
// =============================================================================

/// Raw value returned by a player invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CommandValue {
    #[default]
    Unit,
    Bool(bool),
    Number(f64),
    Integer(i64),
    Text(String),
    TextList(Vec<String>),
    NumberList(Vec<f64>),
    State(PlayerState),
    Json(serde_json::Value),
}

impl CommandValue {
    /// Short shape name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandValue::Unit => "unit",
            CommandValue::Bool(_) => "bool",
            CommandValue::Number(_) => "number",
            CommandValue::Integer(_) => "integer",
            CommandValue::Text(_) => "text",
            CommandValue::TextList(_) => "text list",
            CommandValue::NumberList(_) => "number list",
            CommandValue::State(_) => "state",
            CommandValue::Json(_) => "json",
        }
    }
}

/// Conversion from a raw [`CommandValue`] into a wrapper's result type.
pub trait FromCommandValue: Sized {
    /// Shape name used when the conversion fails.
    const EXPECTED: &'static str;

    /// Convert, or hand the value back when the shape does not match.
    fn from_value(value: CommandValue) -> Result<Self, CommandValue>;

    /// Convert, attributing a mismatch to `command`.
    fn from_command_value(command: CommandName, value: CommandValue) -> Result<Self, ProxyError> {
        Self::from_value(value).map_err(|actual| ProxyError::UnexpectedValue {
            command,
            expected: Self::EXPECTED,
            actual: actual.kind(),
        })
    }
}

impl FromCommandValue for CommandValue {
    const EXPECTED: &'static str = "any";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        Ok(value)
    }
}

impl FromCommandValue for () {
    const EXPECTED: &'static str = "unit";

    // Commands without a result may still hand back something; it is dropped.
    fn from_value(_value: CommandValue) -> Result<Self, CommandValue> {
        Ok(())
    }
}

impl FromCommandValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        match value {
            CommandValue::Bool(b) => Ok(b),
            other => Err(other),
        }
    }
}

impl FromCommandValue for f64 {
    const EXPECTED: &'static str = "number";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        match value {
            CommandValue::Number(n) => Ok(n),
            CommandValue::Integer(n) => Ok(n as f64),
            other => Err(other),
        }
    }
}

impl FromCommandValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        match value {
            CommandValue::Integer(n) => Ok(n),
            CommandValue::Number(n) if n.fract() == 0.0 => Ok(n as i64),
            other => Err(other),
        }
    }
}

impl FromCommandValue for String {
    const EXPECTED: &'static str = "text";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        match value {
            CommandValue::Text(s) => Ok(s),
            other => Err(other),
        }
    }
}

impl FromCommandValue for Vec<String> {
    const EXPECTED: &'static str = "text list";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        match value {
            CommandValue::TextList(list) => Ok(list),
            other => Err(other),
        }
    }
}

impl FromCommandValue for Vec<f64> {
    const EXPECTED: &'static str = "number list";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        match value {
            CommandValue::NumberList(list) => Ok(list),
            other => Err(other),
        }
    }
}

impl FromCommandValue for PlayerState {
    const EXPECTED: &'static str = "state";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        match value {
            CommandValue::State(state) => Ok(state),
            CommandValue::Integer(code) => match i32::try_from(code) {
                Ok(code) => Ok(PlayerState::from_code(code)),
                Err(_) => Err(CommandValue::Integer(code)),
            },
            other => Err(other),
        }
    }
}

impl FromCommandValue for serde_json::Value {
    const EXPECTED: &'static str = "json";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        match value {
            CommandValue::Json(json) => Ok(json),
            CommandValue::Unit => Ok(serde_json::Value::Null),
            other => Err(other),
        }
    }
}

impl FromCommandValue for SphericalProperties {
    const EXPECTED: &'static str = "spherical properties";

    fn from_value(value: CommandValue) -> Result<Self, CommandValue> {
        match value {
            CommandValue::Json(json) => {
                serde_json::from_value(json.clone()).map_err(|_| CommandValue::Json(json))
            }
            other => Err(other),
        }
    }
}

/// View settings of a 360° video. Unset fields are left unchanged on write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SphericalProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fov: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_orientation_sensor: Option<bool>,
}

/// Returned when parsing an unrecognized command name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown player command \"{0}\"")]
pub struct UnknownCommand(pub String);

// =============================================================================
// Command Table
// =============================================================================

macro_rules! player_commands {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident = $name:literal => fn $method:ident($($arg:ident: $ty:ty),*) -> $ret:ty;
        )+
    ) => {
        /// Name of a player command. Serializes as the player spells it.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum CommandName {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl CommandName {
            /// Every command, in the player's documented order.
            pub const ALL: &'static [CommandName] = &[$(CommandName::$variant,)+];

            /// Name as the player spells it.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(CommandName::$variant => $name,)+
                }
            }
        }

        impl FromStr for CommandName {
            type Err = UnknownCommand;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(CommandName::$variant),)+
                    other => Err(UnknownCommand(other.to_string())),
                }
            }
        }

        /// A player command together with its arguments.
        #[derive(Debug, Clone, PartialEq)]
        pub enum PlayerCommand {
            $(
                $(#[$meta])*
                $variant { $($arg: $ty),* },
            )+
        }

        impl PlayerCommand {
            /// Name of this command.
            pub fn name(&self) -> CommandName {
                match self {
                    $(PlayerCommand::$variant { .. } => CommandName::$variant,)+
                }
            }
        }

        /// Typed async wrappers over the player's command set.
        ///
        /// Implementors provide [`call`](PlayerCommands::call); every other
        /// method builds the matching [`PlayerCommand`] and converts the
        /// result.
        #[async_trait]
        pub trait PlayerCommands: Send + Sync {
            /// Invoke a command and return its raw value.
            async fn call(&self, command: PlayerCommand) -> Result<CommandValue, ProxyError>;

            $(
                $(#[$meta])*
                async fn $method(&self, $($arg: $ty),*) -> Result<$ret, ProxyError> {
                    let value = self.call(PlayerCommand::$variant { $($arg),* }).await?;
                    <$ret as FromCommandValue>::from_command_value(CommandName::$variant, value)
                }
            )+
        }
    };
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

player_commands! {
    /// Cue a video without starting playback.
    CueVideoById = "cueVideoById" => fn cue_video_by_id(
        video_id: String,
        start_seconds: Option<f64>,
        suggested_quality: Option<String>
    ) -> ();
    /// Load and play a video.
    LoadVideoById = "loadVideoById" => fn load_video_by_id(
        video_id: String,
        start_seconds: Option<f64>,
        suggested_quality: Option<String>
    ) -> ();
    CueVideoByUrl = "cueVideoByUrl" => fn cue_video_by_url(
        media_content_url: String,
        start_seconds: Option<f64>,
        suggested_quality: Option<String>
    ) -> ();
    LoadVideoByUrl = "loadVideoByUrl" => fn load_video_by_url(
        media_content_url: String,
        start_seconds: Option<f64>,
        suggested_quality: Option<String>
    ) -> ();
    PlayVideo = "playVideo" => fn play_video() -> ();
    PauseVideo = "pauseVideo" => fn pause_video() -> ();
    StopVideo = "stopVideo" => fn stop_video() -> ();
    /// Fraction of the video the player has buffered, `0.0..=1.0`.
    GetVideoLoadedFraction = "getVideoLoadedFraction" => fn get_video_loaded_fraction() -> f64;
    CuePlaylist = "cuePlaylist" => fn cue_playlist(
        playlist: Vec<String>,
        index: Option<u32>,
        start_seconds: Option<f64>,
        suggested_quality: Option<String>
    ) -> ();
    LoadPlaylist = "loadPlaylist" => fn load_playlist(
        playlist: Vec<String>,
        index: Option<u32>,
        start_seconds: Option<f64>,
        suggested_quality: Option<String>
    ) -> ();
    NextVideo = "nextVideo" => fn next_video() -> ();
    PreviousVideo = "previousVideo" => fn previous_video() -> ();
    PlayVideoAt = "playVideoAt" => fn play_video_at(index: u32) -> ();
    SetShuffle = "setShuffle" => fn set_shuffle(shuffle_playlist: bool) -> ();
    SetLoop = "setLoop" => fn set_loop(loop_playlists: bool) -> ();
    GetPlaylist = "getPlaylist" => fn get_playlist() -> Vec<String>;
    GetPlaylistIndex = "getPlaylistIndex" => fn get_playlist_index() -> i64;
    SetOption = "setOption" => fn set_option(
        module: String,
        option: String,
        value: serde_json::Value
    ) -> ();
    Mute = "mute" => fn mute() -> ();
    UnMute = "unMute" => fn un_mute() -> ();
    IsMuted = "isMuted" => fn is_muted() -> bool;
    /// Volume as an integer between 0 and 100.
    SetVolume = "setVolume" => fn set_volume(volume: u32) -> ();
    GetVolume = "getVolume" => fn get_volume() -> f64;
    /// Seek to `seconds`. `allow_seek_ahead` lets the player fetch unbuffered
    /// data from the server.
    SeekTo = "seekTo" => fn seek_to(seconds: f64, allow_seek_ahead: bool) -> ();
    GetPlayerState = "getPlayerState" => fn get_player_state() -> PlayerState;
    GetPlaybackRate = "getPlaybackRate" => fn get_playback_rate() -> f64;
    SetPlaybackRate = "setPlaybackRate" => fn set_playback_rate(suggested_rate: f64) -> ();
    GetAvailablePlaybackRates = "getAvailablePlaybackRates" => fn get_available_playback_rates() -> Vec<f64>;
    GetPlaybackQuality = "getPlaybackQuality" => fn get_playback_quality() -> String;
    SetPlaybackQuality = "setPlaybackQuality" => fn set_playback_quality(suggested_quality: String) -> ();
    GetAvailableQualityLevels = "getAvailableQualityLevels" => fn get_available_quality_levels() -> Vec<String>;
    GetCurrentTime = "getCurrentTime" => fn get_current_time() -> f64;
    GetDuration = "getDuration" => fn get_duration() -> f64;
    GetVideoUrl = "getVideoUrl" => fn get_video_url() -> String;
    GetVideoEmbedCode = "getVideoEmbedCode" => fn get_video_embed_code() -> String;
    /// Option names of `module`, or the module names when `module` is `None`.
    GetOptions = "getOptions" => fn get_options(module: Option<String>) -> Vec<String>;
    GetOption = "getOption" => fn get_option(module: String, option: String) -> serde_json::Value;
    Destroy = "destroy" => fn destroy() -> ();
    SetSize = "setSize" => fn set_size(width: u32, height: u32) -> serde_json::Value;
    GetSphericalProperties = "getSphericalProperties" => fn get_spherical_properties() -> SphericalProperties;
    SetSphericalProperties = "setSphericalProperties" => fn set_spherical_properties(
        properties: SphericalProperties
    ) -> ();
}
