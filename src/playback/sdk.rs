use std::fmt;

/// Transport controls forwarded to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Resume,
    Pause,
    PreviousTrack,
    NextTrack,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transport::Resume => "resume playback",
            Transport::Pause => "pause playback",
            Transport::PreviousTrack => "skip to previous track",
            Transport::NextTrack => "skip to next track",
        };
        write!(f, "{}", name)
    }
}

/// The player SDK as the session sees it.
///
/// Outcomes that the real SDK reports through listeners (`ready`,
/// `not_ready`, the error listeners, `player_state_changed`) are not return
/// values here: the implementation feeds them to the session as
/// [`SdkEvent`](super::SdkEvent)s.
#[allow(async_fn_in_trait)]
pub trait PlayerSdk {
    /// Whether the SDK script is loaded and a player can be created.
    fn is_loaded(&self) -> bool;

    /// Creates the player, registers its listeners and connects it.
    ///
    /// `Ok(false)` means the SDK refused the connection.
    async fn connect(&mut self, token: &str, player_name: &str) -> Result<bool, String>;

    /// Disconnects and drops the player.
    async fn disconnect(&mut self);

    async fn transport(&mut self, action: Transport) -> Result<(), String>;
}
