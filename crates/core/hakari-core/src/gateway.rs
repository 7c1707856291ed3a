//! Voice transport seam
//!
//! The session state machine never touches Discord directly; it drives
//! a [`VoiceGateway`]. The Discord adaptor implements this on songbird,
//! tests implement it with an in-memory fake.

use async_trait::async_trait;

use crate::error::Result;

/// Voice transport operations the session manager depends on
///
/// Completion of a playback cycle is *not* part of this trait: the
/// gateway reports cycle ends asynchronously (the adaptor feeds them
/// into [`crate::manager::SessionManager::on_cycle_end`]).
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Join the voice channel and set up the player for this guild.
    /// Joining again for the same guild must reuse the live connection.
    async fn connect(&self, guild_id: u64, channel_id: u64) -> Result<()>;

    /// Load the clip fresh and start one playback cycle. Returns as
    /// soon as playback is started; the cycle end is reported
    /// asynchronously.
    async fn play_clip(&self, guild_id: u64) -> Result<()>;

    /// Release the connection and player for this guild. Best effort:
    /// a transport that is already gone is not an error.
    async fn disconnect(&self, guild_id: u64);

    /// Current member count of the voice channel, bot included.
    /// `None` when the channel is unknown to the gateway.
    async fn occupant_count(&self, guild_id: u64, channel_id: u64) -> Option<usize>;
}
