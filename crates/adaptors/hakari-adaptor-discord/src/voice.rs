//! Songbird-backed playback driver
//!
//! Implements the core's [`VoiceGateway`] on songbird: one call and
//! player per guild, a fresh clip input per cycle (inputs are not
//! reusable after one playthrough), a fixed volume, and a track-end
//! notifier that feeds cycle completions back to the session manager
//! over a channel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::File as ClipFile;
use songbird::{Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use hakari_core::{HakariError, Result, VoiceGateway};

/// Playback volume applied to every cycle, as a fraction of full scale
pub const CLIP_VOLUME: f32 = 0.35;

/// Voice-state tracker shared with the serenity event handler:
/// `(guild_id, user_id) -> channel_id`, bot included. Kept by hand
/// because it is more reliable than the cache for voice states.
pub type VoiceStateMap = Arc<RwLock<HashMap<(u64, u64), u64>>>;

/// [`VoiceGateway`] on top of songbird
pub struct SongbirdGateway {
    songbird: Arc<Songbird>,
    voice_states: VoiceStateMap,
    clip_path: PathBuf,
    cycle_ends: UnboundedSender<u64>,
}

impl SongbirdGateway {
    /// Build a gateway over an existing songbird instance. Cycle ends
    /// are reported on `cycle_ends`, one guild id per finished clip.
    pub fn new(
        songbird: Arc<Songbird>,
        voice_states: VoiceStateMap,
        clip_path: PathBuf,
        cycle_ends: UnboundedSender<u64>,
    ) -> Self {
        Self {
            songbird,
            voice_states,
            clip_path,
            cycle_ends,
        }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(&self, guild_id: u64, channel_id: u64) -> Result<()> {
        // Joining a guild the bot is already in reuses the live call.
        self.songbird
            .join(GuildId::new(guild_id), ChannelId::new(channel_id))
            .await
            .map(|_| ())
            .map_err(HakariError::transport)
    }

    async fn play_clip(&self, guild_id: u64) -> Result<()> {
        let call_lock = self
            .songbird
            .get(GuildId::new(guild_id))
            .ok_or_else(|| HakariError::Transport("no live call for guild".into()))?;

        let mut call = call_lock.lock().await;
        let track = call.play_input(ClipFile::new(self.clip_path.clone()).into());
        if let Err(e) = track.set_volume(CLIP_VOLUME) {
            warn!(guild_id = %guild_id, error = %e, "Failed to set clip volume");
        }
        track
            .add_event(
                Event::Track(TrackEvent::End),
                ClipEndNotifier {
                    guild_id,
                    cycle_ends: self.cycle_ends.clone(),
                },
            )
            .map_err(HakariError::transport)?;
        debug!(guild_id = %guild_id, clip = %self.clip_path.display(), "Clip cycle started");
        Ok(())
    }

    async fn disconnect(&self, guild_id: u64) {
        // A call that is already gone is not an error.
        if let Err(e) = self.songbird.remove(GuildId::new(guild_id)).await {
            warn!(guild_id = %guild_id, error = %e, "Error leaving voice channel");
        }
    }

    async fn occupant_count(&self, guild_id: u64, channel_id: u64) -> Option<usize> {
        let states = self.voice_states.read().ok()?;
        Some(
            states
                .iter()
                .filter(|((g, _), c)| *g == guild_id && **c == channel_id)
                .count(),
        )
    }
}

/// Reports one finished playthrough to the session manager
struct ClipEndNotifier {
    guild_id: u64,
    cycle_ends: UnboundedSender<u64>,
}

#[async_trait]
impl VoiceEventHandler for ClipEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(_) = ctx {
            debug!(guild_id = %self.guild_id, "Clip cycle ended");
            if self.cycle_ends.send(self.guild_id).is_err() {
                // Manager is gone; nothing left to notify.
                return Some(Event::Cancel);
            }
        }
        None
    }
}
