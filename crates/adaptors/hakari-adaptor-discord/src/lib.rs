//! Discord adapter for the Hakari voice-session core
//!
//! Thin glue between serenity and [`hakari_core::SessionManager`]:
//! slash-command registration and parsing, precondition checks on the
//! invoker, reply rendering, and the voice-state feed that detects the
//! bot being moved or disconnected by an external actor. All lifecycle
//! decisions live in the core.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serenity::async_trait as serenity_async_trait;
use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};
use serenity::model::application::{
    Command, CommandDataOptionValue, CommandInteraction, CommandOptionType, Interaction,
};
use serenity::model::gateway::GatewayIntents;
use serenity::model::voice::VoiceState;
use serenity::prelude::*;
use songbird::serenity::SerenityInit;
use songbird::Songbird;
use tracing::{error, info, warn};

use hakari_core::{HakariError, Rejection, SessionManager, SessionTiming};

pub mod voice;
pub use voice::{SongbirdGateway, VoiceStateMap, CLIP_VOLUME};

/// Embed shown when Hakari expands his domain
const JACKPOT_IMAGE: &str = "https://media.tenor.com/Rpk3q-OLFeYAAAAC/hakari-dance-hakari.gif";
const JACKPOT_COLOR: u32 = 0x7efba6;

/// Runtime configuration for the Discord adapter
#[derive(Debug, Clone)]
pub struct HakariConfig {
    /// Discord bot token
    pub token: String,
    /// Path of the clip played on each cycle
    pub clip_path: PathBuf,
    /// Gateway intents; voice states are required for the watchdog
    pub intents: GatewayIntents,
}

impl Default for HakariConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            clip_path: PathBuf::from("./tuca-donka.mp3"),
            intents: GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES,
        }
    }
}

impl HakariConfig {
    /// Load configuration from the environment (`DISCORD_TOKEN`,
    /// optional `HAKARI_CLIP_PATH`)
    pub fn from_env() -> hakari_core::Result<Self> {
        let token = std::env::var("DISCORD_TOKEN")
            .map_err(|_| HakariError::config("DISCORD_TOKEN is not set"))?;
        let mut config = Self {
            token,
            ..Self::default()
        };
        if let Ok(path) = std::env::var("HAKARI_CLIP_PATH") {
            config.clip_path = PathBuf::from(path);
        }
        Ok(config)
    }
}

struct Handler {
    manager: Arc<SessionManager>,
    voice_states: VoiceStateMap,
}

impl Handler {
    /// Voice channel the user currently sits in, from our own tracker
    fn user_voice_channel(&self, guild_id: u64, user_id: u64) -> Option<u64> {
        self.voice_states
            .read()
            .ok()?
            .get(&(guild_id, user_id))
            .copied()
    }

    async fn respond_text(&self, ctx: &Context, cmd: &CommandInteraction, content: &str) {
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::default().content(content),
        );
        if let Err(e) = cmd.create_response(&ctx.http, response).await {
            warn!(command = %cmd.data.name, error = %format!("{:?}", e), "Failed to send reply");
        }
    }

    async fn respond_jackpot_embed(&self, ctx: &Context, cmd: &CommandInteraction) {
        let embed = CreateEmbed::new()
            .title("Kinji Hakari expands his domain")
            .description("JACKPOT!")
            .color(JACKPOT_COLOR)
            .image(JACKPOT_IMAGE);
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::default().add_embed(embed),
        );
        if let Err(e) = cmd.create_response(&ctx.http, response).await {
            warn!(command = %cmd.data.name, error = %format!("{:?}", e), "Failed to send reply");
        }
    }

    async fn handle_jackpot(&self, ctx: &Context, cmd: &CommandInteraction) {
        let Some(guild_id) = cmd.guild_id else {
            self.respond_text(ctx, cmd, Rejection::no_guild().message())
                .await;
            return;
        };
        if cmd.member.is_none() {
            self.respond_text(ctx, cmd, Rejection::not_a_member().message())
                .await;
            return;
        }
        let user_id = cmd.user.id.get();
        let Some(channel_id) = self.user_voice_channel(guild_id.get(), user_id) else {
            self.respond_text(ctx, cmd, Rejection::not_in_voice().message())
                .await;
            return;
        };

        let times = cmd.data.options.iter().find_map(|opt| match opt.value {
            CommandDataOptionValue::Integer(n) if opt.name == "times" => Some(n),
            _ => None,
        });

        match self.manager.start(guild_id.get(), channel_id, times).await {
            Ok(_) => self.respond_jackpot_embed(ctx, cmd).await,
            Err(rejection) => self.respond_text(ctx, cmd, rejection.message()).await,
        }
    }

    async fn handle_leave(&self, ctx: &Context, cmd: &CommandInteraction) {
        let Some(guild_id) = cmd.guild_id else {
            self.respond_text(ctx, cmd, Rejection::no_guild().message())
                .await;
            return;
        };
        if cmd.member.is_none() {
            self.respond_text(ctx, cmd, Rejection::not_a_member().message())
                .await;
            return;
        }
        let reply = match self.manager.leave(guild_id.get()).await {
            Ok(ack) => ack.message(),
            Err(rejection) => rejection.message(),
        };
        self.respond_text(ctx, cmd, reply).await;
    }
}

#[serenity_async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, data_about_bot: serenity::model::gateway::Ready) {
        info!(
            user = %data_about_bot.user.name,
            guilds_count = %data_about_bot.guilds.len(),
            "Discord ready"
        );

        let http = ctx.http.clone();
        tokio::spawn(async move {
            let jackpot = CreateCommand::new("jackpot")
                .description("Kinji Hakari expands his domain.")
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "times",
                        "How many times should Kinji Hakari expand his domain?",
                    )
                    .required(false)
                    .min_int_value(1),
                );
            if let Err(e) = Command::create_global_command(&http, jackpot).await {
                warn!(error = %format!("{:?}", e), "Register global jackpot failed");
            }
            let leave = CreateCommand::new("leave").description("Kinji Hakari releases his domain.");
            if let Err(e) = Command::create_global_command(&http, leave).await {
                warn!(error = %format!("{:?}", e), "Register global leave failed");
            }
        });
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(cmd) = interaction {
            match cmd.data.name.as_str() {
                "jackpot" => self.handle_jackpot(&ctx, &cmd).await,
                "leave" => self.handle_leave(&ctx, &cmd).await,
                _ => {}
            }
        }
    }

    /// Track voice states by hand and feed the bot's own changes into
    /// the session manager so forced disconnects release the session
    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let user_id = new.user_id.get();
        let guild_id = match new.guild_id {
            Some(g) => g.get(),
            None => return, // Ignore DM voice states
        };
        let new_channel = new.channel_id.map(|c| c.get());

        if let Ok(mut states) = self.voice_states.write() {
            match new_channel {
                Some(channel_id) => {
                    states.insert((guild_id, user_id), channel_id);
                }
                None => {
                    states.remove(&(guild_id, user_id));
                }
            }
        }

        if user_id == ctx.cache.current_user().id.get() {
            self.manager.on_bot_voice_state(guild_id, new_channel).await;
        }
    }
}

/// Build the serenity client around the session core and run it until
/// the gateway connection ends
pub async fn run(config: HakariConfig) -> anyhow::Result<()> {
    let songbird = Songbird::serenity();
    let voice_states: VoiceStateMap = Arc::new(RwLock::new(HashMap::new()));
    let (cycle_tx, cycle_rx) = tokio::sync::mpsc::unbounded_channel();

    let gateway = Arc::new(SongbirdGateway::new(
        songbird.clone(),
        voice_states.clone(),
        config.clip_path.clone(),
        cycle_tx,
    ));
    let manager = SessionManager::new(gateway, SessionTiming::default());
    manager.drive_cycle_ends(cycle_rx);

    let handler = Handler {
        manager,
        voice_states,
    };

    let mut client = Client::builder(&config.token, config.intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    info!(clip = %config.clip_path.display(), "Starting Hakari");
    if let Err(e) = client.start().await {
        error!(error = %format!("{:?}", e), "Client error");
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HakariConfig::default();
        assert_eq!(config.clip_path, PathBuf::from("./tuca-donka.mp3"));
        assert!(config.intents.contains(GatewayIntents::GUILD_VOICE_STATES));
    }

    #[test]
    fn test_from_env_requires_token() {
        std::env::remove_var("DISCORD_TOKEN");
        assert!(HakariConfig::from_env().is_err());
    }
}
