use anyhow::Result;
use serenity::{
    builder::{
        CreateCommand, CreateCommandOption, CreateEmbed, CreateInteractionResponse,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{Command, CommandInteraction, CommandOptionType},
        id::{ChannelId, GuildId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{
        announce::CloseReason,
        error::{PlaybackError, PlaybackResult},
        session::{EnqueueOutcome, SessionHandle, MAX_VOLUME, MIN_VOLUME},
    },
    bot::{resolve, voice, JukeboxBot},
    ui::{embeds, messages},
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        pause_command(),
        resume_command(),
        volume_command(),
        stop_command(),
        shuffle_command(),
        loop_command(),
        remove_command(),
        move_command(),
        queue_command(),
        nowplaying_command(),
        leave_command(),
    ]
}

pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    Command::set_global_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

/// Registers commands for one guild (updates show up immediately).
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song or add it to the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "URL or search terms")
                .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Vote to skip the current song")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause playback")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resume paused playback")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Set the playback volume")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volume (1-100)")
                .min_int_value(u64::from(MIN_VOLUME))
                .max_int_value(u64::from(MAX_VOLUME))
                .required(true),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playback and clear the queue")
}

// Queue

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Shuffle the queue")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Repeat the current song")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Boolean, "enabled", "Loop on or off")
                .required(true),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Remove a song from the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "position", "Queue position")
                .min_int_value(1)
                .required(true),
        )
}

fn move_command() -> CreateCommand {
    CreateCommand::new("move")
        .description("Move a song to another position in the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "from", "Current position")
                .min_int_value(1)
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "to", "New position")
                .min_int_value(1)
                .required(true),
        )
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Show the queue")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                .min_int_value(1),
        )
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Show the current song")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Leave the voice channel")
}

enum Reply {
    Text(String),
    Ephemeral(String),
    Embed(CreateEmbed),
}

impl Reply {
    fn into_message(self) -> CreateInteractionResponseMessage {
        let message = CreateInteractionResponseMessage::new();
        match self {
            Reply::Text(content) => message.content(content),
            Reply::Ephemeral(content) => message.content(content).ephemeral(true),
            Reply::Embed(embed) => message.embed(embed),
        }
    }

    fn into_edit(self) -> EditInteractionResponse {
        let edit = EditInteractionResponse::new();
        match self {
            Reply::Text(content) | Reply::Ephemeral(content) => edit.content(content),
            Reply::Embed(embed) => edit.embed(embed),
        }
    }
}

/// Dispatches a slash command.
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Command used outside a server"))?;

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    if command.data.name == "play" {
        return handle_play(ctx, &command, bot, guild_id).await;
    }

    let result = match command.data.name.as_str() {
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(bot, guild_id).await,
        "resume" => handle_resume(bot, guild_id).await,
        "volume" => handle_volume(&command, bot, guild_id).await,
        "stop" => handle_stop(bot, guild_id).await,
        "shuffle" => handle_shuffle(bot, guild_id).await,
        "loop" => handle_loop(&command, bot, guild_id).await,
        "remove" => handle_remove(&command, bot, guild_id).await,
        "move" => handle_move(&command, bot, guild_id).await,
        "queue" => handle_queue(&command, bot, guild_id).await,
        "nowplaying" => handle_nowplaying(bot, guild_id).await,
        "leave" => handle_leave(bot, guild_id).await,
        _ => Ok(Reply::Ephemeral("❌ Unknown command".to_string())),
    };

    let reply = result.unwrap_or_else(|e| {
        warn!("/{} failed in guild {}: {}", command.data.name, guild_id, e);
        Reply::Ephemeral(messages::error_message(&e))
    });

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(reply.into_message()),
        )
        .await?;

    Ok(())
}

fn session(bot: &JukeboxBot, guild_id: GuildId) -> PlaybackResult<SessionHandle> {
    bot.registry
        .get(guild_id)
        .ok_or(PlaybackError::NoActiveSession)
}

fn str_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn bool_option(command: &CommandInteraction, name: &str) -> Option<bool> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_bool())
}

fn missing(name: &str) -> PlaybackError {
    PlaybackError::InvalidArgument(format!("missing option '{}'", name))
}

/// Converts a 1-based queue position from a command into a 0-based index.
fn queue_index(position: i64) -> PlaybackResult<usize> {
    usize::try_from(position)
        .ok()
        .and_then(|position| position.checked_sub(1))
        .ok_or_else(|| {
            PlaybackError::InvalidArgument(format!("position must be 1 or more, got {}", position))
        })
}

fn position_option(command: &CommandInteraction, name: &str) -> PlaybackResult<usize> {
    queue_index(int_option(command, name).ok_or_else(|| missing(name))?)
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = str_option(command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query not provided"))?
        .to_string();

    let Some(voice_channel) = voice::user_channel(ctx, guild_id, command.user.id) else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    Reply::Ephemeral("🎧 Join a voice channel first.".to_string()).into_message(),
                ),
            )
            .await?;
        return Ok(());
    };

    // Resolving can take a few seconds
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let reply = match play(ctx, command, bot, guild_id, voice_channel, &query).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("/play '{}' failed in guild {}: {:?}", query, guild_id, e);
            match e.downcast_ref::<PlaybackError>() {
                Some(playback) => Reply::Text(messages::error_message(playback)),
                None => Reply::Text(format!("❌ {}", e)),
            }
        }
    };

    command.edit_response(&ctx.http, reply.into_edit()).await?;
    Ok(())
}

async fn play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
    voice_channel: ChannelId,
    query: &str,
) -> Result<Reply> {
    let track = resolve::resolve_track(&bot.http_client, query, command.user.id).await?;
    let session = bot.session_for(ctx, guild_id, voice_channel).await?;

    let reply = match session.enqueue(track.clone(), command.channel_id).await? {
        EnqueueOutcome::Started(track) => Reply::Text(format!("✅ Added **{}**", track.title)),
        EnqueueOutcome::Queued { position } => {
            Reply::Embed(embeds::create_track_added_embed(&track, position))
        }
    };

    Ok(reply)
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> PlaybackResult<Reply> {
    let session = session(bot, guild_id)?;

    let presence = voice::presence(ctx, guild_id, command.user.id);
    if !presence.shares_channel() {
        return Ok(Reply::Ephemeral(
            "🎧 Join my voice channel to vote.".to_string(),
        ));
    }

    let permissions = command.member.as_ref().and_then(|member| member.permissions);
    let privileged = voice::is_privileged(permissions, &presence);

    let outcome = session
        .skip_vote(command.user.id, presence.listeners, privileged)
        .await?;
    Ok(Reply::Text(messages::skip_message(&outcome)))
}

async fn handle_pause(bot: &JukeboxBot, guild_id: GuildId) -> PlaybackResult<Reply> {
    session(bot, guild_id)?.pause().await?;
    Ok(Reply::Text("⏸️ Paused".to_string()))
}

async fn handle_resume(bot: &JukeboxBot, guild_id: GuildId) -> PlaybackResult<Reply> {
    session(bot, guild_id)?.resume().await?;
    Ok(Reply::Text("▶️ Resumed".to_string()))
}

async fn handle_volume(
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> PlaybackResult<Reply> {
    let level = int_option(command, "level").ok_or_else(|| missing("level"))?;
    let volume = session(bot, guild_id)?.set_volume(level).await?;
    Ok(Reply::Text(format!("🔊 Volume set to {}%", volume)))
}

async fn handle_stop(bot: &JukeboxBot, guild_id: GuildId) -> PlaybackResult<Reply> {
    let cleared = session(bot, guild_id)?.stop().await?;
    Ok(Reply::Text(format!(
        "⏹️ Stopped and cleared {} queued songs",
        cleared
    )))
}

async fn handle_shuffle(bot: &JukeboxBot, guild_id: GuildId) -> PlaybackResult<Reply> {
    let shuffled = session(bot, guild_id)?.shuffle().await?;
    Ok(Reply::Text(format!("🔀 Shuffled {} songs", shuffled)))
}

async fn handle_loop(
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> PlaybackResult<Reply> {
    let enabled = bool_option(command, "enabled").ok_or_else(|| missing("enabled"))?;
    session(bot, guild_id)?.set_loop(enabled).await?;

    let text = if enabled {
        "🔂 Looping the current song"
    } else {
        "➡️ Loop disabled"
    };
    Ok(Reply::Text(text.to_string()))
}

async fn handle_remove(
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> PlaybackResult<Reply> {
    let index = position_option(command, "position")?;
    let removed = session(bot, guild_id)?.remove(index).await?;
    Ok(Reply::Text(format!("🗑️ Removed **{}**", removed.title)))
}

async fn handle_move(
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> PlaybackResult<Reply> {
    let from = position_option(command, "from")?;
    let to = position_option(command, "to")?;
    session(bot, guild_id)?.move_track(from, to).await?;
    Ok(Reply::Text(format!(
        "↕️ Moved song {} to position {}",
        from + 1,
        to + 1
    )))
}

async fn handle_queue(
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> PlaybackResult<Reply> {
    let page = int_option(command, "page")
        .and_then(|page| usize::try_from(page).ok())
        .unwrap_or(1);
    let snapshot = session(bot, guild_id)?.queue_snapshot().await?;
    Ok(Reply::Embed(embeds::create_queue_embed(&snapshot, page)))
}

async fn handle_nowplaying(bot: &JukeboxBot, guild_id: GuildId) -> PlaybackResult<Reply> {
    let now = session(bot, guild_id)?.now_playing().await?;
    Ok(Reply::Embed(embeds::create_now_playing_embed(&now)))
}

async fn handle_leave(bot: &JukeboxBot, guild_id: GuildId) -> PlaybackResult<Reply> {
    if !bot.registry.destroy(guild_id, CloseReason::Left).await {
        return Err(PlaybackError::NoActiveSession);
    }
    Ok(Reply::Text("👋 Left the voice channel".to_string()))
}
