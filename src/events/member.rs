use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};

use crate::state::VerificationRecord;
use crate::{Data, Error};

/// What a member-join event calls for, decided before any Discord I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberJoinAction {
    /// Event is for a guild this bot does not manage
    Ignore,
    /// Member verified previously; restore their role instead of prompting
    WelcomeBack(VerificationRecord),
    /// Fresh member; deliver the verification link
    SendVerificationLink,
}

/// Pure decision for a member-join event: non-target guilds are a no-op,
/// known members get their access restored, everyone else gets the link.
pub fn join_action(
    event_guild: serenity::GuildId,
    target_guild: serenity::GuildId,
    existing: Option<VerificationRecord>,
) -> MemberJoinAction {
    if event_guild != target_guild {
        return MemberJoinAction::Ignore;
    }
    match existing {
        Some(record) => MemberJoinAction::WelcomeBack(record),
        None => MemberJoinAction::SendVerificationLink,
    }
}

/// Handle when a new member joins the guild: greet them with a verification
/// link, DM first with a public-channel fallback.
pub async fn handle_member_add(
    ctx: &serenity::Context,
    new_member: &serenity::Member,
    data: &Data,
) -> Result<(), Error> {
    let user_id = new_member.user.id;
    let guild_id = new_member.guild_id;

    let existing = {
        let store = data.store.read().await;
        store.get(&user_id.to_string()).cloned()
    };

    let record = match join_action(guild_id, data.config.guild_id, existing) {
        MemberJoinAction::Ignore => {
            debug!(
                "Ignoring member join in non-target guild {} (target is {})",
                guild_id, data.config.guild_id
            );
            return Ok(());
        }
        MemberJoinAction::WelcomeBack(record) => Some(record),
        MemberJoinAction::SendVerificationLink => None,
    };

    info!(
        "New member joined: {} in guild {}",
        new_member.user.name, guild_id
    );

    // Returning verified member: restore the role and skip the prompt
    if let Some(record) = record {
        info!(
            "Returning verified member: {} ({})",
            record.username, user_id
        );

        if let Err(e) = ctx
            .http
            .add_member_role(
                guild_id,
                user_id,
                data.config.verified_role_id,
                Some("Restoring verified role for returning member"),
            )
            .await
        {
            error!(
                "Failed to restore verified role for {} in guild {}: {}. Bot requires 'Manage Roles' permission and its role must be above the verified role.",
                user_id, guild_id, e
            );
        }

        if let Ok(dm_channel) = new_member.user.create_dm_channel(&ctx.http).await {
            let _ = dm_channel
                .send_message(
                    &ctx.http,
                    serenity::CreateMessage::new().content(format!(
                        "**Welcome back, {}!**\n\n\
                        You're already verified, so your access has been restored automatically.",
                        record.username
                    )),
                )
                .await;
        }
        return Ok(());
    }

    // New member: send the verification link
    let guild_name = guild_id
        .to_partial_guild(&ctx.http)
        .await
        .map(|g| g.name)
        .unwrap_or_else(|_| "the server".to_string());

    let embed = verification_embed(&guild_name);
    let components = verification_components(&data.config.verification_url(user_id));

    let dm_result = match new_member.user.create_dm_channel(&ctx.http).await {
        Ok(dm_channel) => {
            dm_channel
                .send_message(
                    &ctx.http,
                    serenity::CreateMessage::new()
                        .embed(embed.clone())
                        .components(components.clone()),
                )
                .await
        }
        Err(e) => Err(e),
    };

    match dm_result {
        Ok(_) => {
            info!("Sent verification DM to {}", new_member.user.name);
        }
        Err(e) => {
            // DMs disabled or otherwise undeliverable; fall back to the
            // welcome channel with a mention.
            warn!(
                "Could not DM {}: {}. Falling back to welcome channel.",
                new_member.user.name, e
            );

            let fallback = data
                .config
                .welcome_channel_id
                .send_message(
                    &ctx.http,
                    serenity::CreateMessage::new()
                        .content(format!(
                            "Welcome, <@{}>! I couldn't send you a private message. \
                            Please click the button below to verify.",
                            user_id
                        ))
                        .embed(embed)
                        .components(components),
                )
                .await;

            match fallback {
                Ok(_) => info!(
                    "Sent public fallback message for {} in channel {}",
                    new_member.user.name, data.config.welcome_channel_id
                ),
                Err(e) => error!(
                    "Welcome channel {} fallback failed for {}: {}",
                    data.config.welcome_channel_id, new_member.user.name, e
                ),
            }
        }
    }

    Ok(())
}

fn verification_embed(guild_name: &str) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("Verification Required")
        .description(format!(
            "Welcome to {}! To gain access, please verify your account.",
            guild_name
        ))
        .color(0x5865F2)
}

fn verification_components(verification_url: &str) -> Vec<serenity::CreateActionRow> {
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new_link(verification_url).label("Verify"),
    ])]
}
