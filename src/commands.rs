use poise::serenity_prelude as serenity;
use tracing::info;

use crate::{Context, Error};

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(
        poise::CreateReply::default()
            .content("Pong! Bot is working!")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Get a fresh verification link
///
/// Re-sends the verification link, for members who lost the welcome message.
#[poise::command(prefix_command, slash_command)]
pub async fn verify(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id;

    // Already verified users just get a confirmation
    let already_verified = {
        let store = ctx.data().store.read().await;
        store.is_verified(&user_id.to_string())
    };
    if already_verified {
        ctx.send(
            poise::CreateReply::default()
                .content("You are already verified!")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let verify_url = ctx.data().config.verification_url(user_id);

    let embed = serenity::CreateEmbed::new()
        .title("Verify Your Account")
        .description("Click the link below to verify with Discord:")
        .field("Verification Link", &verify_url, false)
        .field(
            "Instructions",
            "1. Click the link\n2. Login with Discord\n3. Authorize the bot\n4. You're verified!",
            false,
        )
        .color(0x5865F2);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    info!("Sent verification link to {}", ctx.author().name);
    Ok(())
}
