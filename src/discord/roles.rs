//! Bot-credentialed role grant against the guild members API.

use poise::serenity_prelude::{GuildId, RoleId, UserId};
use tracing::info;

use crate::error::{Result, VerifyError};

/// The guild member endpoints live under the versioned API root.
pub const DISCORD_API_V10_BASE: &str = "https://discord.com/api/v10";

/// Adds the verified role to a guild member with the bot token. One PUT, no
/// retry; a failure is reported to the caller as `RoleGrantFailed`.
#[derive(Clone)]
pub struct RoleGranter {
    bot_token: String,
    api_base: String,
    http: reqwest::Client,
}

impl RoleGranter {
    pub fn new(bot_token: String, http: reqwest::Client) -> Self {
        Self {
            bot_token,
            api_base: DISCORD_API_V10_BASE.to_string(),
            http,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub async fn grant(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId) -> Result<()> {
        let url = format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.api_base, guild_id, user_id, role_id
        );

        let response = self
            .http
            .put(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .send()
            .await
            .map_err(|e| VerifyError::RoleGrantFailed {
                detail: format!("role grant request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VerifyError::RoleGrantFailed {
                detail: format!("role endpoint returned {}: {}", status, body),
            });
        }

        info!("Granted role {} to user {} in guild {}", role_id, user_id, guild_id);
        Ok(())
    }
}
