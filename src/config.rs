use poise::serenity_prelude::{ChannelId, GuildId, RoleId};

use crate::error::{Result, VerifyError};

/// All environment-derived settings, resolved once at startup and passed
/// down by reference. Downstream APIs reject bad values; we only validate
/// presence and snowflake syntax here.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub bot_token: String,
    pub guild_id: GuildId,
    pub verified_role_id: RoleId,
    pub welcome_channel_id: ChannelId,
    /// Public base URL of this service, e.g. https://verify.example.org
    pub public_url: String,
    pub http_port: u16,
    pub state_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: required("DISCORD_CLIENT_ID")?,
            client_secret: required("DISCORD_CLIENT_SECRET")?,
            redirect_uri: required("DISCORD_REDIRECT_URI")?,
            bot_token: std::env::var("DISCORD_BOT_TOKEN")
                .or_else(|_| std::env::var("DISCORD_TOKEN"))
                .map_err(|_| VerifyError::MissingConfig {
                    var: "DISCORD_BOT_TOKEN",
                })?,
            guild_id: GuildId::new(snowflake("GUILD_ID")?),
            verified_role_id: RoleId::new(snowflake("VERIFIED_ROLE_ID")?),
            welcome_channel_id: ChannelId::new(snowflake("WELCOME_CHANNEL_ID")?),
            public_url: std::env::var("PUBLIC_SITE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            state_path: std::env::var("STATE_PATH").unwrap_or_else(|_| "state".to_string()),
        })
    }

    /// Path of the verification record file inside the state directory.
    pub fn records_path(&self) -> String {
        format!("{}/records.json", self.state_path)
    }

    /// Verification entry point handed out to new members; the member id
    /// rides along as the OAuth state parameter.
    pub fn verification_url(&self, user_id: impl std::fmt::Display) -> String {
        format!("{}/auth/discord?user_id={}", self.public_url, user_id)
    }
}

fn required(var: &'static str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(VerifyError::MissingConfig { var }),
    }
}

fn snowflake(var: &'static str) -> Result<u64> {
    let value = required(var)?;
    // Snowflake ids are non-zero; serenity's id constructors panic on 0, so
    // reject it here like any other malformed value.
    match value.trim().parse() {
        Ok(0) | Err(_) => Err(VerifyError::InvalidConfig { var, value }),
        Ok(id) => Ok(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_rejects_non_numeric() {
        std::env::set_var("DOORMAN_TEST_SNOWFLAKE", "not-a-number");
        match snowflake("DOORMAN_TEST_SNOWFLAKE") {
            Err(VerifyError::InvalidConfig { var, value }) => {
                assert_eq!(var, "DOORMAN_TEST_SNOWFLAKE");
                assert_eq!(value, "not-a-number");
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn snowflake_rejects_zero() {
        std::env::set_var("DOORMAN_TEST_ZERO_SNOWFLAKE", "0");
        match snowflake("DOORMAN_TEST_ZERO_SNOWFLAKE") {
            Err(VerifyError::InvalidConfig { var, value }) => {
                assert_eq!(var, "DOORMAN_TEST_ZERO_SNOWFLAKE");
                assert_eq!(value, "0");
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn missing_var_is_a_config_error() {
        std::env::remove_var("DOORMAN_TEST_MISSING");
        assert!(matches!(
            required("DOORMAN_TEST_MISSING"),
            Err(VerifyError::MissingConfig { .. })
        ));
    }

    #[test]
    fn verification_url_embeds_user_id() {
        let config = Config {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            redirect_uri: "https://verify.example.org/auth/discord/callback".into(),
            bot_token: "token".into(),
            guild_id: GuildId::new(1),
            verified_role_id: RoleId::new(2),
            welcome_channel_id: ChannelId::new(3),
            public_url: "https://verify.example.org".into(),
            http_port: 3000,
            state_path: "state".into(),
        };

        assert_eq!(
            config.verification_url(42u64),
            "https://verify.example.org/auth/discord?user_id=42"
        );
        assert_eq!(config.records_path(), "state/records.json");
    }
}
