//! OAuth2 authorization-code exchange against the Discord API.

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, VerifyError};

/// Base URL of the Discord REST API; overridable so tests can point the
/// client at a local mock server.
pub const DISCORD_API_BASE: &str = "https://discord.com/api";

const OAUTH_SCOPE: &str = "identify email";

/// Client-side half of the authorization-code flow: builds the authorize
/// URL, trades the code for a token and fetches the authenticated identity.
#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    api_base: String,
    http: reqwest::Client,
}

/// Discord OAuth token response
#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Discord user info from /users/@me
#[derive(Deserialize, Debug, Clone)]
pub struct DiscordIdentity {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub locale: Option<String>,
    /// Whether the account email is verified
    pub verified: Option<bool>,
}

impl OAuthClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            api_base: DISCORD_API_BASE.to_string(),
            http,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Provider authorization URL; `state` is round-tripped through the
    /// redirect unmodified.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/oauth2/authorize?client_id={}&redirect_uri={}&response_type=code&scope=identify%20email&state={}",
            self.api_base,
            self.client_id,
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Trade an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.api_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", OAUTH_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| VerifyError::OAuthExchangeFailed {
                detail: format!("token request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VerifyError::OAuthExchangeFailed {
                detail: format!("token endpoint returned {}: {}", status, body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| VerifyError::OAuthExchangeFailed {
                detail: format!("malformed token response: {}", e),
            })
    }

    /// Fetch the identity the token belongs to.
    pub async fn fetch_identity(&self, token: &TokenResponse) -> Result<DiscordIdentity> {
        let response = self
            .http
            .get(format!("{}/users/@me", self.api_base))
            .header(
                "Authorization",
                format!("{} {}", token.token_type, token.access_token),
            )
            .send()
            .await
            .map_err(|e| VerifyError::OAuthExchangeFailed {
                detail: format!("identity request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VerifyError::OAuthExchangeFailed {
                detail: format!("identity endpoint returned {}: {}", status, body),
            });
        }

        response
            .json()
            .await
            .map_err(|e| VerifyError::OAuthExchangeFailed {
                detail: format!("malformed identity response: {}", e),
            })
    }

    /// Run both steps of the exchange in order. The token lives only for the
    /// duration of this call.
    pub async fn exchange_code_for_identity(&self, code: &str) -> Result<DiscordIdentity> {
        let token = self.exchange_code(code).await?;
        debug!("Got access token, fetching identity...");
        self.fetch_identity(&token).await
    }
}
