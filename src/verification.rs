//! The callback pipeline: authorization code in, verified member out.
//!
//! Steps run strictly in order (exchange the code, fetch the identity,
//! persist the record, grant the role) and the first failure ends the
//! request. A record persisted before a failed grant is kept; there is no
//! compensating delete.

use chrono::Utc;
use poise::serenity_prelude::{GuildId, RoleId, UserId};
use std::sync::Arc;
use tracing::info;

use crate::discord::{DiscordIdentity, OAuthClient, RoleGranter};
use crate::error::{Result, VerifyError};
use crate::state::{SharedRecordStore, VerificationRecord};

pub struct Verifier {
    oauth: OAuthClient,
    granter: RoleGranter,
    store: SharedRecordStore,
    records_path: String,
    guild_id: GuildId,
    verified_role_id: RoleId,
}

/// Shared verifier type
pub type SharedVerifier = Arc<Verifier>;

impl Verifier {
    pub fn new(
        oauth: OAuthClient,
        granter: RoleGranter,
        store: SharedRecordStore,
        records_path: String,
        guild_id: GuildId,
        verified_role_id: RoleId,
    ) -> Self {
        Self {
            oauth,
            granter,
            store,
            records_path,
            guild_id,
            verified_role_id,
        }
    }

    pub fn store(&self) -> &SharedRecordStore {
        &self.store
    }

    /// Drive a callback invocation to completion. The returned identity is
    /// the one Discord vouched for via the exchanged token; the forgeable
    /// `state` parameter is never consulted here.
    pub async fn verify(&self, code: &str) -> Result<DiscordIdentity> {
        if code.trim().is_empty() {
            return Err(VerifyError::MissingAuthorizationCode);
        }

        let identity = self.oauth.exchange_code_for_identity(code).await?;

        // Snowflakes are numeric; anything else means the identity payload
        // cannot be acted on.
        let user_id: u64 =
            identity
                .id
                .parse()
                .map_err(|_| VerifyError::OAuthExchangeFailed {
                    detail: format!("identity returned non-numeric id '{}'", identity.id),
                })?;

        let record = VerificationRecord::from_identity(&identity, Utc::now());
        {
            let mut store = self.store.write().await;
            store.put(record);
            store
                .save(&self.records_path)
                .await
                .map_err(|e| VerifyError::PersistenceFailed {
                    detail: e.to_string(),
                })?;
        }

        self.granter
            .grant(self.guild_id, UserId::new(user_id), self.verified_role_id)
            .await?;

        info!(
            "User {} ({}) verified and granted role {}",
            identity.username, identity.id, self.verified_role_id
        );
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{create_shared_record_store, RecordStore};
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    /// Mock Discord API covering all three endpoints the pipeline touches,
    /// recording the order in which they are hit.
    async fn spawn_discord_mock(calls: CallLog, token_status: StatusCode) -> String {
        let token_calls = calls.clone();
        let me_calls = calls.clone();
        let grant_calls = calls;

        let app = Router::new()
            .route(
                "/oauth2/token",
                post(move || {
                    let calls = token_calls.clone();
                    async move {
                        calls.lock().unwrap().push("token");
                        if token_status.is_success() {
                            (
                                StatusCode::OK,
                                Json(serde_json::json!({
                                    "access_token": "tok1",
                                    "token_type": "Bearer"
                                }))
                                .into_response(),
                            )
                        } else {
                            (token_status, "invalid_grant".into_response())
                        }
                    }
                }),
            )
            .route(
                "/users/@me",
                get(move || {
                    let calls = me_calls.clone();
                    async move {
                        calls.lock().unwrap().push("identity");
                        Json(serde_json::json!({
                            "id": "42",
                            "username": "alice",
                            "discriminator": "0001",
                            "avatar": null,
                            "email": "alice@example.org",
                            "verified": true
                        }))
                    }
                }),
            )
            .route(
                "/guilds/:guild/members/:user/roles/:role",
                put(
                    move |Path((_, _, _)): Path<(String, String, String)>| {
                        let calls = grant_calls.clone();
                        async move {
                            calls.lock().unwrap().push("grant");
                            StatusCode::NO_CONTENT
                        }
                    },
                ),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn verifier(base: &str, records_path: &str) -> Verifier {
        let http = reqwest::Client::new();
        let oauth = OAuthClient::new(
            "cid".to_string(),
            "secret".to_string(),
            format!("{}/auth/discord/callback", base),
            http.clone(),
        )
        .with_api_base(base);
        let granter = RoleGranter::new("bot-token".to_string(), http).with_api_base(base);
        Verifier::new(
            oauth,
            granter,
            create_shared_record_store(RecordStore::new()),
            records_path.to_string(),
            GuildId::new(100),
            RoleId::new(7),
        )
    }

    fn temp_records_path(tag: &str) -> String {
        std::env::temp_dir()
            .join(format!("doorman-{}-{}.json", tag, std::process::id()))
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn happy_path_persists_then_grants() {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_discord_mock(calls.clone(), StatusCode::OK).await;
        let path = temp_records_path("happy");

        let verifier = verifier(&base, &path);
        let identity = verifier.verify("abc123").await.unwrap();

        assert_eq!(identity.id, "42");
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &["token", "identity", "grant"]
        );

        let store = verifier.store().read().await;
        let record = store.get("42").expect("record must be persisted");
        assert_eq!(record.username, "alice");
        assert_eq!(record.discriminator, "0001");

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn missing_code_makes_no_network_calls() {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_discord_mock(calls.clone(), StatusCode::OK).await;

        let verifier = verifier(&base, &temp_records_path("missing-code"));
        let err = verifier.verify("").await.unwrap_err();

        assert!(matches!(err, VerifyError::MissingAuthorizationCode));
        assert!(calls.lock().unwrap().is_empty());
        assert!(verifier.store().read().await.is_empty());
    }

    #[tokio::test]
    async fn exchange_failure_skips_store_and_grant() {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_discord_mock(calls.clone(), StatusCode::BAD_REQUEST).await;

        let verifier = verifier(&base, &temp_records_path("bad-code"));
        let err = verifier.verify("expired").await.unwrap_err();

        assert!(matches!(err, VerifyError::OAuthExchangeFailed { .. }));
        assert_eq!(calls.lock().unwrap().as_slice(), &["token"]);
        assert!(verifier.store().read().await.is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_skips_grant() {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_discord_mock(calls.clone(), StatusCode::OK).await;

        // Records path inside a directory that does not exist: the save
        // fails after the exchange succeeds.
        let verifier = verifier(&base, "/nonexistent-doorman-dir/records.json");
        let err = verifier.verify("abc123").await.unwrap_err();

        assert!(matches!(err, VerifyError::PersistenceFailed { .. }));
        assert_eq!(calls.lock().unwrap().as_slice(), &["token", "identity"]);
    }

    #[tokio::test]
    async fn reverification_overwrites_the_record() {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_discord_mock(calls.clone(), StatusCode::OK).await;
        let path = temp_records_path("overwrite");

        let verifier = verifier(&base, &path);
        verifier.verify("abc123").await.unwrap();
        let first_recorded_at = verifier.store().read().await.get("42").unwrap().recorded_at;

        verifier.verify("def456").await.unwrap();

        let store = verifier.store().read().await;
        assert_eq!(store.len(), 1);
        assert!(store.get("42").unwrap().recorded_at >= first_recorded_at);

        tokio::fs::remove_file(&path).await.ok();
    }
}
