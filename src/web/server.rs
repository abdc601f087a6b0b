//! Web server implementation for OAuth verification

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::discord::OAuthClient;
use crate::error::VerifyError;
use crate::verification::SharedVerifier;

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub oauth: OAuthClient,
    pub verifier: SharedVerifier,
}

/// Query parameters on the initiate endpoint
#[derive(Deserialize)]
pub struct InitiateParams {
    user_id: String,
}

/// Query parameters from the Discord OAuth callback. Both are optional so a
/// missing code reaches the handler instead of a framework rejection.
#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/auth/discord", get(initiate))
        .route("/auth/discord/callback", get(oauth_callback))
        .route("/success", get(success))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server for OAuth verification
pub async fn start_web_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web server listening on http://{}", addr);

    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

/// Health check endpoint
async fn health() -> &'static str {
    "Verification server running"
}

/// 302 with a Location header; the provider contract wants a plain Found,
/// not axum's 303/307 helpers.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// GET /auth/discord?user_id=<id> - redirect to the Discord consent screen,
/// carrying the member id as the opaque state parameter.
async fn initiate(State(state): State<AppState>, Query(params): Query<InitiateParams>) -> Response {
    info!("Verification initiated for member {}", params.user_id);
    found(&state.oauth.authorize_url(&params.user_id))
}

/// GET /auth/discord/callback - OAuth callback handler
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    // The state parameter is correlation only; the verified identity comes
    // from the token exchange, never from here.
    info!(
        "OAuth callback received (state: {})",
        params.state.as_deref().unwrap_or("<none>")
    );

    let Some(code) = params.code.filter(|c| !c.trim().is_empty()) else {
        return VerifyError::MissingAuthorizationCode.into_response();
    };

    match state.verifier.verify(&code).await {
        Ok(identity) => {
            info!(
                "Verification complete for {} ({})",
                identity.username, identity.id
            );
            found("/success")
        }
        Err(e) => {
            error!("Verification failed: {}", e);
            e.into_response()
        }
    }
}

/// GET /success - static landing page after a completed verification
async fn success() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Verification Success</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            margin: 0;
            background: linear-gradient(135deg, #11998e 0%, #38ef7d 100%);
        }
        .container {
            background: white;
            padding: 40px;
            border-radius: 16px;
            box-shadow: 0 10px 40px rgba(0,0,0,0.2);
            text-align: center;
            max-width: 400px;
        }
        h1 {
            color: #11998e;
            margin-bottom: 10px;
        }
        .success-icon {
            font-size: 60px;
            margin-bottom: 20px;
        }
    </style>
</head>
<body>
    <div class="container">
        <div class="success-icon">&#10003;</div>
        <h1>Verification Successful!</h1>
        <p>Your account is verified and full server access has been unlocked.</p>
        <p style="color: #888; font-size: 14px;">You can now close this window and head back to Discord.</p>
    </div>
</body>
</html>"#,
    )
}
