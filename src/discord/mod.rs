//! Discord REST collaborators: the OAuth2 exchange and the bot-credentialed
//! role grant. Both take an injectable API base so tests can run against a
//! local mock server.

pub mod oauth;
pub mod roles;

pub use oauth::{DiscordIdentity, OAuthClient};
pub use roles::RoleGranter;
