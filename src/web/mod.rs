//! Web server for OAuth verification
//!
//! Runs alongside the Discord bot and drives the authorization-code flow:
//! initiate redirect, provider callback, success page.

mod server;

pub use server::{start_web_server, AppState};
