use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord bot for guild member verification via OAuth2
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands in the target guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,
}

mod commands;
mod config;
mod discord;
mod error;
mod events;
mod state;
mod verification;
mod web;

use commands::{ping, verify};
use config::Config;
use discord::{OAuthClient, RoleGranter};
use events::handle_member_add;
use state::{create_shared_record_store, RecordStore, SharedRecordStore};
use verification::Verifier;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub config: Arc<Config>,
    pub store: SharedRecordStore,
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::GuildMemberAddition { new_member } = event {
        if let Err(e) = handle_member_add(ctx, new_member, data).await {
            error!("Failed to handle new member: {}", e);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env()?);

    // Ensure state directory exists
    tokio::fs::create_dir_all(&config.state_path).await.ok();

    info!("Loading verification records...");
    let records_path = config.records_path();
    let record_store = RecordStore::load(&records_path).await.unwrap_or_else(|e| {
        warn!("Could not load records: {}, starting empty", e);
        RecordStore::new()
    });
    info!("Loaded {} verification records", record_store.len());
    let store = create_shared_record_store(record_store);

    // One reqwest client shared by the OAuth exchange and the role grant
    let http = reqwest::Client::new();
    let oauth = OAuthClient::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        config.redirect_uri.clone(),
        http.clone(),
    );
    let granter = RoleGranter::new(config.bot_token.clone(), http);
    let verifier = Arc::new(Verifier::new(
        oauth.clone(),
        granter,
        store.clone(),
        records_path,
        config.guild_id,
        config.verified_role_id,
    ));

    // The web server has everything it needs up front; run it alongside the
    // gateway connection.
    let web_state = web::AppState { oauth, verifier };
    let web_port = config.http_port;
    tokio::spawn(async move {
        if let Err(e) = web::start_web_server(web_port, web_state).await {
            error!("Web server error: {}", e);
        }
    });

    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;
    let target_guild_id = config.guild_id;

    if guild_commands {
        info!("--guild-commands: Will register commands in guild {}", target_guild_id);
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }

    let setup_config = config.clone();
    let setup_store = store.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![ping(), verify()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {})",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    if let poise::FrameworkError::Command { error, ctx, .. } = error {
                        error!(
                            "Error in command '{}': {}",
                            ctx.command().qualified_name,
                            error
                        );
                        let _ = ctx.say(format!("An error occurred: {}", error)).await;
                    } else {
                        error!("Framework error: {}", error);
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                if guild_commands || sync_commands {
                    info!("Registering commands to guild: {}", target_guild_id);
                    poise::builtins::register_in_guild(
                        ctx,
                        &framework.options().commands,
                        target_guild_id,
                    )
                    .await?;
                } else {
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                }
                info!(
                    "Registered {} commands",
                    framework.options().commands.len()
                );

                Ok(Data {
                    config: setup_config,
                    store: setup_store,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MEMBERS;

    let token = config.bot_token.clone();
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("GUILD_MEMBERS is a privileged intent; enable it under Discord Developer Portal -> Bot -> Privileged Gateway Intents");
            return Err(anyhow::anyhow!(
                "Disallowed gateway intents; enable GUILD_MEMBERS in the Discord Developer Portal"
            ));
        }
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}
