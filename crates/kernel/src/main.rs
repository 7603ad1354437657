use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use atrium_kernel::config::Config;
use atrium_kernel::db;
use atrium_kernel::models::{CreateUser, Role, User};
use atrium_kernel::routes;
use atrium_kernel::state::AppState;

/// Atrium course, blog and banner catalog server.
#[derive(Debug, Parser)]
#[command(name = "atrium", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Create an admin account.
    CreateAdmin {
        #[arg(long)]
        user_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CreateAdmin {
            user_name,
            email,
            password,
        } => create_admin(&config, user_name, email, password).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Atrium");
    info!(port = config.port, "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    info!("Database connection established");

    let app = routes::app(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn create_admin(
    config: &Config,
    user_name: String,
    email: String,
    password: String,
) -> Result<()> {
    if password.len() < 8 {
        anyhow::bail!("admin password must be at least 8 characters");
    }

    let pool = db::create_pool(config).await?;
    db::run_migrations(&pool).await?;

    if User::find_by_email(&pool, &email).await?.is_some() {
        anyhow::bail!("a user with email {email} already exists");
    }

    let admin = User::create(
        &pool,
        CreateUser {
            user_name,
            email,
            password: Some(password),
            role: Role::Admin,
            ..Default::default()
        },
    )
    .await
    .context("failed to create admin")?;

    info!(user_id = %admin.id, user_name = %admin.user_name, "admin account created");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
