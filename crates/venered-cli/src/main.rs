//! Venered session tool - drives the auth flows from the terminal.
//!
//! Stands in for the mobile UI layer: reads session state, signs in and
//! out, and persists the session between invocations. Runs against the
//! configured Supabase project, or against the in-memory mock backend
//! while none is configured.

mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use store::FileSessionStore;
use venered_auth::{
    AuthGateway, AuthProvider, MockGateway, ProviderOptions, SupabaseGateway, DEMO_EMAIL,
    DEMO_PASSWORD,
};
use venered_config::{init_logging, Config, Paths};
use venered_types::{LoginCredentials, SignUpData};

/// Venered command-line interface.
#[derive(Parser)]
#[command(name = "venered")]
#[command(about = "Session tool for the Venered client core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (config, session). Defaults to ~/.venered
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session state
    Status,
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Register a new account and sign in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        display_name: String,
    },
    /// Sign out and discard the persisted session
    Logout,
    /// Run a scripted sign-in/refresh/sign-out flow against the mock backend
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    if let Commands::Demo = cli.command {
        return run_demo().await;
    }

    let provider = start_provider(&config, &paths);
    let result = match cli.command {
        Commands::Status => show_status(&provider).await,
        Commands::Login { email, password } => {
            sign_in(&provider, LoginCredentials { email, password }).await
        }
        Commands::Signup {
            email,
            password,
            username,
            display_name,
        } => {
            sign_up(
                &provider,
                SignUpData {
                    email,
                    password,
                    username,
                    display_name,
                },
            )
            .await
        }
        Commands::Logout => sign_out(&provider).await,
        Commands::Demo => unreachable!("handled above"),
    };
    provider.shutdown();
    result
}

/// Pick the backend by configuration: the real project when one is set
/// up, the in-memory mock otherwise.
fn start_provider(config: &Config, paths: &Paths) -> AuthProvider {
    let options = ProviderOptions {
        resolve_deadline: Duration::from_secs(config.resolve_deadline_secs),
    };

    let gateway: Arc<dyn AuthGateway> = if config.is_supabase_configured() {
        let store = FileSessionStore::new(paths.session_file());
        Arc::new(SupabaseGateway::with_store(
            config.supabase_url.clone(),
            config.supabase_publishable_key.clone(),
            Box::new(store),
        ))
    } else {
        tracing::info!("supabase is not configured, using the in-memory mock backend");
        Arc::new(MockGateway::new())
    };

    AuthProvider::start(gateway, options)
}

async fn show_status(provider: &AuthProvider) -> anyhow::Result<()> {
    let snapshot = provider.restore().await;
    match snapshot.user() {
        Some(user) => println!("Signed in as {} ({})", user.display_name, user.email),
        None => println!("Signed out"),
    }
    Ok(())
}

async fn sign_in(provider: &AuthProvider, credentials: LoginCredentials) -> anyhow::Result<()> {
    match provider.sign_in(&credentials).await {
        Ok(session) => {
            println!(
                "Signed in as {} ({})",
                session.user.display_name, session.user.email
            );
            Ok(())
        }
        Err(e) => anyhow::bail!(e.user_message()),
    }
}

async fn sign_up(provider: &AuthProvider, data: SignUpData) -> anyhow::Result<()> {
    match provider.sign_up(&data).await {
        Ok(session) => {
            println!(
                "Welcome, {} (@{})",
                session.user.display_name, session.user.username
            );
            Ok(())
        }
        Err(e) => anyhow::bail!(e.user_message()),
    }
}

async fn sign_out(provider: &AuthProvider) -> anyhow::Result<()> {
    match provider.sign_out().await {
        Ok(()) => {
            println!("Signed out");
            Ok(())
        }
        Err(e) => anyhow::bail!(e.user_message()),
    }
}

/// Scripted end-to-end flow against the mock backend, delays included.
async fn run_demo() -> anyhow::Result<()> {
    let gateway = Arc::new(MockGateway::new());
    let provider = AuthProvider::start(
        Arc::clone(&gateway) as Arc<dyn AuthGateway>,
        ProviderOptions::default(),
    );

    println!("Waiting for the backend's first session event...");
    let snapshot = provider.ready().await;
    println!(
        "Resolved: {}",
        if snapshot.is_authenticated() {
            "signed in"
        } else {
            "signed out"
        }
    );

    println!("Signing in as {DEMO_EMAIL}...");
    let session = provider
        .sign_in(&LoginCredentials {
            email: DEMO_EMAIL.to_string(),
            password: DEMO_PASSWORD.to_string(),
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!(
        "Signed in as {} (@{})",
        session.user.display_name, session.user.username
    );

    println!("Refreshing the session...");
    let refreshed = gateway.refresh_session().await?;
    println!("New token expires at {}", refreshed.expires_at);

    println!("Signing out...");
    provider.sign_out().await?;
    println!(
        "Done: {}",
        if provider.is_authenticated() {
            "still signed in"
        } else {
            "signed out"
        }
    );

    provider.shutdown();
    Ok(())
}
