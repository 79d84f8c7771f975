use clap::{Args, Parser, Subcommand};
use csrf_session::config::ConfigError;
use csrf_session::router::NavigationError;
use csrf_session::transport::TransportError;
use csrf_session::{ApiError, AuthStore, NavigationGate, RouteTable, SessionApi, SessionConfig};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("http client setup failed: {0}")]
    Transport(#[from] TransportError),
    #[error("request failed: {0}")]
    Api(#[from] ApiError),
    #[error("navigation failed: {0}")]
    Navigation(#[from] NavigationError),
    #[error("{0}")]
    Session(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "session-cli", about = "CSRF session bootstrap CLI")]
struct Cli {
    /// Overrides `SESSION_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the backend's root endpoint.
    Ping,
    /// Log in and print the profile.
    Login(Credentials),
    /// Re-establish a session from cookies and print the profile.
    Whoami,
    /// Run the navigation gate for a path and print where it lands.
    Navigate {
        path: String,
        #[command(flatten)]
        credentials: OptionalCredentials,
    },
    /// End the backend session.
    Logout(OptionalCredentials),
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long, env = "SESSION_EMAIL")]
    email: String,
    #[arg(long, env = "SESSION_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct OptionalCredentials {
    #[arg(long, env = "SESSION_EMAIL", requires = "password")]
    email: Option<String>,
    #[arg(long, env = "SESSION_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.base_url)?;
    tracing::debug!(base_url = %config.base_url, env = ?config.app_env, "session-cli configured");

    let api = SessionApi::from_config(&config)?;
    let store = AuthStore::new(api);

    match cli.command {
        Command::Ping => run_ping(&store).await,
        Command::Login(credentials) => run_login(&store, &credentials.email, &credentials.password).await,
        Command::Whoami => run_whoami(&store).await,
        Command::Navigate { path, credentials } => run_navigate(&store, &path, credentials).await,
        Command::Logout(credentials) => run_logout(&store, credentials).await,
    }
}

fn load_config(base_url: Option<String>) -> Result<SessionConfig, ConfigError> {
    SessionConfig::from_lookup(|key| {
        if key == "SESSION_API_BASE_URL" {
            if let Some(url) = &base_url {
                return Some(url.clone());
            }
        }
        std::env::var(key).ok()
    })
}

async fn run_ping(store: &AuthStore) -> Result<(), CliError> {
    let info = store.api().server_info().await?;
    print_json(&info)
}

async fn run_login(store: &AuthStore, email: &str, password: &str) -> Result<(), CliError> {
    login(store, email, password).await?;
    print_profile(store)
}

async fn run_whoami(store: &AuthStore) -> Result<(), CliError> {
    store.check_auth().await;
    if let Some(error) = store.snapshot().error {
        return Err(CliError::Session(error));
    }
    print_profile(store)
}

async fn run_navigate(store: &AuthStore, path: &str, credentials: OptionalCredentials) -> Result<(), CliError> {
    login_if_given(store, credentials).await?;
    let gate = NavigationGate::new(RouteTable::standard(), std::sync::Arc::new(store.clone()));
    let route = gate.navigate(path).await?;
    print_json(&serde_json::json!({
        "route": route.name,
        "path": route.path,
        "authenticated": store.is_logged_in(),
    }))
}

async fn run_logout(store: &AuthStore, credentials: OptionalCredentials) -> Result<(), CliError> {
    login_if_given(store, credentials).await?;
    store.logout().await;
    let session = store.snapshot();
    if let Some(error) = session.error {
        return Err(CliError::Session(error));
    }
    println!("logged out");
    Ok(())
}

async fn login_if_given(store: &AuthStore, credentials: OptionalCredentials) -> Result<(), CliError> {
    match (credentials.email, credentials.password) {
        (Some(email), Some(password)) => login(store, &email, &password).await,
        _ => Ok(()),
    }
}

async fn login(store: &AuthStore, email: &str, password: &str) -> Result<(), CliError> {
    store.login(email, password).await;
    let session = store.snapshot();
    if let Some(error) = session.error {
        return Err(CliError::Session(error));
    }
    if !session.authenticated {
        return Err(CliError::NotLoggedIn);
    }
    Ok(())
}

fn print_profile(store: &AuthStore) -> Result<(), CliError> {
    let Some(user) = store.current_user() else {
        return Err(CliError::NotLoggedIn);
    };
    print_json(&serde_json::to_value(user)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
