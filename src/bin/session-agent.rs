use anyhow::{anyhow, Result};
use clap::Parser;
use reqwest::Client;
use serde_json::Value;
use session_agent::observability::metrics::gather_text;
use session_agent::utils::config_loader;
use session_agent::utils::logging;
use session_agent::utils::logging::LogLevel;
use session_agent::{ResilientFetch, SessionManager};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "session-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    /// log in before fetching
    #[arg(long, env = "SESSION_EMAIL", requires = "password")]
    email: Option<String>,
    #[arg(long, env = "SESSION_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// path under the API base url, e.g. /banks
    #[arg(long)]
    fetch: Option<String>,
    /// revoke tokens and clear the session after the fetch
    #[arg(long)]
    logout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, set up logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level)?;
    let settings = &service_config.settings;

    // -------------------------------
    // 2. Build the session context
    // -------------------------------

    let client = Client::new();
    let session = SessionManager::from_settings(client.clone(), settings)?;
    info!(state = ?session.state(), "session restored");

    // -------------------------------
    // 3. Log in or pick up the stored session
    // -------------------------------

    let profile = match (&args.email, &args.password) {
        (Some(email), Some(password)) => session.login(email, password).await?,
        _ => session.initialize_profile().await,
    };
    info!(id = profile.id, email = %profile.email, "profile");

    // -------------------------------
    // 4. Resilient fetch
    // -------------------------------

    if let Some(path) = &args.fetch {
        let policy = settings.retry.clone().unwrap_or_default().to_policy();
        let fetch: ResilientFetch<Value> =
            ResilientFetch::new(client.clone(), settings.api.url(path), &session).with_policy(policy);
        let payload = fetch
            .execute()
            .await
            .map_err(|e| anyhow!("fetch '{}' failed: {}", fetch.url(), e))?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }

    // -------------------------------
    // 5. Logout, metrics
    // -------------------------------

    if args.logout {
        session.logout().await;
    }
    if settings.metrics.is_enabled {
        eprintln!("{}", gather_text().await);
    }

    Ok(())
}
