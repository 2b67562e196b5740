mod api;
mod appmax;
mod checkout_link;
mod error;
mod handlers;
mod models;
mod places;
mod store;
mod sweeper;
mod webhook;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "checkout-service")]
struct Args {
    #[arg(long, env = "APPMAX_ACCESS_TOKEN", hide_env_values = true)]
    appmax_access_token: String,

    #[arg(long, env = "APPMAX_API_URL", default_value = "https://homolog.sandboxappmax.com.br/api/v3")]
    appmax_api_url: String,

    #[arg(long, env = "APPMAX_CHECKOUT_URL", default_value = "https://homolog.sandboxappmax.com.br/checkout/bundle")]
    appmax_checkout_url: String,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    #[arg(long, env = "GOOGLE_PLACES_URL", default_value = places::TEXT_SEARCH_URL)]
    places_url: String,

    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "FRONTEND_PORT", default_value = "80")]
    port: u16,

    #[arg(long, env = "DOMAIN")]
    domain: Option<String>,

    #[arg(long, env = "DB_PATH", default_value = "db.json")]
    db_path: PathBuf,

    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    request_timeout_secs: u64,

    /// Prune provisional transactions older than this many hours. Off when unset.
    #[arg(long, env = "PROVISIONAL_TTL_HOURS", value_parser = clap::value_parser!(u32).range(1..))]
    provisional_ttl_hours: Option<u32>,

    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "3600", value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.request_timeout_secs))
        .build()?;

    let store = Arc::new(store::TransactionStore::new(&args.db_path));
    let appmax: Arc<dyn appmax::AppmaxApi> = Arc::new(appmax::AppmaxClient::new(
        http.clone(),
        &args.appmax_api_url,
        &args.appmax_access_token,
    ));
    let places = Arc::new(places::PlacesClient::new(http, args.google_api_key.clone(), &args.places_url));
    let links = Arc::new(checkout_link::CheckoutLinkResolver::new(Url::parse(&args.appmax_checkout_url)?));

    info!("Places API key loaded: {}", if places.has_api_key() { "yes" } else { "no" });
    let existing = store.list_all().await?;
    info!("Loaded {} transactions from {}", existing.len(), store.path().display());

    if let Some(hours) = args.provisional_ttl_hours {
        let sweeper = sweeper::ProvisionalSweeper::new(
            store.clone(),
            chrono::Duration::try_hours(hours.into()).context("provisional TTL out of range")?,
            Duration::from_secs(args.sweep_interval_secs),
        );
        info!("Pruning provisional transactions older than {} hours", hours);

        tokio::spawn(async move {
            sweeper.run().await;
        });
    }

    let app_state = api::AppState {
        store,
        appmax,
        places,
        links,
    };

    let app = api::create_router(app_state, args.static_dir);
    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;

    info!("Checkout service started on {}:{}", args.host, args.port);
    info!("Local: http://localhost:{}", args.port);
    if let Some(domain) = &args.domain {
        info!("Custom domain: https://{}", domain);
    }

    axum::serve(listener, app).await?;

    Ok(())
}
