mod cache;
mod error;
mod extract;
mod fetch;
mod geo;
mod handlers;
mod registry;
mod resolve;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::time::Instant;
use tower_http::cors::CorsLayer;

use cache::TtlCache;
use fetch::FetchOptions;
use handlers::AppState;
use registry::CityRegistry;
use resolve::Sources;

#[derive(Parser)]
#[command(name = "vakit-api", about = "Namaz vakitleri JSON API")]
struct Cli {
    /// Listen port
    #[arg(short, long, default_value = "3001")]
    port: u16,

    /// Cache TTL for standard lookups, in seconds
    #[arg(long, default_value = "1800")]
    ttl: u64,

    /// Cache TTL for auto/global lookups, in seconds
    #[arg(long, default_value = "900")]
    auto_ttl: u64,

    /// Upstream fetch timeout in seconds
    #[arg(long, default_value = "8")]
    timeout: u64,

    /// Extra fetch attempts after the first failure
    #[arg(long, default_value = "2")]
    retries: u32,

    /// Base retry delay in milliseconds (linear backoff)
    #[arg(long, default_value = "500")]
    retry_delay: u64,

    /// Geolocation service base URL
    #[arg(long, default_value = "http://ip-api.com")]
    geo_base: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .init();

    let state = Arc::new(AppState {
        client: reqwest::Client::new(),
        registry: CityRegistry::new(),
        cache: TtlCache::new(cli.ttl),
        auto_cache: TtlCache::new(cli.auto_ttl),
        fetch_opts: FetchOptions::new(cli.timeout, cli.retries, cli.retry_delay),
        sources: Sources::default(),
        geo_base: cli.geo_base,
        start_time: Instant::now(),
    });

    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/cities", get(handlers::cities))
        .route("/prayer-times/{city}", get(handlers::prayer_times))
        .route("/prayer-times/{city}/{date}", get(handlers::prayer_times_for_date))
        .route("/all-prayer-times", get(handlers::all_prayer_times))
        .route("/prayer-times-by-location", get(handlers::prayer_times_by_location))
        .route("/prayer-times-auto", get(handlers::prayer_times_auto))
        .route("/prayer-times-global", get(handlers::prayer_times_global))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!(
        "Namaz Vakitleri API listening on {} (ttl={}s, auto_ttl={}s, timeout={}s, retries={})",
        addr,
        cli.ttl,
        cli.auto_ttl,
        cli.timeout,
        cli.retries
    );

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
