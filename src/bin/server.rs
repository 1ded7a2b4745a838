use std::{
    fs::OpenOptions,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use baas::{
    AppState, ChatCompletionConfig, ChatCompletionParser, CurrencyCode, IngestionConfig,
    OpenExchangeRates, SQLiteStore, build_router, graceful_shutdown, logging_middleware,
    purge_expired_items_periodically,
};

/// The REST API server for baas.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: PathBuf,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// The secret used to encrypt session cookies.
    #[arg(long, env = "SECRET")]
    cookie_secret: String,

    /// The canonical timezone that new transactions are dated in.
    #[arg(long, env = "TIMEZONE", default_value = "Asia/Singapore")]
    timezone: String,

    /// The currency that transaction amounts are converted into.
    #[arg(long, env = "BASE_CURRENCY", default_value = "SGD")]
    base_currency: String,

    /// The API key for the chat completions service.
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: String,

    /// The chat completions endpoint.
    #[arg(
        long,
        env = "OPENAI_URL",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    openai_url: String,

    /// The model that turns descriptions into line items.
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    openai_model: String,

    /// The exchange rate service, queried as `{rates_url}/{currency}`.
    #[arg(
        long,
        env = "RATES_URL",
        default_value = "https://open.er-api.com/v6/latest"
    )]
    rates_url: String,

    /// How long to wait for the chat completions and exchange rate services.
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
    http_timeout_secs: u64,

    /// Store no transactions from a description unless all of them can be stored.
    #[arg(long, env = "ATOMIC_INGESTION")]
    atomic_ingestion: bool,

    /// How often expired sessions are removed from the database.
    #[arg(long, env = "SESSION_PURGE_INTERVAL_SECS", default_value_t = 3600)]
    session_purge_interval_secs: u64,

    /// Also write debug logs to this file.
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(args.log_file.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let http_timeout = Duration::from_secs(args.http_timeout_secs);
    let base_currency: CurrencyCode = args
        .base_currency
        .parse()
        .expect("The base currency must be a three letter currency code.");

    let conn = Connection::open(&args.db_path).expect("Could not open the database.");
    let store = Arc::new(SQLiteStore::new(conn).expect("Could not initialize the database."));

    let parser = ChatCompletionParser::new(ChatCompletionConfig {
        url: args.openai_url,
        api_key: args.openai_api_key,
        model: args.openai_model,
        base_currency: base_currency.clone(),
        timeout: http_timeout,
    })
    .expect("Could not create the description parser.");
    let exchange_rates = OpenExchangeRates::new(&args.rates_url, http_timeout)
        .expect("Could not create the exchange rate client.");

    let app_state = AppState::new(
        &args.cookie_secret,
        store.clone(),
        Arc::new(parser),
        Arc::new(exchange_rates),
        IngestionConfig {
            base_currency,
            local_timezone: args.timezone,
            atomic: args.atomic_ingestion,
        },
    )
    .expect("Could not create the application state.");

    tokio::spawn(purge_expired_items_periodically(
        store,
        Duration::from_secs(args.session_purge_interval_secs),
    ));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(app_state).layer(middleware::from_fn(logging_middleware)),
    );

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly.");
}

fn setup_logging(log_file: Option<&Path>) {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let debug_log = log_file.map(|path| {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("Could not create log file");

        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Arc::new(log_file))
            .with_filter(EnvFilter::new("debug"))
    });

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
