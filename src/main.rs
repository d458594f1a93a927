use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use portico::application::admin::AdminService;
use portico::application::auth::AuthService;
use portico::application::blog::BlogService;
use portico::application::error::AppError;
use portico::application::events::EventService;
use portico::application::mailer::{Mailer, NoopMailer};
use portico::application::repos::{
    AccessTokensRepo, BlogRepo, EventsRepo, UsersRepo,
};
use portico::application::users::UserService;
use portico::cache::{Cache, Invalidator, KeyValueStore, RateLimiter};
use portico::config;
use portico::infra::db::MySqlRepositories;
use portico::infra::error::InfraError;
use portico::infra::http::{self, ApiState};
use portico::infra::mailer::HttpMailer;
use portico::infra::redis::RedisStore;
use portico::infra::telemetry;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::ResetRateLimits(args) => run_reset_rate_limits(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let store = connect_store(&settings).await?;
    let state = build_api_state(repositories, store, &settings);

    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "portico::server",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn run_reset_rate_limits(
    settings: config::Settings,
    args: config::ResetRateLimitsArgs,
) -> Result<(), AppError> {
    if args.ip.is_none() && args.email.is_none() {
        return Err(AppError::validation(
            "reset-rate-limits requires at least one of --ip or --email",
        ));
    }

    let store = connect_store(&settings).await?;
    let limiter = RateLimiter::new(store);

    let deleted = limiter
        .reset_matching(args.ip.as_deref(), args.email.as_deref())
        .await?;

    info!(
        target = "portico::admin",
        keys = deleted.len(),
        ip = args.ip.as_deref().unwrap_or(""),
        email = args.email.as_deref().unwrap_or(""),
        "rate limits reset"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<MySqlRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = MySqlRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    MySqlRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(MySqlRepositories::new(pool)))
}

async fn connect_store(settings: &config::Settings) -> Result<Arc<dyn KeyValueStore>, AppError> {
    let redis_url = settings
        .redis
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("redis url is not configured"))
        .map_err(AppError::from)?;

    let store = RedisStore::connect(redis_url).await.map_err(AppError::from)?;
    Ok(Arc::new(store))
}

fn build_api_state(
    repositories: Arc<MySqlRepositories>,
    store: Arc<dyn KeyValueStore>,
    settings: &config::Settings,
) -> ApiState {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let blog_repo: Arc<dyn BlogRepo> = repositories.clone();
    let events_repo: Arc<dyn EventsRepo> = repositories.clone();
    let tokens_repo: Arc<dyn AccessTokensRepo> = repositories;

    let cache = Cache::new(store.clone());
    let limiter = RateLimiter::new(store.clone());
    let invalidator = Invalidator::new(store);

    let mailer: Arc<dyn Mailer> = match settings.mail.endpoint.clone() {
        Some(endpoint) => Arc::new(HttpMailer::new(
            endpoint,
            settings.mail.from.clone(),
            settings.mail.from_name.clone(),
        )),
        None => Arc::new(NoopMailer),
    };

    ApiState {
        users: Arc::new(UserService::new(
            users_repo.clone(),
            cache.clone(),
            limiter.clone(),
            invalidator.clone(),
        )),
        auth: Arc::new(AuthService::new(
            users_repo,
            tokens_repo,
            cache.clone(),
            limiter.clone(),
            invalidator.clone(),
            mailer,
            settings.mail.app_url.clone(),
        )),
        blog: Arc::new(BlogService::new(
            blog_repo,
            cache.clone(),
            limiter.clone(),
            invalidator.clone(),
        )),
        events: Arc::new(EventService::new(
            events_repo,
            cache,
            limiter.clone(),
            invalidator,
        )),
        admin: Arc::new(AdminService::new(limiter)),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "portico::server", error = %err, "failed to listen for shutdown signal");
    }
}
