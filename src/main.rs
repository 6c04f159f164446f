use std::{process, sync::Arc};

use brusio::{
    application::{
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        pagination::Paginator,
        posts::PostService,
        repos::{
            CommentsRepo, CreateGroupParams, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo,
            PostsWriteRepo, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState},
    config,
    domain::identity::validate_username,
    infra::{db::PostgresRepositories, error::InfraError, http, telemetry},
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
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
        config::Command::Users(args) => match args.command {
            config::UsersCommand::Create(create) => run_users_create(settings, create).await,
        },
        config::Command::Groups(args) => match args.command {
            config::GroupsCommand::Create(create) => run_groups_create(settings, create).await,
        },
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> http::HttpState {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();

    let paginator = Paginator::new(settings.feed.page_size);

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        groups_repo.clone(),
        users_repo.clone(),
        follows_repo.clone(),
        comments_repo.clone(),
        paginator,
    ));
    let posts = Arc::new(PostService::new(
        posts_repo,
        posts_write_repo,
        comments_repo,
    ));
    let follows = Arc::new(FollowService::new(follows_repo, users_repo.clone()));

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = cache_config.enabled.then(|| CacheState::new(cache_config));

    http::HttpState {
        feed,
        posts,
        follows,
        users: users_repo,
        groups: groups_repo,
        health: health_repo,
        cache,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings);
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "brusio::serve",
        addr = %settings.server.addr,
        "Listening"
    );

    let draining = Arc::new(Notify::new());
    let drain_started = draining.clone();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!(target = "brusio::serve", "shutdown signal received"),
                Err(err) => error!(target = "brusio::serve", error = %err, "shutdown signal unavailable"),
            }
            drain_started.notify_one();
        },
    );

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = async {
            draining.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "brusio::serve",
                grace_secs = grace.as_secs(),
                "graceful shutdown window elapsed, aborting open connections"
            );
        }
    }

    Ok(())
}

async fn run_users_create(
    settings: config::Settings,
    args: config::UsersCreateArgs,
) -> Result<(), AppError> {
    validate_username(&args.username).map_err(AppError::from)?;

    let repositories = init_repositories(&settings).await?;
    let user = repositories
        .create_user(&args.username)
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    info!(
        target = "brusio::users",
        id = user.id,
        username = %user.username,
        "Account created"
    );
    Ok(())
}

async fn run_groups_create(
    settings: config::Settings,
    args: config::GroupsCreateArgs,
) -> Result<(), AppError> {
    let title = args.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("group title must not be empty"));
    }

    let slug = match args.slug.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => slug.to_string(),
        _ => slug::slugify(title),
    };
    if slug.is_empty() {
        return Err(AppError::validation(
            "group slug could not be derived from the title; pass --slug",
        ));
    }

    let repositories = init_repositories(&settings).await?;
    let group = repositories
        .create_group(CreateGroupParams {
            title: title.to_string(),
            slug,
            description: args.description,
        })
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    info!(
        target = "brusio::groups",
        id = group.id,
        slug = %group.slug,
        "Group created"
    );
    Ok(())
}
