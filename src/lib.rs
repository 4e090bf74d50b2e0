pub mod aggregation;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod drafts;
pub mod errors;
pub mod filters;
pub mod mentions;
pub mod models;
pub mod session;
pub mod state;
pub mod subscriptions;
pub mod summary;

pub use app::{MemberMonth, SubmitOutcome, TeamDailyCore};
pub use config::AppConfig;
pub use errors::{AppError, AppResult, AuthError};

use crate::state::{reduce, AppEvent, AppState};
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    if let Err(error) = init_tracing(&config.log_dir(), &config.log_filter) {
        eprintln!("logging disabled: {}", error);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        let (state, _core) = launch(&config).await;
        tracing::info!(
            view = ?state.view,
            connection = ?state.connection,
            data_dir = %config.data_dir.display(),
            "client state ready"
        );
        if let Some(message) = &state.auth_error {
            println!("{}", message);
        } else {
            println!("{:?}", state.view);
        }
    });
    Ok(())
}

/// Opens the store and runs the startup sequence. A store that cannot be opened leaves the client
/// on the login view in the connection-failed state, with no core to talk to.
pub async fn launch(config: &AppConfig) -> (AppState, Option<Arc<TeamDailyCore>>) {
    match TeamDailyCore::new(config) {
        Ok(core) => (start(&core).await, Some(core)),
        Err(error) => {
            tracing::error!(data_dir = %config.data_dir.display(), error = %error, "failed to open document store");
            (reduce(AppState::default(), AppEvent::ConnectionFailed(to_client_error(error))), None)
        }
    }
}

/// Drives the startup sequence through the state machine: connect, restore the session, then load
/// the collections the signed-in user sees.
pub async fn start(core: &Arc<TeamDailyCore>) -> AppState {
    let state = AppState::default();
    let restored = match core.bootstrap().await {
        Ok(restored) => restored,
        Err(error) => return reduce(state, AppEvent::ConnectionFailed(to_client_error(error))),
    };

    let mut state = reduce(state, AppEvent::ConnectionEstablished);
    state = reduce(state, AppEvent::SessionRestored(restored.clone()));
    if let Some(user) = restored {
        state = reduce(state, AppEvent::ReportsUpdated(core.subscribe_reports().current()));
        state = reduce(state, AppEvent::MembersUpdated(core.subscribe_members().current()));
        state = reduce(state, AppEvent::GroupsUpdated(core.subscribe_groups().current()));
        state = reduce(state, AppEvent::NotificationsUpdated(core.subscribe_notifications(&user.id).current()));
    }
    reduce(state, AppEvent::SettingsUpdated(core.subscribe_settings().current()))
}

fn init_tracing(log_dir: &Path, default_filter: &str) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "teamdaily.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

pub fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}
