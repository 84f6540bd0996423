use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use bubble_engine::content::SaveStore;
use bubble_engine::{resolve_app_paths, LoopConfig, StartupError, StateBehavior};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::data::{load_game_data, DataError};
use super::session::GameSession;
use super::states::{NameEntry, TownMenu};

pub(crate) const SEED_ENV_VAR: &str = "BUBBLE_QUEST_SEED";
const SAVE_FILE: &str = "slot.json";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Data(#[from] DataError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) initial: Box<dyn StateBehavior>,
    pub(crate) session: GameSession,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    info!("=== Bubble Quest Startup ===");
    let paths = resolve_app_paths()?;
    let data = load_game_data(&paths.data_dir)?;
    let store = SaveStore::new(paths.saves_dir.join(SAVE_FILE), data.fingerprint.clone());

    let saved = match store.load() {
        Ok(saved) => saved,
        Err(error) => {
            warn!(error = %error, "save_unreadable_starting_fresh");
            None
        }
    };
    let mut session = GameSession::new(data, fresh_seed(), Some(store));
    if let Some(saved) = saved {
        session.apply_save(saved);
    }
    if let Some(seed) = seed_from_env() {
        session.seed = seed;
    }

    let initial: Box<dyn StateBehavior> = if session.has_hero() {
        Box::new(TownMenu::new())
    } else {
        Box::new(NameEntry::new())
    };
    info!(
        hero = session.hero_name.as_str(),
        day = session.day,
        seed = session.seed,
        "session_ready"
    );

    let config = LoopConfig {
        window_title: "Bubble Quest".to_string(),
        asset_root: paths.assets_dir,
        ..LoopConfig::default()
    };
    Ok(AppWiring {
        config,
        initial,
        session,
    })
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn fresh_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

fn parse_seed(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn seed_from_env() -> Option<u64> {
    match env::var(SEED_ENV_VAR) {
        Ok(value) => {
            let seed = parse_seed(&value);
            if seed.is_none() {
                warn!(
                    env_var = SEED_ENV_VAR,
                    value = value.as_str(),
                    "invalid seed env var value; keeping session seed"
                );
            }
            seed
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var = SEED_ENV_VAR,
                error = %err,
                "unable to read seed env var; keeping session seed"
            );
            None
        }
    }
}
