pub mod duplicate;
pub mod info;
pub mod query;
pub mod sysconf;

use super::app::GlobalArgs;
use super::prompts::prompt_db_password;
use anyhow::{Context, Result};
use applus::{Config, Session};
use log::debug;
use std::path::Path;

/// Reads the config named on the command line (or the default one) and
/// applies `--profile`, `--env` and `--user` in that order.
pub fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = match &global.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    if let Some(profile) = &global.profile {
        config = config.with_profile(profile)?;
    }
    if let Some(env) = &global.env {
        config = config.with_env(env.clone());
    }
    if let Some(user) = &global.user {
        config = config.with_user(user.clone());
    }
    Ok(config)
}

/// Opens a session; asks for a database password when one is needed and
/// missing.
pub fn open_session(mut config: Config, needs_db: bool) -> Result<Session> {
    let db = &config.dbserver;
    if needs_db && db.sqlite_url().is_none() && db.password.is_none() && !db.server.is_empty() {
        config.dbserver.password = prompt_db_password(&db.user, &db.server)?;
    }

    debug!("Opening session for {}", config.app_server_base_url());
    Session::connect(&config).context("Failed to connect to the app server")
}

pub fn open_session_from(global: &GlobalArgs, needs_db: bool) -> Result<Session> {
    open_session(load_config(global)?, needs_db)
}

/// Session for a second system, e.g. the target of a duplication.
pub fn open_target_session(path: &Path) -> Result<Session> {
    let config = Config::load_from_file(path)
        .with_context(|| format!("Failed to load target config: {}", path.display()))?;
    open_session(config, true)
}
