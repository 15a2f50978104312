//! Adapter construction from the loaded config. Each command builds only
//! the sessions it needs, so `provision` never logs into the ticketing
//! system and `reclaim` never binds to the directory.

use std::path::Path;

use acctl_core::adapter::database::DatabaseAdapter;
use acctl_core::adapter::directory::DirectoryAdapter;
use acctl_core::adapter::erp::ErpAdapter;
use acctl_core::adapter::ticketing::TicketingAdapter;
use acctl_core::adapter::workspace::WorkspaceAdapter;
use acctl_core::config::{
    BindCredentials, Config, ErpCredentials, MeetingsCredentials, SqlCredentials,
    TicketingCredentials,
};
use acctl_core::license::MeetingsAdapter;
use anyhow::Context;

pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = Config::resolve_path(explicit)?;
    Config::load(&path).with_context(|| format!("failed to load {}", path.display()))
}

pub fn ticketing(config: &Config) -> anyhow::Result<TicketingAdapter> {
    let credentials: TicketingCredentials = config
        .load_credentials("ticketing", &config.ticketing.credentials)
        .context("ticketing credentials")?;
    TicketingAdapter::connect(config.ticketing.clone(), &credentials)
        .context("ticketing admin login failed")
}

pub fn directory(config: &Config) -> anyhow::Result<DirectoryAdapter> {
    let credentials: BindCredentials = config
        .load_credentials("directory", &config.directory.credentials)
        .context("directory credentials")?;
    Ok(DirectoryAdapter::new(
        config.directory.clone(),
        credentials.password,
    ))
}

pub fn workspace(config: &Config) -> WorkspaceAdapter {
    WorkspaceAdapter::new(config.workspace.clone())
}

pub fn database(config: &Config) -> anyhow::Result<DatabaseAdapter> {
    let credentials: SqlCredentials = config
        .load_credentials("database", &config.database.credentials)
        .context("database credentials")?;
    Ok(DatabaseAdapter::new(config.database.clone(), credentials))
}

pub fn erp(config: &Config) -> anyhow::Result<ErpAdapter> {
    let credentials: ErpCredentials = config
        .load_credentials("erp", &config.erp.credentials)
        .context("ERP credentials")?;
    Ok(ErpAdapter::new(credentials))
}

pub fn meetings(config: &Config) -> anyhow::Result<MeetingsAdapter> {
    let meetings = config
        .meetings
        .as_ref()
        .context("config has no `meetings` section; reclaim needs one")?;
    let credentials: MeetingsCredentials = config
        .load_credentials("meetings", &meetings.credentials)
        .context("meetings credentials")?;
    MeetingsAdapter::connect(meetings.clone(), &credentials)
        .context("meeting-service OAuth login failed")
}
