//! Run configuration and per-system credentials.
//!
//! Layout:
//!   config.yaml            — endpoints, ids, keep-lists (safe to commit)
//!   secrets/
//!     ticketing.json       — BEID + web services key
//!     directory.json       — bind dn password
//!     database.json        — sql login
//!     erp.json             — read-only login + connect string
//!     meetings.json        — OAuth client for the meeting service
//!
//! Credential paths in config.yaml are resolved relative to the config file
//! itself, so a deployment can keep everything under one directory.

use crate::error::{AcctlError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Per-system sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketingConfig {
    pub base_url: String,
    /// Ticketing application id, interpolated into ticket endpoints.
    pub app_id: String,
    pub credentials: PathBuf,
    /// Custom-attribute id on the ticket that carries the ERP person id.
    pub erp_attribute_id: u64,
    /// Workflow step the automation approves, and the status ids it moves
    /// the ticket through while working.
    pub workflow_step_id: String,
    pub status_in_process: u64,
    pub status_open: u64,
    /// Ticket type/status filters for the "New separations" search.
    pub separation_type_ids: Vec<u64>,
    pub new_status_ids: Vec<u64>,
    /// Group id of the Employees group removed at the end of a separation.
    pub employees_group_id: u64,
    /// Mail domain for people-search lookups by bare username.
    pub user_domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// LDAP URI, e.g. ldaps://dc.example.com
    pub uri: String,
    pub base_dn: String,
    pub bind_dn: String,
    pub credentials: PathBuf,
    /// Groups that must never be removed from a user.
    #[serde(default)]
    pub keep_groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Mail domain appended to bare usernames.
    pub domain: String,
    /// Group name fragments that must never be removed.
    #[serde(default)]
    pub keep_groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub server: String,
    pub database: String,
    pub credentials: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpConfig {
    pub credentials: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingsConfig {
    pub base_url: String,
    pub auth_url: String,
    pub credentials: PathBuf,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ticketing: TicketingConfig,
    pub directory: DirectoryConfig,
    pub workspace: WorkspaceConfig,
    pub database: DatabaseConfig,
    pub erp: ErpConfig,
    /// Only needed by `acctl reclaim`.
    #[serde(default)]
    pub meetings: Option<MeetingsConfig>,
    /// Pause between tickets in batch mode, to stay under API rate limits.
    #[serde(default = "default_pause_seconds")]
    pub pause_seconds: u64,
    /// Directory the config was loaded from; relative credential paths
    /// resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_pause_seconds() -> u64 {
    5
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AcctlError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&data)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    /// Resolve the config file path.
    ///
    /// Priority:
    /// 1. `--config` flag / `ACCTL_CONFIG` env var (passed in as `explicit`)
    /// 2. `~/.config/acctl/config.yaml`
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(p) = explicit {
            return Ok(p.to_path_buf());
        }
        let Some(home) = home::home_dir() else {
            return Err(AcctlError::ConfigNotFound(
                "no --config given and home directory unknown".to_string(),
            ));
        };
        Ok(home.join(".config/acctl/config.yaml"))
    }

    /// Load a JSON credentials file for one system, resolving relative paths
    /// against the config file's directory.
    pub fn load_credentials<T: DeserializeOwned>(&self, system: &str, path: &Path) -> Result<T> {
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        if !full.exists() {
            return Err(AcctlError::CredentialsNotFound {
                system: system.to_string(),
                path: full.display().to_string(),
            });
        }
        let data = std::fs::read_to_string(&full)?;
        Ok(serde_json::from_str(&data)?)
    }
}

// ---------------------------------------------------------------------------
// Credential file shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TicketingCredentials {
    pub beid: String,
    pub web_services_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BindCredentials {
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SqlCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErpCredentials {
    pub username: String,
    pub password: String,
    pub connect_string: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeetingsCredentials {
    pub account_id: String,
    pub client_id: String,
    pub client_secret: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
