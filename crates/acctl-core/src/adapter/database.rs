//! Relational database adapter, driven through the vendor's `sqlcmd` CLI.
//!
//! Holds the account master table that campus services read. Deactivation
//! flips the status column and writes an audit-log row; nothing is deleted.

use crate::config::{DatabaseConfig, SqlCredentials};
use crate::error::{AcctlError, Result};
use crate::exec::{CmdOutput, CommandRunner, VendorCli};
use crate::types::SystemName;

use super::{AccountLookup, SystemAdapter};

pub struct DatabaseAdapter<R: CommandRunner = VendorCli> {
    config: DatabaseConfig,
    credentials: SqlCredentials,
    runner: R,
}

impl DatabaseAdapter {
    pub fn new(config: DatabaseConfig, credentials: SqlCredentials) -> Self {
        Self {
            config,
            credentials,
            runner: VendorCli,
        }
    }
}

impl<R: CommandRunner> DatabaseAdapter<R> {
    pub fn with_runner(config: DatabaseConfig, credentials: SqlCredentials, runner: R) -> Self {
        Self {
            config,
            credentials,
            runner,
        }
    }

    fn classify(&self, out: &CmdOutput) -> AcctlError {
        if out.stderr.contains("Login failed") {
            return AcctlError::auth("database", out.stderr.trim().to_string());
        }
        if out.stderr.contains("Unable to complete login process")
            || out.stderr.contains("timeout")
            || out.stderr.contains("TCP Provider")
        {
            return AcctlError::transient("database", out.stderr.trim().to_string());
        }
        AcctlError::CliFailed {
            command: "sqlcmd".to_string(),
            detail: format!("exit {}: {}", out.status, out.stderr.trim()),
        }
    }

    /// Run one statement. `-b` makes sqlcmd exit non-zero on SQL errors,
    /// `-h -1 -W` strips headers and padding so rows come back raw.
    fn query(&self, sql: &str) -> Result<Vec<String>> {
        let args = [
            "-S",
            &self.config.server,
            "-d",
            &self.config.database,
            "-U",
            &self.credentials.username,
            "-P",
            &self.credentials.password,
            "-b",
            "-h",
            "-1",
            "-W",
            "-Q",
            sql,
        ];
        let out = self.runner.run("sqlcmd", &args, None)?;
        if !out.success() {
            return Err(self.classify(&out));
        }
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('(')) // drop "(1 rows affected)"
            .map(str::to_string)
            .collect())
    }

    fn fetch_status(&self, username: &str) -> Result<String> {
        let rows = self.query(&format!(
            "SELECT status FROM user_accounts WHERE username = '{}'",
            escape(username)
        ))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AcctlError::not_found("database", username.to_string()))
    }

    fn append_log(&self, username: &str, message: &str) -> Result<()> {
        self.query(&format!(
            "INSERT INTO account_log (username, logged_at, message) \
             VALUES ('{}', GETDATE(), '{}')",
            escape(username),
            escape(message)
        ))?;
        Ok(())
    }

    /// Flip an account to the student type. Not part of the separation
    /// pipeline (students skip the database step entirely); exposed for
    /// manual remediation.
    pub fn set_student(&self, username: &str) -> Result<()> {
        self.fetch_status(username)?;
        self.query(&format!(
            "UPDATE user_accounts SET account_type = 'student' WHERE username = '{}'",
            escape(username)
        ))?;
        self.append_log(username, "account type set to student")
    }
}

impl<R: CommandRunner> SystemAdapter for DatabaseAdapter<R> {
    fn system(&self) -> SystemName {
        SystemName::Database
    }

    fn deactivate(&self, account_id: &str) -> Result<String> {
        let status = self.fetch_status(account_id)?;
        if status.eq_ignore_ascii_case("disabled") {
            return Ok("already disabled".to_string());
        }
        self.query(&format!(
            "UPDATE user_accounts SET status = 'disabled' WHERE username = '{}'",
            escape(account_id)
        ))?;
        self.append_log(account_id, "account disabled by separation automation")?;
        Ok("disabled".to_string())
    }

    fn remove_group_access(&self, _account_id: &str) -> Result<Vec<String>> {
        // The account table carries no group memberships; access follows the
        // status column.
        Ok(Vec::new())
    }

    fn verify_locked(&self, account_id: &str) -> Result<bool> {
        Ok(self.fetch_status(account_id)?.eq_ignore_ascii_case("disabled"))
    }
}

impl<R: CommandRunner> AccountLookup for DatabaseAdapter<R> {
    fn system(&self) -> SystemName {
        SystemName::Database
    }

    fn user_id_exists(&self, user_id: &str) -> Result<bool> {
        let rows = self.query(&format!(
            "SELECT COUNT(*) FROM user_accounts WHERE username = '{}'",
            escape(user_id)
        ))?;
        let row = rows.first().map(String::as_str).unwrap_or("");
        let count: u64 = row.parse().map_err(|_| AcctlError::CliFailed {
            command: "sqlcmd".to_string(),
            detail: format!("expected a count, got '{row}'"),
        })?;
        Ok(count > 0)
    }
}

/// Double single quotes for SQL string literals.
fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
