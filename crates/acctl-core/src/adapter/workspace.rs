//! SaaS workspace adapter, driven through the vendor's `gam` admin CLI.
//!
//! Suspension (not deletion) is the deactivation primitive: the mailbox and
//! drive contents survive for the data-retention window, and suspending an
//! already-suspended account is a no-op on the vendor side.

use crate::config::WorkspaceConfig;
use crate::error::{AcctlError, Result};
use crate::exec::{CmdOutput, CommandRunner, VendorCli};
use crate::types::SystemName;

use super::{AccountLookup, SystemAdapter};

pub struct WorkspaceAdapter<R: CommandRunner = VendorCli> {
    config: WorkspaceConfig,
    runner: R,
}

impl WorkspaceAdapter {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self {
            config,
            runner: VendorCli,
        }
    }
}

impl<R: CommandRunner> WorkspaceAdapter<R> {
    pub fn with_runner(config: WorkspaceConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Bare usernames get the configured mail domain appended.
    fn email(&self, account_id: &str) -> String {
        if account_id.contains('@') {
            account_id.to_string()
        } else {
            format!("{account_id}@{}", self.config.domain)
        }
    }

    fn classify(&self, out: &CmdOutput, what: &str) -> AcctlError {
        let noise = format!("{}\n{}", out.stderr, out.stdout);
        if noise.contains("Does not exist") || noise.contains("userNotFound") {
            return AcctlError::not_found("workspace", what.to_string());
        }
        if noise.contains("rateLimitExceeded")
            || noise.contains("quotaExceeded")
            || noise.contains("timed out")
            || noise.contains("Connection")
        {
            return AcctlError::transient("workspace", out.stderr.trim().to_string());
        }
        if noise.contains("invalid_grant") || noise.contains("unauthorized") {
            return AcctlError::auth("workspace", out.stderr.trim().to_string());
        }
        AcctlError::CliFailed {
            command: "gam".to_string(),
            detail: format!("exit {}: {}", out.status, out.stderr.trim()),
        }
    }

    fn gam(&self, args: &[&str], what: &str) -> Result<CmdOutput> {
        let out = self.runner.run("gam", args, None)?;
        if !out.success() {
            return Err(self.classify(&out, what));
        }
        Ok(out)
    }

    /// `gam info user` output, used for existence and suspension checks.
    fn info_user(&self, email: &str) -> Result<String> {
        Ok(self.gam(&["info", "user", email], email)?.stdout)
    }

    fn is_suspended(info: &str) -> bool {
        info.lines()
            .any(|l| l.trim().eq_ignore_ascii_case("Account Suspended: True"))
    }

    /// Group memberships, filtered through the keep-list. Keep-list entries
    /// match as substrings, so one entry can cover a family of groups.
    fn group_memberships(&self, email: &str) -> Result<Vec<String>> {
        let out = self.gam(&["print", "groups", "member", email], email)?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| line.contains('@'))
            .filter(|group| !self.config.keep_groups.iter().any(|k| group.contains(k.as_str())))
            .map(str::to_string)
            .collect())
    }

    /// Create a workspace account. Skips creation when the address already
    /// exists.
    pub fn create_user(&self, new_user: &crate::provision::NewUser, password: &str) -> Result<bool> {
        let email = self.email(&new_user.user_id);
        if self.user_id_exists(&new_user.user_id)? {
            tracing::info!(user = %email, "workspace account exists, skipping create");
            return Ok(false);
        }
        self.gam(
            &[
                "create",
                "user",
                &email,
                "firstname",
                &new_user.first_name,
                "lastname",
                &new_user.last_name,
                "password",
                password,
                "changepassword",
                "on",
            ],
            &email,
        )?;
        Ok(true)
    }
}

impl<R: CommandRunner> SystemAdapter for WorkspaceAdapter<R> {
    fn system(&self) -> SystemName {
        SystemName::Workspace
    }

    fn deactivate(&self, account_id: &str) -> Result<String> {
        let email = self.email(account_id);
        let info = self.info_user(&email)?;
        if Self::is_suspended(&info) {
            return Ok("already suspended".to_string());
        }
        // Deprovision first (clears connected apps and sign-in cookies),
        // then suspend.
        self.gam(&["user", &email, "deprovision"], &email)?;
        self.gam(&["update", "user", &email, "suspended", "on"], &email)?;
        Ok("suspended and deprovisioned".to_string())
    }

    fn remove_group_access(&self, account_id: &str) -> Result<Vec<String>> {
        let email = self.email(account_id);
        let groups = self.group_memberships(&email)?;
        let mut removed = Vec::new();
        for group in groups {
            self.gam(&["update", "group", &group, "remove", "user", &email], &group)?;
            tracing::debug!(user = %email, group = %group, "removed workspace group");
            removed.push(group);
        }
        Ok(removed)
    }

    fn verify_locked(&self, account_id: &str) -> Result<bool> {
        let email = self.email(account_id);
        Ok(Self::is_suspended(&self.info_user(&email)?))
    }
}

impl<R: CommandRunner> AccountLookup for WorkspaceAdapter<R> {
    fn system(&self) -> SystemName {
        SystemName::Workspace
    }

    fn user_id_exists(&self, user_id: &str) -> Result<bool> {
        match self.info_user(&self.email(user_id)) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;

    fn test_config() -> WorkspaceConfig {
        WorkspaceConfig {
            domain: "example.com".to_string(),
            keep_groups: vec!["allstaff".to_string()],
        }
    }

    fn adapter(runner: ScriptedRunner) -> WorkspaceAdapter<ScriptedRunner> {
        WorkspaceAdapter::with_runner(test_config(), runner)
    }

    const ACTIVE_INFO: &str = "User: jdoe@example.com\nAccount Suspended: False\n";
    const SUSPENDED_INFO: &str = "User: jdoe@example.com\nAccount Suspended: True\n";

    #[test]
    fn deactivate_deprovisions_then_suspends() {
        let runner = ScriptedRunner::new(vec![
            ScriptedRunner::ok(ACTIVE_INFO),
            ScriptedRunner::ok("deprovisioned"),
            ScriptedRunner::ok("updated"),
        ]);
        let adapter = adapter(runner);
        assert_eq!(
            adapter.deactivate("jdoe").unwrap(),
            "suspended and deprovisioned"
        );
        let calls = adapter.runner.calls.borrow();
        assert_eq!(calls[1].1, ["user", "jdoe@example.com", "deprovision"]);
        assert_eq!(
            calls[2].1,
            ["update", "user", "jdoe@example.com", "suspended", "on"]
        );
    }

    #[test]
    fn deactivate_already_suspended_is_success() {
        let runner = ScriptedRunner::new(vec![ScriptedRunner::ok(SUSPENDED_INFO)]);
        let adapter = adapter(runner);
        assert_eq!(adapter.deactivate("jdoe").unwrap(), "already suspended");
        assert_eq!(adapter.runner.calls.borrow().len(), 1);
    }

    #[test]
    fn missing_account_is_not_found() {
        let runner = ScriptedRunner::new(vec![ScriptedRunner::fail(
            1,
            "ERROR: Does not exist: jdoe@example.com",
        )]);
        let adapter = adapter(runner);
        assert!(adapter.deactivate("jdoe").unwrap_err().is_not_found());
    }

    #[test]
    fn rate_limit_is_transient() {
        let runner = ScriptedRunner::new(vec![ScriptedRunner::fail(
            1,
            "ERROR: 403: rateLimitExceeded",
        )]);
        let adapter = adapter(runner);
        assert!(adapter.deactivate("jdoe").unwrap_err().is_transient());
    }

    #[test]
    fn remove_groups_filters_keep_list_fragments() {
        let listing = "Group\nstaff@groups.example.com\nallstaff@groups.example.com\n\
                       printers@groups.example.com\n";
        let runner = ScriptedRunner::new(vec![
            ScriptedRunner::ok(listing),
            ScriptedRunner::ok(""),
            ScriptedRunner::ok(""),
        ]);
        let adapter = adapter(runner);
        let removed = adapter.remove_group_access("jdoe").unwrap();
        assert_eq!(
            removed,
            vec!["staff@groups.example.com", "printers@groups.example.com"]
        );
    }

    #[test]
    fn verify_locked_parses_info() {
        let runner = ScriptedRunner::new(vec![
            ScriptedRunner::ok(SUSPENDED_INFO),
            ScriptedRunner::ok(ACTIVE_INFO),
        ]);
        let adapter = adapter(runner);
        assert!(adapter.verify_locked("jdoe").unwrap());
        assert!(!adapter.verify_locked("jdoe").unwrap());
    }

    #[test]
    fn email_appends_domain_once() {
        let adapter = adapter(ScriptedRunner::new(vec![]));
        assert_eq!(adapter.email("jdoe"), "jdoe@example.com");
        assert_eq!(adapter.email("jdoe@other.org"), "jdoe@other.org");
    }
}
