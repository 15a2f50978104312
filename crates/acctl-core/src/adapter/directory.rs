//! LDAP-style directory adapter, driven through the OpenLDAP client tools
//! (`ldapsearch` / `ldapmodify` / `ldappasswd`).
//!
//! Accounts are disabled by setting the disable bit on the account-control
//! attribute rather than deleting anything, so the operation is reversible
//! and naturally idempotent.

use std::collections::HashMap;

use crate::config::DirectoryConfig;
use crate::error::{AcctlError, Result};
use crate::exec::{CmdOutput, CommandRunner, VendorCli};
use crate::types::SystemName;

use super::{AccountLookup, SystemAdapter};

/// Disable bit in the account-control attribute.
const UAC_DISABLED: u32 = 0x2;
/// Default for a normal enabled account.
const UAC_NORMAL: u32 = 0x200;

/// LDAP client exit code for invalid credentials.
const LDAP_EXIT_INVALID_CREDENTIALS: i32 = 49;
/// Exit code for "can't contact LDAP server".
const LDAP_EXIT_SERVER_DOWN: i32 = 255;

pub struct DirectoryAdapter<R: CommandRunner = VendorCli> {
    config: DirectoryConfig,
    bind_password: String,
    runner: R,
}

impl DirectoryAdapter {
    pub fn new(config: DirectoryConfig, bind_password: String) -> Self {
        Self {
            config,
            bind_password,
            runner: VendorCli,
        }
    }
}

impl<R: CommandRunner> DirectoryAdapter<R> {
    pub fn with_runner(config: DirectoryConfig, bind_password: String, runner: R) -> Self {
        Self {
            config,
            bind_password,
            runner,
        }
    }

    fn auth_args(&self) -> Vec<String> {
        vec![
            "-H".to_string(),
            self.config.uri.clone(),
            "-D".to_string(),
            self.config.bind_dn.clone(),
            "-w".to_string(),
            self.bind_password.clone(),
        ]
    }

    fn classify(&self, out: &CmdOutput, what: &str) -> AcctlError {
        if out.status == LDAP_EXIT_INVALID_CREDENTIALS {
            return AcctlError::auth("directory", out.stderr.trim().to_string());
        }
        if out.status == LDAP_EXIT_SERVER_DOWN
            || out.stderr.contains("Can't contact LDAP server")
            || out.stderr.contains("Timed out")
        {
            return AcctlError::transient("directory", out.stderr.trim().to_string());
        }
        if out.stderr.contains("No such object") {
            return AcctlError::not_found("directory", what.to_string());
        }
        AcctlError::CliFailed {
            command: "ldap".to_string(),
            detail: format!("exit {}: {}", out.status, out.stderr.trim()),
        }
    }

    /// Fetch one user entry as (dn, attributes). Missing entry is NotFound.
    fn fetch_user(&self, account_id: &str) -> Result<(String, HashMap<String, Vec<String>>)> {
        let filter = format!("(&(objectClass=user)(sAMAccountName={account_id}))");
        let mut args = vec!["-LLL".to_string()];
        args.extend(self.auth_args());
        args.extend([
            "-b".to_string(),
            self.config.base_dn.clone(),
            filter,
            "dn".to_string(),
            "userAccountControl".to_string(),
            "memberOf".to_string(),
        ]);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.runner.run("ldapsearch", &arg_refs, None)?;
        if !out.success() {
            return Err(self.classify(&out, account_id));
        }
        parse_ldif_entry(&out.stdout)
            .ok_or_else(|| AcctlError::not_found("directory", account_id.to_string()))
    }

    fn modify(&self, ldif: &str, what: &str) -> Result<()> {
        let mut args = self.auth_args();
        args.push("-x".to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.runner.run("ldapmodify", &arg_refs, Some(ldif))?;
        if !out.success() {
            return Err(self.classify(&out, what));
        }
        Ok(())
    }

    fn account_control(attrs: &HashMap<String, Vec<String>>) -> u32 {
        attrs
            .get("userAccountControl")
            .and_then(|v| v.first())
            .and_then(|s| s.parse().ok())
            .unwrap_or(UAC_NORMAL)
    }

    /// Group names (first RDN of each memberOf DN), keep-list filtered,
    /// deduplicated, sorted.
    fn group_memberships(&self, attrs: &HashMap<String, Vec<String>>) -> Vec<(String, String)> {
        let mut groups: Vec<(String, String)> = attrs
            .get("memberOf")
            .map(|dns| {
                dns.iter()
                    .filter_map(|dn| rdn_value(dn).map(|name| (name, dn.clone())))
                    .filter(|(name, _)| !self.config.keep_groups.contains(name))
                    .collect()
            })
            .unwrap_or_default();
        groups.sort();
        groups.dedup_by(|a, b| a.0 == b.0);
        groups
    }

    /// Create a new enabled account. Skips creation when the id already
    /// exists, so a rerun of a provisioning batch is safe.
    pub fn create_user(&self, new_user: &crate::provision::NewUser, password: &str) -> Result<bool> {
        if self.user_id_exists(&new_user.user_id)? {
            tracing::info!(user = %new_user.user_id, "directory account exists, skipping create");
            return Ok(false);
        }
        let dn = format!("cn={},{}", new_user.user_id, self.config.base_dn);
        let ldif = format!(
            "dn: {dn}\n\
             changetype: add\n\
             objectClass: user\n\
             sAMAccountName: {user}\n\
             givenName: {first}\n\
             sn: {last}\n\
             displayName: {first} {last}\n\
             employeeNumber: {emp}\n\
             uidNumber: {uid}\n\
             mail: {user}@{domain}\n\
             userAccountControl: {uac}\n",
            user = new_user.user_id,
            first = new_user.first_name,
            last = new_user.last_name,
            emp = new_user.employee_id,
            uid = new_user.uid_number,
            domain = new_user.mail_domain,
            uac = UAC_NORMAL,
        );
        self.modify(&ldif, &new_user.user_id)?;

        let mut args = self.auth_args();
        args.extend(["-s".to_string(), password.to_string(), dn]);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.runner.run("ldappasswd", &arg_refs, None)?;
        if !out.success() {
            return Err(self.classify(&out, &new_user.user_id));
        }
        Ok(true)
    }
}

impl<R: CommandRunner> SystemAdapter for DirectoryAdapter<R> {
    fn system(&self) -> SystemName {
        SystemName::Directory
    }

    fn deactivate(&self, account_id: &str) -> Result<String> {
        let (dn, attrs) = self.fetch_user(account_id)?;
        let uac = Self::account_control(&attrs);
        if uac & UAC_DISABLED != 0 {
            return Ok("already disabled".to_string());
        }
        let ldif = format!(
            "dn: {dn}\nchangetype: modify\nreplace: userAccountControl\nuserAccountControl: {}\n",
            uac | UAC_DISABLED
        );
        self.modify(&ldif, account_id)?;
        Ok("disabled".to_string())
    }

    fn remove_group_access(&self, account_id: &str) -> Result<Vec<String>> {
        let (dn, attrs) = self.fetch_user(account_id)?;
        let mut removed = Vec::new();
        for (name, group_dn) in self.group_memberships(&attrs) {
            let ldif =
                format!("dn: {group_dn}\nchangetype: modify\ndelete: member\nmember: {dn}\n");
            self.modify(&ldif, &name)?;
            tracing::debug!(user = account_id, group = %name, "removed directory group");
            removed.push(name);
        }
        Ok(removed)
    }

    fn verify_locked(&self, account_id: &str) -> Result<bool> {
        let (_, attrs) = self.fetch_user(account_id)?;
        Ok(Self::account_control(&attrs) & UAC_DISABLED != 0)
    }
}

impl<R: CommandRunner> AccountLookup for DirectoryAdapter<R> {
    fn system(&self) -> SystemName {
        SystemName::Directory
    }

    fn user_id_exists(&self, user_id: &str) -> Result<bool> {
        match self.fetch_user(user_id) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// LDIF parsing
// ---------------------------------------------------------------------------

/// Parse the first entry of LDIF output into (dn, attribute multimap).
/// Returns None when the output holds no entry.
fn parse_ldif_entry(ldif: &str) -> Option<(String, HashMap<String, Vec<String>>)> {
    let mut dn = None;
    let mut attrs: HashMap<String, Vec<String>> = HashMap::new();
    for line in ldif.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if dn.is_some() {
                break; // end of first entry
            }
            continue;
        }
        let Some((key, value)) = line.split_once(": ") else {
            continue;
        };
        if key == "dn" {
            dn = Some(value.to_string());
        } else {
            attrs.entry(key.to_string()).or_default().push(value.to_string());
        }
    }
    dn.map(|dn| (dn, attrs))
}

/// First RDN value of a DN: "CN=Staff,OU=Groups,DC=x" -> "Staff".
fn rdn_value(dn: &str) -> Option<String> {
    dn.split(',')
        .next()
        .and_then(|rdn| rdn.split_once('='))
        .map(|(_, v)| v.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
