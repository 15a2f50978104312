//! ERP database adapter, driven through the vendor's `sqlplus` CLI.
//!
//! The ERP is the system of record for identity and employment, so this
//! adapter is strictly read-only: lookups, classification queries, and the
//! account-status check the pipeline uses for verification.

use crate::config::ErpCredentials;
use crate::error::{AcctlError, Result};
use crate::exec::{CmdOutput, CommandRunner, VendorCli};
use crate::types::SystemName;

use super::{AccountLookup, ErpClient};

pub struct ErpAdapter<R: CommandRunner = VendorCli> {
    credentials: ErpCredentials,
    runner: R,
}

impl ErpAdapter {
    pub fn new(credentials: ErpCredentials) -> Self {
        Self {
            credentials,
            runner: VendorCli,
        }
    }
}

impl<R: CommandRunner> ErpAdapter<R> {
    pub fn with_runner(credentials: ErpCredentials, runner: R) -> Self {
        Self {
            credentials,
            runner,
        }
    }

    fn classify(&self, out: &CmdOutput) -> AcctlError {
        let noise = format!("{}\n{}", out.stdout, out.stderr);
        if noise.contains("ORA-01017") {
            // invalid username/password
            return AcctlError::auth("erp", "invalid username/password");
        }
        if noise.contains("ORA-12170") || noise.contains("ORA-12541") || noise.contains("ORA-12154")
        {
            // connect timeout / no listener / cannot resolve
            return AcctlError::transient("erp", first_ora_line(&noise));
        }
        AcctlError::CliFailed {
            command: "sqlplus".to_string(),
            detail: first_ora_line(&noise),
        }
    }

    /// Run a query in silent mode and return the raw result rows.
    fn query(&self, sql: &str) -> Result<Vec<String>> {
        let connect = format!(
            "{}/{}@{}",
            self.credentials.username, self.credentials.password, self.credentials.connect_string
        );
        let script = format!(
            "SET PAGESIZE 0 FEEDBACK OFF HEADING OFF VERIFY OFF\n\
             WHENEVER SQLERROR EXIT FAILURE\n\
             {sql};\nEXIT;\n"
        );
        let out = self.runner.run("sqlplus", &["-S", "-L", &connect], Some(&script))?;
        if !out.success() || out.stdout.contains("ORA-") {
            return Err(self.classify(&out));
        }
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn query_one(&self, sql: &str, what: &str) -> Result<String> {
        self.query(sql)?
            .into_iter()
            .next()
            .ok_or_else(|| AcctlError::not_found("erp", what.to_string()))
    }

    fn query_count(&self, sql: &str) -> Result<u64> {
        let row = self.query_one(sql, "count query")?;
        row.parse().map_err(|_| {
            AcctlError::CliFailed {
                command: "sqlplus".to_string(),
                detail: format!("expected a count, got '{row}'"),
            }
        })
    }
}

impl<R: CommandRunner> ErpClient for ErpAdapter<R> {
    fn lookup_uid(&self, erp_id: &str) -> Result<String> {
        self.query_one(
            &format!(
                "SELECT uid FROM identity_map WHERE erp_id = '{}'",
                escape(erp_id)
            ),
            erp_id,
        )
    }

    fn lookup_username(&self, uid: &str) -> Result<String> {
        self.query_one(
            &format!(
                "SELECT username FROM identity_map WHERE uid = '{}'",
                escape(uid)
            ),
            uid,
        )
    }

    fn is_retiree(&self, erp_id: &str) -> Result<bool> {
        let count = self.query_count(&format!(
            "SELECT COUNT(*) FROM retiree_records WHERE erp_id = '{}'",
            escape(erp_id)
        ))?;
        Ok(count > 0)
    }

    fn has_active_employment(&self, erp_id: &str) -> Result<bool> {
        let count = self.query_count(&format!(
            "SELECT COUNT(*) FROM employment_records \
             WHERE erp_id = '{}' AND status = 'A'",
            escape(erp_id)
        ))?;
        Ok(count > 0)
    }

    fn is_recent_student(&self, uid: &str) -> Result<bool> {
        // Enrolled within the last two years, or admitted for a term up to
        // one year out.
        let count = self.query_count(&format!(
            "SELECT COUNT(*) FROM enrollment \
             WHERE uid = '{uid}' \
               AND term_date BETWEEN ADD_MONTHS(SYSDATE, -24) AND ADD_MONTHS(SYSDATE, 12)",
            uid = escape(uid)
        ))?;
        Ok(count > 0)
    }

    fn account_status(&self, erp_id: &str) -> Result<String> {
        let rows = self.query(&format!(
            "SELECT username || ' ' || account_status FROM erp_accounts WHERE erp_id = '{}'",
            escape(erp_id)
        ))?;
        if rows.is_empty() {
            return Err(AcctlError::not_found("erp", erp_id.to_string()));
        }
        Ok(rows.join("\n"))
    }

    fn verify_locked(&self, erp_id: &str) -> Result<bool> {
        Ok(!self.account_status(erp_id)?.contains("OPEN"))
    }

    fn licensed_meeting_users(&self) -> Result<Vec<String>> {
        self.query(
            "SELECT email FROM meeting_license_roster WHERE entitled = 'Y' ORDER BY email",
        )
    }
}

impl<R: CommandRunner> AccountLookup for ErpAdapter<R> {
    fn system(&self) -> SystemName {
        SystemName::Erp
    }

    /// Checks both the external-username table and the LMS roster, the two
    /// ERP-side places a login name can already be claimed.
    fn user_id_exists(&self, user_id: &str) -> Result<bool> {
        let count = self.query_count(&format!(
            "SELECT (SELECT COUNT(*) FROM external_users WHERE username = '{u}') + \
                    (SELECT COUNT(*) FROM lms_users WHERE username = '{u}') FROM dual",
            u = escape(user_id)
        ))?;
        Ok(count > 0)
    }
}

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

fn first_ora_line(noise: &str) -> String {
    noise
        .lines()
        .find(|l| l.contains("ORA-"))
        .unwrap_or("unknown sqlplus failure")
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
