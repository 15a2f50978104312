use crate::types::Classification;
use serde::{Deserialize, Serialize};

/// A person's account identifier in one external system. Most systems key on
/// the username; the ERP and ticketing systems use their own ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemAccount {
    pub system: crate::types::SystemName,
    pub account_id: String,
}

/// Everything the orchestrator needs to know about one person, resolved once
/// at the start of a run and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Login name, shared by the directory, workspace, and database systems.
    pub username: String,
    /// ERP person id (the ticketing system's custom attribute).
    pub erp_id: String,
    /// Internal numeric uid from the ERP identity tables.
    pub uid: String,
    pub classification: Classification,
    pub accounts: Vec<SystemAccount>,
}

impl PersonRecord {
    pub fn new(
        username: impl Into<String>,
        erp_id: impl Into<String>,
        uid: impl Into<String>,
        classification: Classification,
    ) -> Self {
        let username = username.into();
        let erp_id = erp_id.into();
        let uid = uid.into();
        let accounts = vec![
            SystemAccount {
                system: crate::types::SystemName::Directory,
                account_id: username.clone(),
            },
            SystemAccount {
                system: crate::types::SystemName::Workspace,
                account_id: username.clone(),
            },
            SystemAccount {
                system: crate::types::SystemName::Database,
                account_id: username.clone(),
            },
            SystemAccount {
                system: crate::types::SystemName::Erp,
                account_id: erp_id.clone(),
            },
        ];
        Self {
            username,
            erp_id,
            uid,
            classification,
            accounts,
        }
    }

    pub fn account_for(&self, system: crate::types::SystemName) -> Option<&str> {
        self.accounts
            .iter()
            .find(|a| a.system == system)
            .map(|a| a.account_id.as_str())
    }
}
