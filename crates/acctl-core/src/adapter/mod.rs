//! Per-system adapters.
//!
//! Each adapter owns its session or credential handle for the lifetime of a
//! run (acquired at construction, dropped at process exit) and translates
//! one external system's API/CLI into the shared action vocabulary. Errors
//! are mapped into the `AcctlError` taxonomy so the orchestrator can treat
//! all systems uniformly.

pub mod database;
pub mod directory;
pub mod erp;
pub mod ticketing;
pub mod workspace;

#[cfg(test)]
pub mod mock;

use crate::error::Result;
use crate::types::{Classification, SystemName};

/// The common seam the orchestrator drives for the deactivation-capable
/// systems (directory, workspace, database).
///
/// All operations are idempotent against remote state: deactivating an
/// already-deactivated account reports success, and a missing account is
/// surfaced as `AcctlError::NotFound` for the caller to treat as
/// already-satisfied.
pub trait SystemAdapter {
    fn system(&self) -> SystemName;

    /// Disable the account. Returns a human-readable message for the report.
    fn deactivate(&self, account_id: &str) -> Result<String>;

    /// Remove group memberships, honoring the configured keep-list.
    /// Returns the names of the groups actually removed.
    fn remove_group_access(&self, account_id: &str) -> Result<Vec<String>>;

    /// Check, without mutating, whether the account is disabled/suspended.
    fn verify_locked(&self, account_id: &str) -> Result<bool>;
}

/// Lookup seam used by username generation: "is this id already taken in
/// your system?" Implemented by the directory, workspace, database, and ERP
/// adapters.
pub trait AccountLookup {
    fn system(&self) -> SystemName;
    fn user_id_exists(&self, user_id: &str) -> Result<bool>;
}

/// ERP database operations. Strictly read-only: the ERP is the system of
/// record and this tool never mutates it.
pub trait ErpClient {
    /// Internal uid for an ERP person id.
    fn lookup_uid(&self, erp_id: &str) -> Result<String>;

    /// Login name for an internal uid.
    fn lookup_username(&self, uid: &str) -> Result<String>;

    fn is_retiree(&self, erp_id: &str) -> Result<bool>;

    /// True when an employment record is still active. Processing a
    /// separation for such a person is refused.
    fn has_active_employment(&self, erp_id: &str) -> Result<bool>;

    /// Enrolled or admitted within the recent-student window.
    fn is_recent_student(&self, uid: &str) -> Result<bool>;

    /// Raw account-status text for the final ticket comment.
    fn account_status(&self, erp_id: &str) -> Result<String>;

    /// True when the ERP account is locked (not OPEN).
    fn verify_locked(&self, erp_id: &str) -> Result<bool>;

    /// Email addresses entitled to a meeting-service license.
    fn licensed_meeting_users(&self) -> Result<Vec<String>>;
}

/// Ticketing system operations used by the separation pipeline and the
/// reassignment workflow.
pub trait TicketingClient {
    /// Ids of unprocessed ("New") separation tickets.
    fn search_new_separations(&self) -> Result<Vec<u64>>;

    /// The ERP person id stored as a custom attribute on the ticket.
    fn ticket_erp_id(&self, ticket_id: u64) -> Result<String>;

    /// Approve the classification branch on the ticket workflow and mark
    /// the ticket In Process. Returns the workflow engine's message.
    fn advance_workflow(&self, ticket_id: u64, classification: Classification) -> Result<String>;

    /// Complete the ticket task with the final report comment and mark the
    /// ticket Open for human review.
    fn complete_with_comment(&self, ticket_id: u64, comment: &str) -> Result<()>;

    /// Drop the person from the Employees group in the ticketing system.
    fn remove_employee_group(&self, username: &str) -> Result<()>;

    /// Replace the requestor on a ticket.
    fn reassign_requestor(&self, ticket_id: u64, requestor_uid: &str) -> Result<()>;
}
