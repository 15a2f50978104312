//! Scripted adapter implementations for orchestrator and resolver tests.

use std::cell::{Cell, RefCell};

use crate::error::{AcctlError, Result};
use crate::types::{Classification, SystemName};

use super::{ErpClient, SystemAdapter, TicketingClient};

/// How a mock system responds to mutating calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Ok,
    NotFound,
    /// First call fails transiently, the retry succeeds.
    TransientOnce,
    TransientAlways,
    AuthFail,
}

pub struct MockSystem {
    system: SystemName,
    behavior: Behavior,
    attempts: Cell<u32>,
    pub deactivate_calls: Cell<u32>,
    pub group_calls: Cell<u32>,
    pub verify_calls: Cell<u32>,
}

impl MockSystem {
    pub fn new(system: SystemName, behavior: Behavior) -> Self {
        Self {
            system,
            behavior,
            attempts: Cell::new(0),
            deactivate_calls: Cell::new(0),
            group_calls: Cell::new(0),
            verify_calls: Cell::new(0),
        }
    }

    fn respond(&self, ok: String) -> Result<String> {
        match self.behavior {
            Behavior::Ok => Ok(ok),
            Behavior::NotFound => Err(AcctlError::not_found(self.system.as_str(), "account")),
            Behavior::TransientOnce => {
                self.attempts.set(self.attempts.get() + 1);
                if self.attempts.get() == 1 {
                    Err(AcctlError::transient(self.system.as_str(), "timeout"))
                } else {
                    Ok(ok)
                }
            }
            Behavior::TransientAlways => {
                Err(AcctlError::transient(self.system.as_str(), "timeout"))
            }
            Behavior::AuthFail => Err(AcctlError::auth(self.system.as_str(), "session expired")),
        }
    }
}

impl SystemAdapter for MockSystem {
    fn system(&self) -> SystemName {
        self.system
    }

    fn deactivate(&self, _account_id: &str) -> Result<String> {
        self.deactivate_calls.set(self.deactivate_calls.get() + 1);
        self.respond("disabled".to_string())
    }

    fn remove_group_access(&self, _account_id: &str) -> Result<Vec<String>> {
        self.group_calls.set(self.group_calls.get() + 1);
        self.respond(String::new())
            .map(|_| vec!["staff".to_string()])
    }

    fn verify_locked(&self, _account_id: &str) -> Result<bool> {
        self.verify_calls.set(self.verify_calls.get() + 1);
        self.respond(String::new()).map(|_| true)
    }
}

#[derive(Clone)]
pub struct MockErp {
    pub uid: String,
    pub username: String,
    pub retiree: bool,
    pub active_employment: bool,
    pub recent_student: bool,
    pub locked: bool,
}

impl Default for MockErp {
    fn default() -> Self {
        Self {
            uid: "4242".to_string(),
            username: "jdoe".to_string(),
            retiree: false,
            active_employment: false,
            recent_student: false,
            locked: true,
        }
    }
}

impl ErpClient for MockErp {
    fn lookup_uid(&self, _erp_id: &str) -> Result<String> {
        Ok(self.uid.clone())
    }

    fn lookup_username(&self, _uid: &str) -> Result<String> {
        Ok(self.username.clone())
    }

    fn is_retiree(&self, _erp_id: &str) -> Result<bool> {
        Ok(self.retiree)
    }

    fn has_active_employment(&self, _erp_id: &str) -> Result<bool> {
        Ok(self.active_employment)
    }

    fn is_recent_student(&self, _uid: &str) -> Result<bool> {
        Ok(self.recent_student)
    }

    fn account_status(&self, _erp_id: &str) -> Result<String> {
        Ok(format!(
            "{} {}",
            self.username,
            if self.locked { "LOCKED" } else { "OPEN" }
        ))
    }

    fn verify_locked(&self, _erp_id: &str) -> Result<bool> {
        Ok(self.locked)
    }

    fn licensed_meeting_users(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct MockTicketing {
    pub erp_id: String,
    pub new_tickets: Vec<u64>,
    pub actions: RefCell<Vec<String>>,
    pub last_comment: RefCell<Option<String>>,
}

impl MockTicketing {
    pub fn for_person(erp_id: &str) -> Self {
        Self {
            erp_id: erp_id.to_string(),
            ..Self::default()
        }
    }
}

impl TicketingClient for MockTicketing {
    fn search_new_separations(&self) -> Result<Vec<u64>> {
        Ok(self.new_tickets.clone())
    }

    fn ticket_erp_id(&self, _ticket_id: u64) -> Result<String> {
        if self.erp_id.is_empty() {
            return Err(AcctlError::not_found("ticketing", "ERP id attribute"));
        }
        Ok(self.erp_id.clone())
    }

    fn advance_workflow(&self, ticket_id: u64, classification: Classification) -> Result<String> {
        self.actions
            .borrow_mut()
            .push(format!("advance:{ticket_id}:{classification}"));
        Ok("workflow advanced".to_string())
    }

    fn complete_with_comment(&self, ticket_id: u64, comment: &str) -> Result<()> {
        self.actions.borrow_mut().push(format!("complete:{ticket_id}"));
        *self.last_comment.borrow_mut() = Some(comment.to_string());
        Ok(())
    }

    fn remove_employee_group(&self, username: &str) -> Result<()> {
        self.actions
            .borrow_mut()
            .push(format!("remove_group:{username}"));
        Ok(())
    }

    fn reassign_requestor(&self, ticket_id: u64, requestor_uid: &str) -> Result<()> {
        self.actions
            .borrow_mut()
            .push(format!("reassign:{ticket_id}:{requestor_uid}"));
        Ok(())
    }
}
