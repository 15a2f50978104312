use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Separation category for a person. Drives which deactivation steps apply:
/// students and retirees keep their accounts, only a terminated employee is
/// deactivated everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Employee,
    Student,
    Retiree,
}

impl Classification {
    pub fn all() -> &'static [Classification] {
        &[
            Classification::Employee,
            Classification::Student,
            Classification::Retiree,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Employee => "employee",
            Classification::Student => "student",
            Classification::Retiree => "retiree",
        }
    }

    /// True when this classification exempts a person from the deactivation
    /// steps (directory, workspace, database). The account stays active.
    pub fn exempt_from_deactivation(self) -> bool {
        match self {
            Classification::Employee => false,
            Classification::Student | Classification::Retiree => true,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Classification {
    type Err = crate::error::AcctlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(Classification::Employee),
            "student" => Ok(Classification::Student),
            "retiree" => Ok(Classification::Retiree),
            _ => Err(crate::error::AcctlError::Validation(format!(
                "unknown classification '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// SystemName
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemName {
    Directory,
    Workspace,
    Database,
    Erp,
    Ticketing,
}

impl SystemName {
    pub fn as_str(self) -> &'static str {
        match self {
            SystemName::Directory => "directory",
            SystemName::Workspace => "workspace",
            SystemName::Database => "database",
            SystemName::Erp => "erp",
            SystemName::Ticketing => "ticketing",
        }
    }
}

impl fmt::Display for SystemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorkflowStage
// ---------------------------------------------------------------------------

/// Progression of one person through the separation pipeline. Stages are
/// strictly ordered; a run walks them front to back and never revisits one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Resolved,
    DirectoryHandled,
    WorkspaceHandled,
    DatabaseHandled,
    ErpVerified,
    TicketAnnotated,
    Done,
}

impl WorkflowStage {
    pub fn all() -> &'static [WorkflowStage] {
        &[
            WorkflowStage::Resolved,
            WorkflowStage::DirectoryHandled,
            WorkflowStage::WorkspaceHandled,
            WorkflowStage::DatabaseHandled,
            WorkflowStage::ErpVerified,
            WorkflowStage::TicketAnnotated,
            WorkflowStage::Done,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<WorkflowStage> {
        WorkflowStage::all().get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStage::Resolved => "resolved",
            WorkflowStage::DirectoryHandled => "directory_handled",
            WorkflowStage::WorkspaceHandled => "workspace_handled",
            WorkflowStage::DatabaseHandled => "database_handled",
            WorkflowStage::ErpVerified => "erp_verified",
            WorkflowStage::TicketAnnotated => "ticket_annotated",
            WorkflowStage::Done => "done",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepOutcome::Success => "success",
            StepOutcome::Skipped => "skipped",
            StepOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
