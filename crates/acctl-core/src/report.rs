use crate::types::{Classification, StepOutcome, SystemName, WorkflowStage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Outcome of one attempted (or skipped) action against one system.
/// Appended exactly once per action; the final ticket comment is rendered
/// from the full list so nothing is silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub system: SystemName,
    pub action: String,
    pub outcome: StepOutcome,
    pub message: String,
    /// How many retries the action needed (0 or 1 under the single-retry
    /// policy).
    #[serde(default)]
    pub retries: u32,
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub ticket_id: u64,
    pub username: String,
    pub classification: Classification,
    pub stage_reached: WorkflowStage,
    pub steps: Vec<StepResult>,
    /// Raw ERP account-status text, appended verbatim to the ticket comment
    /// so the help desk can see the final lock state.
    pub erp_account_status: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl RunReport {
    pub fn new(ticket_id: u64, username: impl Into<String>, classification: Classification) -> Self {
        Self {
            ticket_id,
            username: username.into(),
            classification,
            stage_reached: WorkflowStage::Resolved,
            steps: Vec::new(),
            erp_account_status: None,
            started_at: Utc::now(),
        }
    }

    pub fn record(
        &mut self,
        system: SystemName,
        action: impl Into<String>,
        outcome: StepOutcome,
        message: impl Into<String>,
        retries: u32,
    ) {
        self.steps.push(StepResult {
            system,
            action: action.into(),
            outcome,
            message: message.into(),
            retries,
        });
    }

    pub fn advance(&mut self, stage: WorkflowStage) {
        if stage > self.stage_reached {
            self.stage_reached = stage;
        }
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.outcome == StepOutcome::Failed)
    }

    /// Render the report as the plain-text ticket comment. One line per
    /// step, failures called out for human follow-up, the ERP status block
    /// last.
    pub fn render_comment(&self) -> String {
        let mut out = match self.classification {
            Classification::Employee => format!(
                "Automatically deactivating terminated user account: {}",
                self.username
            ),
            Classification::Student => format!(
                "Leaving current/recent student account active: {}",
                self.username
            ),
            Classification::Retiree => {
                format!("Leaving retiree account active: {}", self.username)
            }
        };

        for step in &self.steps {
            out.push_str("\n\n");
            match step.outcome {
                StepOutcome::Success => {
                    out.push_str(&format!("[{}] {}: {}", step.system, step.action, step.message));
                    if step.retries > 0 {
                        out.push_str(&format!(" (after {} retry)", step.retries));
                    }
                }
                StepOutcome::Skipped => {
                    out.push_str(&format!(
                        "[{}] {}: skipped ({})",
                        step.system, step.action, step.message
                    ));
                }
                StepOutcome::Failed => {
                    out.push_str(&format!(
                        "[{}] {}: FAILED - {} - manual follow-up required",
                        step.system, step.action, step.message
                    ));
                }
            }
        }

        if let Some(status) = &self.erp_account_status {
            out.push_str("\n\nERP account information:\n");
            out.push_str(status);
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
