//! The separation pipeline.
//!
//! One ticket at a time, each person walks the stages
//! Resolved → DirectoryHandled → WorkspaceHandled → DatabaseHandled →
//! ErpVerified → TicketAnnotated → Done.
//!
//! Failure semantics: a failed step is recorded and the remaining
//! independent steps still run, so one flaky system doesn't leave the rest
//! of the person's accounts untouched. Only fatal errors (credential
//! failures, missing admin tools) abort, since nothing after them could
//! succeed either.

use std::time::Duration;

use crate::adapter::{ErpClient, SystemAdapter, TicketingClient};
use crate::error::Result;
use crate::person::PersonRecord;
use crate::report::RunReport;
use crate::resolver;
use crate::retry::with_retry;
use crate::types::{StepOutcome, WorkflowStage};

pub struct Orchestrator<'a> {
    pub directory: &'a dyn SystemAdapter,
    pub workspace: &'a dyn SystemAdapter,
    pub database: &'a dyn SystemAdapter,
    pub erp: &'a dyn ErpClient,
    pub ticketing: &'a dyn TicketingClient,
}

/// Result of one ticket within a batch. Per-record errors (validation,
/// unmatched identifiers) are kept so the batch summary can show them.
pub struct TicketOutcome {
    pub ticket_id: u64,
    pub result: Result<RunReport>,
}

impl Orchestrator<'_> {
    /// Process every unprocessed separation ticket, pausing between tickets
    /// to stay under API rate limits. Fatal errors abort the batch; per
    /// -record errors are captured and the batch continues.
    pub fn run_batch(&self, pause: Duration) -> Result<Vec<TicketOutcome>> {
        let tickets = self.ticketing.search_new_separations()?;
        tracing::info!(count = tickets.len(), "found new separation tickets");

        let mut outcomes = Vec::with_capacity(tickets.len());
        for (i, ticket_id) in tickets.iter().copied().enumerate() {
            let result = match self.process_ticket(ticket_id) {
                Err(e) if e.is_fatal() => return Err(e),
                other => other,
            };
            if let Err(e) = &result {
                tracing::warn!(ticket = ticket_id, "skipping ticket: {e}");
            }
            outcomes.push(TicketOutcome { ticket_id, result });
            if i + 1 < tickets.len() {
                std::thread::sleep(pause);
            }
        }
        Ok(outcomes)
    }

    /// Run the full pipeline for one ticket and return the aggregated
    /// report. The report has already been posted back to the ticket unless
    /// the ticketing system itself failed (in which case the failure is in
    /// the report for the caller to print).
    pub fn process_ticket(&self, ticket_id: u64) -> Result<RunReport> {
        let person = resolver::resolve(self.ticketing, self.erp, ticket_id)?;
        let mut report = RunReport::new(ticket_id, &person.username, person.classification);

        // Pick the classification branch on the ticket workflow and mark
        // the ticket In Process before touching any account.
        self.run_ticketing_step(&mut report, "advance_workflow", || {
            self.ticketing
                .advance_workflow(ticket_id, person.classification)
        })?;

        self.handle_system(self.directory, &person, &mut report, WorkflowStage::DirectoryHandled)?;
        self.handle_system(self.workspace, &person, &mut report, WorkflowStage::WorkspaceHandled)?;
        self.handle_system(self.database, &person, &mut report, WorkflowStage::DatabaseHandled)?;

        self.verify_erp(&person, &mut report)?;
        self.annotate_ticket(ticket_id, &person, &mut report)?;

        report.advance(WorkflowStage::Done);
        Ok(report)
    }

    /// Run one deactivation-capable system. Exempt classifications skip the
    /// system wholesale; otherwise deactivate, strip groups, and verify,
    /// recording each action once.
    fn handle_system(
        &self,
        adapter: &dyn SystemAdapter,
        person: &PersonRecord,
        report: &mut RunReport,
        stage: WorkflowStage,
    ) -> Result<()> {
        let system = adapter.system();
        let account = person.account_for(system).unwrap_or(&person.username);

        if person.classification.exempt_from_deactivation() {
            report.record(
                system,
                "deactivate",
                StepOutcome::Skipped,
                format!("{} accounts stay active", person.classification),
                0,
            );
            report.advance(stage);
            return Ok(());
        }

        match with_retry(|| adapter.deactivate(account)) {
            Ok(r) => report.record(system, "deactivate", StepOutcome::Success, r.value, r.retries),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) if e.is_not_found() => report.record(
                system,
                "deactivate",
                StepOutcome::Success,
                "account absent, nothing to deactivate",
                0,
            ),
            Err(e) => report.record(
                system,
                "deactivate",
                StepOutcome::Failed,
                e.to_string(),
                u32::from(e.is_transient()),
            ),
        }

        match with_retry(|| adapter.remove_group_access(account)) {
            Ok(r) => {
                let message = if r.value.is_empty() {
                    "no removable groups".to_string()
                } else {
                    format!("removed groups: {}", r.value.join(", "))
                };
                report.record(system, "remove_group_access", StepOutcome::Success, message, r.retries);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) if e.is_not_found() => report.record(
                system,
                "remove_group_access",
                StepOutcome::Success,
                "account absent, no groups to remove",
                0,
            ),
            Err(e) => report.record(
                system,
                "remove_group_access",
                StepOutcome::Failed,
                e.to_string(),
                u32::from(e.is_transient()),
            ),
        }

        match adapter.verify_locked(account) {
            Ok(true) => {
                report.record(system, "verify_locked", StepOutcome::Success, "account locked", 0)
            }
            Ok(false) => report.record(
                system,
                "verify_locked",
                StepOutcome::Failed,
                "account still active after deactivation",
                0,
            ),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) if e.is_not_found() => report.record(
                system,
                "verify_locked",
                StepOutcome::Success,
                "account absent",
                0,
            ),
            Err(e) => {
                report.record(system, "verify_locked", StepOutcome::Failed, e.to_string(), 0)
            }
        }

        report.advance(stage);
        Ok(())
    }

    /// Check the ERP lock status. Read-only: the ERP is handled by its own
    /// offboarding process, this pipeline only confirms the result and
    /// captures the status text for the ticket.
    fn verify_erp(&self, person: &PersonRecord, report: &mut RunReport) -> Result<()> {
        match self.erp.verify_locked(&person.erp_id) {
            Ok(true) => report.record(
                crate::types::SystemName::Erp,
                "verify_locked",
                StepOutcome::Success,
                "ERP account locked",
                0,
            ),
            Ok(false) => report.record(
                crate::types::SystemName::Erp,
                "verify_locked",
                StepOutcome::Failed,
                "ERP account still OPEN",
                0,
            ),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) if e.is_not_found() => report.record(
                crate::types::SystemName::Erp,
                "verify_locked",
                StepOutcome::Success,
                "no ERP account",
                0,
            ),
            Err(e) => report.record(
                crate::types::SystemName::Erp,
                "verify_locked",
                StepOutcome::Failed,
                e.to_string(),
                0,
            ),
        }

        if let Ok(status) = self.erp.account_status(&person.erp_id) {
            report.erp_account_status = Some(status);
        }

        report.advance(WorkflowStage::ErpVerified);
        Ok(())
    }

    /// Final bookkeeping on the ticket: drop the Employees group and post
    /// the aggregated report as the task comment.
    fn annotate_ticket(
        &self,
        ticket_id: u64,
        person: &PersonRecord,
        report: &mut RunReport,
    ) -> Result<()> {
        self.run_ticketing_step(report, "remove_employee_group", || {
            self.ticketing
                .remove_employee_group(&person.username)
                .map(|()| "Employees group removed (if present)".to_string())
        })?;

        let comment = report.render_comment();
        self.run_ticketing_step(report, "complete_with_comment", || {
            self.ticketing
                .complete_with_comment(ticket_id, &comment)
                .map(|()| "report posted, ticket set Open".to_string())
        })?;

        report.advance(WorkflowStage::TicketAnnotated);
        Ok(())
    }

    fn run_ticketing_step(
        &self,
        report: &mut RunReport,
        action: &str,
        op: impl FnMut() -> Result<String>,
    ) -> Result<()> {
        match with_retry(op) {
            Ok(r) => report.record(
                crate::types::SystemName::Ticketing,
                action,
                StepOutcome::Success,
                r.value,
                r.retries,
            ),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) if e.is_not_found() => report.record(
                crate::types::SystemName::Ticketing,
                action,
                StepOutcome::Success,
                "not present in ticketing system",
                0,
            ),
            Err(e) => report.record(
                crate::types::SystemName::Ticketing,
                action,
                StepOutcome::Failed,
                e.to_string(),
                u32::from(e.is_transient()),
            ),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::{Behavior, MockErp, MockSystem, MockTicketing};
    use crate::error::AcctlError;
    use crate::types::{StepOutcome, SystemName};

    struct Fixture {
        directory: MockSystem,
        workspace: MockSystem,
        database: MockSystem,
        erp: MockErp,
        ticketing: MockTicketing,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                directory: MockSystem::new(SystemName::Directory, Behavior::Ok),
                workspace: MockSystem::new(SystemName::Workspace, Behavior::Ok),
                database: MockSystem::new(SystemName::Database, Behavior::Ok),
                erp: MockErp::default(),
                ticketing: MockTicketing::for_person("E100200"),
            }
        }

        fn orchestrator(&self) -> Orchestrator<'_> {
            Orchestrator {
                directory: &self.directory,
                workspace: &self.workspace,
                database: &self.database,
                erp: &self.erp,
                ticketing: &self.ticketing,
            }
        }
    }

    fn outcome_of(report: &RunReport, system: SystemName, action: &str) -> StepOutcome {
        report
            .steps
            .iter()
            .find(|s| s.system == system && s.action == action)
            .unwrap_or_else(|| panic!("no step {system}/{action}"))
            .outcome
    }

    #[test]
    fn employee_runs_all_systems_and_reaches_done() {
        let fx = Fixture::new();
        let report = fx.orchestrator().process_ticket(1234).unwrap();

        assert_eq!(report.stage_reached, WorkflowStage::Done);
        for system in [SystemName::Directory, SystemName::Workspace, SystemName::Database] {
            assert_eq!(outcome_of(&report, system, "deactivate"), StepOutcome::Success);
        }
        assert_eq!(fx.directory.deactivate_calls.get(), 1);
        assert_eq!(fx.workspace.deactivate_calls.get(), 1);
        assert_eq!(fx.database.deactivate_calls.get(), 1);
        // ERP step verified without any mutation, and the ticket got the
        // final comment.
        assert_eq!(
            outcome_of(&report, SystemName::Erp, "verify_locked"),
            StepOutcome::Success
        );
        let actions = fx.ticketing.actions.borrow();
        assert_eq!(
            *actions,
            vec![
                "advance:1234:employee",
                "remove_group:jdoe",
                "complete:1234"
            ]
        );
    }

    #[test]
    fn student_skips_deactivation_systems_entirely() {
        let mut fx = Fixture::new();
        fx.erp.recent_student = true;
        let report = fx.orchestrator().process_ticket(1234).unwrap();

        for system in [SystemName::Directory, SystemName::Workspace, SystemName::Database] {
            assert_eq!(outcome_of(&report, system, "deactivate"), StepOutcome::Skipped);
        }
        // Never attempted, not merely recorded as skipped.
        assert_eq!(fx.directory.deactivate_calls.get(), 0);
        assert_eq!(fx.workspace.deactivate_calls.get(), 0);
        assert_eq!(fx.database.deactivate_calls.get(), 0);
        assert_eq!(fx.directory.group_calls.get(), 0);
        // ERP verification and ticket annotation still ran.
        assert_eq!(
            outcome_of(&report, SystemName::Erp, "verify_locked"),
            StepOutcome::Success
        );
        assert!(fx
            .ticketing
            .actions
            .borrow()
            .iter()
            .any(|a| a == "complete:1234"));
        assert_eq!(report.stage_reached, WorkflowStage::Done);
    }

    #[test]
    fn retiree_skips_like_student() {
        let mut fx = Fixture::new();
        fx.erp.retiree = true;
        let report = fx.orchestrator().process_ticket(1234).unwrap();
        assert_eq!(
            outcome_of(&report, SystemName::Directory, "deactivate"),
            StepOutcome::Skipped
        );
        assert_eq!(fx.directory.deactivate_calls.get(), 0);
        assert!(report.render_comment().contains("Leaving retiree account active"));
    }

    #[test]
    fn not_found_never_aborts_remaining_steps() {
        let mut fx = Fixture::new();
        fx.workspace = MockSystem::new(SystemName::Workspace, Behavior::NotFound);
        let report = fx.orchestrator().process_ticket(1234).unwrap();

        // NotFound maps to already-satisfied, and the database step still ran.
        assert_eq!(
            outcome_of(&report, SystemName::Workspace, "deactivate"),
            StepOutcome::Success
        );
        assert_eq!(fx.database.deactivate_calls.get(), 1);
        assert!(!report.has_failures());
        assert_eq!(report.stage_reached, WorkflowStage::Done);
    }

    #[test]
    fn transient_retries_once_then_succeeds() {
        let mut fx = Fixture::new();
        fx.workspace = MockSystem::new(SystemName::Workspace, Behavior::TransientOnce);
        let report = fx.orchestrator().process_ticket(1234).unwrap();

        let step = report
            .steps
            .iter()
            .find(|s| s.system == SystemName::Workspace && s.action == "deactivate")
            .unwrap();
        assert_eq!(step.outcome, StepOutcome::Success);
        assert_eq!(step.retries, 1);
        // Original attempt plus one retry.
        assert_eq!(fx.workspace.deactivate_calls.get(), 2);
    }

    #[test]
    fn persistent_transient_is_recorded_and_pipeline_continues() {
        let mut fx = Fixture::new();
        fx.directory = MockSystem::new(SystemName::Directory, Behavior::TransientAlways);
        let report = fx.orchestrator().process_ticket(1234).unwrap();

        assert_eq!(
            outcome_of(&report, SystemName::Directory, "deactivate"),
            StepOutcome::Failed
        );
        // Later systems were still handled.
        assert_eq!(fx.workspace.deactivate_calls.get(), 1);
        assert_eq!(fx.database.deactivate_calls.get(), 1);
        assert!(report.has_failures());
        // The failure made it into the posted comment.
        assert!(fx
            .ticketing
            .last_comment
            .borrow()
            .as_deref()
            .unwrap()
            .contains("manual follow-up required"));
    }

    #[test]
    fn auth_failure_aborts_the_run() {
        let mut fx = Fixture::new();
        fx.workspace = MockSystem::new(SystemName::Workspace, Behavior::AuthFail);
        let err = fx.orchestrator().process_ticket(1234).unwrap_err();
        assert!(matches!(err, AcctlError::Auth { .. }));
        // Nothing after the aborting step ran.
        assert_eq!(fx.database.deactivate_calls.get(), 0);
    }

    #[test]
    fn open_erp_account_is_a_recorded_failure() {
        let mut fx = Fixture::new();
        fx.erp.locked = false;
        let report = fx.orchestrator().process_ticket(1234).unwrap();
        assert_eq!(
            outcome_of(&report, SystemName::Erp, "verify_locked"),
            StepOutcome::Failed
        );
        // Annotation still happened so a human sees the problem.
        assert!(fx
            .ticketing
            .actions
            .borrow()
            .iter()
            .any(|a| a == "complete:1234"));
    }

    #[test]
    fn batch_continues_past_validation_errors() {
        let mut fx = Fixture::new();
        fx.erp.active_employment = true;
        fx.ticketing.new_tickets = vec![1, 2];
        let outcomes = fx
            .orchestrator()
            .run_batch(Duration::from_millis(0))
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(&o.result, Err(AcctlError::Validation(_)))));
    }
}
