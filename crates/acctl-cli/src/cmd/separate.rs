use std::path::Path;
use std::time::Duration;

use acctl_core::orchestrator::Orchestrator;
use acctl_core::report::RunReport;
use anyhow::bail;

use crate::output::{print_json, print_table};
use crate::systems;

pub fn run(
    config_path: Option<&Path>,
    ticket_id: Option<u64>,
    auto: bool,
    json: bool,
) -> anyhow::Result<()> {
    if ticket_id.is_none() && !auto {
        bail!("give a ticket id, or --auto to work the whole queue");
    }

    let config = systems::load_config(config_path)?;
    let ticketing = systems::ticketing(&config)?;
    let directory = systems::directory(&config)?;
    let workspace = systems::workspace(&config);
    let database = systems::database(&config)?;
    let erp = systems::erp(&config)?;

    let orchestrator = Orchestrator {
        directory: &directory,
        workspace: &workspace,
        database: &database,
        erp: &erp,
        ticketing: &ticketing,
    };

    if let Some(ticket_id) = ticket_id {
        let report = orchestrator.process_ticket(ticket_id)?;
        print_report(&report, json)?;
        if report.has_failures() {
            bail!("ticket {ticket_id} finished with failed steps");
        }
        return Ok(());
    }

    let pause = Duration::from_secs(config.pause_seconds);
    let outcomes = orchestrator.run_batch(pause)?;

    if json {
        #[derive(serde::Serialize)]
        struct BatchEntry<'a> {
            ticket_id: u64,
            report: Option<&'a RunReport>,
            error: Option<String>,
        }
        let entries: Vec<BatchEntry> = outcomes
            .iter()
            .map(|o| BatchEntry {
                ticket_id: o.ticket_id,
                report: o.result.as_ref().ok(),
                error: o.result.as_ref().err().map(|e| e.to_string()),
            })
            .collect();
        return print_json(&entries);
    }

    let rows: Vec<Vec<String>> = outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(report) => vec![
                o.ticket_id.to_string(),
                report.username.clone(),
                report.classification.to_string(),
                report.stage_reached.to_string(),
                if report.has_failures() {
                    "with failures".to_string()
                } else {
                    "clean".to_string()
                },
            ],
            Err(e) => vec![
                o.ticket_id.to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
                e.to_string(),
            ],
        })
        .collect();
    print_table(&["TICKET", "USER", "CLASS", "STAGE", "RESULT"], rows);
    Ok(())
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }
    println!(
        "ticket {} — {} ({}), reached {}",
        report.ticket_id, report.username, report.classification, report.stage_reached
    );
    let rows: Vec<Vec<String>> = report
        .steps
        .iter()
        .map(|s| {
            vec![
                s.system.to_string(),
                s.action.clone(),
                s.outcome.to_string(),
                s.message.clone(),
            ]
        })
        .collect();
    print_table(&["SYSTEM", "ACTION", "OUTCOME", "DETAIL"], rows);
    if let Some(status) = &report.erp_account_status {
        println!("\nERP account information:\n{status}");
    }
    Ok(())
}
