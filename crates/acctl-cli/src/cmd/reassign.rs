use std::path::Path;
use std::time::Duration;

use acctl_core::adapter::TicketingClient;
use anyhow::Context;

use crate::output::print_json;
use crate::systems;

/// Bulk-replace the requestor on tickets, e.g. after the original requestor
/// leaves. Ticket ids come one per line; unknown tickets are reported and
/// skipped.
pub fn run(
    config_path: Option<&Path>,
    requestor_uid: &str,
    ids_path: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(ids_path)
        .with_context(|| format!("failed to read {}", ids_path.display()))?;
    let ids = parse_ids(&data)?;

    let config = systems::load_config(config_path)?;
    let ticketing = systems::ticketing(&config)?;
    let pause = Duration::from_secs(config.pause_seconds);

    let mut updated = Vec::new();
    let mut missing = Vec::new();
    for (i, ticket_id) in ids.iter().copied().enumerate() {
        match ticketing.reassign_requestor(ticket_id, requestor_uid) {
            Ok(()) => {
                tracing::info!(ticket = ticket_id, "requestor updated");
                updated.push(ticket_id);
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(ticket = ticket_id, "ticket not found, skipping");
                missing.push(ticket_id);
            }
            Err(e) => return Err(e.into()),
        }
        if i + 1 < ids.len() {
            std::thread::sleep(pause);
        }
    }

    if json {
        return print_json(&serde_json::json!({
            "requestor": requestor_uid,
            "updated": updated,
            "missing": missing,
        }));
    }
    println!(
        "updated {} ticket(s), {} not found",
        updated.len(),
        missing.len()
    );
    Ok(())
}

fn parse_ids(data: &str) -> anyhow::Result<Vec<u64>> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<u64>()
                .with_context(|| format!("bad ticket id '{line}'"))
        })
        .collect()
}
