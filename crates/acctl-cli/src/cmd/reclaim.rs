use std::path::Path;

use acctl_core::license;

use crate::output::print_json;
use crate::systems;

pub fn run(config_path: Option<&Path>, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let config = systems::load_config(config_path)?;
    let meetings = systems::meetings(&config)?;
    let erp = systems::erp(&config)?;

    let summary = license::reclaim(&meetings, &erp, dry_run)?;

    if json {
        #[derive(serde::Serialize)]
        struct Summary<'a> {
            licensed: usize,
            entitled: usize,
            grouped: usize,
            dry_run: bool,
            downgraded: &'a [String],
            failed: &'a [String],
        }
        return print_json(&Summary {
            licensed: summary.licensed,
            entitled: summary.entitled,
            grouped: summary.grouped,
            dry_run: summary.dry_run,
            downgraded: &summary.downgraded,
            failed: &summary.failed,
        });
    }

    let verb = if summary.dry_run {
        "would downgrade"
    } else {
        "downgraded"
    };
    println!(
        "{} licensed, {} entitled, {} in exception groups",
        summary.licensed, summary.entitled, summary.grouped
    );
    println!("{verb} {} seat(s)", summary.downgraded.len());
    for email in &summary.downgraded {
        println!("  {email}");
    }
    if !summary.failed.is_empty() {
        println!("{} downgrade(s) failed, retry on the next run:", summary.failed.len());
        for line in &summary.failed {
            println!("  {line}");
        }
        anyhow::bail!("{} seat(s) could not be downgraded", summary.failed.len());
    }
    Ok(())
}
