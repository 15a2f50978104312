use std::collections::HashSet;
use std::path::{Path, PathBuf};

use acctl_core::adapter::AccountLookup;
use acctl_core::config::Config;
use acctl_core::provision::{
    generate_password, generate_user_id, parse_hire_roster, write_roster, HireRecord, NewUser,
    RosterEntry,
};
use anyhow::Context;
use clap::Subcommand;

use crate::output::{print_json, print_table};
use crate::systems;

const PASSWORD_LEN: usize = 14;

#[derive(Subcommand)]
pub enum ProvisionSubcommand {
    /// Provision a single hire
    One {
        #[arg(long)]
        employee_id: String,
        #[arg(long)]
        first: String,
        #[arg(long)]
        last: String,
        /// ERP internal uid number
        #[arg(long)]
        uid: String,
    },

    /// Provision every row of a hire roster (employee_id,first,last,uid)
    Batch {
        roster: PathBuf,

        /// Output roster with the generated user ids and passwords
        #[arg(long, default_value = "provisioned.csv")]
        out: PathBuf,
    },
}

struct Provisioner {
    directory: acctl_core::adapter::directory::DirectoryAdapter,
    workspace: acctl_core::adapter::workspace::WorkspaceAdapter,
    database: acctl_core::adapter::database::DatabaseAdapter,
    erp: acctl_core::adapter::erp::ErpAdapter,
    mail_domain: String,
}

impl Provisioner {
    fn build(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            directory: systems::directory(config)?,
            workspace: systems::workspace(config),
            database: systems::database(config)?,
            erp: systems::erp(config)?,
            mail_domain: config.workspace.domain.clone(),
        })
    }
}

pub fn run(
    config_path: Option<&Path>,
    subcommand: ProvisionSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let config = systems::load_config(config_path)?;
    let provisioner = Provisioner::build(&config)?;

    match subcommand {
        ProvisionSubcommand::One {
            employee_id,
            first,
            last,
            uid,
        } => {
            let record = HireRecord {
                employee_id,
                first_name: first,
                last_name: last,
                uid_number: uid,
            };
            let mut claimed = HashSet::new();
            let entry = provision_one(&provisioner, &record, &mut claimed)?;
            if json {
                return print_json(&serde_json::json!({
                    "user_id": entry.user_id,
                    "employee_id": entry.employee_id,
                    "password": entry.password,
                }));
            }
            println!("created {} (employee {})", entry.user_id, entry.employee_id);
            println!("initial password: {}", entry.password);
            Ok(())
        }
        ProvisionSubcommand::Batch { roster, out } => {
            let data = std::fs::read_to_string(&roster)
                .with_context(|| format!("failed to read {}", roster.display()))?;
            let mut claimed = HashSet::new();
            let mut entries = Vec::new();
            let mut skipped = Vec::new();

            for row in parse_hire_roster(&data) {
                let record = match row {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!("skipping roster row: {e}");
                        skipped.push(e.to_string());
                        continue;
                    }
                };
                match provision_one(&provisioner, &record, &mut claimed) {
                    Ok(entry) => entries.push(entry),
                    // Fatal errors abort the batch, bad records don't.
                    Err(e) => match e.downcast_ref::<acctl_core::AcctlError>() {
                        Some(core) if !core.is_fatal() => {
                            tracing::warn!(employee = %record.employee_id, "skipping hire: {e}");
                            skipped.push(format!("{}: {e}", record.employee_id));
                        }
                        _ => return Err(e),
                    },
                }
            }

            write_roster(&out, &entries)
                .with_context(|| format!("failed to write {}", out.display()))?;

            if json {
                #[derive(serde::Serialize)]
                struct BatchSummary<'a> {
                    created: Vec<&'a str>,
                    skipped: &'a [String],
                    roster: String,
                }
                return print_json(&BatchSummary {
                    created: entries.iter().map(|e| e.user_id.as_str()).collect(),
                    skipped: &skipped,
                    roster: out.display().to_string(),
                });
            }

            let rows: Vec<Vec<String>> = entries
                .iter()
                .map(|e| {
                    vec![
                        e.user_id.clone(),
                        e.employee_id.clone(),
                        format!("{} {}", e.first_name, e.last_name),
                    ]
                })
                .collect();
            print_table(&["USER", "EMPLOYEE", "NAME"], rows);
            println!(
                "\n{} created, {} skipped; roster written to {}",
                entries.len(),
                skipped.len(),
                out.display()
            );
            Ok(())
        }
    }
}

/// Generate a free user id, then create the directory and workspace
/// accounts. The database and ERP are consulted for id collisions but get
/// no account; their rows come from their own provisioning feeds.
fn provision_one(
    provisioner: &Provisioner,
    record: &HireRecord,
    claimed: &mut HashSet<String>,
) -> anyhow::Result<RosterEntry> {
    let lookups: [&dyn AccountLookup; 4] = [
        &provisioner.directory,
        &provisioner.workspace,
        &provisioner.database,
        &provisioner.erp,
    ];
    let user_id = generate_user_id(&record.first_name, &record.last_name, &lookups, claimed)?;
    let password = generate_password(PASSWORD_LEN);

    let new_user = NewUser {
        user_id: user_id.clone(),
        first_name: record.first_name.clone(),
        last_name: record.last_name.clone(),
        employee_id: record.employee_id.clone(),
        uid_number: record.uid_number.clone(),
        mail_domain: provisioner.mail_domain.clone(),
    };

    provisioner
        .directory
        .create_user(&new_user, &password)
        .context("directory account creation failed")?;
    provisioner
        .workspace
        .create_user(&new_user, &password)
        .context("workspace account creation failed")?;
    tracing::info!(user = %user_id, employee = %record.employee_id, "provisioned accounts");

    Ok(RosterEntry {
        user_id,
        employee_id: record.employee_id.clone(),
        first_name: record.first_name.clone(),
        last_name: record.last_name.clone(),
        password,
    })
}
