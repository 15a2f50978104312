//! New-hire provisioning: hire rosters, user id generation, passwords.
//!
//! The account-creation calls themselves live on the directory and
//! workspace adapters; this module is the pure part that decides WHAT to
//! create, so it stays testable without any external system.

use std::collections::HashSet;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::adapter::AccountLookup;
use crate::error::{AcctlError, Result};
use crate::io::write_lines;

/// Everything the adapters need to create one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub employee_id: String,
    pub uid_number: String,
    pub mail_domain: String,
}

/// One row of an HR hire roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HireRecord {
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub uid_number: String,
}

// ---------------------------------------------------------------------------
// Roster files
// ---------------------------------------------------------------------------

/// Parse a headerless hire roster: `employee_id,first,last,uid` per line.
/// Blank lines are ignored; a malformed line is a per-record validation
/// error so the batch caller can skip it and keep going.
pub fn parse_hire_roster(data: &str) -> Vec<Result<HireRecord>> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_hire_line(line).map_err(|e| match e {
            AcctlError::Validation(msg) => {
                AcctlError::Validation(format!("line {}: {msg}", i + 1))
            }
            other => other,
        }))
        .collect()
}

fn parse_hire_line(line: &str) -> Result<HireRecord> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [employee_id, first_name, last_name, uid_number] = fields.as_slice() else {
        return Err(AcctlError::Validation(format!(
            "expected 4 fields (employee_id,first,last,uid), got {}",
            fields.len()
        )));
    };
    if fields.iter().any(|f| f.is_empty()) {
        return Err(AcctlError::Validation("empty field".to_string()));
    }
    Ok(HireRecord {
        employee_id: employee_id.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        uid_number: uid_number.to_string(),
    })
}

/// A provisioned account destined for the output roster handed back to HR.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub user_id: String,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Write the output roster as `user_id,employee_id,first,last,password`.
/// Atomic so a crashed batch never leaves a half-written roster behind.
pub fn write_roster(path: &Path, entries: &[RosterEntry]) -> Result<()> {
    write_lines(
        path,
        entries.iter().map(|e| {
            format!(
                "{},{},{},{},{}",
                e.user_id, e.employee_id, e.first_name, e.last_name, e.password
            )
        }),
    )
}

// ---------------------------------------------------------------------------
// User id generation
// ---------------------------------------------------------------------------

/// Lowercase and drop everything but ASCII letters, so "O'Brien-Smith"
/// becomes "obriensmith".
fn sanitize(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn truncated(name: &str, len: usize) -> String {
    name.chars().take(len).collect()
}

/// Generate a user id that is free in every checked system and not already
/// claimed earlier in this run.
///
/// Candidates are tried in order of decreasing readability:
/// 1. surname, up to 8 characters
/// 2. surname up to 7 characters plus first initial
/// 3. surname up to 6 characters plus 01..99
/// 4. surname up to 5 characters plus 100..999
/// 5. surname up to 4 characters plus 1000..9999
///
/// The first free candidate is inserted into `claimed` and returned.
pub fn generate_user_id(
    first_name: &str,
    last_name: &str,
    lookups: &[&dyn AccountLookup],
    claimed: &mut HashSet<String>,
) -> Result<String> {
    let first = sanitize(first_name);
    let last = sanitize(last_name);
    if first.is_empty() || last.is_empty() {
        return Err(AcctlError::Validation(format!(
            "cannot derive a user id from '{first_name} {last_name}'"
        )));
    }

    let mut candidates = vec![truncated(&last, 8)];
    candidates.push(format!("{}{}", truncated(&last, 7), &first[..1]));
    candidates.extend((1..=99).map(|n| format!("{}{n:02}", truncated(&last, 6))));
    candidates.extend((100..=999).map(|n| format!("{}{n}", truncated(&last, 5))));
    candidates.extend((1000..=9999).map(|n| format!("{}{n}", truncated(&last, 4))));

    for candidate in candidates {
        if claimed.contains(&candidate) {
            continue;
        }
        if is_taken(&candidate, lookups)? {
            continue;
        }
        claimed.insert(candidate.clone());
        return Ok(candidate);
    }
    Err(AcctlError::UserIdExhausted {
        first: first_name.to_string(),
        last: last_name.to_string(),
    })
}

fn is_taken(candidate: &str, lookups: &[&dyn AccountLookup]) -> Result<bool> {
    for lookup in lookups {
        if lookup.user_id_exists(candidate)? {
            tracing::debug!(
                candidate,
                system = %lookup.system(),
                "user id already taken"
            );
            return Ok(true);
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

const LOWER: &[u8] = b"abcdefghjkmnpqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!#$%&*+-=?@";

/// Random initial password with at least one character from each class.
/// Ambiguous characters (0/O, 1/l/I) are excluded since these get read to
/// new hires over the phone.
pub fn generate_password(len: usize) -> String {
    let len = len.max(8);
    let mut rng = rand::thread_rng();
    let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while chars.len() < len {
        chars.push(all[rng.gen_range(0..all.len())]);
    }
    chars.shuffle(&mut rng);
    chars.into_iter().map(char::from).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
