//! Identity resolution: turn a ticket into a `PersonRecord`.

use crate::adapter::{ErpClient, TicketingClient};
use crate::error::{AcctlError, Result};
use crate::person::PersonRecord;
use crate::types::Classification;

/// Resolve the person behind a separation ticket and classify them.
///
/// Classification order matters:
/// 1. Retiree first — retirees sometimes still carry active employment
///    records, so the employment check cannot come before this.
/// 2. An active employment record on a non-retiree refuses the run: the
///    separation may have been rescinded or the last work date moved, and a
///    human needs to look before any account is touched.
/// 3. Recent student (enrolled or admitted within the window) keeps the
///    account active.
/// 4. Everyone else is a terminated employee and gets the full pipeline.
///    This is also the conservative default for anyone the queries cannot
///    place: a deactivation can be reversed, a skipped one is a gap.
pub fn resolve(
    ticketing: &dyn TicketingClient,
    erp: &dyn ErpClient,
    ticket_id: u64,
) -> Result<PersonRecord> {
    let erp_id = ticketing.ticket_erp_id(ticket_id)?;
    let uid = erp.lookup_uid(&erp_id)?;
    let username = erp.lookup_username(&uid)?;

    let classification = if erp.is_retiree(&erp_id)? {
        Classification::Retiree
    } else if erp.has_active_employment(&erp_id)? {
        return Err(AcctlError::Validation(format!(
            "'{username}' still has an active employment record; refusing to process ticket {ticket_id}"
        )));
    } else if erp.is_recent_student(&uid)? {
        Classification::Student
    } else {
        Classification::Employee
    };

    tracing::info!(ticket = ticket_id, user = %username, class = %classification, "resolved person");
    Ok(PersonRecord::new(username, erp_id, uid, classification))
}
