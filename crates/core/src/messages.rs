//! User-facing outcome messages.
//!
//! Every submission surfaces exactly one of these. Worker result messages
//! (`"<name> created"`) are stored on the task; the `*_finished` helpers
//! turn a terminal task outcome into the flash text a console shows.

use crate::action::TenantAction;

const ENTITY: &str = "Cloud Tenant";
const ENTITY_PLURAL: &str = "Cloud Tenants";

fn entity(count: usize) -> &'static str {
    if count == 1 {
        ENTITY
    } else {
        ENTITY_PLURAL
    }
}

// ---------------------------------------------------------------------------
// Submission-time messages
// ---------------------------------------------------------------------------

pub fn create_cancelled() -> String {
    format!("Add of {ENTITY} was cancelled by the user")
}

pub fn update_cancelled(name: &str) -> String {
    format!("Edit of {ENTITY} \"{name}\" was cancelled by the user")
}

pub fn delete_initiated(count: usize) -> String {
    format!("Delete initiated for {count} {}.", entity(count))
}

pub fn delete_blocked(name: &str) -> String {
    format!(
        "{ENTITY} \"{name}\" cannot be removed because it is attached to one or more Instances"
    )
}

// ---------------------------------------------------------------------------
// Worker result messages
// ---------------------------------------------------------------------------

pub fn worker_created(name: &str) -> String {
    format!("{name} created")
}

pub fn worker_updated(name: &str) -> String {
    format!("{name} updated")
}

pub fn worker_deleted(count: usize) -> String {
    format!("Deleted {count} {}", entity(count))
}

// ---------------------------------------------------------------------------
// Finalize messages
// ---------------------------------------------------------------------------

/// Flash text for a terminal task outcome.
///
/// Failures carry the worker's message verbatim as `details`.
pub fn finished(action: TenantAction, name: &str, ok: bool, details: &str) -> String {
    match (action, ok) {
        (TenantAction::Create, true) => format!("{ENTITY} \"{name}\" created"),
        (TenantAction::Create, false) => format!("Unable to create {ENTITY} \"{name}\": {details}"),
        (TenantAction::Update, true) => format!("{ENTITY} \"{name}\" updated"),
        (TenantAction::Update, false) => format!("Unable to update {ENTITY} \"{name}\": {details}"),
        (TenantAction::Delete, true) => details.to_string(),
        (TenantAction::Delete, false) => format!("Unable to delete {name}: {details}"),
    }
}
