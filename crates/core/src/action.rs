//! The closed set of tenant operations a caller may submit.
//!
//! Toolbar buttons and form posts arrive as strings. They are parsed once,
//! at the edge, into [`TenantAction`] / [`FormButton`]; anything outside
//! the set is a validation error rather than a silent fall-through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audit::action_types;
use crate::error::CoreError;
use crate::roles::Capability;

/// A tenant mutation class. Each variant maps to exactly one handler in
/// the submission gateway and one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenantAction {
    #[serde(rename = "cloud_tenant_new")]
    Create,
    #[serde(rename = "cloud_tenant_edit")]
    Update,
    #[serde(rename = "cloud_tenant_delete")]
    Delete,
}

impl TenantAction {
    /// Toolbar / storage name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            TenantAction::Create => "cloud_tenant_new",
            TenantAction::Update => "cloud_tenant_edit",
            TenantAction::Delete => "cloud_tenant_delete",
        }
    }

    /// Capability the acting user must hold to submit this action.
    pub fn capability(self) -> Capability {
        match self {
            TenantAction::Create => Capability::TenantNew,
            TenantAction::Update => Capability::TenantEdit,
            TenantAction::Delete => Capability::TenantDelete,
        }
    }

    /// Audit event name recorded for each affected resource at submission.
    pub fn audit_event(self) -> &'static str {
        match self {
            TenantAction::Create => action_types::TENANT_CREATE_INITIATED,
            TenantAction::Update => action_types::TENANT_UPDATE_INITIATED,
            TenantAction::Delete => action_types::TENANT_DELETE_INITIATED,
        }
    }
}

impl fmt::Display for TenantAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cloud_tenant_new" => Ok(TenantAction::Create),
            "cloud_tenant_edit" => Ok(TenantAction::Update),
            "cloud_tenant_delete" => Ok(TenantAction::Delete),
            other => Err(CoreError::Validation(format!("Unknown action '{other}'"))),
        }
    }
}

/// Which button submitted a create/edit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormButton {
    /// `add` on the create form, `save` on the edit form.
    Submit,
    Cancel,
}

impl FromStr for FormButton {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" | "save" => Ok(FormButton::Submit),
            "cancel" => Ok(FormButton::Cancel),
            other => Err(CoreError::Validation(format!("Unknown button '{other}'"))),
        }
    }
}
