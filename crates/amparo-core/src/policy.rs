use amparo_types::models::{Actor, Role};

use crate::error::{Error, Result};

/// Everything a role can be granted: views and lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewTriage,
    ViewManagement,
    ViewHelper,
    ViewReports,
    ViewAdmin,
    ViewSuper,
    /// Decide a triaged request: triage -> inProgress | cancelled.
    Approve,
    /// Finish a request: inProgress -> done.
    Complete,
    /// Create a pre-verified request that skips triage.
    CreateVerified,
    ManageUsers,
    ManageCities,
}

/// The whole authorization model in one table. Keep it a flat lookup —
/// scattering role conditionals through handlers makes the grant set
/// impossible to audit.
pub fn allows(role: Role, capability: Capability) -> bool {
    use Capability::*;

    match role {
        Role::Admin | Role::Super => true,
        Role::CityHall => matches!(
            capability,
            ViewTriage
                | ViewManagement
                | ViewHelper
                | ViewReports
                | Approve
                | Complete
                | CreateVerified
                | ManageUsers
        ),
        Role::Management => matches!(
            capability,
            ViewManagement | ViewHelper | ViewReports | Approve | Complete
        ),
        Role::Triage => matches!(capability, ViewTriage | Approve),
        Role::Helping => matches!(capability, ViewHelper | Complete),
    }
}

/// Authorization gate: fails before any write is attempted.
pub fn ensure(actor: &Actor, capability: Capability) -> Result<()> {
    if allows(actor.role, capability) {
        Ok(())
    } else {
        Err(Error::Unauthorized {
            role: actor.role,
            capability,
        })
    }
}

/// Everyone except super is scoped to their home city partition.
pub fn ensure_city(actor: &Actor, city: &str) -> Result<()> {
    if actor.role == Role::Super || actor.city == city {
        Ok(())
    } else {
        Err(Error::WrongCity {
            role: actor.role,
            home: actor.city.clone(),
            requested: city.to_string(),
        })
    }
}
