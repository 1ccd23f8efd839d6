//! # Permissions
//!
//! Resolves what a user may do in each module of their pharmacy.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. role == ADMIN               → full access to every module          │
//! │  2. explicit UserPermission     → used as-is for that module           │
//! │     (edit or delete implies view)                                      │
//! │  3. role default table          → PHARMACIST / WORKER defaults         │
//! │                                                                         │
//! │  USERS and SETTINGS: non-admins are capped at view, whatever the grant │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Role Defaults
//! ```text
//!                    PHARMACIST        WORKER
//!   DASHBOARD        view              view
//!   INVENTORY        view, edit        view
//!   SALES            view, edit        view, edit
//!   PRESCRIPTIONS    view, edit        view
//!   EXPENSES         view, edit        -
//!   REPORTS          view, edit        -
//!   USERS            -                 -
//!   SETTINGS         -                 -
//!   LOGS             view              -
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{Module, Role, User, UserPermission, UserStatus};

/// An operation on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Action {
    View,
    Edit,
    Delete,
}

impl Action {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved access to one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ModuleAccess {
    pub module: Module,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl ModuleAccess {
    const fn none(module: Module) -> Self {
        ModuleAccess {
            module,
            can_view: false,
            can_edit: false,
            can_delete: false,
        }
    }

    const fn full(module: Module) -> Self {
        ModuleAccess {
            module,
            can_view: true,
            can_edit: true,
            can_delete: true,
        }
    }

    const fn with(module: Module, view: bool, edit: bool) -> Self {
        ModuleAccess {
            module,
            can_view: view,
            can_edit: edit,
            can_delete: false,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.can_view,
            Action::Edit => self.can_edit,
            Action::Delete => self.can_delete,
        }
    }
}

/// Modules whose management is reserved to administrators.
#[inline]
pub fn is_admin_only(module: Module) -> bool {
    matches!(module, Module::Users | Module::Settings)
}

/// The default access a role has to a module before grants are applied.
pub fn role_default(role: Role, module: Module) -> ModuleAccess {
    use Module::*;

    match role {
        Role::Admin => ModuleAccess::full(module),
        Role::Pharmacist => match module {
            Dashboard | Inventory | Sales | Prescriptions | Expenses | Reports => {
                ModuleAccess::with(module, true, true)
            }
            Logs => ModuleAccess::with(module, true, false),
            Users | Settings => ModuleAccess::none(module),
        },
        Role::Worker => match module {
            Sales => ModuleAccess::with(module, true, true),
            Dashboard | Inventory | Prescriptions => ModuleAccess::with(module, true, false),
            _ => ModuleAccess::none(module),
        },
    }
}

/// Normalizes a stored or requested grant: edit or delete implies view.
pub fn normalize_grant(mut grant: UserPermission) -> UserPermission {
    if grant.can_edit || grant.can_delete {
        grant.can_view = true;
    }
    grant
}

/// Resolves the effective access of a role plus its grants to one module.
pub fn effective_access(role: Role, grants: &[UserPermission], module: Module) -> ModuleAccess {
    if role == Role::Admin {
        return ModuleAccess::full(module);
    }

    let mut access = match grants.iter().find(|g| g.module == module) {
        Some(grant) => {
            let grant = normalize_grant(grant.clone());
            ModuleAccess {
                module,
                can_view: grant.can_view,
                can_edit: grant.can_edit,
                can_delete: grant.can_delete,
            }
        }
        None => role_default(role, module),
    };

    if is_admin_only(module) {
        access.can_edit = false;
        access.can_delete = false;
    }
    access
}

/// Whether `role` with `grants` may perform `action` on `module`.
///
/// ```rust
/// use medtrack_core::permissions::{can, Action};
/// use medtrack_core::{Module, Role};
///
/// assert!(can(Role::Worker, &[], Module::Sales, Action::Edit));
/// assert!(!can(Role::Worker, &[], Module::Inventory, Action::Edit));
/// assert!(can(Role::Admin, &[], Module::Settings, Action::Delete));
/// ```
pub fn can(role: Role, grants: &[UserPermission], module: Module, action: Action) -> bool {
    effective_access(role, grants, module).allows(action)
}

/// Like [`can`], but returns [`CoreError::Forbidden`] on refusal.
pub fn require(role: Role, grants: &[UserPermission], module: Module, action: Action) -> CoreResult<()> {
    if can(role, grants, module, action) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            module: module.as_str().to_lowercase(),
            action: action.as_str().to_string(),
        })
    }
}

/// Access to every module, in [`Module::ALL`] order.
pub fn effective_permissions(role: Role, grants: &[UserPermission]) -> Vec<ModuleAccess> {
    Module::ALL
        .iter()
        .map(|module| effective_access(role, grants, *module))
        .collect()
}

/// Proposed change to a user account, checked by [`guard_self_change`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountChange {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub delete: bool,
}

/// Stops an administrator from demoting, suspending or deleting themselves.
/// Changes to other accounts always pass.
pub fn guard_self_change(actor: &User, target_id: &str, change: AccountChange) -> CoreResult<()> {
    if actor.id != target_id {
        return Ok(());
    }

    if change.delete {
        return Err(CoreError::SelfModification {
            action: "delete".to_string(),
        });
    }
    if matches!(change.role, Some(role) if role != actor.role) {
        return Err(CoreError::SelfModification {
            action: "change the role of".to_string(),
        });
    }
    if matches!(change.status, Some(status) if status != UserStatus::Active) {
        return Err(CoreError::SelfModification {
            action: "deactivate".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn grant(module: Module, view: bool, edit: bool, delete: bool) -> UserPermission {
        UserPermission {
            user_id: "u".to_string(),
            module,
            can_view: view,
            can_edit: edit,
            can_delete: delete,
        }
    }

    fn admin() -> User {
        User {
            id: "admin-1".to_string(),
            email: "owner@pharmacy.test".to_string(),
            name: "Owner".to_string(),
            role: Role::Admin,
            pharmacy_id: "ph".to_string(),
            status: UserStatus::Active,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_defaults() {
        assert!(can(Role::Pharmacist, &[], Module::Inventory, Action::Edit));
        assert!(!can(Role::Pharmacist, &[], Module::Inventory, Action::Delete));
        assert!(can(Role::Pharmacist, &[], Module::Logs, Action::View));
        assert!(!can(Role::Pharmacist, &[], Module::Users, Action::View));

        assert!(can(Role::Worker, &[], Module::Dashboard, Action::View));
        assert!(can(Role::Worker, &[], Module::Prescriptions, Action::View));
        assert!(!can(Role::Worker, &[], Module::Prescriptions, Action::Edit));
        assert!(!can(Role::Worker, &[], Module::Reports, Action::View));
    }

    #[test]
    fn test_grant_overrides_default() {
        let grants = vec![grant(Module::Inventory, false, true, false)];
        assert!(can(Role::Worker, &grants, Module::Inventory, Action::Edit));
        // Edit implies view even if the row says otherwise.
        assert!(can(Role::Worker, &grants, Module::Inventory, Action::View));
        assert!(!can(Role::Worker, &grants, Module::Inventory, Action::Delete));

        // A grant can also take a default away.
        let revoked = vec![grant(Module::Sales, false, false, false)];
        assert!(!can(Role::Worker, &revoked, Module::Sales, Action::View));
    }

    #[test]
    fn test_admin_only_modules_are_capped_at_view() {
        let grants = vec![
            grant(Module::Users, true, true, true),
            grant(Module::Settings, false, true, false),
        ];
        assert!(can(Role::Pharmacist, &grants, Module::Users, Action::View));
        assert!(!can(Role::Pharmacist, &grants, Module::Users, Action::Edit));
        assert!(!can(Role::Pharmacist, &grants, Module::Users, Action::Delete));
        assert!(can(Role::Pharmacist, &grants, Module::Settings, Action::View));
        assert!(!can(Role::Pharmacist, &grants, Module::Settings, Action::Edit));
    }

    #[test]
    fn test_admin_ignores_grants() {
        let grants = vec![grant(Module::Sales, false, false, false)];
        assert!(can(Role::Admin, &grants, Module::Sales, Action::Delete));
    }

    #[test]
    fn test_require_error() {
        let err = require(Role::Worker, &[], Module::Expenses, Action::Edit).unwrap_err();
        assert_eq!(err.to_string(), "Not allowed to edit expenses");
    }

    #[test]
    fn test_effective_permissions_covers_all_modules() {
        let perms = effective_permissions(Role::Worker, &[]);
        assert_eq!(perms.len(), Module::ALL.len());
        assert_eq!(perms[0].module, Module::Dashboard);
    }

    #[test]
    fn test_guard_self_change() {
        let me = admin();

        assert!(guard_self_change(&me, "admin-1", AccountChange { delete: true, ..Default::default() }).is_err());
        assert!(guard_self_change(
            &me,
            "admin-1",
            AccountChange {
                role: Some(Role::Worker),
                ..Default::default()
            }
        )
        .is_err());
        assert!(guard_self_change(
            &me,
            "admin-1",
            AccountChange {
                status: Some(UserStatus::Suspended),
                ..Default::default()
            }
        )
        .is_err());

        // Re-asserting the same role and status is fine.
        assert!(guard_self_change(
            &me,
            "admin-1",
            AccountChange {
                role: Some(Role::Admin),
                status: Some(UserStatus::Active),
                delete: false,
            }
        )
        .is_ok());

        assert!(guard_self_change(&me, "other", AccountChange { delete: true, ..Default::default() }).is_ok());
    }
}
