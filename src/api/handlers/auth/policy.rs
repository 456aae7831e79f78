//! Roles and the allow-sets that gate every protected operation.
//!
//! Roles are never compared by rank. Each operation names the exact set of
//! roles it accepts, and a caller is admitted only when its role is a member.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Applicant,
    Evaluator,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Self; 4] = [Self::Applicant, Self::Evaluator, Self::Admin, Self::SuperAdmin];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Evaluator => "evaluator",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or(UnknownRole(normalized))
    }
}

/// Explicit set of roles admitted to an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllowSet(&'static [Role]);

impl AllowSet {
    #[must_use]
    pub fn permits(self, role: Role) -> bool {
        self.0.contains(&role)
    }

    #[must_use]
    pub fn roles(self) -> &'static [Role] {
        self.0
    }
}

pub const SUPER_ADMIN_ONLY: AllowSet = AllowSet(&[Role::SuperAdmin]);
pub const ADMIN_OR_ABOVE: AllowSet = AllowSet(&[Role::Admin, Role::SuperAdmin]);
pub const EVALUATOR_OR_ABOVE: AllowSet =
    AllowSet(&[Role::Evaluator, Role::Admin, Role::SuperAdmin]);
pub const APPLICANT_ONLY: AllowSet = AllowSet(&[Role::Applicant]);

/// Who may create an account carrying `role`. `None` means self-registration is allowed.
#[must_use]
pub const fn required_creator(role: Role) -> Option<AllowSet> {
    match role {
        Role::Applicant => None,
        Role::Evaluator => Some(ADMIN_OR_ABOVE),
        Role::Admin | Role::SuperAdmin => Some(SUPER_ADMIN_ONLY),
    }
}

/// Who may delete an account carrying `role`. Staff accounts above evaluator
/// can only be removed by a super admin.
#[must_use]
pub const fn required_remover(role: Role) -> AllowSet {
    match role {
        Role::Applicant | Role::Evaluator => ADMIN_OR_ABOVE,
        Role::Admin | Role::SuperAdmin => SUPER_ADMIN_ONLY,
    }
}
