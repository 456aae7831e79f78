//! Recruitment departments.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Technical,
    Management,
    SocialMedia,
    Design,
}

impl Department {
    pub const ALL: [Self; 4] = [
        Self::Technical,
        Self::Management,
        Self::SocialMedia,
        Self::Design,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Management => "management",
            Self::SocialMedia => "social_media",
            Self::Design => "design",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown department: {0}")]
pub struct UnknownDepartment(pub String);

impl FromStr for Department {
    type Err = UnknownDepartment;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|department| department.as_str() == normalized)
            .ok_or(UnknownDepartment(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_departments() {
        for department in Department::ALL {
            assert_eq!(department.as_str().parse::<Department>(), Ok(department));
        }
        assert_eq!(" Social_Media ".parse::<Department>(), Ok(Department::SocialMedia));
    }

    #[test]
    fn rejects_unknown_department() {
        assert_eq!(
            "finance".parse::<Department>(),
            Err(UnknownDepartment("finance".to_string()))
        );
    }

    #[test]
    fn serializes_snake_case() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&Department::SocialMedia)?, "\"social_media\"");
        let parsed: Department = serde_json::from_str("\"design\"")?;
        assert_eq!(parsed, Department::Design);
        Ok(())
    }
}
