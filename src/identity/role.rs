use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Administrator,
    Instructor,
    Student,
    Supervisor,
}

/// Where a role's credentials live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    Directory,
    Local,
}

impl RoleKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Instructor => "instructor",
            Self::Student => "student",
            Self::Supervisor => "supervisor",
        }
    }

    #[must_use]
    pub const fn authentication(self) -> Authentication {
        match self {
            Self::Administrator | Self::Instructor | Self::Student => Authentication::Directory,
            Self::Supervisor => Authentication::Local,
        }
    }
}

impl FromStr for RoleKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "administrator" => Ok(Self::Administrator),
            "instructor" => Ok(Self::Instructor),
            "student" => Ok(Self::Student),
            "supervisor" => Ok(Self::Supervisor),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub kind: RoleKind,
    pub name: String,
    /// Lower sorts first in the audit view.
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleView {
    pub id: RoleKind,
    pub name: String,
}

impl Role {
    #[must_use]
    pub fn view(&self) -> RoleView {
        RoleView {
            id: self.kind,
            name: self.name.clone(),
        }
    }
}
