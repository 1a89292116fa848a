use std::fmt;
use std::str::FromStr;

/// Account role. Stored in the `roles` table by canonical lowercase name;
/// parsing is case-insensitive so legacy mixed-case rows still resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Hr,
    Pm,
    Candidate,
    Ceo,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Manager,
        Role::Hr,
        Role::Pm,
        Role::Candidate,
        Role::Ceo,
    ];

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Whether this role may submit evaluations and verdicts.
    pub fn can_evaluate(self) -> bool {
        matches!(self, Self::Admin | Self::Manager | Self::Pm)
    }

    /// Whether this role may create tasks and see other users' task lists.
    pub fn can_manage_tasks(self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }

    /// Whether this role may create projects.
    pub fn can_manage_projects(self) -> bool {
        matches!(self, Self::Admin | Self::Manager | Self::Pm)
    }

    /// Whether this role may assign interns to projects.
    pub fn can_assign_projects(self) -> bool {
        matches!(self, Self::Admin | Self::Manager | Self::Hr | Self::Pm)
    }

    /// Whether this role may approve or reject leave requests.
    pub fn can_review_leaves(self) -> bool {
        matches!(self, Self::Admin | Self::Hr)
    }

    /// Whether this role may read the audit log.
    pub fn can_view_logs(self) -> bool {
        matches!(self, Self::Admin | Self::Manager | Self::Hr)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Hr => "hr",
            Self::Pm => "pm",
            Self::Candidate => "candidate",
            Self::Ceo => "ceo",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "hr" => Ok(Self::Hr),
            "pm" => Ok(Self::Pm),
            "candidate" => Ok(Self::Candidate),
            "ceo" => Ok(Self::Ceo),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}
