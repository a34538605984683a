// src/models/person.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Staff,
    HodStaff,
    Hod,
    Principal,
    PlacementOfficer,
    Mentor,
    ClassAdvisor,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            "hodstaff" | "hod_staff" => Ok(Role::HodStaff),
            "hod" => Ok(Role::Hod),
            "principal" => Ok(Role::Principal),
            "placement_officer" | "placementofficer" => Ok(Role::PlacementOfficer),
            "mentor" => Ok(Role::Mentor),
            "class_advisor" | "classadvisor" => Ok(Role::ClassAdvisor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// All roles a person holds, merged from `role`, `position_1` and `position_2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn contains_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.0.contains(r))
    }

    /// Parses one raw role column. The column has been written in three shapes over
    /// time: a JSON object `{"roles": [...]}`, a comma separated list, or a single
    /// role. Unknown tokens are skipped.
    pub fn parse_raw(raw: &str) -> RoleSet {
        let raw = raw.trim();
        let tokens: Vec<String> = if raw.starts_with('{') || raw.starts_with('[') {
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(value) => {
                    let list = value.get("roles").unwrap_or(&value);
                    list.as_array()
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(|v| v.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default()
                }
                Err(e) => {
                    tracing::warn!("role column is not valid JSON ({}): {}", e, raw);
                    Vec::new()
                }
            }
        } else {
            raw.split(',').map(str::to_string).collect()
        };

        let mut set = BTreeSet::new();
        for token in tokens.iter().filter(|t| !t.trim().is_empty()) {
            match token.parse::<Role>() {
                Ok(role) => {
                    set.insert(role);
                }
                Err(e) => tracing::warn!("ignoring role token: {}", e),
            }
        }
        RoleSet(set)
    }

    pub fn merge(mut self, other: RoleSet) -> RoleSet {
        self.0.extend(other.0);
        self
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        RoleSet(iter.into_iter().collect())
    }
}

/// Which approval chain a requester falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RequesterClass {
    Student,
    Staff,
    Hod,
}

impl RequesterClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequesterClass::Student => "student",
            RequesterClass::Staff => "staff",
            RequesterClass::Hod => "hod",
        }
    }
}

/// Roles that put a non-student in the staff population.
pub const STAFF_LIKE_ROLES: &[Role] = &[
    Role::Staff,
    Role::HodStaff,
    Role::Hod,
    Role::Mentor,
    Role::ClassAdvisor,
    Role::PlacementOfficer,
];

/// Row as stored in the `users` table, before role normalization.
#[derive(Debug, Clone, FromRow)]
pub struct PersonRow {
    pub id: String,
    pub sin_number: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub position_1: Option<String>,
    pub position_2: Option<String>,
    pub department: String,
    pub year: Option<i64>,
    pub college: String,
    pub mentor: Option<String>,
    pub class_advisor: Option<String>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Person {
    pub id: String,
    pub sin_number: String,
    pub name: String,
    pub email: String,
    pub roles: RoleSet,
    pub department: String,
    pub year: Option<i64>,
    pub college: String,
    pub mentor: Option<String>,
    pub class_advisor: Option<String>,
    pub is_deleted: bool,
}

impl From<PersonRow> for Person {
    fn from(row: PersonRow) -> Self {
        let mut roles = RoleSet::parse_raw(&row.role);
        for position in [&row.position_1, &row.position_2].into_iter().flatten() {
            roles = roles.merge(RoleSet::parse_raw(position));
        }
        Person {
            id: row.id,
            sin_number: row.sin_number,
            name: row.name,
            email: row.email,
            roles,
            department: row.department,
            year: row.year,
            college: row.college,
            mentor: row.mentor,
            class_advisor: row.class_advisor,
            is_deleted: row.is_deleted,
        }
    }
}

impl Person {
    pub fn is_student(&self) -> bool {
        self.roles.contains(Role::Student)
    }

    pub fn is_staff_like(&self) -> bool {
        !self.is_student() && self.roles.contains_any(STAFF_LIKE_ROLES)
    }

    /// Chain selector for requests this person submits. Principals and admins
    /// have no approval chain.
    pub fn requester_class(&self) -> Option<RequesterClass> {
        if self.is_student() {
            Some(RequesterClass::Student)
        } else if self.roles.contains(Role::Hod) {
            Some(RequesterClass::Hod)
        } else if self.roles.contains_any(STAFF_LIKE_ROLES) {
            Some(RequesterClass::Staff)
        } else {
            None
        }
    }
}
