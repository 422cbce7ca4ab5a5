use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ApiError, ApiResult};

// ========== ROLE ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Enumerator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Enumerator => "enumerator",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }

    /// Effective role of a record that may only carry the legacy `is_admin`
    /// flag. An explicit, valid `role` always wins.
    pub fn from_legacy(role: Option<&str>, is_admin: Option<bool>) -> Role {
        match role.and_then(|r| r.parse().ok()) {
            Some(role) => role,
            None if is_admin == Some(true) => Role::Admin,
            None => Role::User,
        }
    }

    /// Role requested by an admin write. `role` takes priority; `isAdmin`
    /// is only consulted when `role` is absent. An unknown role is rejected.
    pub fn from_request(role: Option<&str>, is_admin: Option<bool>) -> ApiResult<Option<Role>> {
        match (role, is_admin) {
            (Some(role), _) => role
                .parse()
                .map(Some)
                .map_err(|_| ApiError::validation("Invalid role")),
            (None, Some(true)) => Ok(Some(Role::Admin)),
            (None, Some(false)) => Ok(Some(Role::User)),
            (None, None) => Ok(None),
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "enumerator" => Ok(Role::Enumerator),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== USER ==========
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user: never carries the password hash, and always
/// derives `isAdmin` from the role.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub is_admin: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            is_admin: user.role.is_admin(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Body of signup, admin create (POST) and admin replace/patch (PUT/PATCH).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub is_admin: Option<bool>,
}

impl UserRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.role.is_none()
            && self.is_admin.is_none()
    }
}

// ========== PROBLEM ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProblemStatus {
    #[default]
    Open,
    InProgress,
    Closed,
}

impl ProblemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemStatus::Open => "open",
            ProblemStatus::InProgress => "in-progress",
            ProblemStatus::Closed => "closed",
        }
    }
}

impl FromStr for ProblemStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ProblemStatus::Open),
            "in-progress" => Ok(ProblemStatus::InProgress),
            "closed" => Ok(ProblemStatus::Closed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub email: String,
    pub anonymous: bool,
    /// Owning user id, when the reporter was signed in
    pub user: Option<String>,
    pub status: ProblemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateProblemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub anonymous: Option<bool>,
    pub location: Option<String>,
    pub latitude: Option<serde_json::Value>,
    pub longitude: Option<serde_json::Value>,
}

impl CreateProblemRequest {
    pub fn into_problem(self, owner: Option<String>, now: DateTime<Utc>) -> ApiResult<Problem> {
        let (Some(title), Some(description)) = (present(&self.title), present(&self.description))
        else {
            return Err(ApiError::validation("Title and description are required"));
        };

        Ok(Problem {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            email: self
                .email
                .as_deref()
                .map(|e| e.trim().to_lowercase())
                .unwrap_or_default(),
            anonymous: self.anonymous.unwrap_or(false),
            user: owner,
            status: ProblemStatus::Open,
            admin_notes: None,
            location: present(&self.location).map(str::to_string),
            latitude: coordinate("latitude", &self.latitude)?,
            longitude: coordinate("longitude", &self.longitude)?,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProblemRequest {
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

impl UpdateProblemRequest {
    pub fn apply(self, problem: &mut Problem, now: DateTime<Utc>) -> ApiResult<()> {
        let status = match self.status.as_deref() {
            Some(s) => Some(
                s.parse::<ProblemStatus>()
                    .map_err(|_| ApiError::validation("Invalid status"))?,
            ),
            None => None,
        };
        if status.is_none() && self.admin_notes.is_none() {
            return Err(ApiError::validation("No update data provided"));
        }

        if let Some(status) = status {
            problem.status = status;
        }
        if let Some(notes) = self.admin_notes {
            problem.admin_notes = Some(notes.trim().to_string());
        }
        problem.updated_at = now;
        Ok(())
    }
}

// ========== QUERY ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Infrastructure,
    Health,
    Education,
    Agriculture,
    Water,
    Electricity,
    Transportation,
    Communication,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Infrastructure => "Infrastructure",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::Agriculture => "Agriculture",
            Category::Water => "Water",
            Category::Electricity => "Electricity",
            Category::Transportation => "Transportation",
            Category::Communication => "Communication",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Infrastructure" => Ok(Category::Infrastructure),
            "Health" => Ok(Category::Health),
            "Education" => Ok(Category::Education),
            "Agriculture" => Ok(Category::Agriculture),
            "Water" => Ok(Category::Water),
            "Electricity" => Ok(Category::Electricity),
            "Transportation" => Ok(Category::Transportation),
            "Communication" => Ok(Category::Communication),
            "Other" => Ok(Category::Other),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "Low",
            Urgency::Medium => "Medium",
            Urgency::High => "High",
            Urgency::Critical => "Critical",
        }
    }
}

impl FromStr for Urgency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Urgency::Low),
            "Medium" => Ok(Urgency::Medium),
            "High" => Ok(Urgency::High),
            "Critical" => Ok(Urgency::Critical),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum QueryStatus {
    #[default]
    Collected,
    Reviewed,
    InProgress,
    Resolved,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Collected => "collected",
            QueryStatus::Reviewed => "reviewed",
            QueryStatus::InProgress => "in-progress",
            QueryStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for QueryStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collected" => Ok(QueryStatus::Collected),
            "reviewed" => Ok(QueryStatus::Reviewed),
            "in-progress" => Ok(QueryStatus::InProgress),
            "resolved" => Ok(QueryStatus::Resolved),
            _ => Err(()),
        }
    }
}

/// A field-collected report, recorded by an enumerator on behalf of someone
/// without platform access.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(rename = "_id")]
    pub id: String,
    pub person_name: String,
    pub contact_info: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub category: Category,
    pub problem_title: String,
    pub description: String,
    pub urgency: Urgency,
    pub admin_notes: String,
    #[serde(skip_serializing)]
    pub collected_by: String,
    pub status: QueryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `collectedBy` as sent to clients: the collector's summary when the user
/// still exists, the bare id otherwise.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Collector {
    Populated {
        #[serde(rename = "_id")]
        id: String,
        name: String,
        email: String,
    },
    Id(String),
}

impl Collector {
    pub fn resolve(collected_by: &str, user: Option<&User>) -> Self {
        match user {
            Some(user) => Collector::Populated {
                id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
            },
            None => Collector::Id(collected_by.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryView {
    #[serde(flatten)]
    pub query: Query,
    pub collected_by: Collector,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueryRequest {
    pub person_name: Option<String>,
    pub contact_info: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<serde_json::Value>,
    pub longitude: Option<serde_json::Value>,
    pub category: Option<String>,
    pub problem_title: Option<String>,
    pub description: Option<String>,
    pub urgency: Option<String>,
    pub admin_notes: Option<String>,
}

impl CreateQueryRequest {
    pub fn into_query(self, collected_by: &str, now: DateTime<Utc>) -> ApiResult<Query> {
        let (Some(person_name), Some(location), Some(category), Some(problem_title), Some(description)) = (
            present(&self.person_name),
            present(&self.location),
            present(&self.category),
            present(&self.problem_title),
            present(&self.description),
        ) else {
            return Err(ApiError::validation(
                "Person name, location, category, title, and description are required",
            ));
        };

        let category = category
            .parse::<Category>()
            .map_err(|_| ApiError::validation("Invalid category"))?;
        let urgency = match present(&self.urgency) {
            Some(u) => u
                .parse::<Urgency>()
                .map_err(|_| ApiError::validation("Invalid urgency"))?,
            None => Urgency::default(),
        };

        Ok(Query {
            id: uuid::Uuid::new_v4().to_string(),
            person_name: person_name.to_string(),
            contact_info: present(&self.contact_info).unwrap_or_default().to_string(),
            location: location.to_string(),
            latitude: coordinate("latitude", &self.latitude)?,
            longitude: coordinate("longitude", &self.longitude)?,
            category,
            problem_title: problem_title.to_string(),
            description: description.to_string(),
            urgency,
            admin_notes: present(&self.admin_notes).unwrap_or_default().to_string(),
            collected_by: collected_by.to_string(),
            status: QueryStatus::Collected,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQueryRequest {
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

impl UpdateQueryRequest {
    pub fn apply(self, query: &mut Query, now: DateTime<Utc>) -> ApiResult<()> {
        let status = match present(&self.status) {
            Some(s) => Some(
                s.parse::<QueryStatus>()
                    .map_err(|_| ApiError::validation("Invalid status"))?,
            ),
            None => None,
        };
        if status.is_none() && self.admin_notes.is_none() {
            return Err(ApiError::validation("No update data provided"));
        }

        if let Some(status) = status {
            query.status = status;
        }
        if let Some(notes) = self.admin_notes {
            query.admin_notes = notes.trim().to_string();
        }
        query.updated_at = now;
        Ok(())
    }
}

// ========== HELPERS ==========

/// Trimmed value of a field that must be present and non-blank.
pub fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Coordinates arrive either as JSON numbers or as numeric strings from
/// form inputs. Blank and null mean "not provided".
fn coordinate(name: &str, value: &Option<serde_json::Value>) -> ApiResult<Option<f64>> {
    let parsed = match value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    // NaN and infinities are not storable numbers
    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(ApiError::validation(format!("Invalid {}", name))),
    }
}
