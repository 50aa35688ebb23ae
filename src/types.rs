use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Fresh, never-reused identifier for any entity kind.
pub fn new_id() -> String {
    Ulid::new().to_string()
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Display order used by the matrix and statistics views.
    pub const DESCENDING: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!("Unknown priority: {s}")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_in: Option<String>,
}

impl Profile {
    /// Overlay every field that is set in `patch`.
    pub fn merge(&mut self, patch: Profile) {
        if patch.photo.is_some() {
            self.photo = patch.photo;
        }
        if patch.age.is_some() {
            self.age = patch.age;
        }
        if patch.country.is_some() {
            self.country = patch.country;
        }
        if patch.degree.is_some() {
            self.degree = patch.degree;
        }
        if patch.profession.is_some() {
            self.profession = patch.profession;
        }
        if patch.linked_in.is_some() {
            self.linked_in = patch.linked_in;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2id PHC string; plaintext is never stored.
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub created_at: DateTime<Utc>,
}

/// User record without credentials, safe to hand to presentation layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            profile: user.profile.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub subcategory_id: String,
    pub progress: u8,
    #[serde(default)]
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
}

impl Target {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        category_id: impl Into<String>,
        subcategory_id: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            category_id: category_id.into(),
            subcategory_id: subcategory_id.into(),
            progress: 0,
            actions: Vec::new(),
            created_at: Utc::now(),
            user_id: user_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub title: String,
    pub urgency: Priority,
    pub impact: Priority,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    pub progress: u8,
    pub target_id: String,
}

impl Action {
    pub fn new(title: impl Into<String>, urgency: Priority, impact: Priority) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            urgency,
            impact,
            steps: Vec::new(),
            obstacles: Vec::new(),
            progress: 0,
            target_id: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub description: String,
    pub completed: bool,
    pub progress: u8,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub action_id: String,
}

impl Step {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            completed: false,
            progress: 0,
            tasks: Vec::new(),
            action_id: String::new(),
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub description: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    pub step_id: String,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            completed: false,
            deadline: None,
            step_id: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Obstacle {
    pub id: String,
    pub description: String,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_resolutions: Option<Vec<String>>,
    pub action_id: String,
}

impl Obstacle {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            resolved: false,
            resolution: None,
            resolution_date: None,
            suggested_resolutions: None,
            action_id: String::new(),
        }
    }
}

// Partial updates. Unset fields leave the stored value untouched; ids and
// back-references are not patchable.

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub progress: Option<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionPatch {
    pub title: Option<String>,
    pub urgency: Option<Priority>,
    pub impact: Option<Priority>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepPatch {
    pub description: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObstaclePatch {
    pub description: Option<String>,
    pub suggested_resolutions: Option<Vec<String>>,
}

/// Full persisted state. Sequences keep insertion order so a save/load
/// round-trip reproduces the same tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_id: Option<String>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Favorite target ids keyed by viewer.
    #[serde(default)]
    pub favorites: BTreeMap<String, Vec<String>>,
}
