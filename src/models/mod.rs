//! Data models for the insights dashboard.
//!
//! This module defines the read-only entity records and the mutable selection:
//! - `Group` - Top-level grouping of projects
//! - `Project` - Work container with status, owner and member lists
//! - `User` - A person who can own, access or work on projects
//! - `Task` - Work item under a project with assignees and due date
//! - `Selection` - The three facet sets (groups, projects, users)
//!
//! Upstream records are loosely typed: identifiers arrive as `_id` or `id`,
//! relational fields as bare ids, numbers or embedded records, and field names
//! in snake_case or camelCase. All of that is normalized here, at the serde
//! boundary, so the rest of the crate only ever sees bare `String` ids.

pub mod graph;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Project lifecycle status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProjectStatus {
    #[default]
    Ongoing,
    OnHold,
    Completed,
    Closed,
    /// Any status string we do not recognize; treated as open.
    Other(String),
}

impl ProjectStatus {
    /// A project is closed iff it is completed or closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Closed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProjectStatus::Ongoing => "ongoing",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Closed => "closed",
            ProjectStatus::Other(raw) => raw,
        }
    }

    /// Human label used in option badges.
    pub fn label(&self) -> &str {
        match self {
            ProjectStatus::Ongoing => "Ongoing",
            ProjectStatus::OnHold => "On hold",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Closed => "Closed",
            ProjectStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for ProjectStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "ongoing" => ProjectStatus::Ongoing,
            "on_hold" | "hold" => ProjectStatus::OnHold,
            "completed" => ProjectStatus::Completed,
            "closed" => ProjectStatus::Closed,
            _ => ProjectStatus::Other(raw),
        }
    }
}

impl From<ProjectStatus> for String {
    fn from(status: ProjectStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task status in the workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Hold,
    Review,
    Blocked,
    Completed,
    Other(String),
}

impl TaskStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Hold => "hold",
            TaskStatus::Review => "review",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Completed => "completed",
            TaskStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "not_started" | "todo" => TaskStatus::NotStarted,
            "in_progress" => TaskStatus::InProgress,
            "hold" | "on_hold" => TaskStatus::Hold,
            "review" => TaskStatus::Review,
            "blocked" => TaskStatus::Blocked,
            "completed" | "done" => TaskStatus::Completed,
            _ => TaskStatus::Other(raw),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Task priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            _ => Priority::Medium,
        }
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
        .to_string()
    }
}

/// A group of projects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct Group {
    pub id: String,
    pub name: String,
    /// Informational count as reported upstream; not used for filtering.
    pub project_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl From<RawRecord> for Group {
    fn from(raw: RawRecord) -> Self {
        Self {
            id: raw.id(),
            name: raw.text(&["name"]).unwrap_or_default(),
            project_count: raw.count(&["project_count", "projectCount"]),
            color: raw.text(&["color"]),
        }
    }
}

/// A project owned by a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub status: ProjectStatus,
    pub group_id: Option<String>,
    pub owner_id: Option<String>,
    pub access_user_ids: Vec<String>,
    pub collaborator_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl From<RawRecord> for Project {
    fn from(raw: RawRecord) -> Self {
        Self {
            id: raw.id(),
            name: raw.text(&["name"]).unwrap_or_default(),
            status: raw.lenient(&["status"]),
            group_id: raw.reference(&["group_id", "groupId", "group"]),
            owner_id: raw.reference(&["owner_id", "ownerId", "owner"]),
            access_user_ids: raw.references(&["access_user_ids", "accessUserIds", "access_users"]),
            collaborator_ids: raw.references(&["collaborator_ids", "collaboratorIds", "collaborators"]),
            start_date: raw.datetime(&["start_date", "startDate"]),
            end_date: raw.datetime(&["end_date", "endDate"]),
        }
    }
}

impl Project {
    /// Whether the project is closed (completed or closed status).
    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Every user id directly attached to the project record.
    pub fn direct_member_ids(&self) -> impl Iterator<Item = &String> {
        self.owner_id
            .iter()
            .chain(self.access_user_ids.iter())
            .chain(self.collaborator_ids.iter())
    }

    /// Past its end date and not closed, as of `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_closed() && self.end_date.is_some_and(|end| end < now)
    }
}

/// A person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<RawRecord> for User {
    fn from(raw: RawRecord) -> Self {
        Self {
            id: raw.id(),
            name: raw.text(&["name"]).unwrap_or_default(),
            email: raw.text(&["email"]).unwrap_or_default(),
        }
    }
}

/// A work item under a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct Task {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub project_id: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_by_id: Option<String>,
    pub assignee_ids: Vec<String>,
    pub collaborator_ids: Vec<String>,
}

impl From<RawRecord> for Task {
    fn from(raw: RawRecord) -> Self {
        Self {
            id: raw.id(),
            title: raw.text(&["title"]),
            project_id: raw.reference(&["project_id", "projectId", "project"]),
            status: raw.lenient(&["status"]),
            priority: raw.lenient(&["priority"]),
            due_date: raw.datetime(&["due_date", "dueDate"]),
            assigned_by_id: raw.reference(&["assigned_by_id", "assignedById", "assigned_by"]),
            assignee_ids: raw.references(&["assignee_ids", "assigneeIds", "assignees"]),
            collaborator_ids: raw.references(&["collaborator_ids", "collaboratorIds", "collaborators"]),
        }
    }
}

impl Task {
    /// Every user referenced by the task (assigner, assignees, collaborators).
    pub fn involved_user_ids(&self) -> impl Iterator<Item = &String> {
        self.assigned_by_id
            .iter()
            .chain(self.assignee_ids.iter())
            .chain(self.collaborator_ids.iter())
    }

    /// Past its due date and not completed, as of `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_completed() && self.due_date.is_some_and(|due| due < now)
    }
}

/// The four raw collections supplied by the entity store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default, deserialize_with = "de_records")]
    pub groups: Vec<Group>,
    #[serde(default, deserialize_with = "de_records")]
    pub projects: Vec<Project>,
    #[serde(default, deserialize_with = "de_records")]
    pub users: Vec<User>,
    #[serde(default, deserialize_with = "de_records")]
    pub tasks: Vec<Task>,
}

impl Entities {
    pub fn new(groups: Vec<Group>, projects: Vec<Project>, users: Vec<User>, tasks: Vec<Task>) -> Self {
        Self {
            groups,
            projects,
            users,
            tasks,
        }
        .normalized()
    }

    /// Drop records without an id and keep the first record per id.
    pub fn normalized(mut self) -> Self {
        fn dedup_by_id<T>(items: &mut Vec<T>, id: impl Fn(&T) -> &str) {
            let mut seen = HashSet::new();
            items.retain(|item| {
                let key = id(item);
                !key.is_empty() && seen.insert(key.to_string())
            });
        }
        dedup_by_id(&mut self.groups, |g| &g.id);
        dedup_by_id(&mut self.projects, |p| &p.id);
        dedup_by_id(&mut self.users, |u| &u.id);
        dedup_by_id(&mut self.tasks, |t| &t.id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.projects.is_empty() && self.users.is_empty() && self.tasks.is_empty()
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Projects that can still be picked in a facet (not closed).
    pub fn open_projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter().filter(|p| !p.is_closed())
    }
}

/// One of the three selection axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Group,
    Project,
    User,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facet::Group => write!(f, "group"),
            Facet::Project => write!(f, "project"),
            Facet::User => write!(f, "user"),
        }
    }
}

/// The three facet selections. Sets are deduplicated and order-irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub group_ids: BTreeSet<String>,
    #[serde(default)]
    pub project_ids: BTreeSet<String>,
    #[serde(default)]
    pub user_ids: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_projects<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_users<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.group_ids.is_empty() && self.project_ids.is_empty() && self.user_ids.is_empty()
    }

    pub fn facet(&self, facet: Facet) -> &BTreeSet<String> {
        match facet {
            Facet::Group => &self.group_ids,
            Facet::Project => &self.project_ids,
            Facet::User => &self.user_ids,
        }
    }

    pub fn facet_mut(&mut self, facet: Facet) -> &mut BTreeSet<String> {
        match facet {
            Facet::Group => &mut self.group_ids,
            Facet::Project => &mut self.project_ids,
            Facet::User => &mut self.user_ids,
        }
    }
}

/// A user-driven change to the selection, applied to produce a draft.
///
/// Drafts are never stored; they are always passed through reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SelectionEdit {
    /// Replace one facet with the given ids.
    Set { facet: Facet, ids: Vec<String> },
    /// Add the id if absent, remove it if present.
    Toggle { facet: Facet, id: String },
    /// Empty one facet.
    Clear { facet: Facet },
    /// Empty every facet.
    Reset,
}

impl SelectionEdit {
    /// Produce the draft selection this edit describes on top of `current`.
    pub fn apply_to(&self, current: &Selection) -> Selection {
        let mut draft = current.clone();
        match self {
            SelectionEdit::Set { facet, ids } => {
                *draft.facet_mut(*facet) = ids.iter().filter(|id| !id.is_empty()).cloned().collect();
            }
            SelectionEdit::Toggle { facet, id } => {
                let set = draft.facet_mut(*facet);
                if !set.remove(id) && !id.is_empty() {
                    set.insert(id.clone());
                }
            }
            SelectionEdit::Clear { facet } => draft.facet_mut(*facet).clear(),
            SelectionEdit::Reset => draft = Selection::default(),
        }
        draft
    }
}

// ==================== Boundary normalization ====================

/// Extract a bare identifier from a loosely typed JSON value.
///
/// Accepts strings, numbers, and embedded records carrying `_id`, `id` or `$oid`.
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["_id", "id", "$oid"]
            .iter()
            .find_map(|key| map.get(*key).and_then(id_from_value)),
        _ => None,
    }
}

/// An upstream record as a raw JSON object, read through alias-aware accessors.
///
/// Scalar references take the first key that resolves to an id; list references
/// take the union of every key, so `collaborator_ids` next to an embedded
/// `collaborators` array yields one deduplicated list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    fn get(&self, keys: &[&str]) -> impl Iterator<Item = &Value> {
        keys.iter().filter_map(|key| self.0.get(*key)).filter(|v| !v.is_null())
    }

    fn id(&self) -> String {
        self.reference(&["_id", "id"]).unwrap_or_default()
    }

    fn reference(&self, keys: &[&str]) -> Option<String> {
        self.get(keys).find_map(id_from_value)
    }

    fn references(&self, keys: &[&str]) -> Vec<String> {
        let mut seen = HashSet::new();
        self.get(keys)
            .flat_map(|value| match value {
                Value::Array(items) => items.iter().filter_map(id_from_value).collect::<Vec<_>>(),
                other => id_from_value(other).into_iter().collect(),
            })
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        self.get(keys).find_map(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    fn count(&self, keys: &[&str]) -> u32 {
        self.get(keys)
            .find_map(Value::as_u64)
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0)
    }

    /// String-backed enums fall back to their default for `null` or non-strings.
    fn lenient<T: From<String> + Default>(&self, keys: &[&str]) -> T {
        self.get(keys)
            .find_map(Value::as_str)
            .map(|s| T::from(s.to_string()))
            .unwrap_or_default()
    }

    fn datetime(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        self.get(keys).find_map(|value| match value {
            Value::String(s) => parse_datetime(s),
            Value::Object(map) => map.get("$date").and_then(Value::as_str).and_then(parse_datetime),
            _ => None,
        })
    }
}

/// Collection fields tolerate `null` and skip records that fail to parse.
fn de_records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Parse RFC 3339, naive date-time, or plain date strings as UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
