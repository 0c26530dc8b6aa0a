use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Which of the two store mappings an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletableType {
    Project,
    Task,
}

impl CompletableType {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletableType::Project => "project",
            CompletableType::Task => "task",
        }
    }
}

impl std::fmt::Display for CompletableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An editable property of a [`Completable`], named by its wire key.
///
/// Used by property-scoped listeners (fire only when this field changed) and
/// by the patch echo comparison (compare only fields the client owns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Note,
    StartDate,
    DueDate,
    CompletedDate,
    Priority,
    Completed,
    Subtasks,
    PrereqTasks,
    Tags,
}

impl Field {
    /// Every editable field, in wire order.
    pub const ALL: [Field; 10] = [
        Field::Title,
        Field::Note,
        Field::StartDate,
        Field::DueDate,
        Field::CompletedDate,
        Field::Priority,
        Field::Completed,
        Field::Subtasks,
        Field::PrereqTasks,
        Field::Tags,
    ];

    /// The JSON key for this field
    pub fn key(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Note => "note",
            Field::StartDate => "startDate",
            Field::DueDate => "dueDate",
            Field::CompletedDate => "completedDate",
            Field::Priority => "priority",
            Field::Completed => "completed",
            Field::Subtasks => "subtasks",
            Field::PrereqTasks => "prereqTasks",
            Field::Tags => "tags",
        }
    }

    /// Snapshot this field's current value on `completable` as JSON.
    pub fn value_of(self, completable: &Completable) -> Value {
        fn date(d: &Option<DateTime<Utc>>) -> Value {
            match d {
                // millisecond grain: servers store and echo dates at that
                // precision, and finer local precision must not read as a
                // change
                Some(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
                None => Value::Null,
            }
        }
        fn ids(v: &[String]) -> Value {
            Value::Array(v.iter().map(|s| Value::String(s.clone())).collect())
        }
        match self {
            Field::Title => Value::String(completable.title.clone()),
            Field::Note => Value::String(completable.note.clone()),
            Field::StartDate => date(&completable.start_date),
            Field::DueDate => date(&completable.due_date),
            Field::CompletedDate => date(&completable.completed_date),
            Field::Priority => Value::from(completable.priority),
            Field::Completed => Value::Bool(completable.completed),
            Field::Subtasks => ids(&completable.subtasks),
            Field::PrereqTasks => ids(&completable.prereq_tasks),
            Field::Tags => ids(&completable.tags),
        }
    }
}

/// The shared shape of a project and a task as stored in the database.
///
/// Hierarchy is by weak reference: `subtasks` and `prereq_tasks` hold entity
/// IDs, and the store (not the parent) owns the child records. Wire dates are
/// ISO-8601 strings; serde re-hydrates them into `DateTime<Utc>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completable {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub note: String,
    #[serde(default = "Utc::now")]
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: i32,
    /// Documents created before this field existed may lack it or hold a
    /// non-boolean; anything but `true` deserializes as `false`.
    #[serde(default, deserialize_with = "completed_or_false")]
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<String>,
    /// Task IDs that should logically complete before this one (tasks only;
    /// stays empty on projects).
    #[serde(default)]
    pub prereq_tasks: Vec<String>,
    /// Tag IDs referencing the owning user's tag dictionary.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Completable {
    /// Create a blank completable with the given identity and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Completable {
            id: id.into(),
            title: title.into(),
            note: String::new(),
            date_created: Utc::now(),
            start_date: None,
            due_date: None,
            completed_date: None,
            priority: 0,
            completed: false,
            subtasks: Vec::new(),
            prereq_tasks: Vec::new(),
            tags: Vec::new(),
        }
    }
}

fn completed_or_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(matches!(value, Value::Bool(true)))
}
