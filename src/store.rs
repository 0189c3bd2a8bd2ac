//! Task store abstraction and hosted-database client.
//!
//! The orchestrator talks to the store through the narrow [`TaskStore`]
//! trait so the processor and scheduler can run against in-memory doubles
//! in tests. [`HttpTaskStore`] is the live implementation over the hosted
//! task database's HTTP API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::task::Task;
use crate::workflow::Stage;

/// Maximum characters accepted per annotation or text property by the store.
pub const ANNOTATION_MAX_CHARS: usize = 2000;

/// Property name holding the task title.
pub const TITLE_PROPERTY: &str = "Name";

/// Property name holding the workflow stage.
pub const STAGE_PROPERTY: &str = "Status";

/// Property name the plan text is written back to.
pub const PLAN_PROPERTY: &str = "PlanOutput";

/// Truncate text to the store's annotation limit, on a char boundary.
#[must_use]
pub fn truncate_annotation(text: &str) -> &str {
    match text.char_indices().nth(ANNOTATION_MAX_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Which wire shape the store uses for its stage field.
///
/// The hosted database migrated its stage column from a select field to a
/// dedicated status field at some point; deployments against an older
/// database can flip this back. Exactly one shape is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFieldKind {
    /// Dedicated status field (current schema).
    Status,
    /// Plain select field (legacy schema).
    Select,
}

impl StatusFieldKind {
    /// The field key used in filters and property writes.
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Select => "select",
        }
    }
}

/// Narrow interface to the external task store.
///
/// Implementations are expected to be externally synchronized; the
/// orchestrator performs no compare-and-swap on stage values.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Query all tasks currently sitting in `stage`.
    ///
    /// Malformed records are dropped with a diagnostic log, never an error.
    async fn query_by_stage(&self, stage: Stage) -> Result<Vec<Task>>;

    /// Unconditionally overwrite the task's stage.
    async fn set_stage(&self, id: &str, stage: Stage) -> Result<()>;

    /// Append a free-text annotation to the task record.
    ///
    /// Text is truncated to [`ANNOTATION_MAX_CHARS`] before sending.
    async fn append_annotation(&self, id: &str, text: &str) -> Result<()>;

    /// Set a free-text property on the task record, with the same
    /// truncation rule as annotations.
    async fn set_text_property(&self, id: &str, property: &str, text: &str) -> Result<()>;
}

/// Live task store client over the hosted database HTTP API.
pub struct HttpTaskStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
    database_id: String,
    field_kind: StatusFieldKind,
}

impl HttpTaskStore {
    /// Create a client for one database.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        database_id: impl Into<String>,
        field_kind: StatusFieldKind,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            database_id: database_id.into(),
            field_kind,
        }
    }

    /// The database this client reads and writes.
    #[must_use]
    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    fn stage_filter(&self, stage: Stage) -> Value {
        json!({
            "property": STAGE_PROPERTY,
            (self.field_kind.wire_name()): { "equals": stage.as_str() },
        })
    }

    fn stage_write(&self, stage: Stage) -> Value {
        json!({
            (STAGE_PROPERTY): {
                (self.field_kind.wire_name()): { "name": stage.as_str() },
            },
        })
    }

    fn text_write(property: &str, text: &str) -> Value {
        json!({
            (property): {
                "rich_text": [
                    { "type": "text", "text": { "content": truncate_annotation(text) } },
                ],
            },
        })
    }

    async fn patch_page(&self, id: &str, properties: Value, operation: &str) -> Result<()> {
        let url = format!("{}/pages/{}", self.base_url, id);
        self.client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "properties": properties }))
            .send()
            .await
            .with_context(|| format!("store {operation} request failed for {id}"))?
            .error_for_status()
            .with_context(|| format!("store rejected {operation} for {id}"))?;
        Ok(())
    }

    /// Convert one query result record into a [`Task`].
    ///
    /// Records missing their identifier or title, or carrying a stage token
    /// outside the known 14, are dropped with a warning so a single bad
    /// record can never fail the batch.
    fn parse_record(&self, record: &Value) -> Option<Task> {
        let id = match record.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                warn!("dropping store record without an id");
                return None;
            }
        };

        let Some(props) = record.get("properties") else {
            warn!(record = %id, "dropping store record without properties");
            return None;
        };

        let name = match title_text(props) {
            Some(name) if !name.is_empty() => name,
            _ => {
                warn!(record = %id, "dropping store record without a title");
                return None;
            }
        };

        let stage_token = props
            .get(STAGE_PROPERTY)
            .and_then(|p| p.get(self.field_kind.wire_name()))
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let stage = match stage_token.parse::<Stage>() {
            Ok(stage) => stage,
            Err(_) => {
                warn!(record = %id, token = stage_token, "dropping store record with unknown stage");
                return None;
            }
        };

        let repository = props
            .get("Repository")
            .and_then(|p| p.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| rich_text(props, "Repository"));

        Some(Task {
            id,
            name,
            stage,
            description: rich_text(props, "Description").unwrap_or_default(),
            project_path: rich_text(props, "ProjectPath").unwrap_or_default(),
            repository,
            branch: rich_text(props, "Branch"),
            plan_output: rich_text(props, PLAN_PROPERTY),
            error: rich_text(props, "Error"),
            session_id: None,
        })
    }
}

/// Extract the plain title string from a record's title property.
fn title_text(props: &Value) -> Option<String> {
    let content = props
        .get(TITLE_PROPERTY)?
        .get("title")?
        .as_array()?
        .first()?
        .get("text")?
        .get("content")?
        .as_str()?;
    Some(content.replace('\0', ""))
}

/// Extract plain text from a rich-text property, stripping NUL bytes.
fn rich_text(props: &Value, property: &str) -> Option<String> {
    let content = props
        .get(property)?
        .get("rich_text")?
        .as_array()?
        .first()?
        .get("text")?
        .get("content")?
        .as_str()?;
    if content.is_empty() {
        return None;
    }
    Some(content.replace('\0', ""))
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn query_by_stage(&self, stage: Stage) -> Result<Vec<Task>> {
        debug!(stage = %stage, database = %self.database_id, "querying task store");
        let url = format!("{}/databases/{}/query", self.base_url, self.database_id);
        let payload: Value = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "filter": self.stage_filter(stage) }))
            .send()
            .await
            .context("store query request failed")?
            .error_for_status()
            .context("store rejected query")?
            .json()
            .await
            .context("store query response was not valid JSON")?;

        let tasks: Vec<Task> = payload
            .get("results")
            .and_then(Value::as_array)
            .map(|records| {
                records
                    .iter()
                    .filter_map(|record| self.parse_record(record))
                    .collect()
            })
            .unwrap_or_default();

        debug!(stage = %stage, count = tasks.len(), "query complete");
        Ok(tasks)
    }

    async fn set_stage(&self, id: &str, stage: Stage) -> Result<()> {
        debug!(record = %id, stage = %stage, "updating task stage");
        self.patch_page(id, self.stage_write(stage), "stage update").await
    }

    async fn append_annotation(&self, id: &str, text: &str) -> Result<()> {
        debug!(record = %id, "appending annotation");
        let url = format!("{}/comments", self.base_url);
        self.client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({
                "parent": { "page_id": id },
                "rich_text": [
                    { "type": "text", "text": { "content": truncate_annotation(text) } },
                ],
            }))
            .send()
            .await
            .with_context(|| format!("store annotation request failed for {id}"))?
            .error_for_status()
            .with_context(|| format!("store rejected annotation for {id}"))?;
        Ok(())
    }

    async fn set_text_property(&self, id: &str, property: &str, text: &str) -> Result<()> {
        debug!(record = %id, property, "updating text property");
        self.patch_page(id, Self::text_write(property, text), "property update")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(kind: StatusFieldKind) -> HttpTaskStore {
        HttpTaskStore::new("https://store.example/v1", "secret", "db-1", kind)
    }

    fn record(id: &str, name: &str, stage_token: &str) -> Value {
        json!({
            "id": id,
            "properties": {
                "Name": { "title": [ { "text": { "content": name } } ] },
                "Status": { "status": { "name": stage_token } },
                "Description": { "rich_text": [ { "text": { "content": "desc" } } ] },
                "ProjectPath": { "rich_text": [ { "text": { "content": "/srv/proj" } } ] },
            },
        })
    }

    #[test]
    fn test_truncate_annotation_limits_chars() {
        let long = "x".repeat(ANNOTATION_MAX_CHARS + 50);
        assert_eq!(truncate_annotation(&long).chars().count(), ANNOTATION_MAX_CHARS);
        assert_eq!(truncate_annotation("short"), "short");
    }

    #[test]
    fn test_truncate_annotation_char_boundary() {
        let long = "é".repeat(ANNOTATION_MAX_CHARS + 1);
        let cut = truncate_annotation(&long);
        assert_eq!(cut.chars().count(), ANNOTATION_MAX_CHARS);
        assert!(long.is_char_boundary(cut.len()));
    }

    #[test]
    fn test_parse_record_full() {
        let task = store(StatusFieldKind::Status)
            .parse_record(&record("page-1", "Add parser", "ToPlan"))
            .unwrap();
        assert_eq!(task.id, "page-1");
        assert_eq!(task.name, "Add parser");
        assert_eq!(task.stage, Stage::ToPlan);
        assert_eq!(task.description, "desc");
        assert_eq!(task.project_path, "/srv/proj");
        assert!(task.plan_output.is_none());
    }

    #[test]
    fn test_parse_record_unknown_stage_dropped() {
        let value = record("page-1", "Add parser", "InProgress");
        assert!(store(StatusFieldKind::Status).parse_record(&value).is_none());
    }

    #[test]
    fn test_parse_record_missing_title_dropped() {
        let value = json!({
            "id": "page-2",
            "properties": {
                "Status": { "status": { "name": "ToPlan" } },
            },
        });
        assert!(store(StatusFieldKind::Status).parse_record(&value).is_none());
    }

    #[test]
    fn test_parse_record_missing_properties_dropped() {
        let value = json!({ "id": "page-9" });
        assert!(store(StatusFieldKind::Status).parse_record(&value).is_none());
    }

    #[test]
    fn test_parse_record_select_schema() {
        let value = json!({
            "id": "page-3",
            "properties": {
                "Name": { "title": [ { "text": { "content": "Legacy task" } } ] },
                "Status": { "select": { "name": "ReadyToImplement" } },
            },
        });
        let task = store(StatusFieldKind::Select).parse_record(&value).unwrap();
        assert_eq!(task.stage, Stage::ReadyToImplement);
    }

    #[test]
    fn test_stage_filter_shapes() {
        let status = store(StatusFieldKind::Status).stage_filter(Stage::ToPlan);
        assert_eq!(status["status"]["equals"], "ToPlan");
        let select = store(StatusFieldKind::Select).stage_filter(Stage::ToPlan);
        assert_eq!(select["select"]["equals"], "ToPlan");
    }

    #[test]
    fn test_rich_text_strips_nul_bytes() {
        let props = json!({
            "Branch": { "rich_text": [ { "text": { "content": "fe\0ature" } } ] },
        });
        assert_eq!(rich_text(&props, "Branch").as_deref(), Some("feature"));
    }
}
