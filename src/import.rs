//! Creation orchestrator: turns a document into an ordered sequence of
//! remote operations.
//!
//! Execution is strictly sequential: milestones referenced by section
//! headings are ensured before any item creation (issues embed a milestone
//! reference), then every work item is processed to completion before the
//! next one is looked at. Any remote failure aborts the run immediately; the
//! report and log output tell the operator what had been created up to that
//! point.

use thiserror::Error;
use tracing::{debug, info};

use crate::annotate::FieldValue;
use crate::markup::{ConvertError, MarkupConverter};
use crate::schema::SchemaCache;
use crate::tracker::{FieldKind, FieldSetting, NewDraftItem, NewIssue, Tracker, TrackerError};
use crate::walk::{grouping_labels, work_items, WorkItem};

pub const DEFAULT_STATUS_FIELD: &str = "status";
pub const DEFAULT_STATUS_VALUE: &str = "Todo";

/// Where and how the document's work items are created.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportTarget {
    /// One issue per leaf; section headings become milestones; optionally
    /// links every issue to a board and applies its fields there.
    Issues {
        owner: String,
        repo: String,
        board: Option<String>,
    },
    /// Draft board items only. Labels are unsupported on drafts and are
    /// silently dropped; `milestone_field` optionally receives each item's
    /// section heading as a board field value.
    Drafts {
        board: String,
        milestone_field: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("document contains no recognizable sections")]
    MalformedDocument,
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("work item '{item}': unknown field '{field}'")]
    UnknownField { item: String, field: String },
    #[error("work item '{item}': field '{field}' has no option matching '{value}'")]
    InvalidOption {
        item: String,
        field: String,
        value: String,
    },
    #[error("work item '{item}': unknown user '{login}'")]
    UnknownUser { item: String, login: String },
    #[error("work item '{item}': {source}")]
    Remote { item: String, source: TrackerError },
    #[error("milestone '{milestone}': {source}")]
    Milestone {
        milestone: String,
        source: TrackerError,
    },
}

/// What one run created, for audit output.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub milestones: Vec<String>,
    pub items: Vec<ImportedItem>,
}

#[derive(Debug)]
pub struct ImportedItem {
    pub title: String,
    pub entity_id: String,
    pub board_item_id: Option<String>,
    /// Annotation labels that did not make it onto the created entity:
    /// unmatched on the repository, or any label on a draft item.
    pub skipped_labels: Vec<String>,
}

/// Entrypoint: converts `input` and creates every work item on the tracker.
pub async fn run_import<C, T>(
    converter: &C,
    tracker: &T,
    target: &ImportTarget,
    input: &[u8],
) -> Result<ImportReport, ImportError>
where
    C: MarkupConverter,
    T: Tracker,
{
    let document = converter.to_tree(input)?;
    let groupings = grouping_labels(&document);
    if groupings.is_empty() {
        return Err(ImportError::MalformedDocument);
    }

    let mut cache = SchemaCache::new(tracker);
    let mut report = ImportReport::default();

    if let ImportTarget::Issues { owner, repo, .. } = target {
        // Issue creation embeds a milestone reference, so every grouping
        // must exist before the first item is created.
        for label in &groupings {
            let milestone = cache
                .ensure_milestone(owner, repo, label)
                .await
                .map_err(|source| ImportError::Milestone {
                    milestone: label.clone(),
                    source,
                })?;
            info!(milestone = %milestone.title, number = milestone.number, "milestone ready");
            report.milestones.push(milestone.title);
        }
    }

    for item in work_items(&document, converter) {
        let imported = match target {
            ImportTarget::Issues { owner, repo, board } => {
                import_issue(tracker, &mut cache, owner, repo, board.as_deref(), &item).await?
            }
            ImportTarget::Drafts {
                board,
                milestone_field,
            } => import_draft(tracker, &mut cache, board, milestone_field.as_deref(), &item).await?,
        };
        report.items.push(imported);
    }

    info!(items = report.items.len(), "import finished");
    Ok(report)
}

async fn import_issue<T: Tracker>(
    tracker: &T,
    cache: &mut SchemaCache<'_, T>,
    owner: &str,
    repo: &str,
    board: Option<&str>,
    item: &WorkItem,
) -> Result<ImportedItem, ImportError> {
    let assignee_ids = resolve_assignees(cache, item).await?;
    let labels = list_field(item, "labels");
    let milestone = cache
        .milestone(owner, repo, &item.grouping)
        .await
        .map_err(|source| remote(item, source))?
        .ok_or_else(|| {
            remote(
                item,
                TrackerError::Remote(format!(
                    "milestone '{}' not visible after pre-pass",
                    item.grouping
                )),
            )
        })?;

    info!(title = %item.title, milestone = %milestone.title, "creating issue");
    let issue = tracker
        .create_issue(NewIssue {
            owner,
            repo,
            title: &item.title,
            body: &item.body,
            assignee_ids: &assignee_ids,
            labels: &labels,
            milestone_id: Some(&milestone.id),
        })
        .await
        .map_err(|source| remote(item, source))?;
    debug!(number = issue.number, id = %issue.id, "issue created");

    let mut board_item_id = None;
    if let Some(board_id) = board {
        let linked = tracker
            .link_issue_to_board(&issue.id, board_id)
            .await
            .map_err(|source| remote(item, source))?;
        apply_fields(tracker, cache, board_id, &linked, item, None).await?;
        board_item_id = Some(linked);
    }

    Ok(ImportedItem {
        title: item.title.clone(),
        entity_id: issue.id,
        board_item_id,
        skipped_labels: issue.skipped_labels,
    })
}

async fn import_draft<T: Tracker>(
    tracker: &T,
    cache: &mut SchemaCache<'_, T>,
    board_id: &str,
    milestone_field: Option<&str>,
    item: &WorkItem,
) -> Result<ImportedItem, ImportError> {
    let assignee_ids = resolve_assignees(cache, item).await?;
    let skipped_labels = list_field(item, "labels");
    if !skipped_labels.is_empty() {
        debug!(title = %item.title, "draft items cannot carry labels, dropping");
    }

    info!(title = %item.title, "creating draft board item");
    let item_id = tracker
        .create_draft_item(NewDraftItem {
            board_id,
            title: &item.title,
            body: &item.body,
            assignee_ids: &assignee_ids,
        })
        .await
        .map_err(|source| remote(item, source))?;

    apply_fields(tracker, cache, board_id, &item_id, item, milestone_field).await?;

    Ok(ImportedItem {
        title: item.title.clone(),
        entity_id: item_id.clone(),
        board_item_id: Some(item_id),
        skipped_labels,
    })
}

/// Applies every annotation field except `assignees`/`labels` to the board
/// item, plus the optional milestone field, plus the default status when the
/// document gave none.
async fn apply_fields<T: Tracker>(
    tracker: &T,
    cache: &mut SchemaCache<'_, T>,
    board_id: &str,
    item_id: &str,
    item: &WorkItem,
    milestone_field: Option<&str>,
) -> Result<(), ImportError> {
    if let Some(name) = milestone_field {
        let grouping = FieldValue::Scalar(item.grouping.clone());
        apply_one(tracker, cache, board_id, item_id, item, name, &grouping).await?;
    }

    let mut status_given = false;
    for (key, value) in &item.fields {
        if key == "assignees" || key == "labels" {
            continue;
        }
        if key == DEFAULT_STATUS_FIELD {
            status_given = true;
        }
        apply_one(tracker, cache, board_id, item_id, item, key, value).await?;
    }

    if !status_given {
        let default = FieldValue::Scalar(DEFAULT_STATUS_VALUE.to_string());
        apply_one(
            tracker,
            cache,
            board_id,
            item_id,
            item,
            DEFAULT_STATUS_FIELD,
            &default,
        )
        .await?;
    }
    Ok(())
}

async fn apply_one<T: Tracker>(
    tracker: &T,
    cache: &mut SchemaCache<'_, T>,
    board_id: &str,
    item_id: &str,
    item: &WorkItem,
    key: &str,
    value: &FieldValue,
) -> Result<(), ImportError> {
    let field = cache
        .field(board_id, key)
        .await
        .map_err(|source| remote(item, source))?
        .ok_or_else(|| ImportError::UnknownField {
            item: item.title.clone(),
            field: key.to_string(),
        })?;

    let setting = match (&field.kind, value) {
        (FieldKind::Number, FieldValue::Number(number)) => FieldSetting::Number(*number as f64),
        (FieldKind::SingleSelect { options }, _) => {
            let text = value_text(value);
            let matched = options
                .iter()
                .find(|option| option.name.eq_ignore_ascii_case(&text))
                .ok_or_else(|| ImportError::InvalidOption {
                    item: item.title.clone(),
                    field: field.name.clone(),
                    value: text.clone(),
                })?;
            FieldSetting::SingleSelectOption(matched.id.clone())
        }
        // Plain text, and numeric fields given non-numeric values.
        _ => FieldSetting::Text(value_text(value)),
    };

    debug!(title = %item.title, field = %field.name, ?setting, "setting board field");
    tracker
        .set_field_value(board_id, item_id, &field.id, setting)
        .await
        .map_err(|source| remote(item, source))
}

async fn resolve_assignees<T: Tracker>(
    cache: &mut SchemaCache<'_, T>,
    item: &WorkItem,
) -> Result<Vec<String>, ImportError> {
    let logins = list_field(item, "assignees");
    let mut ids = Vec::with_capacity(logins.len());
    for login in &logins {
        let id = cache.user(login).await.map_err(|source| match source {
            TrackerError::UnknownUser(login) => ImportError::UnknownUser {
                item: item.title.clone(),
                login,
            },
            other => remote(item, other),
        })?;
        ids.push(id);
    }
    Ok(ids)
}

fn list_field(item: &WorkItem, key: &str) -> Vec<String> {
    match item.fields.get(key) {
        Some(FieldValue::List(values)) => values.clone(),
        Some(FieldValue::Scalar(value)) => vec![value.clone()],
        _ => Vec::new(),
    }
}

fn remote(item: &WorkItem, source: TrackerError) -> ImportError {
    ImportError::Remote {
        item: item.title.clone(),
        source,
    }
}

fn value_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Scalar(text) => text.clone(),
        FieldValue::Number(number) => number.to_string(),
        FieldValue::List(values) => values.join(", "),
    }
}
