//! Contract with the remote tracking service.
//!
//! The import engine only ever talks to this trait. The production
//! implementation lives in [`crate::github`]; tests substitute mocks or a
//! recording fake. All methods are treated as atomic request/response
//! operations: there is no retry layer and no mid-call cancellation.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The service has no account for the given login.
    #[error("unknown user: {0}")]
    UnknownUser(String),
    /// Transport- or API-level failure.
    #[error("remote operation failed: {0}")]
    Remote(String),
}

/// A milestone-like grouping entity. Identity is case-insensitive on
/// `title`; `id` is the service's node id, `number` its REST-side handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Milestone {
    pub id: String,
    pub number: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldOption {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Number,
    Text,
    SingleSelect { options: Vec<FieldOption> },
}

/// A custom field defined on a project board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardField {
    pub id: String,
    pub name: String,
    pub kind: FieldKind,
}

/// Value shapes accepted by [`Tracker::set_field_value`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSetting {
    Number(f64),
    Text(String),
    SingleSelectOption(String),
}

/// Request data for creating a repository issue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    /// Resolved user ids, not logins.
    pub assignee_ids: &'a [String],
    /// Label names; resolution against the repository is the client's job.
    pub labels: &'a [String],
    pub milestone_id: Option<&'a str>,
}

/// Request data for creating a draft board item (no backing issue).
#[derive(Debug, Clone, PartialEq)]
pub struct NewDraftItem<'a> {
    pub board_id: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub assignee_ids: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueHandle {
    pub id: String,
    pub number: i64,
    pub url: String,
    /// Requested label names the service could not match, in request order.
    pub skipped_labels: Vec<String>,
}

/// Remote operations the import engine depends on.
///
/// The trait is annotated for `mockall` so consumers can generate
/// deterministic mocks in unit and integration tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait Tracker: Send + Sync {
    async fn list_milestones(&self, owner: &str, repo: &str)
        -> Result<Vec<Milestone>, TrackerError>;

    /// Creates a milestone with the given title, casing preserved.
    async fn create_milestone(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
    ) -> Result<Milestone, TrackerError>;

    async fn create_issue<'a>(&self, req: NewIssue<'a>) -> Result<IssueHandle, TrackerError>;

    /// Places an existing issue on a board, returning the board-item id.
    async fn link_issue_to_board(
        &self,
        issue_id: &str,
        board_id: &str,
    ) -> Result<String, TrackerError>;

    /// Creates a draft board item, returning the board-item id.
    async fn create_draft_item<'a>(&self, req: NewDraftItem<'a>) -> Result<String, TrackerError>;

    /// Resolves a login to a user id; fails with [`TrackerError::UnknownUser`].
    async fn resolve_user(&self, login: &str) -> Result<String, TrackerError>;

    async fn list_board_fields(&self, board_id: &str) -> Result<Vec<BoardField>, TrackerError>;

    async fn set_field_value(
        &self,
        board_id: &str,
        item_id: &str,
        field_id: &str,
        value: FieldSetting,
    ) -> Result<(), TrackerError>;
}
