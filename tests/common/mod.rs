//! Recording fake tracker for end-to-end import tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tasklift::tracker::{
    BoardField, FieldKind, FieldOption, FieldSetting, IssueHandle, Milestone, NewDraftItem,
    NewIssue, Tracker, TrackerError,
};

/// One remote operation, recorded in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    ListMilestones {
        owner: String,
        repo: String,
    },
    CreateMilestone {
        owner: String,
        repo: String,
        title: String,
    },
    CreateIssue {
        title: String,
        body: String,
        assignee_ids: Vec<String>,
        labels: Vec<String>,
        milestone_id: Option<String>,
    },
    LinkIssue {
        issue_id: String,
        board_id: String,
    },
    CreateDraft {
        board_id: String,
        title: String,
        body: String,
        assignee_ids: Vec<String>,
    },
    ResolveUser {
        login: String,
    },
    ListFields {
        board_id: String,
    },
    SetField {
        board_id: String,
        item_id: String,
        field_id: String,
        value: FieldSetting,
    },
}

pub struct FakeTracker {
    milestones: Mutex<Vec<Milestone>>,
    fields: Vec<BoardField>,
    users: HashMap<String, String>,
    /// When set, issue labels outside this list come back as skipped.
    known_labels: Option<Vec<String>>,
    ops: Mutex<Vec<Op>>,
    counter: AtomicI64,
}

impl FakeTracker {
    pub fn new(fields: Vec<BoardField>, users: &[(&str, &str)]) -> Self {
        Self {
            milestones: Mutex::new(Vec::new()),
            fields,
            users: users
                .iter()
                .map(|(login, id)| (login.to_string(), id.to_string()))
                .collect(),
            known_labels: None,
            ops: Mutex::new(Vec::new()),
            counter: AtomicI64::new(0),
        }
    }

    pub fn with_known_labels(mut self, labels: &[&str]) -> Self {
        self.known_labels = Some(labels.iter().map(|label| label.to_string()).collect());
        self
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }

    fn next(&self) -> i64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl Tracker for FakeTracker {
    async fn list_milestones(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Milestone>, TrackerError> {
        self.record(Op::ListMilestones {
            owner: owner.to_string(),
            repo: repo.to_string(),
        });
        Ok(self.milestones.lock().unwrap().clone())
    }

    async fn create_milestone(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
    ) -> Result<Milestone, TrackerError> {
        self.record(Op::CreateMilestone {
            owner: owner.to_string(),
            repo: repo.to_string(),
            title: title.to_string(),
        });
        let number = self.next();
        let milestone = Milestone {
            id: format!("M{number}"),
            number,
            title: title.to_string(),
        };
        self.milestones.lock().unwrap().push(milestone.clone());
        Ok(milestone)
    }

    async fn create_issue<'a>(&self, req: NewIssue<'a>) -> Result<IssueHandle, TrackerError> {
        self.record(Op::CreateIssue {
            title: req.title.to_string(),
            body: req.body.to_string(),
            assignee_ids: req.assignee_ids.to_vec(),
            labels: req.labels.to_vec(),
            milestone_id: req.milestone_id.map(str::to_string),
        });
        let skipped_labels = match &self.known_labels {
            Some(known) => req
                .labels
                .iter()
                .filter(|label| !known.iter().any(|k| k.eq_ignore_ascii_case(label)))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        let number = self.next();
        Ok(IssueHandle {
            id: format!("I{number}"),
            number,
            url: format!("https://example.test/issues/{number}"),
            skipped_labels,
        })
    }

    async fn link_issue_to_board(
        &self,
        issue_id: &str,
        board_id: &str,
    ) -> Result<String, TrackerError> {
        self.record(Op::LinkIssue {
            issue_id: issue_id.to_string(),
            board_id: board_id.to_string(),
        });
        Ok(format!("BI{}", self.next()))
    }

    async fn create_draft_item<'a>(&self, req: NewDraftItem<'a>) -> Result<String, TrackerError> {
        self.record(Op::CreateDraft {
            board_id: req.board_id.to_string(),
            title: req.title.to_string(),
            body: req.body.to_string(),
            assignee_ids: req.assignee_ids.to_vec(),
        });
        Ok(format!("BI{}", self.next()))
    }

    async fn resolve_user(&self, login: &str) -> Result<String, TrackerError> {
        self.record(Op::ResolveUser {
            login: login.to_string(),
        });
        self.users
            .get(login)
            .cloned()
            .ok_or_else(|| TrackerError::UnknownUser(login.to_string()))
    }

    async fn list_board_fields(&self, board_id: &str) -> Result<Vec<BoardField>, TrackerError> {
        self.record(Op::ListFields {
            board_id: board_id.to_string(),
        });
        Ok(self.fields.clone())
    }

    async fn set_field_value(
        &self,
        board_id: &str,
        item_id: &str,
        field_id: &str,
        value: FieldSetting,
    ) -> Result<(), TrackerError> {
        self.record(Op::SetField {
            board_id: board_id.to_string(),
            item_id: item_id.to_string(),
            field_id: field_id.to_string(),
            value,
        });
        Ok(())
    }
}

/// Field catalog shared by most scenarios: single-select Status, numeric
/// Points, free-text Epic.
pub fn standard_fields() -> Vec<BoardField> {
    vec![
        BoardField {
            id: "F-status".into(),
            name: "Status".into(),
            kind: FieldKind::SingleSelect {
                options: vec![
                    FieldOption {
                        id: "O-todo".into(),
                        name: "Todo".into(),
                    },
                    FieldOption {
                        id: "O-progress".into(),
                        name: "In Progress".into(),
                    },
                    FieldOption {
                        id: "O-done".into(),
                        name: "Done".into(),
                    },
                ],
            },
        },
        BoardField {
            id: "F-points".into(),
            name: "Points".into(),
            kind: FieldKind::Number,
        },
        BoardField {
            id: "F-epic".into(),
            name: "Epic".into(),
            kind: FieldKind::Text,
        },
    ]
}
