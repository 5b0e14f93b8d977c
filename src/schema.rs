//! Per-run caches of the remote schema: milestones, board fields, users.
//!
//! All lookups are case-insensitive on names. Milestones are fetched lazily
//! per repository and invalidated whenever one is created, so later lookups
//! in the same run observe it. Field catalogs are fetched once per board and
//! never invalidated: a field added remotely mid-run is invisible, a known
//! limitation.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::tracker::{BoardField, Milestone, Tracker, TrackerError};

pub struct SchemaCache<'a, T: Tracker> {
    tracker: &'a T,
    /// `owner/repo` -> lower-cased title -> milestone.
    milestones: HashMap<String, HashMap<String, Milestone>>,
    /// board id -> lower-cased name -> field.
    fields: HashMap<String, HashMap<String, BoardField>>,
    /// login -> user id.
    users: HashMap<String, String>,
}

impl<'a, T: Tracker> SchemaCache<'a, T> {
    pub fn new(tracker: &'a T) -> Self {
        Self {
            tracker,
            milestones: HashMap::new(),
            fields: HashMap::new(),
            users: HashMap::new(),
        }
    }

    pub async fn milestone(
        &mut self,
        owner: &str,
        repo: &str,
        name: &str,
    ) -> Result<Option<Milestone>, TrackerError> {
        let key = repo_key(owner, repo);
        if !self.milestones.contains_key(&key) {
            self.refresh_milestones(owner, repo).await?;
        }
        Ok(self
            .milestones
            .get(&key)
            .and_then(|by_title| by_title.get(&name.to_lowercase()))
            .cloned())
    }

    /// Returns the milestone named `name`, creating it (casing preserved)
    /// when absent. The cache is refreshed after a creation so the new
    /// milestone is observable before this returns.
    pub async fn ensure_milestone(
        &mut self,
        owner: &str,
        repo: &str,
        name: &str,
    ) -> Result<Milestone, TrackerError> {
        if let Some(existing) = self.milestone(owner, repo, name).await? {
            debug!(milestone = %existing.title, "milestone already present");
            return Ok(existing);
        }
        info!(milestone = name, owner, repo, "creating missing milestone");
        let created = self.tracker.create_milestone(owner, repo, name).await?;
        self.refresh_milestones(owner, repo).await?;
        Ok(created)
    }

    async fn refresh_milestones(&mut self, owner: &str, repo: &str) -> Result<(), TrackerError> {
        let listed = self.tracker.list_milestones(owner, repo).await?;
        debug!(owner, repo, count = listed.len(), "fetched milestones");
        let by_title = listed
            .into_iter()
            .map(|milestone| (milestone.title.to_lowercase(), milestone))
            .collect();
        self.milestones.insert(repo_key(owner, repo), by_title);
        Ok(())
    }

    pub async fn field(
        &mut self,
        board_id: &str,
        name: &str,
    ) -> Result<Option<BoardField>, TrackerError> {
        if !self.fields.contains_key(board_id) {
            let listed = self.tracker.list_board_fields(board_id).await?;
            debug!(board_id, count = listed.len(), "fetched board fields");
            let by_name = listed
                .into_iter()
                .map(|field| (field.name.to_lowercase(), field))
                .collect();
            self.fields.insert(board_id.to_string(), by_name);
        }
        Ok(self
            .fields
            .get(board_id)
            .and_then(|by_name| by_name.get(&name.to_lowercase()))
            .cloned())
    }

    pub async fn user(&mut self, login: &str) -> Result<String, TrackerError> {
        if let Some(id) = self.users.get(login) {
            return Ok(id.clone());
        }
        let id = self.tracker.resolve_user(login).await?;
        debug!(login, id = %id, "resolved user");
        self.users.insert(login.to_string(), id.clone());
        Ok(id)
    }
}

fn repo_key(owner: &str, repo: &str) -> String {
    format!("{owner}/{repo}")
}
