//! GitHub-backed implementation of the [`Tracker`] contract.
//!
//! Milestones go through the REST v3 API (GraphQL has no milestone creation
//! mutation); everything touching ProjectV2 boards, users and issue creation
//! uses the GraphQL v4 API. Authentication is a bearer token from the
//! `GITHUB_TOKEN` environment variable.

use async_trait::async_trait;
use reqwest::header;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::tracker::{
    BoardField, FieldKind, FieldOption, FieldSetting, IssueHandle, Milestone, NewDraftItem,
    NewIssue, Tracker, TrackerError,
};

const REST_URL: &str = "https://api.github.com";
const GRAPHQL_URL: &str = "https://api.github.com/graphql";
const USER_AGENT: &str = concat!("tasklift/", env!("CARGO_PKG_VERSION"));

const REPOSITORY_QUERY: &str = r"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    id
    labels(first: 100) { nodes { id name } }
  }
}";

const CREATE_ISSUE_MUTATION: &str = r"
mutation($input: CreateIssueInput!) {
  createIssue(input: $input) { issue { id number url } }
}";

const LINK_ITEM_MUTATION: &str = r"
mutation($input: AddProjectV2ItemByIdInput!) {
  addProjectV2ItemById(input: $input) { item { id } }
}";

const CREATE_DRAFT_MUTATION: &str = r"
mutation($input: AddProjectV2DraftIssueInput!) {
  addProjectV2DraftIssue(input: $input) { projectItem { id } }
}";

const USER_QUERY: &str = r"
query($login: String!) {
  user(login: $login) { id }
}";

const BOARD_FIELDS_QUERY: &str = r"
query($board: ID!) {
  node(id: $board) {
    ... on ProjectV2 {
      fields(first: 100) {
        nodes {
          ... on ProjectV2Field { id name dataType }
          ... on ProjectV2SingleSelectField { id name dataType options { id name } }
        }
      }
    }
  }
}";

const SET_FIELD_MUTATION: &str = r"
mutation($input: UpdateProjectV2ItemFieldValueInput!) {
  updateProjectV2ItemFieldValue(input: $input) { projectV2Item { id } }
}";

pub struct GitHubClient {
    http: reqwest::Client,
    rest_url: String,
    graphql_url: String,
}

impl GitHubClient {
    /// Builds a client from the `GITHUB_TOKEN` environment variable,
    /// honouring a `.env` file when present.
    pub fn new_from_env() -> Result<Self, TrackerError> {
        dotenvy::dotenv().ok();
        let token = std::env::var("GITHUB_TOKEN")
            .map_err(|_| TrackerError::Remote("GITHUB_TOKEN environment variable not set".into()))?;
        Self::new(&token)
    }

    pub fn new(token: &str) -> Result<Self, TrackerError> {
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TrackerError::Remote(format!("invalid token: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| TrackerError::Remote(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            rest_url: REST_URL.to_string(),
            graphql_url: GRAPHQL_URL.to_string(),
        })
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, TrackerError> {
        let response = self
            .http
            .post(&self.graphql_url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| TrackerError::Remote(format!("GraphQL request failed: {e}")))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| TrackerError::Remote(format!("GraphQL response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(TrackerError::Remote(format!(
                "GraphQL endpoint returned {status}: {payload}"
            )));
        }
        Ok(payload)
    }

    async fn rest_get(&self, path: &str) -> Result<Value, TrackerError> {
        let url = format!("{}{path}", self.rest_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TrackerError::Remote(format!("GET {path} failed: {e}")))?;
        decode_rest(path, response).await
    }

    async fn rest_post(&self, path: &str, body: Value) -> Result<Value, TrackerError> {
        let url = format!("{}{path}", self.rest_url);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TrackerError::Remote(format!("POST {path} failed: {e}")))?;
        decode_rest(path, response).await
    }
}

async fn decode_rest(path: &str, response: reqwest::Response) -> Result<Value, TrackerError> {
    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|e| TrackerError::Remote(format!("response from {path} unreadable: {e}")))?;
    if !status.is_success() {
        return Err(TrackerError::Remote(format!(
            "{status} from {path}: {payload}"
        )));
    }
    Ok(payload)
}

fn check_errors(payload: &Value, context: &str) -> Result<(), TrackerError> {
    match payload.get("errors").and_then(Value::as_array) {
        Some(errors) if !errors.is_empty() => Err(TrackerError::Remote(format!(
            "{context}: {errors:?}"
        ))),
        _ => Ok(()),
    }
}

fn expect_str(payload: &Value, pointer: &str, context: &str) -> Result<String, TrackerError> {
    payload
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            TrackerError::Remote(format!("{context}: unexpected response shape: {payload}"))
        })
}

fn parse_milestone(value: &Value) -> Result<Milestone, TrackerError> {
    let shape = || TrackerError::Remote(format!("unexpected milestone shape: {value}"));
    Ok(Milestone {
        id: value
            .get("node_id")
            .and_then(Value::as_str)
            .ok_or_else(shape)?
            .to_string(),
        number: value.get("number").and_then(Value::as_i64).ok_or_else(shape)?,
        title: value
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(shape)?
            .to_string(),
    })
}

#[async_trait]
impl Tracker for GitHubClient {
    async fn list_milestones(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Milestone>, TrackerError> {
        let payload = self
            .rest_get(&format!(
                "/repos/{owner}/{repo}/milestones?state=all&per_page=100"
            ))
            .await?;
        payload
            .as_array()
            .ok_or_else(|| TrackerError::Remote(format!("milestone list is not an array: {payload}")))?
            .iter()
            .map(parse_milestone)
            .collect()
    }

    async fn create_milestone(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
    ) -> Result<Milestone, TrackerError> {
        let payload = self
            .rest_post(
                &format!("/repos/{owner}/{repo}/milestones"),
                json!({ "title": title }),
            )
            .await?;
        parse_milestone(&payload)
    }

    async fn create_issue<'a>(&self, req: NewIssue<'a>) -> Result<IssueHandle, TrackerError> {
        // Repository node id and label ids only exist on the GraphQL side.
        let repository = self
            .graphql(
                REPOSITORY_QUERY,
                json!({ "owner": req.owner, "name": req.repo }),
            )
            .await?;
        check_errors(&repository, "repository lookup")?;
        let repository_id = expect_str(&repository, "/data/repository/id", "repository lookup")?;

        let mut label_ids = Vec::new();
        let mut skipped_labels = Vec::new();
        let known_labels = repository
            .pointer("/data/repository/labels/nodes")
            .and_then(Value::as_array);
        for wanted in req.labels {
            let found = known_labels.and_then(|nodes| {
                nodes.iter().find(|node| {
                    node.get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|name| name.eq_ignore_ascii_case(wanted))
                })
            });
            match found.and_then(|node| node.get("id")).and_then(Value::as_str) {
                Some(id) => label_ids.push(id.to_string()),
                None => {
                    warn!(label = %wanted, "label not defined on repository, skipping");
                    skipped_labels.push(wanted.clone());
                }
            }
        }

        let mut input = json!({
            "repositoryId": repository_id,
            "title": req.title,
            "body": req.body,
            "assigneeIds": req.assignee_ids,
            "labelIds": label_ids,
        });
        if let Some(milestone_id) = req.milestone_id {
            input["milestoneId"] = json!(milestone_id);
        }

        let payload = self
            .graphql(CREATE_ISSUE_MUTATION, json!({ "input": input }))
            .await?;
        check_errors(&payload, "createIssue")?;
        let handle = IssueHandle {
            id: expect_str(&payload, "/data/createIssue/issue/id", "createIssue")?,
            number: payload
                .pointer("/data/createIssue/issue/number")
                .and_then(Value::as_i64)
                .unwrap_or_default(),
            url: expect_str(&payload, "/data/createIssue/issue/url", "createIssue")?,
            skipped_labels,
        };
        debug!(number = handle.number, url = %handle.url, "issue created");
        Ok(handle)
    }

    async fn link_issue_to_board(
        &self,
        issue_id: &str,
        board_id: &str,
    ) -> Result<String, TrackerError> {
        let payload = self
            .graphql(
                LINK_ITEM_MUTATION,
                json!({ "input": { "projectId": board_id, "contentId": issue_id } }),
            )
            .await?;
        check_errors(&payload, "addProjectV2ItemById")?;
        expect_str(
            &payload,
            "/data/addProjectV2ItemById/item/id",
            "addProjectV2ItemById",
        )
    }

    async fn create_draft_item<'a>(&self, req: NewDraftItem<'a>) -> Result<String, TrackerError> {
        let payload = self
            .graphql(
                CREATE_DRAFT_MUTATION,
                json!({ "input": {
                    "projectId": req.board_id,
                    "title": req.title,
                    "body": req.body,
                    "assigneeIds": req.assignee_ids,
                } }),
            )
            .await?;
        check_errors(&payload, "addProjectV2DraftIssue")?;
        expect_str(
            &payload,
            "/data/addProjectV2DraftIssue/projectItem/id",
            "addProjectV2DraftIssue",
        )
    }

    async fn resolve_user(&self, login: &str) -> Result<String, TrackerError> {
        let payload = self.graphql(USER_QUERY, json!({ "login": login })).await?;
        if let Some(id) = payload.pointer("/data/user/id").and_then(Value::as_str) {
            return Ok(id.to_string());
        }
        let not_found = payload
            .get("errors")
            .and_then(Value::as_array)
            .is_some_and(|errors| {
                errors
                    .iter()
                    .any(|error| error.get("type").and_then(Value::as_str) == Some("NOT_FOUND"))
            });
        if not_found {
            Err(TrackerError::UnknownUser(login.to_string()))
        } else {
            Err(TrackerError::Remote(format!(
                "user lookup for '{login}' returned unexpected response: {payload}"
            )))
        }
    }

    async fn list_board_fields(&self, board_id: &str) -> Result<Vec<BoardField>, TrackerError> {
        let payload = self
            .graphql(BOARD_FIELDS_QUERY, json!({ "board": board_id }))
            .await?;
        check_errors(&payload, "board field listing")?;
        let nodes = payload
            .pointer("/data/node/fields/nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TrackerError::Remote(format!(
                    "board '{board_id}' has no field listing: {payload}"
                ))
            })?;

        let mut fields = Vec::new();
        for node in nodes {
            let (Some(id), Some(name)) = (
                node.get("id").and_then(Value::as_str),
                node.get("name").and_then(Value::as_str),
            ) else {
                // Field types outside the inline fragments come back empty.
                continue;
            };
            let kind = match node.get("dataType").and_then(Value::as_str) {
                Some("NUMBER") => FieldKind::Number,
                Some("SINGLE_SELECT") => {
                    let options = node
                        .get("options")
                        .and_then(Value::as_array)
                        .map(|options| {
                            options
                                .iter()
                                .filter_map(|option| {
                                    Some(FieldOption {
                                        id: option.get("id")?.as_str()?.to_string(),
                                        name: option.get("name")?.as_str()?.to_string(),
                                    })
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    FieldKind::SingleSelect { options }
                }
                _ => FieldKind::Text,
            };
            fields.push(BoardField {
                id: id.to_string(),
                name: name.to_string(),
                kind,
            });
        }
        Ok(fields)
    }

    async fn set_field_value(
        &self,
        board_id: &str,
        item_id: &str,
        field_id: &str,
        value: FieldSetting,
    ) -> Result<(), TrackerError> {
        let value = match value {
            FieldSetting::Number(number) => json!({ "number": number }),
            FieldSetting::Text(text) => json!({ "text": text }),
            FieldSetting::SingleSelectOption(option_id) => {
                json!({ "singleSelectOptionId": option_id })
            }
        };
        let payload = self
            .graphql(
                SET_FIELD_MUTATION,
                json!({ "input": {
                    "projectId": board_id,
                    "itemId": item_id,
                    "fieldId": field_id,
                    "value": value,
                } }),
            )
            .await?;
        check_errors(&payload, "updateProjectV2ItemFieldValue")
    }
}
