//! # GitHub Webhook Payloads
//!
//! Typed views of the webhook bodies the service understands. Only the
//! fields that feed normalization or installation bookkeeping are modeled;
//! everything else in a delivery is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Header carrying the webhook event kind.
pub const EVENT_KIND_HEADER: &str = "x-github-event";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("missing {EVENT_KIND_HEADER} header")]
    MissingEventKind,
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Account {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Repository {
    pub id: i64,
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InstallationRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: i64,
    pub title: String,
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub assignee: Option<Account>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseBranch {
    #[serde(rename = "ref", default)]
    pub ref_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: i64,
    pub title: String,
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub base: BaseBranch,
    #[serde(default)]
    pub requested_reviewers: Vec<Account>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub body: String,
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub issue: Issue,
    #[serde(default)]
    pub assignee: Option<Account>,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Account,
    #[serde(default)]
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: Issue,
    pub comment: Comment,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Account,
    #[serde(default)]
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequest,
    #[serde(default)]
    pub requested_reviewer: Option<Account>,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Account,
    #[serde(default)]
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestReviewEvent {
    pub action: String,
    pub review: Review,
    pub pull_request: PullRequest,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Account,
    #[serde(default)]
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestReviewCommentEvent {
    pub action: String,
    pub comment: Comment,
    pub pull_request: PullRequest,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Account,
    #[serde(default)]
    pub installation: Option<InstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationDetails {
    pub id: i64,
    pub account: Account,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationEvent {
    pub action: String,
    pub installation: InstallationDetails,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

/// A decoded webhook delivery, keyed by the `X-GitHub-Event` kind.
#[derive(Debug, Clone)]
pub enum WebhookPayload {
    Issues(IssuesEvent),
    IssueComment(IssueCommentEvent),
    PullRequest(PullRequestEvent),
    PullRequestReview(PullRequestReviewEvent),
    PullRequestReviewComment(PullRequestReviewCommentEvent),
    Installation(InstallationEvent),
    /// Any kind the service does not act on; the body is not inspected.
    Unsupported(String),
}

impl WebhookPayload {
    /// Decode a delivery body for the given event kind.
    pub fn decode(kind: &str, body: &[u8]) -> Result<Self, PayloadError> {
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(PayloadError::MissingEventKind);
        }

        let payload = match kind {
            "issues" => WebhookPayload::Issues(parse(kind, body)?),
            "issue_comment" => WebhookPayload::IssueComment(parse(kind, body)?),
            "pull_request" => WebhookPayload::PullRequest(parse(kind, body)?),
            "pull_request_review" => WebhookPayload::PullRequestReview(parse(kind, body)?),
            "pull_request_review_comment" => {
                WebhookPayload::PullRequestReviewComment(parse(kind, body)?)
            }
            "installation" => WebhookPayload::Installation(parse(kind, body)?),
            other => WebhookPayload::Unsupported(other.to_string()),
        };

        Ok(payload)
    }

    /// Event kind this payload was decoded from.
    pub fn kind(&self) -> &str {
        match self {
            WebhookPayload::Issues(_) => "issues",
            WebhookPayload::IssueComment(_) => "issue_comment",
            WebhookPayload::PullRequest(_) => "pull_request",
            WebhookPayload::PullRequestReview(_) => "pull_request_review",
            WebhookPayload::PullRequestReviewComment(_) => "pull_request_review_comment",
            WebhookPayload::Installation(_) => "installation",
            WebhookPayload::Unsupported(kind) => kind,
        }
    }

    /// Action string carried by the payload, when the kind has one.
    pub fn action(&self) -> Option<&str> {
        match self {
            WebhookPayload::Issues(e) => Some(&e.action),
            WebhookPayload::IssueComment(e) => Some(&e.action),
            WebhookPayload::PullRequest(e) => Some(&e.action),
            WebhookPayload::PullRequestReview(e) => Some(&e.action),
            WebhookPayload::PullRequestReviewComment(e) => Some(&e.action),
            WebhookPayload::Installation(e) => Some(&e.action),
            WebhookPayload::Unsupported(_) => None,
        }
    }
}

fn parse<T: DeserializeOwned>(kind: &str, body: &[u8]) -> Result<T, PayloadError> {
    serde_json::from_slice(body).map_err(|source| PayloadError::Malformed {
        kind: kind.to_string(),
        source,
    })
}
