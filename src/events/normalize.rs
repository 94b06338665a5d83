//! # Payload Normalization
//!
//! Maps a decoded [`WebhookPayload`] to a canonical [`Event`]. Every
//! supported (shape, action) pair yields a fully populated event; anything
//! else yields `None` and is dropped without error.

use chrono::{DateTime, Utc};

use super::model::{Event, EventType};
use super::payload::{
    InstallationRef, IssueCommentEvent, IssuesEvent, PullRequestEvent, PullRequestReviewCommentEvent,
    PullRequestReviewEvent, Repository, WebhookPayload,
};

/// Normalize a webhook payload. Installation payloads and unsupported kinds
/// never produce an event.
pub fn normalize(payload: &WebhookPayload) -> Option<Event> {
    match payload {
        WebhookPayload::Issues(event) => normalize_issues(event),
        WebhookPayload::IssueComment(event) => normalize_issue_comment(event),
        WebhookPayload::PullRequest(event) => normalize_pull_request(event),
        WebhookPayload::PullRequestReview(event) => normalize_pull_request_review(event),
        WebhookPayload::PullRequestReviewComment(event) => {
            normalize_pull_request_review_comment(event)
        }
        WebhookPayload::Installation(_) | WebhookPayload::Unsupported(_) => None,
    }
}

fn normalize_issues(event: &IssuesEvent) -> Option<Event> {
    let issue = &event.issue;
    let (event_type, description) = match event.action.as_str() {
        "opened" => (EventType::IssueOpened, format!("Opened #{}", issue.number)),
        "closed" => (EventType::IssueClosed, format!("Closed #{}", issue.number)),
        "assigned" => {
            let assignee = issue.assignee.as_ref().or(event.assignee.as_ref())?;
            (
                EventType::IssueAssigned,
                format!("Assigned #{} to @{}", issue.number, assignee.login),
            )
        }
        _ => return None,
    };

    Some(build(
        event_type,
        description,
        &event.repository,
        Subject {
            number: issue.number,
            title: &issue.title,
            url: &issue.html_url,
            updated_at: issue.updated_at,
        },
        &event.sender.avatar_url,
        event.installation.as_ref(),
    ))
}

fn normalize_issue_comment(event: &IssueCommentEvent) -> Option<Event> {
    if event.action != "created" {
        return None;
    }

    let comment = &event.comment;
    Some(build(
        EventType::IssueCommented,
        format!("Commented \"{}\"", comment.body),
        &event.repository,
        Subject {
            number: event.issue.number,
            title: &event.issue.title,
            url: &comment.html_url,
            updated_at: comment.updated_at,
        },
        &event.sender.avatar_url,
        event.installation.as_ref(),
    ))
}

fn normalize_pull_request(event: &PullRequestEvent) -> Option<Event> {
    let pr = &event.pull_request;
    let (event_type, description) = match event.action.as_str() {
        "opened" => (EventType::PrOpened, format!("Opened #{}", pr.number)),
        "review_requested" => {
            let reviewer = pr
                .requested_reviewers
                .first()
                .or(event.requested_reviewer.as_ref())?;
            (
                EventType::PrReviewRequested,
                format!("Requested review by @{}", reviewer.login),
            )
        }
        "closed" if pr.merged => (
            EventType::PrMerged,
            format!("Merged #{} into {}", pr.number, pr.base.ref_name),
        ),
        "closed" => (EventType::PrClosed, format!("Closed #{}", pr.number)),
        _ => return None,
    };

    Some(build(
        event_type,
        description,
        &event.repository,
        Subject {
            number: pr.number,
            title: &pr.title,
            url: &pr.html_url,
            updated_at: pr.updated_at,
        },
        &event.sender.avatar_url,
        event.installation.as_ref(),
    ))
}

fn normalize_pull_request_review(event: &PullRequestReviewEvent) -> Option<Event> {
    if event.action != "submitted" {
        return None;
    }

    let pr = &event.pull_request;
    let description = match event.review.state.to_ascii_lowercase().as_str() {
        "changes_requested" => format!("Requested changes on #{}", pr.number),
        "approved" => format!("Approved #{}", pr.number),
        "dismissed" => format!("Dismissed #{}", pr.number),
        "commented" => format!("Commented on #{}", pr.number),
        _ => return None,
    };

    Some(build(
        EventType::PrReviewed,
        description,
        &event.repository,
        Subject {
            number: pr.number,
            title: &pr.title,
            url: &pr.html_url,
            updated_at: pr.updated_at,
        },
        &event.sender.avatar_url,
        event.installation.as_ref(),
    ))
}

fn normalize_pull_request_review_comment(event: &PullRequestReviewCommentEvent) -> Option<Event> {
    if event.action != "created" {
        return None;
    }

    let comment = &event.comment;
    Some(build(
        EventType::PrReviewCommented,
        format!("Commented \"{}\"", comment.body),
        &event.repository,
        Subject {
            number: event.pull_request.number,
            title: &event.pull_request.title,
            url: &comment.html_url,
            updated_at: comment.updated_at,
        },
        &event.sender.avatar_url,
        event.installation.as_ref(),
    ))
}

/// Pass-through fields of the issue, pull request or comment the event is about.
struct Subject<'a> {
    number: i64,
    title: &'a str,
    url: &'a str,
    updated_at: DateTime<Utc>,
}

fn build(
    event_type: EventType,
    description: String,
    repository: &Repository,
    subject: Subject<'_>,
    avatar_url: &str,
    installation: Option<&InstallationRef>,
) -> Event {
    Event {
        event_type,
        repo_name: repository.full_name.clone(),
        repo_id: repository.id,
        number: subject.number,
        title: subject.title.to_string(),
        description,
        avatar_url: avatar_url.to_string(),
        timestamp: subject.updated_at,
        url: subject.url.to_string(),
        // Deliveries without an installation block resolve to no installation.
        installation_id: installation.map(|i| i.id).unwrap_or_default(),
    }
}
