//! Canned domain values shared by integration tests.

use kiln_protocol::{Pipeline, Repo, WebhookEvent};

pub const REPO_ID: i64 = 7;
pub const ORG_ID: i64 = 3;

/// `acme/widgets`, repo 7 in org 3.
pub fn repo() -> Repo {
    Repo::new(REPO_ID, ORG_ID, "acme", "widgets")
}

/// A repository in a different organization.
pub fn other_repo() -> Repo {
    Repo::new(REPO_ID + 1, ORG_ID + 1, "globex", "gadgets")
}

pub fn pipeline() -> Pipeline {
    pipeline_for(WebhookEvent::Push)
}

pub fn pipeline_for(event: WebhookEvent) -> Pipeline {
    Pipeline {
        number: 42,
        event,
        commit: "3f786850e387550fdab836ed7e6dc881de23001b".to_string(),
        branch: "main".to_string(),
        git_ref: "refs/heads/main".to_string(),
        author: "octocat".to_string(),
    }
}
