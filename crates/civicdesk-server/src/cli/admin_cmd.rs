//! Administrator subcommands: issues, transition, delete, users.

use std::io::Write;

use serde_json::json;

use civicdesk_core::issues::{IssueFilter, IssueSortField};
use civicdesk_core::store::{PageRequest, UserSortField};
use civicdesk_core::IssueTransition;

use super::{TokenArg, authorize, write_json};
use crate::app::App;

/// Paging flags shared by the listing subcommands.
#[derive(clap::Args, Debug, Clone)]
pub struct PageArgs {
    /// Zero-based page number.
    #[arg(long, default_value_t = 0)]
    pub page: u32,
    #[arg(long, default_value_t = 10)]
    pub size: u32,
    /// Sort field (`id`, `title`, `createdAt` for issues; `id`, `name`,
    /// `email`, `createdAt` for users).
    #[arg(long, default_value = "id")]
    pub sort: String,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    StartProgress,
    Resolve,
    Reject,
}

impl From<TransitionKind> for IssueTransition {
    fn from(kind: TransitionKind) -> Self {
        match kind {
            TransitionKind::StartProgress => Self::StartProgress,
            TransitionKind::Resolve => Self::Resolve,
            TransitionKind::Reject => Self::Reject,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum AdminAction {
    /// List issue reports, optionally filtered. Filters combine with AND.
    Issues {
        #[command(flatten)]
        auth: TokenArg,
        #[command(flatten)]
        paging: PageArgs,
        #[arg(long)]
        category: Option<String>,
        /// PENDING, INPROGRESS, RESOLVED or REJECTED (any case).
        #[arg(long)]
        status: Option<String>,
        /// Current email of the reporting account.
        #[arg(long)]
        owner_email: Option<String>,
        /// Case-insensitive substring of the location.
        #[arg(long)]
        location: Option<String>,
        /// Case-insensitive substring of the title or description.
        #[arg(long)]
        search: Option<String>,
        /// Inclusive start date, yyyy-MM-dd.
        #[arg(long)]
        from_date: Option<String>,
        /// Inclusive end date, yyyy-MM-dd.
        #[arg(long)]
        to_date: Option<String>,
    },
    /// Move a report to a new status.
    Transition {
        #[command(flatten)]
        auth: TokenArg,
        id: i64,
        #[arg(value_enum)]
        to: TransitionKind,
    },
    /// Delete a report and notify its reporter.
    Delete {
        #[command(flatten)]
        auth: TokenArg,
        id: i64,
    },
    /// List accounts holding the USER role.
    Users {
        #[command(flatten)]
        auth: TokenArg,
        #[command(flatten)]
        paging: PageArgs,
    },
}

pub async fn run(action: AdminAction, app: &App, out: &mut dyn Write) -> anyhow::Result<()> {
    match action {
        AdminAction::Issues {
            auth,
            paging,
            category,
            status,
            owner_email,
            location,
            search,
            from_date,
            to_date,
        } => {
            let ctx = authorize(app, &auth.token).await?;
            let page = PageRequest::new(
                paging.page,
                paging.size,
                IssueSortField::parse(&paging.sort)?,
            );
            let filter = IssueFilter {
                category,
                status,
                owner_email,
                location,
                search,
                from_date,
                to_date,
            };
            let result = if filter == IssueFilter::default() {
                app.issues.list_all(&ctx, page).await?
            } else {
                app.issues.search(&ctx, &filter, page).await?
            };
            write_json(out, &result)
        }
        AdminAction::Transition { auth, id, to } => {
            let ctx = authorize(app, &auth.token).await?;
            let report = app.issues.transition(&ctx, id, to.into()).await?;
            write_json(out, &report)
        }
        AdminAction::Delete { auth, id } => {
            let ctx = authorize(app, &auth.token).await?;
            let report = app.issues.delete(&ctx, id).await?;
            write_json(
                out,
                &json!({
                    "message": format!("Complaint {} deleted", report.id),
                    "deleted": report,
                }),
            )
        }
        AdminAction::Users { auth, paging } => {
            let ctx = authorize(app, &auth.token).await?;
            let page = PageRequest::new(
                paging.page,
                paging.size,
                UserSortField::parse(&paging.sort)?,
            );
            let users = app.accounts.list_users(&ctx, page).await?;
            write_json(out, &users)
        }
    }
}
