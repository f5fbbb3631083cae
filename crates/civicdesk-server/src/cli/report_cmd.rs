//! Report subcommands for citizens: submit, mine, show.

use std::io::Write;
use std::path::PathBuf;

use tracing::info;

use civicdesk_core::NewIssue;

use super::{TokenArg, authorize, read_image, write_json};
use crate::app::App;

#[derive(clap::Subcommand, Debug)]
pub enum ReportAction {
    /// File a new issue report.
    Submit {
        #[command(flatten)]
        auth: TokenArg,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        address: String,
        /// Reporter name. Defaults to the account's display name.
        #[arg(long)]
        name: Option<String>,
        /// Reporter email. Defaults to the account email.
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Image file to attach.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List the caller's own reports.
    Mine {
        #[command(flatten)]
        auth: TokenArg,
    },
    /// Show one report (owner or admin).
    Show {
        #[command(flatten)]
        auth: TokenArg,
        id: i64,
    },
}

pub async fn run(action: ReportAction, app: &App, out: &mut dyn Write) -> anyhow::Result<()> {
    match action {
        ReportAction::Submit {
            auth,
            title,
            description,
            category,
            location,
            address,
            name,
            email,
            phone,
            image,
        } => {
            let ctx = authorize(app, &auth.token).await?;
            let name = match name {
                Some(name) => name,
                None => app.sessions.identity(&ctx).await?.name,
            };
            let image = read_image(image.as_deref()).await?;
            let form = NewIssue {
                name,
                email: email.unwrap_or_default(),
                phone_number: phone,
                title,
                description,
                category,
                location,
                address,
            };
            let report = app.issues.submit(&ctx, form, image).await?;
            info!(issue_id = report.id, "Report filed from command line");
            write_json(out, &report)
        }
        ReportAction::Mine { auth } => {
            let ctx = authorize(app, &auth.token).await?;
            let reports = app.issues.list_mine(&ctx).await?;
            write_json(out, &reports)
        }
        ReportAction::Show { auth, id } => {
            let ctx = authorize(app, &auth.token).await?;
            let report = app.issues.get(&ctx, id).await?;
            write_json(out, &report)
        }
    }
}
