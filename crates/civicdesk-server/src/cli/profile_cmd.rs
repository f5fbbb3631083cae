//! Profile subcommands: show, update.

use std::io::Write;
use std::path::PathBuf;

use civicdesk_core::ProfileUpdate;

use super::{TokenArg, authorize, read_image, write_json};
use crate::app::App;

#[derive(clap::Subcommand, Debug)]
pub enum ProfileAction {
    /// Show the caller's profile.
    Show {
        #[command(flatten)]
        auth: TokenArg,
    },
    /// Change profile fields. Omitted flags are left unchanged.
    Update {
        #[command(flatten)]
        auth: TokenArg,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// New profile picture.
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

pub async fn run(action: ProfileAction, app: &App, out: &mut dyn Write) -> anyhow::Result<()> {
    match action {
        ProfileAction::Show { auth } => {
            let ctx = authorize(app, &auth.token).await?;
            let identity = app.accounts.profile(&ctx).await?;
            write_json(out, &identity)
        }
        ProfileAction::Update {
            auth,
            name,
            phone,
            bio,
            password,
            image,
        } => {
            let ctx = authorize(app, &auth.token).await?;
            let update = ProfileUpdate {
                name,
                phone_number: phone,
                bio,
                password,
                image: read_image(image.as_deref()).await?,
            };
            let identity = app.accounts.update_profile(&ctx, update).await?;
            write_json(out, &identity)
        }
    }
}
