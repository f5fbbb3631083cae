//! Account subcommands: signup, verify, login, whoami.

use std::io::Write;

use serde_json::json;

use civicdesk_core::SignupRequest;

use super::{authorize, write_json};
use crate::app::App;

#[derive(clap::Args, Debug)]
pub struct SignupArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "CIVICDESK_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub bio: Option<String>,
    /// Requested roles (`USER`, `ADMIN`); repeat for several. Defaults to `USER`.
    #[arg(long = "role")]
    pub roles: Vec<String>,
}

/// Register an account. A verification email is sent before this returns.
pub async fn signup(app: &App, args: SignupArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let identity = app
        .registration
        .register(SignupRequest {
            name: args.name,
            email: args.email,
            password: args.password,
            phone_number: args.phone,
            bio: args.bio,
            roles: args.roles,
        })
        .await?;
    write_json(
        out,
        &json!({
            "message": "User registered successfully! Please verify your email.",
            "user": identity,
        }),
    )
}

/// Consume a verification token.
pub async fn verify(app: &App, token: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let identity = app.registration.verify(token).await?;
    write_json(
        out,
        &json!({
            "message": "Email verified successfully!",
            "user": identity,
        }),
    )
}

pub async fn login(
    app: &App,
    email: &str,
    password: &str,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let session = app.sessions.authenticate(email, password).await?;
    write_json(out, &session)
}

pub async fn whoami(app: &App, token: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let ctx = authorize(app, token).await?;
    let identity = app.sessions.identity(&ctx).await?;
    write_json(out, &identity)
}
