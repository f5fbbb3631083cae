//! Service wiring.
//!
//! [`App`] owns the database and every core service built on top of it. The
//! binary builds one from resolved configuration; tests build one from an
//! in-memory database and collaborator doubles.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use civicdesk_core::config::{Config, default_database_path, default_image_dir};
use civicdesk_core::image::ImageHost;
use civicdesk_core::notify::Notifier;
use civicdesk_core::store::{IssueStore, UserStore};
use civicdesk_core::{
    AccountService, IssueService, NotificationDispatcher, RegistrationFlow, SessionAuthenticator,
    TokenCodec, VerificationTokenManager,
};

use crate::images::LocalImageHost;
use crate::mail::{LogTransport, Mailer};
use crate::storage::CivicDatabase;

pub struct App {
    pub db: CivicDatabase,
    pub codec: Arc<TokenCodec>,
    pub sessions: SessionAuthenticator,
    pub registration: RegistrationFlow,
    pub issues: IssueService,
    pub accounts: AccountService,
    notifications: NotificationDispatcher,
}

impl App {
    /// Open the configured database and build every service.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let secret = config.auth.require_secret()?;
        let codec = Arc::new(TokenCodec::new(
            secret.as_bytes(),
            config.auth.session_ttl_secs,
        )?);

        let db_path = match &config.storage.database_path {
            Some(path) => path.clone(),
            None => default_database_path()
                .context("Cannot determine data directory; set storage.database_path")?,
        };
        info!(path = %db_path.display(), "Opening civicdesk database");
        let db = CivicDatabase::open(&db_path).await?;

        let image_dir: PathBuf = match &config.images.root_dir {
            Some(dir) => dir.clone(),
            None => default_image_dir()
                .context("Cannot determine data directory; set images.root_dir")?,
        };
        let images = Arc::new(LocalImageHost::new(
            image_dir,
            config.images.public_base_url.clone(),
        ));

        let notifier = build_notifier(config)?;
        let notifications = NotificationDispatcher::with_timeout(notifier, config.mail.timeout());

        Ok(Self::with_dispatcher(
            db,
            notifications,
            images,
            codec,
            config.auth.verification_ttl_secs,
        ))
    }

    pub fn with_parts(
        db: CivicDatabase,
        notifier: Arc<dyn Notifier>,
        images: Arc<dyn ImageHost>,
        codec: Arc<TokenCodec>,
        verification_ttl_secs: i64,
    ) -> Self {
        Self::with_dispatcher(
            db,
            NotificationDispatcher::new(notifier),
            images,
            codec,
            verification_ttl_secs,
        )
    }

    pub fn with_dispatcher(
        db: CivicDatabase,
        notifications: NotificationDispatcher,
        images: Arc<dyn ImageHost>,
        codec: Arc<TokenCodec>,
        verification_ttl_secs: i64,
    ) -> Self {
        let users: Arc<dyn UserStore> = Arc::new(db.clone());
        let issue_store: Arc<dyn IssueStore> = Arc::new(db.clone());
        let tokens = Arc::new(VerificationTokenManager::new(
            Arc::clone(&users),
            verification_ttl_secs,
        ));

        Self {
            sessions: SessionAuthenticator::new(Arc::clone(&users), Arc::clone(&codec)),
            registration: RegistrationFlow::new(
                Arc::clone(&users),
                tokens,
                notifications.clone(),
            ),
            issues: IssueService::new(issue_store, Arc::clone(&images), notifications.clone()),
            accounts: AccountService::new(users, images),
            notifications,
            codec,
            db,
        }
    }

    /// Wait for in-flight best-effort notifications, then close the database.
    pub async fn shutdown(&self) {
        self.notifications.flush().await;
        self.db.close().await;
    }
}

fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    let sender = config.mail.sender.clone();
    let base_url = config.mail.base_url.clone();

    match config.mail.webhook_url.as_deref() {
        #[cfg(feature = "webhook-mail")]
        Some(url) => {
            info!(url, "Delivering mail through webhook");
            let transport = crate::mail::WebhookTransport::new(url, config.mail.timeout())?;
            Ok(Arc::new(Mailer::new(transport, sender, base_url)))
        }
        #[cfg(not(feature = "webhook-mail"))]
        Some(url) => {
            tracing::warn!(
                url,
                "mail.webhook_url is set but this build lacks the webhook-mail feature; logging mail instead"
            );
            Ok(Arc::new(Mailer::new(LogTransport, sender, base_url)))
        }
        None => Ok(Arc::new(Mailer::new(LogTransport, sender, base_url))),
    }
}
