//! Profile management and the admin user directory.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::auth::AuthContext;
use crate::auth::password::{check_password_policy, hash_password_async};
use crate::error::{Error, Result};
use crate::image::ImageHost;
use crate::model::{Identity, Role};
use crate::store::{Page, PageRequest, UserSortField, UserStore};

/// Fields a user may change on their own profile. `None` leaves a field as
/// it is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub password: Option<String>,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

pub struct AccountService {
    users: Arc<dyn UserStore>,
    images: Arc<dyn ImageHost>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, images: Arc<dyn ImageHost>) -> Self {
        Self { users, images }
    }

    pub async fn profile(&self, ctx: &AuthContext) -> Result<Identity> {
        self.users
            .find_by_id(ctx.user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", ctx.user_id)))
    }

    /// Apply `update` to the caller's own record. A new image is uploaded
    /// before anything is saved; the image it replaces is removed afterwards.
    #[instrument(skip(self, ctx, update), fields(user_id = ctx.user_id))]
    pub async fn update_profile(&self, ctx: &AuthContext, update: ProfileUpdate) -> Result<Identity> {
        let mut identity = self.profile(ctx).await?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("name must not be empty".into()));
            }
            identity.name = name;
        }
        if let Some(phone) = update.phone_number {
            identity.phone_number = Some(phone).filter(|p| !p.trim().is_empty());
        }
        if let Some(bio) = update.bio {
            identity.bio = Some(bio).filter(|b| !b.trim().is_empty());
        }
        if let Some(password) = update.password {
            check_password_policy(&password)?;
            identity.password_hash = hash_password_async(password).await?;
        }

        let mut replaced_ref = None;
        let mut uploaded_ref = None;
        if let Some(bytes) = update.image {
            let uploaded = self.images.upload(bytes).await?;
            replaced_ref = identity.image_ref.take();
            identity.picture = Some(uploaded.url);
            identity.image_ref = Some(uploaded.reference_id.clone());
            uploaded_ref = Some(uploaded.reference_id);
        }

        let saved = match self.users.update(&identity).await {
            Ok(saved) => saved,
            Err(e) => {
                if let Some(reference_id) = uploaded_ref {
                    self.discard_image(&reference_id).await;
                }
                return Err(e.into());
            }
        };

        if let Some(reference_id) = replaced_ref {
            self.discard_image(&reference_id).await;
        }

        info!("Profile updated");
        Ok(saved)
    }

    /// Accounts holding the `USER` role, for administrators.
    pub async fn list_users(
        &self,
        ctx: &AuthContext,
        page: PageRequest<UserSortField>,
    ) -> Result<Page<Identity>> {
        ctx.require_admin()?;
        Ok(self.users.find_by_role(Role::User, &page).await?)
    }

    async fn discard_image(&self, reference_id: &str) {
        if let Err(e) = self.images.delete(reference_id).await {
            warn!(error = %e, reference_id, "Failed to delete profile image");
        }
    }
}
