//! Account queries.

use async_trait::async_trait;
use sqlx::{Sqlite, Transaction};

use civicdesk_core::model::{Identity, NewIdentity, Role};
use civicdesk_core::store::{Page, PageRequest, StoreError, UserSortField, UserStore};

use super::db::{CivicDatabase, DatabaseError};
use super::models::{RoleRow, UserRow, parse_role};

const fn sort_column(sort: UserSortField) -> &'static str {
    match sort {
        UserSortField::Id => "u.id",
        UserSortField::Name => "u.name",
        UserSortField::Email => "u.email",
        UserSortField::CreatedAt => "u.created_at",
    }
}

fn page_limits(page: &PageRequest<UserSortField>) -> (i64, i64) {
    (
        i64::from(page.size),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

async fn write_roles(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    roles: &[Role],
) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    for (position, role) in (0_i64..).zip(roles) {
        sqlx::query("INSERT INTO user_roles (user_id, role, position) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(role.as_str())
            .bind(position)
            .execute(&mut **tx)
            .await
            .map_err(|e| match DatabaseError::from(e) {
                // idx_user_roles_single_admin
                DatabaseError::Duplicate(_) if *role == Role::Admin => DatabaseError::AdminExists,
                other => other,
            })?;
    }
    Ok(())
}

impl CivicDatabase {
    async fn roles_of(&self, user_id: i64) -> Result<Vec<Role>, DatabaseError> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT user_id, role FROM user_roles WHERE user_id = ? ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(parse_role).collect()
    }

    async fn hydrate(&self, row: Option<UserRow>) -> Result<Option<Identity>, DatabaseError> {
        match row {
            Some(row) => {
                let roles = self.roles_of(row.id).await?;
                Ok(Some(row.into_identity(roles)))
            }
            None => Ok(None),
        }
    }

    /// Get a user by email (exact, case-sensitive).
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<Identity>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        self.hydrate(row).await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<Identity>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        self.hydrate(row).await
    }

    pub async fn get_user_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<Identity>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE verification_token = ?")
            .bind(token)
            .fetch_optional(self.pool())
            .await?;
        self.hydrate(row).await
    }

    pub async fn count_users_with_email(&self, email: &str) -> Result<i64, DatabaseError> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
                .bind(email)
                .fetch_one(self.pool())
                .await?,
        )
    }

    pub async fn count_users_with_role(&self, role: Role) -> Result<i64, DatabaseError> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_roles WHERE role = ?")
                .bind(role.as_str())
                .fetch_one(self.pool())
                .await?,
        )
    }

    /// Insert an account and its roles in one transaction.
    pub async fn create_user(&self, new: NewIdentity) -> Result<Identity, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, name, phone_number, bio, picture, image_ref, \
             enabled, verified, verification_token, verification_expires_at, created_at, version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, 0)",
        )
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.name)
        .bind(&new.phone_number)
        .bind(&new.bio)
        .bind(&new.picture)
        .bind(&new.image_ref)
        .bind(&new.verification.value)
        .bind(new.verification.expires_at)
        .bind(new.created_at)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        write_roles(&mut tx, id, &new.roles).await?;
        tx.commit().await?;

        Ok(new.into_identity(id))
    }

    /// Compare-and-set on `(id, version)`. Returns `None` when the stored
    /// row has moved on or no longer exists.
    pub async fn save_user(&self, identity: &Identity) -> Result<Option<Identity>, DatabaseError> {
        let (token, expires_at) = identity
            .verification
            .as_ref()
            .map_or((None, None), |v| (Some(v.value.as_str()), Some(v.expires_at)));

        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            "UPDATE users SET email = ?, password_hash = ?, name = ?, phone_number = ?, bio = ?, \
             picture = ?, image_ref = ?, enabled = ?, verified = ?, verification_token = ?, \
             verification_expires_at = ?, version = version + 1 \
             WHERE id = ? AND version = ?",
        )
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(&identity.name)
        .bind(&identity.phone_number)
        .bind(&identity.bio)
        .bind(&identity.picture)
        .bind(&identity.image_ref)
        .bind(identity.enabled)
        .bind(identity.verified)
        .bind(token)
        .bind(expires_at)
        .bind(identity.id)
        .bind(identity.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        write_roles(&mut tx, identity.id, &identity.roles).await?;
        tx.commit().await?;

        let mut saved = identity.clone();
        saved.version += 1;
        Ok(Some(saved))
    }

    /// Delete an account. Its roles and issues go with it.
    pub async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_users_with_role(
        &self,
        role: Role,
        page: &PageRequest<UserSortField>,
    ) -> Result<Page<Identity>, DatabaseError> {
        let total = self.count_users_with_role(role).await?;
        let (limit, offset) = page_limits(page);

        let sql = format!(
            "SELECT u.* FROM users u JOIN user_roles r ON r.user_id = u.id \
             WHERE r.role = ? ORDER BY {}, u.id LIMIT ? OFFSET ?",
            sort_column(page.sort)
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let roles = self.roles_of(row.id).await?;
            items.push(row.into_identity(roles));
        }

        Ok(Page {
            items,
            page: page.page,
            size: page.size,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl UserStore for CivicDatabase {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.get_user_by_email(email).await?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, StoreError> {
        Ok(self.get_user(id).await?)
    }

    async fn find_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<Identity>, StoreError> {
        Ok(self.get_user_by_verification_token(token).await?)
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.count_users_with_email(email).await? > 0)
    }

    async fn exists_by_role(&self, role: Role) -> Result<bool, StoreError> {
        Ok(self.count_users_with_role(role).await? > 0)
    }

    async fn insert(&self, identity: NewIdentity) -> Result<Identity, StoreError> {
        Ok(self.create_user(identity).await?)
    }

    async fn update(&self, identity: &Identity) -> Result<Identity, StoreError> {
        self.save_user(identity)
            .await?
            .ok_or_else(|| StoreError::Stale(format!("user {}", identity.id)))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.delete_user(id).await?)
    }

    async fn find_by_role(
        &self,
        role: Role,
        page: &PageRequest<UserSortField>,
    ) -> Result<Page<Identity>, StoreError> {
        Ok(self.list_users_with_role(role, page).await?)
    }
}
