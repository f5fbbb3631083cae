//! Row types for civicdesk storage and their conversion into domain values.

use civicdesk_core::model::{Identity, IssueReport, IssueStatus, Role, VerificationToken};

use super::db::DatabaseError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub picture: Option<String>,
    pub image_ref: Option<String>,
    pub enabled: bool,
    pub verified: bool,
    pub verification_token: Option<String>,
    pub verification_expires_at: Option<i64>,
    pub created_at: i64,
    pub version: i64,
}

impl UserRow {
    /// Roles live in `user_roles` and are loaded separately.
    pub fn into_identity(self, roles: Vec<Role>) -> Identity {
        let verification = match (self.verification_token, self.verification_expires_at) {
            (Some(value), Some(expires_at)) => Some(VerificationToken { value, expires_at }),
            _ => None,
        };
        Identity {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            phone_number: self.phone_number,
            bio: self.bio,
            picture: self.picture,
            image_ref: self.image_ref,
            roles,
            enabled: self.enabled,
            verified: self.verified,
            verification,
            created_at: self.created_at,
            version: self.version,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoleRow {
    pub user_id: i64,
    pub role: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IssueRow {
    pub id: i64,
    pub reporter_name: String,
    pub reporter_email: String,
    pub reporter_phone: Option<String>,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub location: String,
    pub address: String,
    pub picture: Option<String>,
    pub image_ref: Option<String>,
    pub status: String,
    pub owner_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: i64,
}

impl TryFrom<IssueRow> for IssueReport {
    type Error = DatabaseError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        let status: IssueStatus = row
            .status
            .parse()
            .map_err(|_| DatabaseError::Corrupt(format!("issue {} status {:?}", row.id, row.status)))?;
        Ok(Self {
            id: row.id,
            reporter_name: row.reporter_name,
            reporter_email: row.reporter_email,
            reporter_phone: row.reporter_phone,
            title: row.title,
            description: row.description,
            category: row.category,
            location: row.location,
            address: row.address,
            picture: row.picture,
            image_ref: row.image_ref,
            status,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

pub fn parse_role(row: &RoleRow) -> Result<Role, DatabaseError> {
    row.role
        .parse()
        .map_err(|_| DatabaseError::Corrupt(format!("user {} role {:?}", row.user_id, row.role)))
}
