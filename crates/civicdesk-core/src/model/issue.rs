//! Issue report records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Status of an issue report. See [`crate::issues::lifecycle`] for legal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl IssueStatus {
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Resolved,
        Self::Rejected,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "INPROGRESS",
            Self::Resolved => "RESOLVED",
            Self::Rejected => "REJECTED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = Error;

    /// Case-insensitive match against the status names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::InvalidFilter(format!("Invalid status: {s}")))
    }
}

/// A citizen-submitted report.
///
/// Reporter name, email and phone are copies taken at submission time and do
/// not follow later edits to the owning identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReport {
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
    pub status: IssueStatus,
    pub owner_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: i64,
}

/// A report ready to be inserted; the store assigns `id` and `version`.
#[derive(Debug, Clone)]
pub struct NewIssueReport {
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
    pub owner_id: i64,
    pub created_at: i64,
}

impl NewIssueReport {
    /// Materialise with a store-assigned id. Every report starts out `PENDING`.
    pub fn into_report(self, id: i64) -> IssueReport {
        IssueReport {
            id,
            reporter_name: self.reporter_name,
            reporter_email: self.reporter_email,
            reporter_phone: self.reporter_phone,
            title: self.title,
            description: self.description,
            category: self.category,
            location: self.location,
            address: self.address,
            picture: self.picture,
            image_ref: self.image_ref,
            status: IssueStatus::Pending,
            owner_id: self.owner_id,
            created_at: self.created_at,
            updated_at: self.created_at,
            version: 0,
        }
    }
}
