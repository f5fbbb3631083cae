//! Composable filter predicates for querying issue reports.
//!
//! [`IssueQueryBuilder`] accumulates independent [`IssuePredicate`]s; an
//! [`IssueQuery`] matches a report only when every predicate does. Stores
//! either evaluate predicates directly ([`IssueQuery::matches`]) or translate
//! each variant into their own query language.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::clock::utc_date;
use crate::error::{Error, Result};
use crate::model::{IssueReport, IssueStatus};

const INVALID_DATE: &str = "Invalid date format. Expected format is yyyy-MM-dd";

/// Raw, independently optional filter parameters as supplied by an administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub owner_email: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

/// A single filter condition over an issue report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuePredicate {
    /// Exact, case-sensitive category match.
    Category(String),
    Status(IssueStatus),
    /// Exact match on the owning identity's email.
    OwnerEmail(String),
    /// Case-insensitive substring of the location. Holds the lowercased needle.
    LocationContains(String),
    /// Case-insensitive substring of the title or the description. Holds the lowercased needle.
    TextSearch(String),
    /// Creation date (UTC) within `from..=to`.
    CreatedBetween { from: NaiveDate, to: NaiveDate },
}

impl IssuePredicate {
    /// `owner_email` is the current email of the report's owner, when known.
    pub fn matches(&self, report: &IssueReport, owner_email: Option<&str>) -> bool {
        match self {
            Self::Category(category) => report.category.as_deref() == Some(category.as_str()),
            Self::Status(status) => report.status == *status,
            Self::OwnerEmail(email) => owner_email == Some(email.as_str()),
            Self::LocationContains(needle) => report.location.to_lowercase().contains(needle),
            Self::TextSearch(needle) => {
                report.title.to_lowercase().contains(needle)
                    || report.description.to_lowercase().contains(needle)
            }
            Self::CreatedBetween { from, to } => {
                utc_date(report.created_at).is_some_and(|date| *from <= date && date <= *to)
            }
        }
    }
}

/// Conjunction of predicates. An empty query matches every report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueQuery {
    predicates: Vec<IssuePredicate>,
}

impl IssueQuery {
    pub const fn all() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    pub fn predicates(&self) -> &[IssuePredicate] {
        &self.predicates
    }

    pub fn is_unconstrained(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Whether evaluating this query needs the owner's email.
    pub fn needs_owner_email(&self) -> bool {
        self.predicates
            .iter()
            .any(|p| matches!(p, IssuePredicate::OwnerEmail(_)))
    }

    pub fn matches(&self, report: &IssueReport, owner_email: Option<&str>) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(report, owner_email))
    }
}

/// Accumulates predicates; blank inputs add nothing.
#[derive(Debug, Default)]
pub struct IssueQueryBuilder {
    predicates: Vec<IssuePredicate>,
}

impl IssueQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query from every field of `filter`.
    pub fn from_filter(filter: &IssueFilter) -> Result<IssueQuery> {
        Ok(Self::new()
            .category(filter.category.as_deref())
            .status(filter.status.as_deref())?
            .owner_email(filter.owner_email.as_deref())
            .location(filter.location.as_deref())
            .search(filter.search.as_deref())
            .date_range(filter.from_date.as_deref(), filter.to_date.as_deref())?
            .build())
    }

    /// Add an arbitrary predicate.
    #[must_use]
    pub fn with(mut self, predicate: IssuePredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    #[must_use]
    pub fn category(self, category: Option<&str>) -> Self {
        match non_blank(category) {
            Some(category) => self.with(IssuePredicate::Category(category.to_string())),
            None => self,
        }
    }

    /// Fails with [`Error::InvalidFilter`] on an unrecognised status name.
    pub fn status(self, status: Option<&str>) -> Result<Self> {
        match non_blank(status) {
            Some(status) => Ok(self.with(IssuePredicate::Status(status.parse()?))),
            None => Ok(self),
        }
    }

    #[must_use]
    pub fn owner_email(self, email: Option<&str>) -> Self {
        match non_blank(email) {
            Some(email) => self.with(IssuePredicate::OwnerEmail(email.to_string())),
            None => self,
        }
    }

    #[must_use]
    pub fn location(self, location: Option<&str>) -> Self {
        match non_blank(location) {
            Some(location) => self.with(IssuePredicate::LocationContains(location.to_lowercase())),
            None => self,
        }
    }

    #[must_use]
    pub fn search(self, term: Option<&str>) -> Self {
        match non_blank(term) {
            Some(term) => self.with(IssuePredicate::TextSearch(term.to_lowercase())),
            None => self,
        }
    }

    /// Both bounds or neither; each must be a `YYYY-MM-DD` calendar date.
    pub fn date_range(self, from: Option<&str>, to: Option<&str>) -> Result<Self> {
        match (non_blank(from), non_blank(to)) {
            (None, None) => Ok(self),
            (Some(from), Some(to)) => {
                let from = parse_date(from)?;
                let to = parse_date(to)?;
                Ok(self.with(IssuePredicate::CreatedBetween { from, to }))
            }
            _ => Err(Error::InvalidFilter(INVALID_DATE.to_string())),
        }
    }

    pub fn build(self) -> IssueQuery {
        IssueQuery {
            predicates: self.predicates,
        }
    }
}

/// Sort keys accepted when listing issue reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueSortField {
    #[default]
    Id,
    Title,
    CreatedAt,
}

impl IssueSortField {
    pub fn parse(field: &str) -> Result<Self> {
        match field {
            "id" => Ok(Self::Id),
            "title" => Ok(Self::Title),
            "createdAt" => Ok(Self::CreatedAt),
            other => Err(Error::InvalidSort(other.to_string())),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Strict `YYYY-MM-DD`: chrono alone also takes unpadded fields like `2024-1-5`.
fn parse_date(value: &str) -> Result<NaiveDate> {
    let invalid = || Error::InvalidFilter(INVALID_DATE.to_string());
    let well_formed = value.len() == 10
        && value.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())
}
