//! Issue report queries, including translation of filter predicates to SQL.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};

use civicdesk_core::clock::start_of_day;
use civicdesk_core::issues::{IssuePredicate, IssueQuery, IssueSortField};
use civicdesk_core::model::{IssueReport, NewIssueReport};
use civicdesk_core::store::{IssueStore, Page, PageRequest, StoreError};

use super::db::{CivicDatabase, DatabaseError};
use super::models::IssueRow;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

const fn sort_column(sort: IssueSortField) -> &'static str {
    match sort {
        IssueSortField::Id => "i.id",
        IssueSortField::Title => "i.title",
        IssueSortField::CreatedAt => "i.created_at",
    }
}

/// Append `AND <condition>` for each predicate. Needles are already
/// lowercased by the query builder.
fn push_predicates(qb: &mut QueryBuilder<'_, Sqlite>, query: &IssueQuery) {
    for predicate in query.predicates() {
        qb.push(" AND ");
        match predicate {
            IssuePredicate::Category(category) => {
                qb.push("i.category = ").push_bind(category.clone());
            }
            IssuePredicate::Status(status) => {
                qb.push("i.status = ").push_bind(status.as_str());
            }
            IssuePredicate::OwnerEmail(email) => {
                qb.push("u.email = ").push_bind(email.clone());
            }
            IssuePredicate::LocationContains(needle) => {
                qb.push("instr(lower(i.location), ")
                    .push_bind(needle.clone())
                    .push(") > 0");
            }
            IssuePredicate::TextSearch(needle) => {
                qb.push("(instr(lower(i.title), ")
                    .push_bind(needle.clone())
                    .push(") > 0 OR instr(lower(i.description), ")
                    .push_bind(needle.clone())
                    .push(") > 0)");
            }
            IssuePredicate::CreatedBetween { from, to } => {
                qb.push("i.created_at >= ")
                    .push_bind(start_of_day(*from))
                    .push(" AND i.created_at < ")
                    .push_bind(start_of_day(*to) + SECONDS_PER_DAY);
            }
        }
    }
}

fn filtered<'a>(select: &str, query: &IssueQuery) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" FROM issues i JOIN users u ON u.id = i.owner_id WHERE 1 = 1");
    push_predicates(&mut qb, query);
    qb
}

fn rows_to_reports(rows: Vec<IssueRow>) -> Result<Vec<IssueReport>, DatabaseError> {
    rows.into_iter().map(IssueReport::try_from).collect()
}

impl CivicDatabase {
    pub async fn create_issue(&self, new: NewIssueReport) -> Result<IssueReport, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO issues (reporter_name, reporter_email, reporter_phone, title, description, \
             category, location, address, picture, image_ref, status, owner_id, created_at, \
             updated_at, version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'PENDING', ?, ?, ?, 0)",
        )
        .bind(&new.reporter_name)
        .bind(&new.reporter_email)
        .bind(&new.reporter_phone)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.category)
        .bind(&new.location)
        .bind(&new.address)
        .bind(&new.picture)
        .bind(&new.image_ref)
        .bind(new.owner_id)
        .bind(new.created_at)
        .bind(new.created_at)
        .execute(self.pool())
        .await?;

        Ok(new.into_report(result.last_insert_rowid()))
    }

    pub async fn get_issue(&self, id: i64) -> Result<Option<IssueReport>, DatabaseError> {
        sqlx::query_as::<_, IssueRow>("SELECT * FROM issues WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .map(IssueReport::try_from)
            .transpose()
    }

    pub async fn list_issues_by_owner(
        &self,
        owner_id: i64,
    ) -> Result<Vec<IssueReport>, DatabaseError> {
        let rows = sqlx::query_as::<_, IssueRow>(
            "SELECT * FROM issues WHERE owner_id = ? ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;
        rows_to_reports(rows)
    }

    /// Compare-and-set on `(id, version)`. Returns `None` when the stored
    /// row has moved on or no longer exists.
    pub async fn save_issue(
        &self,
        issue: &IssueReport,
    ) -> Result<Option<IssueReport>, DatabaseError> {
        let result = sqlx::query(
            "UPDATE issues SET reporter_name = ?, reporter_email = ?, reporter_phone = ?, \
             title = ?, description = ?, category = ?, location = ?, address = ?, picture = ?, \
             image_ref = ?, status = ?, updated_at = ?, version = version + 1 \
             WHERE id = ? AND version = ?",
        )
        .bind(&issue.reporter_name)
        .bind(&issue.reporter_email)
        .bind(&issue.reporter_phone)
        .bind(&issue.title)
        .bind(&issue.description)
        .bind(&issue.category)
        .bind(&issue.location)
        .bind(&issue.address)
        .bind(&issue.picture)
        .bind(&issue.image_ref)
        .bind(issue.status.as_str())
        .bind(issue.updated_at)
        .bind(issue.id)
        .bind(issue.version)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let mut saved = issue.clone();
        saved.version += 1;
        Ok(Some(saved))
    }

    pub async fn delete_issue(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM issues WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One page of the reports matching every predicate of `query`.
    pub async fn search_issues(
        &self,
        query: &IssueQuery,
        page: &PageRequest<IssueSortField>,
    ) -> Result<Page<IssueReport>, DatabaseError> {
        let mut count = filtered("SELECT COUNT(*)", query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(self.pool()).await?;

        let mut select = filtered("SELECT i.*", query);
        select
            .push(" ORDER BY ")
            .push(sort_column(page.sort))
            .push(", i.id LIMIT ")
            .push_bind(i64::from(page.size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
        let rows: Vec<IssueRow> = select.build_query_as::<IssueRow>().fetch_all(self.pool()).await?;

        Ok(Page {
            items: rows_to_reports(rows)?,
            page: page.page,
            size: page.size,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl IssueStore for CivicDatabase {
    async fn insert(&self, issue: NewIssueReport) -> Result<IssueReport, StoreError> {
        Ok(self.create_issue(issue).await?)
    }

    async fn update(&self, issue: &IssueReport) -> Result<IssueReport, StoreError> {
        self.save_issue(issue)
            .await?
            .ok_or_else(|| StoreError::Stale(format!("issue {}", issue.id)))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<IssueReport>, StoreError> {
        Ok(self.get_issue(id).await?)
    }

    async fn find_by_owner(&self, owner_id: i64) -> Result<Vec<IssueReport>, StoreError> {
        Ok(self.list_issues_by_owner(owner_id).await?)
    }

    async fn find_by_query(
        &self,
        query: &IssueQuery,
        page: &PageRequest<IssueSortField>,
    ) -> Result<Page<IssueReport>, StoreError> {
        Ok(self.search_issues(query, page).await?)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.delete_issue(id).await?)
    }
}
