//! Category repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Seed and list each user's ordered categories.
//!
//! # Invariants
//! - Listing is deterministic: `sort_order ASC, seq ASC`.
//! - Seeding checks for existing categories and inserts the defaults inside
//!   one immediate transaction, so concurrent seeding yields one set.

use super::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use crate::model::category::{Category, CategoryId, DEFAULT_CATEGORY_NAMES};
use crate::model::user::UserId;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const CATEGORY_SELECT_SQL: &str = "SELECT
    category_uuid,
    user_id,
    name,
    sort_order,
    created_at
FROM categories";

/// Repository interface for category operations.
pub trait CategoryRepository {
    /// Inserts the default categories when `user_id` has none.
    ///
    /// Returns `true` when seeding happened.
    fn ensure_defaults(&self, user_id: &UserId) -> RepoResult<bool>;
    /// Lists the user's categories in display order.
    fn list_categories(&self, user_id: &UserId) -> RepoResult<Vec<Category>>;
    /// Loads one category when it exists and belongs to `user_id`.
    fn get_category(
        &self,
        user_id: &UserId,
        category_id: CategoryId,
    ) -> RepoResult<Option<Category>>;
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn ensure_defaults(&self, user_id: &UserId) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM categories WHERE user_id = ?1;",
            [user_id.as_str()],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(false);
        }

        for (order, name) in (0_i64..).zip(DEFAULT_CATEGORY_NAMES) {
            tx.execute(
                "INSERT INTO categories (category_uuid, user_id, name, sort_order)
                 VALUES (?1, ?2, ?3, ?4);",
                params![Uuid::new_v4().to_string(), user_id.as_str(), name, order],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    fn list_categories(&self, user_id: &UserId) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL}
             WHERE user_id = ?1
             ORDER BY sort_order ASC, seq ASC;"
        ))?;
        let mut rows = stmt.query([user_id.as_str()])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }

    fn get_category(
        &self,
        user_id: &UserId,
        category_id: CategoryId,
    ) -> RepoResult<Option<Category>> {
        load_owned_category(self.conn, user_id, category_id)
    }
}

/// Loads a category only when owned by `user_id`.
pub(crate) fn load_owned_category(
    conn: &Connection,
    user_id: &UserId,
    category_id: CategoryId,
) -> RepoResult<Option<Category>> {
    conn.query_row(
        &format!(
            "{CATEGORY_SELECT_SQL}
             WHERE category_uuid = ?1
               AND user_id = ?2;"
        ),
        params![category_id.to_string(), user_id.as_str()],
        |row| Ok(parse_category_row(row)),
    )
    .optional()?
    .transpose()
}

/// Fails with `CategoryNotOwned` unless `category_id` belongs to `user_id`.
pub(crate) fn ensure_category_owned(
    conn: &Connection,
    user_id: &UserId,
    category_id: CategoryId,
) -> RepoResult<()> {
    match load_owned_category(conn, user_id, category_id)? {
        Some(_) => Ok(()),
        None => Err(RepoError::CategoryNotOwned(category_id)),
    }
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<Category> {
    let id_text: String = row.get("category_uuid")?;
    let user_text: String = row.get("user_id")?;
    let user_id = UserId::new(user_text)
        .map_err(|err| RepoError::InvalidData(format!("categories.user_id: {err}")))?;

    Ok(Category {
        id: parse_uuid(&id_text, "categories.category_uuid")?,
        user_id,
        name: row.get("name")?,
        order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
    })
}
