//! Category use-case service.
//!
//! # Responsibility
//! - Gate category use-cases on the caller's identity.
//! - Pick the lane a new note lands in when none is named.
//!
//! # Invariants
//! - Seeding requires an authenticated caller; listing does not (anonymous
//!   callers see an empty board).

use crate::auth::Caller;
use crate::error::{BoardError, BoardResult};
use crate::model::category::{Category, CategoryId};
use crate::repo::category_repo::CategoryRepository;

/// Category service facade over repository implementations.
pub struct CategoryService<R: CategoryRepository> {
    repo: R,
}

impl<R: CategoryRepository> CategoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Seeds the default categories for a user with none.
    ///
    /// Returns `true` when seeding happened, `false` for the no-op case.
    pub fn ensure_defaults(&self, caller: &Caller) -> BoardResult<bool> {
        let user_id = caller.user_id().ok_or(BoardError::Unauthorized)?;
        Ok(self.repo.ensure_defaults(user_id)?)
    }

    /// Lists the caller's categories in display order.
    pub fn list(&self, caller: &Caller) -> BoardResult<Vec<Category>> {
        match caller.user_id() {
            Some(user_id) => Ok(self.repo.list_categories(user_id)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn get(&self, caller: &Caller, category_id: CategoryId) -> BoardResult<Option<Category>> {
        match caller.user_id() {
            Some(user_id) => Ok(self.repo.get_category(user_id, category_id)?),
            None => Ok(None),
        }
    }

    /// Lane targeted by "new note": the filtered category when it is owned,
    /// else the first category.
    pub fn default_lane(
        &self,
        caller: &Caller,
        filter: Option<CategoryId>,
    ) -> BoardResult<Option<Category>> {
        if let Some(category_id) = filter {
            if let Some(category) = self.get(caller, category_id)? {
                return Ok(Some(category));
            }
        }
        Ok(self.list(caller)?.into_iter().next())
    }
}
