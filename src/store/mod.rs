//! Storage seam for menus and group accounts.
//!
//! The lifecycle manager only talks to these traits. `PgStore` backs the
//! running service; `MemoryStore` is the test double.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ApiResult;
use crate::models::account::Account;
use crate::models::menu::{GroupId, Menu, MenuId, MenuStatus, ProposeMenu};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait MenuStore: Send + Sync {
    /// Insert a new `pending` menu and its items, returning the generated id.
    /// Opens a zero-balance account for the group if it has none yet.
    async fn insert_menu(
        &self,
        grp_id: GroupId,
        proposer: &str,
        menu: &ProposeMenu,
    ) -> ApiResult<MenuId>;

    async fn find_menu(&self, menu_id: MenuId) -> ApiResult<Option<Menu>>;

    /// Most recent menu (latest date, then highest id) of a group in `status`.
    async fn latest_by_status(
        &self,
        grp_id: GroupId,
        status: MenuStatus,
    ) -> ApiResult<Option<Menu>>;

    /// Id of the menu published for `grp_id` on `day`, if any.
    async fn published_on(&self, grp_id: GroupId, day: NaiveDate) -> ApiResult<Option<MenuId>>;

    /// Overwrite the status. Returns false when the menu does not exist.
    async fn set_status(&self, menu_id: MenuId, status: MenuStatus) -> ApiResult<bool>;

    /// Mark the menu rejected with the reviewer's comments.
    async fn record_rejection(
        &self,
        menu_id: MenuId,
        comments: &str,
        username: &str,
    ) -> ApiResult<bool>;

    /// Replace the first occurrence of `old_item`. Returns false when it is absent.
    async fn replace_item(&self, menu_id: MenuId, old_item: &str, new_item: &str)
        -> ApiResult<bool>;

    /// Publish an open menu and, unless it was credited before, add `credit`
    /// to its group's balance, in one atomic step. Returns whether the
    /// balance was credited.
    ///
    /// Nothing is written when the credit fails with `AccountNotFound`.
    async fn publish(&self, menu_id: MenuId, grp_id: GroupId, credit: i64) -> ApiResult<bool>;
}

/// Read side of the group balances. Credits are only ever written by
/// `MenuStore::publish`.
#[async_trait]
pub trait AccountLedger: Send + Sync {
    async fn balance(&self, grp_id: GroupId) -> ApiResult<Account>;
}
