//! In-memory test double for `MenuStore` and `AccountLedger`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use super::{AccountLedger, MenuStore};
use crate::error::{ApiResult, AppError};
use crate::models::account::Account;
use crate::models::menu::{GroupId, Menu, MenuId, MenuStatus, ProposeMenu};

#[derive(Debug, Default)]
struct Tables {
    next_id: MenuId,
    menus: BTreeMap<MenuId, Menu>,
    accounts: HashMap<GroupId, Account>,
}

impl Tables {
    fn open_account(&mut self, grp_id: GroupId) {
        self.accounts.entry(grp_id).or_insert_with(|| Account {
            grp_id,
            balance: 0,
            updated_at: Utc::now(),
        });
    }

    fn credit(&mut self, grp_id: GroupId, amount: i64) -> ApiResult<()> {
        let account = self
            .accounts
            .get_mut(&grp_id)
            .ok_or(AppError::AccountNotFound(grp_id))?;
        account.balance += amount;
        account.updated_at = Utc::now();
        Ok(())
    }
}

/// All tables sit behind one lock, so every operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with a zero-balance account for each group.
    pub fn with_accounts(grp_ids: impl IntoIterator<Item = GroupId>) -> Self {
        let mut tables = Tables::default();
        for grp_id in grp_ids {
            tables.open_account(grp_id);
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    #[cfg(test)]
    pub(crate) async fn close_account(&self, grp_id: GroupId) {
        self.tables.write().await.accounts.remove(&grp_id);
    }
}

#[async_trait]
impl MenuStore for MemoryStore {
    async fn insert_menu(
        &self,
        grp_id: GroupId,
        proposer: &str,
        menu: &ProposeMenu,
    ) -> ApiResult<MenuId> {
        let mut tables = self.tables.write().await;
        tables.open_account(grp_id);
        tables.next_id += 1;
        let menu_id = tables.next_id;
        tables.menus.insert(
            menu_id,
            Menu {
                menu_id,
                grp_id,
                date: menu.date,
                status: MenuStatus::Pending,
                items: menu.items.clone(),
                proposer: proposer.to_string(),
                comments: None,
                rejected_by: None,
                credited_at: None,
            },
        );
        Ok(menu_id)
    }

    async fn find_menu(&self, menu_id: MenuId) -> ApiResult<Option<Menu>> {
        Ok(self.tables.read().await.menus.get(&menu_id).cloned())
    }

    async fn latest_by_status(
        &self,
        grp_id: GroupId,
        status: MenuStatus,
    ) -> ApiResult<Option<Menu>> {
        let tables = self.tables.read().await;
        let latest = tables
            .menus
            .values()
            .filter(|m| m.grp_id == grp_id && m.status == status)
            .max_by_key(|m| (m.date, m.menu_id))
            .cloned();
        Ok(latest)
    }

    async fn published_on(&self, grp_id: GroupId, day: NaiveDate) -> ApiResult<Option<MenuId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .menus
            .values()
            .find(|m| m.grp_id == grp_id && m.status == MenuStatus::Published && m.day() == day)
            .map(|m| m.menu_id))
    }

    async fn set_status(&self, menu_id: MenuId, status: MenuStatus) -> ApiResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.menus.get_mut(&menu_id) {
            Some(menu) => {
                menu.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_rejection(
        &self,
        menu_id: MenuId,
        comments: &str,
        username: &str,
    ) -> ApiResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.menus.get_mut(&menu_id) {
            Some(menu) => {
                menu.status = MenuStatus::Rejected;
                menu.comments = Some(comments.to_string());
                menu.rejected_by = Some(username.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_item(
        &self,
        menu_id: MenuId,
        old_item: &str,
        new_item: &str,
    ) -> ApiResult<bool> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .menus
            .get_mut(&menu_id)
            .and_then(|menu| menu.items.iter_mut().find(|item| item.as_str() == old_item));
        match slot {
            Some(item) => {
                *item = new_item.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn publish(&self, menu_id: MenuId, grp_id: GroupId, credit: i64) -> ApiResult<bool> {
        let mut tables = self.tables.write().await;

        let (day, already_credited) = match tables.menus.get(&menu_id) {
            Some(menu) if menu.grp_id == grp_id && menu.status.is_open() => {
                (menu.day(), menu.credited_at.is_some())
            }
            _ => return Err(AppError::NotFound(format!("No open menu with id {menu_id}"))),
        };
        let clash = tables.menus.values().any(|m| {
            m.menu_id != menu_id
                && m.grp_id == grp_id
                && m.status == MenuStatus::Published
                && m.day() == day
        });
        if clash {
            return Err(AppError::AlreadyPublished(day));
        }

        // Credit first so a missing account leaves the menu untouched.
        if !already_credited {
            tables.credit(grp_id, credit)?;
        }
        if let Some(menu) = tables.menus.get_mut(&menu_id) {
            menu.status = MenuStatus::Published;
            menu.credited_at.get_or_insert_with(Utc::now);
        }
        Ok(!already_credited)
    }
}

#[async_trait]
impl AccountLedger for MemoryStore {
    async fn balance(&self, grp_id: GroupId) -> ApiResult<Account> {
        self.tables
            .read()
            .await
            .accounts
            .get(&grp_id)
            .cloned()
            .ok_or(AppError::AccountNotFound(grp_id))
    }
}
