use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    error::{ApiResult, AppError},
    models::menu::{
        GroupId, Menu, MenuId, MenuRow, MenuStatus, MenuUpdate, ProposeMenu, UpdateMenuRequest,
    },
    services::locks::GroupLocks,
    store::MenuStore,
};

/// Menu lifecycle: proposal, review and publication of a group's daily menus.
///
/// ```text
/// propose -> pending | not_published --publish--> published (+credit)
///                                    \--reject---> rejected
/// ```
///
/// Every operation is scoped to the caller's group; a menu owned by another
/// group is reported as not found.
pub struct MenuService {
    store: Arc<dyn MenuStore>,
    locks: GroupLocks,
    publish_credit: i64,
}

impl MenuService {
    pub fn new(store: Arc<dyn MenuStore>, publish_credit: i64) -> Self {
        Self {
            store,
            locks: GroupLocks::new(),
            publish_credit,
        }
    }

    /// Create a new `pending` menu.
    pub async fn propose(
        &self,
        grp_id: GroupId,
        proposer: &str,
        proposal: ProposeMenu,
    ) -> ApiResult<MenuId> {
        if proposal.items.is_empty() {
            return Err(AppError::Validation("items must not be empty".into()));
        }

        let _guard = self.locks.acquire(grp_id).await;
        let menu_id = self.store.insert_menu(grp_id, proposer, &proposal).await?;
        info!(menu_id, grp_id, proposer, items = proposal.items.len(), "menu proposed");
        Ok(menu_id)
    }

    /// Rows of the group's most recent menu in `status`. Empty when there is none.
    pub async fn menu_by_status(
        &self,
        grp_id: GroupId,
        status: MenuStatus,
    ) -> ApiResult<Vec<MenuRow>> {
        let rows = self
            .store
            .latest_by_status(grp_id, status)
            .await?
            .map(|menu| MenuRow::from_menu(&menu))
            .unwrap_or_default();
        if rows.is_empty() {
            debug!(grp_id, %status, "no menu found");
        }
        Ok(rows)
    }

    /// The group's current published menu.
    pub async fn view_accepted(&self, grp_id: GroupId) -> ApiResult<Vec<MenuRow>> {
        self.menu_by_status(grp_id, MenuStatus::Published).await
    }

    /// Publish an open menu and credit the group's balance.
    ///
    /// Publishing is not re-entrant: a menu that is already published fails
    /// with `InvalidTransition`. A menu that was published, moved back to an
    /// open status and published again is not credited a second time.
    pub async fn publish(
        &self,
        menu_id: MenuId,
        grp_id: GroupId,
        menu_date: DateTime<Utc>,
    ) -> ApiResult<()> {
        let _guard = self.locks.acquire(grp_id).await;

        let menu = self.owned_menu(menu_id, grp_id).await?;
        if !menu.status.is_open() {
            return Err(AppError::InvalidTransition {
                from: menu.status,
                to: MenuStatus::Published,
            });
        }
        let day = menu.day();
        if menu_date.date_naive() != day {
            return Err(AppError::Validation(format!(
                "Menu {menu_id} is for {day}, not {}",
                menu_date.date_naive()
            )));
        }
        if let Some(existing) = self.store.published_on(grp_id, day).await? {
            debug!(menu_id, existing, %day, "publish blocked by existing menu");
            return Err(AppError::AlreadyPublished(day));
        }

        let credited = self
            .store
            .publish(menu_id, grp_id, self.publish_credit)
            .await?;
        if credited {
            info!(menu_id, grp_id, %day, credit = self.publish_credit, "menu published");
        } else {
            info!(menu_id, grp_id, %day, "menu republished without credit");
        }
        Ok(())
    }

    pub async fn reject(
        &self,
        menu_id: MenuId,
        grp_id: GroupId,
        comments: &str,
        username: &str,
    ) -> ApiResult<String> {
        if comments.trim().is_empty() {
            return Err(AppError::Validation(
                "comments are required to reject a menu".into(),
            ));
        }

        let _guard = self.locks.acquire(grp_id).await;

        let menu = self.owned_menu(menu_id, grp_id).await?;
        if !menu.status.is_open() {
            return Err(AppError::InvalidTransition {
                from: menu.status,
                to: MenuStatus::Rejected,
            });
        }
        if !self.store.record_rejection(menu_id, comments, username).await? {
            return Err(menu_not_found(menu_id));
        }
        info!(menu_id, grp_id, rejected_by = username, "menu rejected");
        Ok(format!("Menu {menu_id} rejected"))
    }

    /// Overwrite the status of an existing menu. `published` and `rejected`
    /// carry side effects and go through `publish`/`reject` instead.
    pub async fn update_status(
        &self,
        menu_id: MenuId,
        grp_id: GroupId,
        status: MenuStatus,
    ) -> ApiResult<String> {
        if matches!(status, MenuStatus::Published | MenuStatus::Rejected) {
            return Err(AppError::Validation(format!(
                "status {status} must be set by publishing or rejecting the menu"
            )));
        }

        let _guard = self.locks.acquire(grp_id).await;

        let menu = self.owned_menu(menu_id, grp_id).await?;
        if !self.store.set_status(menu_id, status).await? {
            return Err(menu_not_found(menu_id));
        }
        info!(menu_id, grp_id, from = %menu.status, to = %status, "menu status updated");
        Ok(format!("Menu {menu_id} status updated to {status}"))
    }

    /// Replace the first occurrence of `old_item` with `new_item`.
    pub async fn patch_item(
        &self,
        menu_id: MenuId,
        grp_id: GroupId,
        old_item: &str,
        new_item: &str,
    ) -> ApiResult<()> {
        let _guard = self.locks.acquire(grp_id).await;

        let menu = self.owned_menu(menu_id, grp_id).await?;
        if !menu.status.accepts_item_patch() {
            return Err(AppError::Validation(format!(
                "Menu {menu_id} is {} and cannot be edited",
                menu.status
            )));
        }
        if !self.store.replace_item(menu_id, old_item, new_item).await? {
            return Err(AppError::NotFound(format!(
                "Item '{old_item}' not found in menu {menu_id}"
            )));
        }
        info!(menu_id, grp_id, old_item, new_item, "menu item replaced");
        Ok(())
    }

    /// Route a PUT /menu request to publish, reject or a plain status write.
    pub async fn apply_update(
        &self,
        grp_id: GroupId,
        username: &str,
        req: &UpdateMenuRequest,
    ) -> ApiResult<String> {
        match req.validate()? {
            MenuUpdate::Publish => {
                let menu = self.owned_menu(req.menu_id, grp_id).await?;
                self.publish(menu.menu_id, grp_id, menu.date).await?;
                Ok("success".into())
            }
            MenuUpdate::Reject { comments } => {
                self.reject(req.menu_id, grp_id, &comments, username).await
            }
            MenuUpdate::Status(status) => self.update_status(req.menu_id, grp_id, status).await,
        }
    }

    async fn owned_menu(&self, menu_id: MenuId, grp_id: GroupId) -> ApiResult<Menu> {
        self.store
            .find_menu(menu_id)
            .await?
            .filter(|menu| menu.grp_id == grp_id)
            .ok_or_else(|| menu_not_found(menu_id))
    }
}

fn menu_not_found(menu_id: MenuId) -> AppError {
    AppError::NotFound(format!("Menu {menu_id} not found"))
}
