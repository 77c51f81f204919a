use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use super::{AccountLedger, MenuStore};
use crate::error::{ApiResult, AppError};
use crate::models::account::Account;
use crate::models::menu::{GroupId, Menu, MenuId, MenuRecord, MenuStatus, ProposeMenu};

const MENU_COLUMNS: &str =
    "id, grp_id, menu_date, status, proposer, comments, rejected_by, credited_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, menu_id: MenuId) -> ApiResult<Vec<String>> {
        let items = sqlx::query_scalar::<_, String>(
            "SELECT item FROM menu_items WHERE menu_id = $1 ORDER BY position",
        )
        .bind(menu_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn hydrate(&self, record: Option<MenuRecord>) -> ApiResult<Option<Menu>> {
        match record {
            Some(record) => {
                let items = self.load_items(record.id).await?;
                Ok(Some(record.into_menu(items)?))
            }
            None => Ok(None),
        }
    }
}

async fn credit_account(
    conn: &mut PgConnection,
    grp_id: GroupId,
    amount: i64,
) -> ApiResult<()> {
    let result = sqlx::query(
        "UPDATE accounts SET balance = balance + $1, updated_at = NOW() WHERE grp_id = $2",
    )
    .bind(amount)
    .bind(grp_id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::AccountNotFound(grp_id));
    }
    Ok(())
}

#[async_trait]
impl MenuStore for PgStore {
    async fn insert_menu(
        &self,
        grp_id: GroupId,
        proposer: &str,
        menu: &ProposeMenu,
    ) -> ApiResult<MenuId> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO accounts (grp_id) VALUES ($1) ON CONFLICT (grp_id) DO NOTHING")
            .bind(grp_id)
            .execute(&mut *tx)
            .await?;

        let menu_id = sqlx::query_scalar::<_, MenuId>(
            "INSERT INTO menus (grp_id, menu_date, menu_day, status, proposer)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(grp_id)
        .bind(menu.date)
        .bind(menu.date.date_naive())
        .bind(MenuStatus::Pending.as_str())
        .bind(proposer)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO menu_items (menu_id, position, item)
             SELECT $1, t.pos::INTEGER, t.item
             FROM UNNEST($2::VARCHAR[]) WITH ORDINALITY AS t(item, pos)",
        )
        .bind(menu_id)
        .bind(&menu.items)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(menu_id)
    }

    async fn find_menu(&self, menu_id: MenuId) -> ApiResult<Option<Menu>> {
        let record = sqlx::query_as::<_, MenuRecord>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus WHERE id = $1"
        ))
        .bind(menu_id)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate(record).await
    }

    async fn latest_by_status(
        &self,
        grp_id: GroupId,
        status: MenuStatus,
    ) -> ApiResult<Option<Menu>> {
        let record = sqlx::query_as::<_, MenuRecord>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus
             WHERE grp_id = $1 AND status = $2
             ORDER BY menu_date DESC, id DESC
             LIMIT 1"
        ))
        .bind(grp_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate(record).await
    }

    async fn published_on(&self, grp_id: GroupId, day: NaiveDate) -> ApiResult<Option<MenuId>> {
        let id = sqlx::query_scalar::<_, MenuId>(
            "SELECT id FROM menus WHERE grp_id = $1 AND menu_day = $2 AND status = 'published'",
        )
        .bind(grp_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn set_status(&self, menu_id: MenuId, status: MenuStatus) -> ApiResult<bool> {
        let result =
            sqlx::query("UPDATE menus SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status.as_str())
                .bind(menu_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_rejection(
        &self,
        menu_id: MenuId,
        comments: &str,
        username: &str,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE menus
             SET status = 'rejected', comments = $1, rejected_by = $2, updated_at = NOW()
             WHERE id = $3",
        )
        .bind(comments)
        .bind(username)
        .bind(menu_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_item(
        &self,
        menu_id: MenuId,
        old_item: &str,
        new_item: &str,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE menu_items SET item = $3
             WHERE id = (
                 SELECT id FROM menu_items
                 WHERE menu_id = $1 AND item = $2
                 ORDER BY position
                 LIMIT 1
             )",
        )
        .bind(menu_id)
        .bind(old_item)
        .bind(new_item)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn publish(&self, menu_id: MenuId, grp_id: GroupId, credit: i64) -> ApiResult<bool> {
        let mut tx = self.pool.begin().await?;

        let (day, already_credited) = sqlx::query_as::<_, (NaiveDate, bool)>(
            "SELECT menu_day, credited_at IS NOT NULL FROM menus
             WHERE id = $1 AND grp_id = $2 AND status IN ('pending', 'not_published')
             FOR UPDATE",
        )
        .bind(menu_id)
        .bind(grp_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No open menu with id {menu_id}")))?;

        sqlx::query(
            "UPDATE menus
             SET status = 'published', credited_at = COALESCE(credited_at, NOW()), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(menu_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::AlreadyPublished(day)
            }
            other => other.into(),
        })?;

        if !already_credited {
            // Dropping `tx` on error rolls the status change back.
            credit_account(&mut *tx, grp_id, credit).await?;
        }

        tx.commit().await?;
        Ok(!already_credited)
    }
}

#[async_trait]
impl AccountLedger for PgStore {
    async fn balance(&self, grp_id: GroupId) -> ApiResult<Account> {
        sqlx::query_as::<_, Account>(
            "SELECT grp_id, balance, updated_at FROM accounts WHERE grp_id = $1",
        )
        .bind(grp_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::AccountNotFound(grp_id))
    }
}
