use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::menu::GroupId;

/// A group's account balance.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Account {
    pub grp_id: GroupId,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}
