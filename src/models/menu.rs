use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{ApiResult, AppError};

pub type GroupId = i64;
pub type MenuId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MenuStatus {
    Pending,
    NotPublished,
    Published,
    Rejected,
}

impl MenuStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuStatus::Pending => "pending",
            MenuStatus::NotPublished => "not_published",
            MenuStatus::Published => "published",
            MenuStatus::Rejected => "rejected",
        }
    }

    /// A candidate still waiting for a publish or reject decision.
    pub fn is_open(&self) -> bool {
        matches!(self, MenuStatus::Pending | MenuStatus::NotPublished)
    }

    pub fn accepts_item_patch(&self) -> bool {
        matches!(self, MenuStatus::Pending | MenuStatus::Published)
    }
}

impl std::fmt::Display for MenuStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MenuStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MenuStatus::Pending),
            "not_published" => Ok(MenuStatus::NotPublished),
            "published" => Ok(MenuStatus::Published),
            "rejected" => Ok(MenuStatus::Rejected),
            _ => Err(AppError::Validation(format!("Unknown menu status: {s}"))),
        }
    }
}

/// A group's menu for one day, with its items in proposal order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Menu {
    pub menu_id: MenuId,
    pub grp_id: GroupId,
    pub date: DateTime<Utc>,
    pub status: MenuStatus,
    pub items: Vec<String>,
    pub proposer: String,
    pub comments: Option<String>,
    pub rejected_by: Option<String>,
    /// Set the first time the menu is published; the group is credited only then.
    pub credited_at: Option<DateTime<Utc>>,
}

impl Menu {
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

/// DB row struct: status is fetched as TEXT and parsed into `MenuStatus`.
#[derive(Debug, Clone, FromRow)]
pub struct MenuRecord {
    pub id: MenuId,
    pub grp_id: GroupId,
    pub menu_date: DateTime<Utc>,
    pub status: String,
    pub proposer: String,
    pub comments: Option<String>,
    pub rejected_by: Option<String>,
    pub credited_at: Option<DateTime<Utc>>,
}

impl MenuRecord {
    pub fn into_menu(self, items: Vec<String>) -> Result<Menu, AppError> {
        Ok(Menu {
            menu_id: self.id,
            grp_id: self.grp_id,
            date: self.menu_date,
            status: self.status.parse()?,
            items,
            proposer: self.proposer,
            comments: self.comments,
            rejected_by: self.rejected_by,
            credited_at: self.credited_at,
        })
    }
}

/// One item of a menu, flattened with the menu's date and id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuRow {
    pub item: String,
    pub date: DateTime<Utc>,
    pub menu_id: MenuId,
}

impl MenuRow {
    pub fn from_menu(menu: &Menu) -> Vec<MenuRow> {
        menu.items
            .iter()
            .map(|item| MenuRow {
                item: item.clone(),
                date: menu.date,
                menu_id: menu.menu_id,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuView {
    pub menu_id: MenuId,
    pub date: DateTime<Utc>,
    pub items: Vec<String>,
}

impl MenuView {
    /// Folds rows of a single menu back into one view. `None` when there are no rows.
    pub fn from_rows(rows: &[MenuRow]) -> Option<MenuView> {
        let first = rows.first()?;
        Some(MenuView {
            menu_id: first.menu_id,
            date: first.date,
            items: rows.iter().map(|r| r.item.clone()).collect(),
        })
    }
}

/// Response of GET /menu: a menu, or an explicit "nothing there".
#[derive(Debug, Serialize)]
pub struct MenuLookup {
    pub found: bool,
    #[serde(flatten)]
    pub menu: Option<MenuView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Option<MenuView>> for MenuLookup {
    fn from(menu: Option<MenuView>) -> Self {
        match menu {
            Some(menu) => MenuLookup {
                found: true,
                menu: Some(menu),
                message: None,
            },
            None => MenuLookup {
                found: false,
                menu: None,
                message: Some("No such menu found.".into()),
            },
        }
    }
}

/// Query params for GET /menu.
#[derive(Debug, Deserialize)]
pub struct MenuStatusQuery {
    pub status: String,
}

/// Body for POST /menu.
#[derive(Debug, Deserialize)]
pub struct ProposeMenuRequest {
    pub items: Vec<String>,
    /// ISO 8601 timestamp, e.g. "2024-05-01T09:30:00.000Z".
    pub date: String,
}

/// A validated proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposeMenu {
    pub items: Vec<String>,
    pub date: DateTime<Utc>,
}

impl ProposeMenuRequest {
    pub fn validate(self) -> ApiResult<ProposeMenu> {
        if self.items.is_empty() {
            return Err(AppError::Validation("items must not be empty".into()));
        }
        if self.items.iter().any(|item| item.trim().is_empty()) {
            return Err(AppError::Validation("items must not be blank".into()));
        }
        let date = parse_menu_date(&self.date)?;
        Ok(ProposeMenu {
            items: self.items,
            date,
        })
    }
}

/// Accepts RFC 3339 timestamps, or a zone-less timestamp taken as UTC.
pub fn parse_menu_date(raw: &str) -> ApiResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| AppError::Validation(format!("Invalid date: {raw}")))
}

/// Body for PUT /menu.
#[derive(Debug, Deserialize)]
pub struct UpdateMenuRequest {
    pub menu_id: MenuId,
    pub status: String,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuUpdate {
    Publish,
    Reject { comments: String },
    Status(MenuStatus),
}

impl UpdateMenuRequest {
    pub fn validate(&self) -> ApiResult<MenuUpdate> {
        match self.status.parse::<MenuStatus>()? {
            MenuStatus::Published => Ok(MenuUpdate::Publish),
            MenuStatus::Rejected => {
                let comments = self
                    .comments
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| {
                        AppError::Validation("comments are required to reject a menu".into())
                    })?;
                Ok(MenuUpdate::Reject {
                    comments: comments.to_string(),
                })
            }
            other => Ok(MenuUpdate::Status(other)),
        }
    }
}

/// Body for PATCH /menu/{menu_id}.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub old_item: String,
    pub new_item: String,
}

impl UpdateItemRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.old_item.trim().is_empty() || self.new_item.trim().is_empty() {
            return Err(AppError::Validation(
                "old_item and new_item must not be blank".into(),
            ));
        }
        Ok(())
    }
}
