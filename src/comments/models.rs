use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Comment as shown on a page, joined with its author
#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    /// UTC, `YYYY-MM-DD HH:MM:SS`
    pub time: String,
    pub name: String,
    pub image: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateComment {
    #[serde(default)]
    pub hostname: String,
    pub target: String,
    pub content: String,
}

/// Identifies the page a thread belongs to
#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub target: String,
}

/// Query parameters of the widget page `GET /`
#[derive(Deserialize, Debug, Default)]
pub struct WidgetQuery {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub target: String,
    pub error: Option<String>,
}
