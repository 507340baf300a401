use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Article, ItemKey, SizeId};

/// Catalog stock state of a single size option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    InStock,
    ComingSoon,
    #[serde(other)]
    Unknown,
}

impl StockStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StockStatus::InStock => "InStock",
            StockStatus::ComingSoon => "ComingSoon",
            StockStatus::Unknown => "Unknown",
        }
    }
}

impl From<&str> for StockStatus {
    fn from(s: &str) -> Self {
        match s {
            "InStock" => Self::InStock,
            "ComingSoon" => Self::ComingSoon,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current catalog state of one size option of an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub article: Article,
    pub size_id: SizeId,
    /// Human readable size label, e.g. `"10 (140cm)"`
    pub name: String,
    pub price: String,
    pub status: StockStatus,
}

impl StockSnapshot {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.article.clone(), self.size_id)
    }

    pub fn is_in_stock(&self) -> bool {
        self.status == StockStatus::InStock
    }
}

impl fmt::Display for StockSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}, {}", self.status, self.name, self.price)
    }
}

/// Catalog description of an article together with all of its size options
#[derive(Debug, Clone, Default)]
pub struct ItemDetails {
    pub description: String,
    pub options: Vec<StockSnapshot>,
}

impl ItemDetails {
    /// Find the option matching the given size
    pub fn option(&self, size_id: SizeId) -> Option<&StockSnapshot> {
        self.options.iter().find(|option| option.size_id == size_id)
    }
}
