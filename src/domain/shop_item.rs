use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::Article;
use crate::error::{Error, Result};

/// Numeric identifier of one size option of an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct SizeId(i32);

impl SizeId {
    pub fn value(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for SizeId {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        if value <= 0 {
            return Err(Error::Validation(format!(
                "Size id must be positive, got {}",
                value
            )));
        }
        Ok(Self(value))
    }
}

impl FromStr for SizeId {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let value: i32 = value
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("Size id '{}' is not a number", value)))?;

        value.try_into()
    }
}

impl From<SizeId> for i32 {
    fn from(size_id: SizeId) -> Self {
        size_id.0
    }
}

impl fmt::Display for SizeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The (article, size) pair that identifies one watchable catalog item
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub article: Article,
    pub size_id: SizeId,
}

impl ItemKey {
    pub fn new(article: Article, size_id: SizeId) -> Self {
        Self { article, size_id }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.article, self.size_id)
    }
}

/// A catalog item a user wants to be notified about.
/// Only `article` and `size_id` identify the item; the remaining fields are
/// filled in best-effort from the catalog when a subscription is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
    pub article: Article,
    pub size_id: SizeId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub size_label: String,
    #[serde(default)]
    pub url: String,
}

impl ShopItem {
    pub fn new(article: Article, size_id: SizeId) -> Self {
        Self {
            article,
            size_id,
            description: String::new(),
            size_label: String::new(),
            url: String::new(),
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.article.clone(), self.size_id)
    }
}
