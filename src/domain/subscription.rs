use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Article, ItemKey, ShopItem, SizeId, StockSnapshot};
use crate::error::{Error, Result};

const MAX_USER_ID_LEN: usize = 128;

/// Opaque identifier of a subscriber, as handed over by the front end
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl FromStr for UserId {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();

        if value.is_empty() {
            return Err(Error::Validation("User id cannot be empty".into()));
        }
        if value.len() > MAX_USER_ID_LEN {
            return Err(Error::Validation("User id too long".into()));
        }

        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self { id }
    }
}

/// Composite identity of a subscription: at most one record exists per key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionKey {
    pub user_id: UserId,
    pub article: Article,
    pub size_id: SizeId,
}

impl SubscriptionKey {
    pub fn item_key(&self) -> ItemKey {
        ItemKey::new(self.article.clone(), self.size_id)
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.user_id, self.article, self.size_id)
    }
}

/// A user's request to be told when a shop item comes into stock.
/// Serializes to the persisted record shape
/// `{user: {id}, shopItem: {article, sizeId, description, sizeLabel, url}, active}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub user: User,
    pub shop_item: ShopItem,
    pub active: bool,
}

impl Subscription {
    /// A new, active subscription
    pub fn new(user: User, shop_item: ShopItem) -> Self {
        Self {
            user,
            shop_item,
            active: true,
        }
    }

    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey {
            user_id: self.user.id.clone(),
            article: self.shop_item.article.clone(),
            size_id: self.shop_item.size_id,
        }
    }
}

/// Unvalidated subscription input coming from a front end
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRequest {
    pub user_id: String,
    pub article: String,
    pub size_id: i32,
}

impl TryFrom<SubscriptionRequest> for Subscription {
    type Error = Error;

    fn try_from(request: SubscriptionRequest) -> Result<Self> {
        let user = User::new(request.user_id.parse()?);
        let article = request.article.parse()?;
        let size_id = SizeId::try_from(request.size_id)?;

        Ok(Subscription::new(user, ShopItem::new(article, size_id)))
    }
}

/// Outbound event telling a subscriber that their item is in stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user: User,
    pub shop_item: ShopItem,
    pub snapshot: StockSnapshot,
}
