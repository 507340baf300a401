use std::fmt;
use std::str::FromStr;

use regex::Regex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_LEN: usize = 32;

/// A catalog article, normalized to its digits only (`"111-222"` becomes `"111222"`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Article(String);

impl Article {
    /// Strip every non-digit character from a user supplied article
    pub fn normalize(value: &str) -> String {
        lazy_static::lazy_static! {
            static ref NON_DIGITS: Regex = Regex::new(r"[^0-9]").unwrap();
        }

        NON_DIGITS.replace_all(value, "").into_owned()
    }
}

impl FromStr for Article {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = Self::normalize(value);

        if normalized.is_empty() {
            return Err(Error::Validation(format!(
                "Article '{}' contains no digits",
                value
            )));
        }
        if normalized.len() > MAX_LEN {
            return Err(Error::Validation("Article too long".into()));
        }

        Ok(Self(normalized))
    }
}

impl TryFrom<String> for Article {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Article> for String {
    fn from(article: Article) -> Self {
        article.0
    }
}

impl AsRef<str> for Article {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
