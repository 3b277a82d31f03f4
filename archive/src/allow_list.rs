//! URL allow-list for remote archive locators.
//!
//! Entries are URL prefixes. A locator is permitted when it begins with any
//! entry, compared ASCII case-insensitively so that `HTTPS://Host/` and
//! `https://host/` behave the same. The list is ordered only for display;
//! matching stops at the first hit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefixes accepted when no allow-list is configured.
///
/// Mirrors the permissive default of the model server: any `file`, `http`,
/// or `https` locator.
pub const DEFAULT_ALLOWED_PREFIXES: [&str; 3] = ["file://", "http://", "https://"];

/// An ordered set of permitted URL prefixes.
///
/// # Examples
///
/// ```
/// use model_archive::allow_list::AllowList;
///
/// let list = AllowList::new(["https://host/"]);
/// assert!(list.is_allowed("https://host/models/resnet.mar"));
/// assert!(!list.is_allowed("https://other/models/resnet.mar"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList(Vec<String>);

impl AllowList {
    /// Build an allow-list from the given prefixes. Blank entries are
    /// dropped.
    #[must_use]
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            prefixes
                .into_iter()
                .map(Into::into)
                .map(|prefix| prefix.trim().to_owned())
                .filter(|prefix| !prefix.is_empty())
                .collect(),
        )
    }

    /// Return whether `locator` matches any configured prefix.
    #[must_use]
    pub fn is_allowed(&self, locator: &str) -> bool {
        self.0.iter().any(|prefix| starts_with_ignore_case(locator, prefix))
    }

    /// Return the configured prefixes in order.
    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.0
    }

    /// Return true when no prefix is configured, in which case every
    /// locator is rejected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_PREFIXES)
    }
}

impl fmt::Display for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}
