//! Listing query-state adapter.
//!
//! Translates between the navigable URL query string (untyped, every key optional) and
//! `ListingParams` (typed, defaulted). The empty string is the canonical "unset" value
//! and is never written back to a URL, so default state does not leak into shareable
//! links.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use url::form_urlencoded;
use utoipa::ToSchema;

pub const SORT_KEY: &str = "sort";
pub const ORGANIZATION_KEY: &str = "organization";
pub const TAG_KEY: &str = "tag";
pub const YEAR_KEY: &str = "year";
pub const SEARCH_KEY: &str = "q";

/// SortKey
///
/// Listing order. Anything other than `updated` in the URL reads as `Newest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortKey {
    #[default]
    Newest,
    Updated,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Updated => "updated",
        }
    }

    /// Lenient URL parsing: unknown or empty values fall back to the default.
    pub fn from_param(value: &str) -> Self {
        match value {
            "updated" => SortKey::Updated,
            _ => SortKey::Newest,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ListingParams
///
/// Normalized sort/filter state of a listing page. Derived from the URL on every read and
/// never persisted anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ListingParams {
    pub sort: SortKey,
    pub organization: String,
    pub tag: String,
    pub year: String,
}

/// ListingUpdate
///
/// A partial change to `ListingParams`. `None` keeps the current value; `Some("")`
/// clears a filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ListingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

impl ListingParams {
    /// Reads params from a raw query string (with or without the leading `?`).
    /// Missing keys take their defaults; malformed input never fails.
    pub fn from_query(raw: &str) -> Self {
        Self::from_pairs(parse_pairs(raw))
    }

    /// Reads params from decoded key/value pairs. A repeated key keeps its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = ListingParams::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                SORT_KEY => params.sort = SortKey::from_param(value),
                ORGANIZATION_KEY => params.organization = value.to_string(),
                TAG_KEY => params.tag = value.to_string(),
                YEAR_KEY => params.year = value.to_string(),
                _ => {}
            }
        }
        params
    }

    /// Current params with `update` laid over them.
    pub fn merge(&self, update: &ListingUpdate) -> Self {
        Self {
            sort: update.sort.unwrap_or(self.sort),
            organization: update
                .organization
                .clone()
                .unwrap_or_else(|| self.organization.clone()),
            tag: update.tag.clone().unwrap_or_else(|| self.tag.clone()),
            year: update.year.clone().unwrap_or_else(|| self.year.clone()),
        }
    }

    /// The pairs that belong in a URL: empty values and the default sort are stripped.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if self.sort != SortKey::default() {
            pairs.push((SORT_KEY, self.sort.as_str().to_string()));
        }
        for (key, value) in [
            (ORGANIZATION_KEY, &self.organization),
            (TAG_KEY, &self.tag),
            (YEAR_KEY, &self.year),
        ] {
            if !value.is_empty() {
                pairs.push((key, value.clone()));
            }
        }
        pairs
    }

    pub fn to_query_string(&self) -> String {
        encode_pairs(self.to_pairs())
    }
}

/// ListingLocation
///
/// A listing page's full navigable state: path, optional search text (`q`) and the
/// listing params. Navigation always replaces the whole query set, so an update is
/// assembled here from the current location plus the partial change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct ListingLocation {
    pub path: String,
    pub search: String,
    pub params: ListingParams,
}

impl ListingLocation {
    pub fn parse(path: &str, raw_query: &str) -> Self {
        let pairs = parse_pairs(raw_query);
        let search = pairs
            .iter()
            .rev()
            .find(|(key, _)| key == SEARCH_KEY)
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        Self {
            path: path.to_string(),
            search,
            params: ListingParams::from_pairs(pairs),
        }
    }

    /// update_params
    ///
    /// Merges `update` into the current params. `q` is carried over unchanged so that
    /// filtering a search result does not drop the search.
    pub fn update_params(&self, update: &ListingUpdate) -> Self {
        Self {
            path: self.path.clone(),
            search: self.search.clone(),
            params: self.params.merge(update),
        }
    }

    pub fn query_string(&self) -> String {
        let mut pairs = Vec::with_capacity(5);
        if !self.search.is_empty() {
            pairs.push((SEARCH_KEY, self.search.clone()));
        }
        pairs.extend(self.params.to_pairs());
        encode_pairs(pairs)
    }

    /// Path plus canonical query, the target a navigation should land on.
    pub fn href(&self) -> String {
        let query = self.query_string();
        if query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, query)
        }
    }

    /// True when `raw_query` is already in the form this adapter would write.
    pub fn is_canonical_query(&self, raw_query: &str) -> bool {
        raw_query.trim_start_matches('?') == self.query_string()
    }
}

fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(raw.trim_start_matches('?').as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn encode_pairs(pairs: Vec<(&'static str, String)>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, &value);
    }
    serializer.finish()
}
