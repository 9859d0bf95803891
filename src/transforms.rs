//! View transforms over an already-fetched post collection.
//!
//! Everything here is pure and synchronous: same collection and parameters in, same
//! sequence out. Inputs are borrowed and never mutated; results are fresh vectors.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};

use crate::models::{RecruitmentPost, RecruitmentPostType};
use crate::query_state::{ListingParams, SortKey};

/// Offset of the reference time zone used to bucket posts by calendar year (IST, UTC+05:30).
pub const REFERENCE_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Number of posts on the home feed.
pub const HOME_FEED_SIZE: usize = 12;

/// ListingFilter
///
/// The conjunctive filter half of `ListingParams`. An empty field imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilter {
    pub organization: String,
    pub tag: String,
    pub year: String,
}

impl From<&ListingParams> for ListingFilter {
    fn from(params: &ListingParams) -> Self {
        Self {
            organization: params.organization.clone(),
            tag: params.tag.clone(),
            year: params.year.clone(),
        }
    }
}

/// Calendar year of a timestamp in the reference zone, as the year filter compares it.
pub fn year_of(timestamp: &DateTime<Utc>) -> String {
    let zone = FixedOffset::east_opt(REFERENCE_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    timestamp.with_timezone(&zone).year().to_string()
}

/// sort_posts
///
/// `Newest` orders by `created_at` descending, `Updated` by `updated_at` descending.
/// `sort_by` is stable, so posts with equal timestamps keep their input order and do
/// not jitter between renders.
pub fn sort_posts(posts: &[RecruitmentPost], sort: SortKey) -> Vec<RecruitmentPost> {
    let mut sorted = posts.to_vec();
    match sort {
        SortKey::Newest => sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::Updated => sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
    }
    sorted
}

/// filter_posts
///
/// Keeps posts matching every non-empty field of `filter`:
/// - organization: case-insensitive substring of `organization`
/// - tag: exact, case-sensitive member of `tags`
/// - year: calendar year of `created_at` (reference zone) equals the filter string
pub fn filter_posts(posts: &[RecruitmentPost], filter: &ListingFilter) -> Vec<RecruitmentPost> {
    let organization = filter.organization.to_lowercase();
    posts
        .iter()
        .filter(|post| {
            organization.is_empty() || post.organization.to_lowercase().contains(&organization)
        })
        .filter(|post| filter.tag.is_empty() || post.tags.iter().any(|tag| *tag == filter.tag))
        .filter(|post| filter.year.is_empty() || year_of(&post.created_at) == filter.year)
        .cloned()
        .collect()
}

/// search_posts
///
/// A blank query returns the input unchanged. Otherwise a post matches when the
/// lower-cased query occurs in its title, organization, exam/post name, or in at
/// least one of its tags.
pub fn search_posts(posts: &[RecruitmentPost], query: &str) -> Vec<RecruitmentPost> {
    if query.trim().is_empty() {
        return posts.to_vec();
    }

    let needle = query.to_lowercase();
    posts
        .iter()
        .filter(|post| {
            post.title.to_lowercase().contains(&needle)
                || post.organization.to_lowercase().contains(&needle)
                || post.exam_post_name.to_lowercase().contains(&needle)
                || post.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Distinct creation years present in `posts`, newest first.
pub fn available_years(posts: &[RecruitmentPost]) -> Vec<String> {
    let years: BTreeSet<String> = posts.iter().map(|post| year_of(&post.created_at)).collect();
    years.into_iter().rev().collect()
}

/// Distinct tags present in `posts`, in ascending lexicographic order.
pub fn available_tags(posts: &[RecruitmentPost]) -> Vec<String> {
    let tags: BTreeSet<&str> = posts
        .iter()
        .flat_map(|post| post.tags.iter().map(String::as_str))
        .collect();
    tags.into_iter().map(str::to_owned).collect()
}

/// Posts of one category, input order preserved.
pub fn posts_of_type(posts: &[RecruitmentPost], post_type: RecruitmentPostType) -> Vec<RecruitmentPost> {
    posts
        .iter()
        .filter(|post| post.post_type == post_type)
        .cloned()
        .collect()
}

/// The `limit` most recently created posts.
pub fn latest(posts: &[RecruitmentPost], limit: usize) -> Vec<RecruitmentPost> {
    let mut sorted = sort_posts(posts, SortKey::Newest);
    sorted.truncate(limit);
    sorted
}

/// apply_listing
///
/// The listing pipeline shared by the category and search pages:
/// `sort(filter(posts, params), params.sort)`.
pub fn apply_listing(posts: &[RecruitmentPost], params: &ListingParams) -> Vec<RecruitmentPost> {
    let filtered = filter_posts(posts, &ListingFilter::from(params));
    sort_posts(&filtered, params.sort)
}
