use crate::error::PortalError;
use crate::models::{KeyValue, PostInput, RecruitmentPost};

/// RowList
///
/// Which key/value list of the draft a row operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowList {
    ImportantDates,
    OfficialLinks,
}

/// PostDraft
///
/// The admin editor's working copy of a post. Every edit goes through a method here, so
/// the draft can never hold a duplicate or blank tag. Rows keep the order they were added
/// in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostDraft {
    input: PostInput,
}

impl PostDraft {
    /// An empty draft: `recruitmentForm`, blank text, no rows, no tags.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_post(post: &RecruitmentPost) -> Self {
        Self {
            input: post.to_input(),
        }
    }

    /// A draft seeded from a submitted payload. Tags go through `add_tag`, so blank and
    /// repeated ones are dropped.
    pub fn from_input(input: PostInput) -> Self {
        let tags = input.tags.clone();
        let mut draft = Self {
            input: PostInput {
                tags: Vec::with_capacity(tags.len()),
                ..input
            },
        };
        for tag in &tags {
            draft.add_tag(tag);
        }
        draft
    }

    pub fn input(&self) -> &PostInput {
        &self.input
    }

    /// Mutable access to the plain text fields and the post type.
    pub fn fields_mut(&mut self) -> &mut PostInput {
        &mut self.input
    }

    pub fn tags(&self) -> &[String] {
        &self.input.tags
    }

    // --- Tags ---

    /// add_tag
    ///
    /// Trims `tag` and appends it. Returns `false` when nothing was added because the
    /// trimmed tag is empty or already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.input.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.input.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.input.tags.retain(|t| t != tag);
    }

    // --- Key/Value Rows ---

    pub fn rows(&self, list: RowList) -> &[KeyValue] {
        match list {
            RowList::ImportantDates => &self.input.important_dates,
            RowList::OfficialLinks => &self.input.official_links,
        }
    }

    fn rows_mut(&mut self, list: RowList) -> &mut Vec<KeyValue> {
        match list {
            RowList::ImportantDates => &mut self.input.important_dates,
            RowList::OfficialLinks => &mut self.input.official_links,
        }
    }

    /// Appends an empty row and returns its index.
    pub fn add_row(&mut self, list: RowList) -> usize {
        let rows = self.rows_mut(list);
        rows.push(KeyValue::default());
        rows.len() - 1
    }

    /// Out-of-range indexes are ignored.
    pub fn set_row_key(&mut self, list: RowList, index: usize, key: &str) {
        if let Some(row) = self.rows_mut(list).get_mut(index) {
            row.key = key.to_string();
        }
    }

    pub fn set_row_value(&mut self, list: RowList, index: usize, value: &str) {
        if let Some(row) = self.rows_mut(list).get_mut(index) {
            row.value = value.to_string();
        }
    }

    pub fn remove_row(&mut self, list: RowList, index: usize) {
        let rows = self.rows_mut(list);
        if index < rows.len() {
            rows.remove(index);
        }
    }

    /// submit
    ///
    /// Validates the draft and yields the payload for `createPost`/`updatePost`. The draft
    /// itself is left untouched so a rejected submission can be corrected and resent.
    pub fn submit(&self) -> Result<PostInput, PortalError> {
        self.input.validate()?;
        Ok(self.input.clone())
    }
}
