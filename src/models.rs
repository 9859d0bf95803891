use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::PortalError;

// --- Identifiers ---

/// PostId
///
/// Server-assigned post identifier. Opaque to the client: it is only compared,
/// hashed and echoed back to the remote service.
pub type PostId = u64;

/// Principal
///
/// The resolved caller identity as the remote service knows it. Identity provisioning
/// happens outside this crate; we only carry the textual principal around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema)]
#[serde(transparent)]
#[ts(export)]
pub struct Principal(pub String);

impl Principal {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Post Value Types ---

/// PostStatus
///
/// Lifecycle of a notice. Only `Published` posts belong to the public view set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum PostStatus {
    Draft,
    Published,
}

/// RecruitmentPostType
///
/// The four categories the public site is organised by. The camelCase wire names
/// double as the category path segment (`/category/admitCard`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum RecruitmentPostType {
    RecruitmentForm,
    AdmitCard,
    Result,
    AnswerKey,
}

impl RecruitmentPostType {
    pub const ALL: [RecruitmentPostType; 4] = [
        RecruitmentPostType::RecruitmentForm,
        RecruitmentPostType::AdmitCard,
        RecruitmentPostType::Result,
        RecruitmentPostType::AnswerKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecruitmentPostType::RecruitmentForm => "recruitmentForm",
            RecruitmentPostType::AdmitCard => "admitCard",
            RecruitmentPostType::Result => "result",
            RecruitmentPostType::AnswerKey => "answerKey",
        }
    }
}

impl Default for RecruitmentPostType {
    fn default() -> Self {
        RecruitmentPostType::RecruitmentForm
    }
}

impl fmt::Display for RecruitmentPostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unknown category segment is treated like any other missing resource.
impl FromStr for RecruitmentPostType {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecruitmentPostType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(PortalError::NotFound)
    }
}

/// KeyValue
///
/// One labelled row of `importantDates` or `officialLinks`. Rows are kept in
/// insertion order; that order is what the site displays.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// --- Core Entity ---

/// RecruitmentPost
///
/// A recruitment notice as held by the remote service. The client never edits one
/// in place: a changed post arrives as a fresh value and replaces the cached copy.
///
/// Timestamps travel as integer nanoseconds since the Unix epoch. `created_at` is set
/// once; `updated_at` moves forward on every accepted mutation, publish and unpublish
/// included, and is never earlier than `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecruitmentPost {
    #[ts(type = "bigint")]
    pub id: PostId,
    pub status: PostStatus,
    pub post_type: RecruitmentPostType,
    pub title: String,
    pub organization: String,
    pub exam_post_name: String,

    // Optional free text: the empty string stands for "not provided".
    pub eligibility: String,
    pub application_fee: String,
    pub age_limit: String,
    pub vacancy_details: String,

    pub important_dates: Vec<KeyValue>,
    pub official_links: Vec<KeyValue>,
    pub tags: Vec<String>,

    #[serde(with = "chrono::serde::ts_nanoseconds")]
    #[ts(type = "bigint")]
    #[schema(value_type = i64)]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_nanoseconds")]
    #[ts(type = "bigint")]
    #[schema(value_type = i64)]
    pub updated_at: DateTime<Utc>,
}

impl RecruitmentPost {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Builds a post from a submission payload. Used by service implementations
    /// that own id assignment and timestamps.
    pub fn from_input(id: PostId, input: PostInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: PostStatus::Draft,
            post_type: input.post_type,
            title: input.title,
            organization: input.organization,
            exam_post_name: input.exam_post_name,
            eligibility: input.eligibility,
            application_fee: input.application_fee,
            age_limit: input.age_limit,
            vacancy_details: input.vacancy_details,
            important_dates: input.important_dates,
            official_links: input.official_links,
            tags: input.tags,
            created_at: now,
            updated_at: now,
        }
    }

    /// The editable field set of this post, as the admin editor starts from it.
    pub fn to_input(&self) -> PostInput {
        PostInput {
            post_type: self.post_type,
            title: self.title.clone(),
            organization: self.organization.clone(),
            exam_post_name: self.exam_post_name.clone(),
            important_dates: self.important_dates.clone(),
            eligibility: self.eligibility.clone(),
            application_fee: self.application_fee.clone(),
            age_limit: self.age_limit.clone(),
            vacancy_details: self.vacancy_details.clone(),
            official_links: self.official_links.clone(),
            tags: self.tags.clone(),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// PostInput
///
/// The field set shared by `createPost` and `updatePost`. Status, id and timestamps
/// are owned by the service and cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostInput {
    pub post_type: RecruitmentPostType,
    pub title: String,
    pub organization: String,
    pub exam_post_name: String,
    #[serde(default)]
    pub important_dates: Vec<KeyValue>,
    #[serde(default)]
    pub eligibility: String,
    #[serde(default)]
    pub application_fee: String,
    #[serde(default)]
    pub age_limit: String,
    #[serde(default)]
    pub vacancy_details: String,
    #[serde(default)]
    pub official_links: Vec<KeyValue>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PostInput {
    /// validate
    ///
    /// Rejects a submission whose required text fields are blank. Runs before any
    /// remote call, so a rejected submission never reaches the service.
    pub fn validate(&self) -> Result<(), PortalError> {
        let required = [
            ("title", &self.title),
            ("organization", &self.organization),
            ("examPostName", &self.exam_post_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PortalError::ValidationViolation { field });
            }
        }
        Ok(())
    }
}

// --- Identity & Profile Schemas ---

/// UserProfile
///
/// The caller-owned display profile, created through an explicit save.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub name: String,
}

/// UserRole
///
/// The authoritative role lives in the remote service; the client only caches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

/// AssignRoleRequest
///
/// Input payload for `POST /api/admin/roles`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AssignRoleRequest {
    pub user: Principal,
    pub role: UserRole,
}

/// CreatedPost
///
/// Response of a successful create: the id the service assigned.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatedPost {
    #[ts(type = "bigint")]
    pub id: PostId,
}
