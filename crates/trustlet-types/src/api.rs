use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{HomeType, Listing, Message, MessageStatus, Neighborhood};

// -- JWT Claims --

/// Claims carried by the session token. The auth middleware turns these into
/// the per-request session context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Email of the existing member nominating the applicant. Only optional
    /// for the very first account.
    #[serde(default)]
    pub inviter_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub is_active: bool,
    pub message: String,
    pub notification: Option<NotificationReport>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub token: String,
}

// -- Listings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateListingRequest {
    #[serde(default)]
    pub title: String,
    pub home_type: HomeType,
    pub bedrooms: u32,
    pub neighborhood: Neighborhood,
    #[serde(default)]
    pub street_name: String,
    pub cost: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub photo_link: Option<String>,
}

/// Query string of `GET /listings`. `neighborhood` is a comma separated list.
#[derive(Debug, Default, Deserialize)]
pub struct ListingSearchQuery {
    pub neighborhood: Option<String>,
    pub home_type: Option<HomeType>,
    pub max_cost: Option<f64>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    #[serde(flatten)]
    pub listing: Listing,
    pub per_night_cost: f64,
    pub owner_name: Option<String>,
    /// Month the owner joined, e.g. "Sep 2025".
    pub member_since: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetActiveRequest {
    pub active: bool,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InquiryRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyRequest {
    pub content: String,
    #[serde(default)]
    pub listing_id: Option<Uuid>,
}

/// Outcome of the best-effort email that follows a message write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationReport {
    pub delivered: bool,
    pub error: Option<String>,
}

impl NotificationReport {
    pub fn delivered() -> Self {
        Self {
            delivered: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            delivered: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: Message,
    pub notification: NotificationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    #[serde(flatten)]
    pub message: Message,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub listing_title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveInviteResponse {
    pub message_id: Uuid,
    pub applicant_id: Uuid,
    pub status: MessageStatus,
    /// Present on approval only; rejections notify nobody.
    pub notification: Option<NotificationReport>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}
