//! Database row types and insert payloads. Domain structs come from
//! trustlet-types; the rows here add what only the store sees, such as
//! password hashes and joined display columns.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use trustlet_types::{HomeType, Listing, Message, MessageKind, Neighborhood, User};

pub struct UserRow {
    pub user: User,
    pub password_hash: String,
}

pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub invited_by: Option<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewSignup {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    /// `None` only for the seed member of an empty directory.
    pub inviter_email: Option<String>,
    /// Total accounts allowed. `None` means unlimited.
    pub beta_cap: Option<u64>,
}

/// An account created by [`Database::register_user`](crate::Database::register_user).
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    /// The active member who nominated the account, absent for the seed member.
    pub inviter: Option<User>,
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub owner_id: Uuid,
    pub title: String,
    pub home_type: HomeType,
    pub bedrooms: u32,
    pub neighborhood: Neighborhood,
    pub street_name: String,
    pub cost: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub photo_link: Option<String>,
}

/// Listing joined with the owner's public profile.
pub struct ListingRow {
    pub listing: Listing,
    pub owner_name: Option<String>,
    pub owner_created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub listing_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
}

/// Inbox message joined with sender and listing display columns.
pub struct InboxRow {
    pub message: Message,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub listing_title: Option<String>,
}

/// Read a TEXT column through `FromStr`. Unknown enum literals and malformed
/// ids surface as conversion errors instead of being passed through.
pub(crate) fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parsed_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
