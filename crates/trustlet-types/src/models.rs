use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored value that does not name any variant of a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Closed string-valued enum. The literals are the persisted representation
/// and must stay byte-identical to historical rows.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    HomeType, "home type" {
        RoomOnly => "Room only",
        EntireHome => "Entire home",
    }
}

string_enum! {
    /// Amsterdam neighborhoods a listing can be placed in.
    Neighborhood, "neighborhood" {
        Oost => "Oost",
        ZuidOost => "ZuidOost",
        Centrum => "Centrum",
        Westerpark => "Westerpark",
        OudWest => "Oud-West",
        OudZuid => "Oud-Zuid",
        Noord => "Noord",
    }
}

string_enum! {
    MessageKind, "message kind" {
        InviteRequest => "invite_request",
        Inquiry => "inquiry",
        Reply => "reply",
        System => "system",
        Uncategorized => "uncategorized",
    }
}

string_enum! {
    /// Workflow status of a message. Only invite requests ever leave their
    /// initial status.
    MessageStatus, "message status" {
        Pending => "pending",
        Sent => "sent",
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl MessageKind {
    /// Status a freshly created message of this kind starts in.
    pub fn initial_status(self) -> MessageStatus {
        match self {
            MessageKind::InviteRequest => MessageStatus::Pending,
            _ => MessageStatus::Sent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub invited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
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
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    /// Whole days between start and end. Zero or negative for degenerate
    /// or inverted ranges.
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Total cost spread over the nights of the stay. A stay of zero or fewer
    /// nights costs the full amount per night.
    pub fn per_night_cost(&self) -> f64 {
        self.cost / self.nights().max(1) as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub status: MessageStatus,
    pub listing_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub is_active: bool,
    /// Bumped on every status transition; used as the compare-and-set guard.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}
