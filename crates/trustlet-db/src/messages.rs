use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use trustlet_types::{Message, MessageKind, MessageStatus};

use crate::Database;
use crate::models::{InboxRow, NewMessage, parsed, parsed_opt};

const MESSAGE_COLUMNS: &str = "m.id, m.sender_id, m.receiver_id, m.content, m.message_type, \
     m.status, m.listing_id, m.parent_message_id, m.is_active, m.version, m.created_at";

/// Terminal outcome of an invite request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteDecision {
    Approve,
    Reject,
}

impl InviteDecision {
    pub fn status(self) -> MessageStatus {
        match self {
            InviteDecision::Approve => MessageStatus::Approved,
            InviteDecision::Reject => MessageStatus::Rejected,
        }
    }

    fn activates_applicant(self) -> bool {
        self == InviteDecision::Approve
    }
}

/// Result of a guarded invite transition.
#[derive(Debug)]
pub enum InviteTransition {
    /// Status moved out of `pending`. Carries the approval notice, if one was written.
    Applied { notice: Option<Message> },
    /// Another caller resolved the request first; nothing was written.
    Stale,
}

impl Database {
    // -- Messages --

    pub fn insert_message(&self, new: &NewMessage) -> Result<Message> {
        self.with_conn(|conn| insert_message(conn, new))
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Active messages addressed to `user_id`, newest first. Invite requests
    /// drop out once they leave `pending`.
    pub fn inbox(&self, user_id: Uuid) -> Result<Vec<InboxRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}, u.name, u.email, l.title
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 LEFT JOIN listings l ON m.listing_id = l.id
                 WHERE m.receiver_id = ?1
                   AND m.is_active = 1
                   AND NOT (m.message_type = 'invite_request' AND m.status != 'pending')
                 ORDER BY m.created_at DESC, m.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(InboxRow {
                        message: map_message(row)?,
                        sender_name: row.get(11)?,
                        sender_email: row.get(12)?,
                        listing_title: row.get(13)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// One-way hide. The row and its status are kept. Returns false when the
    /// message does not exist.
    pub fn hide_message(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET is_active = 0 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    /// Move a pending invite request to its terminal status, flip the
    /// applicant's activation flag and, when `notice` is given, write the
    /// notice message. All of it commits together or not at all.
    ///
    /// The status update is a compare-and-set on `status = 'pending'` and the
    /// `expected_version` the caller read; losing that race yields
    /// [`InviteTransition::Stale`].
    pub fn resolve_invite(
        &self,
        message_id: Uuid,
        expected_version: i64,
        applicant_id: Uuid,
        decision: InviteDecision,
        notice: Option<&NewMessage>,
    ) -> Result<InviteTransition> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE messages SET status = ?1, version = version + 1
                 WHERE id = ?2
                   AND message_type = 'invite_request'
                   AND status = 'pending'
                   AND version = ?3",
                rusqlite::params![decision.status().as_str(), message_id.to_string(), expected_version],
            )?;
            if updated == 0 {
                debug!("Invite {} already resolved, skipping", message_id);
                return Ok(InviteTransition::Stale);
            }

            let activated = tx.execute(
                "UPDATE users SET is_active = ?1 WHERE id = ?2",
                rusqlite::params![decision.activates_applicant(), applicant_id.to_string()],
            )?;
            if activated == 0 {
                anyhow::bail!("applicant {} of invite {} does not exist", applicant_id, message_id);
            }

            let notice = match notice {
                Some(new) => Some(insert_message(&tx, new)?),
                None => None,
            };

            tx.commit()?;
            Ok(InviteTransition::Applied { notice })
        })
    }
}

fn insert_message(conn: &Connection, new: &NewMessage) -> Result<Message> {
    let message = Message {
        id: Uuid::new_v4(),
        sender_id: new.sender_id,
        receiver_id: new.receiver_id,
        content: new.content.clone(),
        kind: new.kind,
        status: new.kind.initial_status(),
        listing_id: new.listing_id,
        parent_message_id: new.parent_message_id,
        is_active: true,
        version: 0,
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO messages (id, sender_id, receiver_id, content, message_type, status,
                               listing_id, parent_message_id, is_active, version, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            message.id.to_string(),
            message.sender_id.to_string(),
            message.receiver_id.to_string(),
            &message.content,
            message.kind.as_str(),
            message.status.as_str(),
            message.listing_id.map(|id| id.to_string()),
            message.parent_message_id.map(|id| id.to_string()),
            message.is_active,
            message.version,
            message.created_at,
        ],
    )?;

    Ok(message)
}

fn query_message(conn: &Connection, id: Uuid) -> Result<Option<Message>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], map_message).optional()?;
    Ok(row)
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: parsed(row, 0)?,
        sender_id: parsed(row, 1)?,
        receiver_id: parsed(row, 2)?,
        content: row.get(3)?,
        kind: parsed::<MessageKind>(row, 4)?,
        status: parsed::<MessageStatus>(row, 5)?,
        listing_id: parsed_opt(row, 6)?,
        parent_message_id: parsed_opt(row, 7)?,
        is_active: row.get(8)?,
        version: row.get(9)?,
        created_at: row.get(10)?,
    })
}
