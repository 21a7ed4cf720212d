use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use trustlet_types::User;

use crate::Database;
use crate::models::{NewSignup, NewUser, Registration, UserRow, parsed, parsed_opt};

/// Why a signup was turned away. Nothing is written in any of these cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignupRejection {
    #[error("the member cap has been reached")]
    Closed,
    #[error("inviter not found or inactive")]
    InviterNotFound,
    #[error("an inviter is required once the directory has members")]
    InviterRequired,
    #[error("email already registered")]
    DuplicateEmail,
}

const USER_COLUMNS: &str = "id, name, email, is_active, invited_by, created_at, password";

/// Emails are stored and compared trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Database {
    // -- Users --

    pub fn create_user(&self, new: &NewUser) -> Result<User> {
        self.with_conn(|conn| insert_user(conn, new))
    }

    /// Admission check and insert for a new member, in one immediate
    /// transaction so concurrent signups cannot both take the seed slot or
    /// overshoot the cap.
    ///
    /// With no inviter the account is only created when the directory is
    /// empty, and it is created active. With an inviter it is created pending
    /// and the active inviter is returned alongside it.
    pub fn register_user(&self, signup: &NewSignup) -> Result<Result<Registration, SignupRejection>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let count: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            if signup.beta_cap.is_some_and(|cap| count as u64 >= cap) {
                return Ok(Err(SignupRejection::Closed));
            }

            let inviter = match signup.inviter_email.as_deref() {
                Some(inviter_email) => {
                    let inviter_email = normalize_email(inviter_email);
                    match query_user(&tx, "email = ?1 AND is_active = 1", &inviter_email)? {
                        Some(row) => Some(row.user),
                        None => return Ok(Err(SignupRejection::InviterNotFound)),
                    }
                }
                None if count == 0 => None,
                None => return Ok(Err(SignupRejection::InviterRequired)),
            };

            let email = normalize_email(&signup.email);
            if query_user(&tx, "email = ?1", &email)?.is_some() {
                return Ok(Err(SignupRejection::DuplicateEmail));
            }

            let user = insert_user(
                &tx,
                &NewUser {
                    name: signup.name.clone(),
                    email,
                    password_hash: signup.password_hash.clone(),
                    invited_by: inviter.as_ref().map(|u| u.id),
                    is_active: inviter.is_none(),
                },
            )?;

            tx.commit()?;
            Ok(Ok(Registration { user, inviter }))
        })
    }

    /// Insert an account that cannot log in until its invite request is approved.
    pub fn create_pending_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        inviter_id: Uuid,
    ) -> Result<User> {
        self.create_user(&NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            invited_by: Some(inviter_id),
            is_active: false,
        })
    }

    pub fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .with_conn(|conn| query_user(conn, "id = ?1", &id.to_string()))?
            .map(|row| row.user))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find_credentials(email)?.map(|row| row.user))
    }

    /// User plus password hash, for the login credential check.
    pub fn find_credentials(&self, email: &str) -> Result<Option<UserRow>> {
        let email = normalize_email(email);
        self.with_conn(|conn| query_user(conn, "email = ?1", &email))
    }

    pub fn find_active_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .with_conn(|conn| query_user(conn, "email = ?1 AND is_active = 1", &email))?
            .map(|row| row.user))
    }

    /// Returns false when no such user exists. Setting the current value is a no-op.
    pub fn set_user_active(&self, id: Uuid, active: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET is_active = ?1 WHERE id = ?2",
                rusqlite::params![active, id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    pub fn activate_user(&self, id: Uuid) -> Result<bool> {
        self.set_user_active(id, true)
    }

    pub fn deactivate_user(&self, id: Uuid) -> Result<bool> {
        self.set_user_active(id, false)
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn active_user_emails(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT email FROM users WHERE is_active = 1 ORDER BY email")?;
            let emails = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(emails)
        })
    }

    /// Hard delete. Only used to undo a signup whose invite request could not
    /// be written; accounts are never removed otherwise.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }
}

fn insert_user(conn: &Connection, new: &NewUser) -> Result<User> {
    let user = User {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        email: normalize_email(&new.email),
        is_active: new.is_active,
        invited_by: new.invited_by,
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO users (id, name, email, password, is_active, invited_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            user.id.to_string(),
            &user.name,
            &user.email,
            &new.password_hash,
            user.is_active,
            user.invited_by.map(|id| id.to_string()),
            user.created_at,
        ],
    )?;

    Ok(user)
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], map_user_row).optional()?;
    Ok(row)
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        user: User {
            id: parsed(row, 0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            is_active: row.get(3)?,
            invited_by: parsed_opt(row, 4)?,
            created_at: row.get(5)?,
        },
        password_hash: row.get(6)?,
    })
}
