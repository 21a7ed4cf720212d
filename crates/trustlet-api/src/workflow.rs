//! Membership and messaging workflow.
//!
//! Invite requests move `pending -> approved | rejected` exactly once; every
//! other message kind is written as `sent` and never changes status. Every
//! write that creates a message is followed by a best-effort email whose
//! outcome is reported alongside the result and never undoes the write.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand_core::OsRng;
use tracing::{error, info, warn};
use uuid::Uuid;

use trustlet_db::{
    Database, InviteDecision, InviteTransition, NewMessage, NewSignup, Registration,
    SignupRejection, normalize_email,
};
use trustlet_notify::{NotificationContext, NotificationDispatcher, NotificationError};
use trustlet_types::api::{InboxEntry, NotificationReport};
use trustlet_types::{Message, MessageKind, MessageStatus, User};

use crate::error::AppError;

pub const APPROVAL_NOTICE: &str = "Your membership request has been approved. Welcome to Trustlet!";
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Total accounts allowed before signups close. `None` means unlimited.
    pub beta_cap: Option<u64>,
    /// Upper bound on a single store round trip.
    pub store_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            beta_cap: None,
            store_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct SignupOutcome {
    pub user: User,
    /// `None` for the seed account, which needs no approval.
    pub invite_request: Option<Message>,
    pub notification: Option<NotificationReport>,
}

/// A message that was written, and what happened to its email.
#[derive(Debug)]
pub struct Posted {
    pub message: Message,
    pub notification: NotificationReport,
}

#[derive(Debug)]
pub struct InviteResolution {
    pub message_id: Uuid,
    pub applicant_id: Uuid,
    pub status: MessageStatus,
    pub notice: Option<Message>,
    pub notification: Option<NotificationReport>,
}

#[derive(Clone)]
pub struct Workflow {
    db: Arc<Database>,
    notifier: NotificationDispatcher,
    config: WorkflowConfig,
}

impl Workflow {
    pub fn new(db: Arc<Database>, notifier: NotificationDispatcher, config: WorkflowConfig) -> Self {
        Self {
            db,
            notifier,
            config,
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Run blocking store work off the async runtime, bounded by the
    /// configured store timeout.
    pub async fn run_store<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Database) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let task = tokio::task::spawn_blocking(move || f(&db));

        match tokio::time::timeout(self.config.store_timeout, task).await {
            Ok(joined) => joined.map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                AppError::Store(anyhow!("store task failed: {}", e))
            })?,
            Err(_) => {
                error!("Store call exceeded {:?}", self.config.store_timeout);
                Err(AppError::Store(anyhow!(
                    "store call timed out after {:?}",
                    self.config.store_timeout
                )))
            }
        }
    }

    // -- Membership --

    /// Register an applicant nominated by `inviter_email`. The account stays
    /// inactive until the inviter approves the invite request sent to them.
    /// The first account of an empty directory is the seed member and is
    /// active immediately.
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
        inviter_email: Option<&str>,
    ) -> Result<SignupOutcome, AppError> {
        let name = name.trim().to_string();
        let email = normalize_email(email);
        let inviter_email = inviter_email
            .map(normalize_email)
            .filter(|e| !e.is_empty());

        if name.is_empty() {
            return Err(AppError::validation("Name is required."));
        }
        validate_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                AppError::Store(anyhow!("password hashing task failed: {}", e))
            })??;

        let signup = NewSignup {
            name,
            email,
            password_hash,
            inviter_email,
            beta_cap: self.config.beta_cap,
        };
        let Registration { user, inviter } = self
            .run_store(move |db| {
                db.register_user(&signup)?.map_err(|rejection| match rejection {
                    SignupRejection::Closed => AppError::SignupsClosed,
                    SignupRejection::InviterNotFound => AppError::InviterNotFound,
                    SignupRejection::InviterRequired => AppError::validation(
                        "An existing member's email is required to sign up.",
                    ),
                    SignupRejection::DuplicateEmail => AppError::DuplicateEmail,
                })
            })
            .await?;

        let Some(inviter) = inviter else {
            info!("Seed member {} created", user.email);
            return Ok(SignupOutcome {
                user,
                invite_request: None,
                notification: None,
            });
        };

        let content = format!("{} ({}) has requested to join Trustlet.", user.name, user.email);
        match self.request_invite(user.id, inviter.id, &content).await {
            Ok(posted) => {
                info!("{} requested an invite from {}", user.email, inviter.email);
                Ok(SignupOutcome {
                    user,
                    invite_request: Some(posted.message),
                    notification: Some(posted.notification),
                })
            }
            Err(e) => {
                warn!("Invite request for {} failed, removing pending account: {}", user.email, e);
                let user_id = user.id;
                if let Err(cleanup) = self.run_store(move |db| Ok(db.delete_user(user_id)?)).await {
                    error!(
                        "Could not remove pending account {} after failed signup, needs manual cleanup: {}",
                        user_id, cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// Credential check plus activation check. A correct password on an
    /// account that has not been approved is `NotAuthorized`, not
    /// `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);
        let password = password.to_string();

        self.run_store(move |db| {
            let row = db
                .find_credentials(&email)?
                .ok_or(AppError::InvalidCredentials)?;
            verify_password(&password, &row.password_hash)?;
            if !row.user.is_active {
                return Err(AppError::NotAuthorized);
            }
            Ok(row.user)
        })
        .await
    }

    // -- Invite requests --

    pub async fn request_invite(
        &self,
        applicant_id: Uuid,
        inviter_id: Uuid,
        content: &str,
    ) -> Result<Posted, AppError> {
        let content = content.to_string();

        let (message, applicant) = self
            .run_store(move |db| {
                let inviter = db
                    .find_user_by_id(inviter_id)?
                    .filter(|u| u.is_active)
                    .ok_or(AppError::InviterNotFound)?;
                let applicant = db
                    .find_user_by_id(applicant_id)?
                    .ok_or(AppError::NotFound("applicant"))?;

                let message = db.insert_message(&NewMessage {
                    sender_id: applicant.id,
                    receiver_id: inviter.id,
                    content,
                    kind: MessageKind::InviteRequest,
                    listing_id: None,
                    parent_message_id: None,
                })?;
                Ok((message, applicant))
            })
            .await?;

        let notification = self.notify(&message, &applicant.name, None).await;
        Ok(Posted {
            message,
            notification,
        })
    }

    /// Approve a pending invite request addressed to `approver_id`: the
    /// applicant is activated and receives a system notice.
    pub async fn approve_invite(
        &self,
        message_id: Uuid,
        approver_id: Uuid,
    ) -> Result<InviteResolution, AppError> {
        self.resolve_invite(message_id, approver_id, InviteDecision::Approve)
            .await
    }

    /// Reject a pending invite request. The applicant stays inactive and is
    /// not notified.
    pub async fn reject_invite(
        &self,
        message_id: Uuid,
        rejecter_id: Uuid,
    ) -> Result<InviteResolution, AppError> {
        self.resolve_invite(message_id, rejecter_id, InviteDecision::Reject)
            .await
    }

    async fn resolve_invite(
        &self,
        message_id: Uuid,
        actor_id: Uuid,
        decision: InviteDecision,
    ) -> Result<InviteResolution, AppError> {
        let (request, actor, transition) = self
            .run_store(move |db| {
                let request = db
                    .get_message(message_id)?
                    .filter(|m| m.kind == MessageKind::InviteRequest)
                    .ok_or(AppError::NotFound("invite request"))?;
                if request.receiver_id != actor_id {
                    return Err(AppError::Forbidden);
                }
                if request.status != MessageStatus::Pending {
                    return Err(AppError::AlreadyResolved);
                }
                let actor = db.find_user_by_id(actor_id)?.ok_or(AppError::Forbidden)?;

                let notice = match decision {
                    InviteDecision::Approve => Some(NewMessage {
                        sender_id: actor.id,
                        receiver_id: request.sender_id,
                        content: APPROVAL_NOTICE.to_string(),
                        kind: MessageKind::System,
                        listing_id: None,
                        parent_message_id: None,
                    }),
                    InviteDecision::Reject => None,
                };

                let transition = db
                    .resolve_invite(
                        request.id,
                        request.version,
                        request.sender_id,
                        decision,
                        notice.as_ref(),
                    )
                    .inspect_err(|e| {
                        error!("Invite {} transition failed and was rolled back: {:#}", request.id, e)
                    })?;
                Ok((request, actor, transition))
            })
            .await?;

        let notice = match transition {
            InviteTransition::Applied { notice } => notice,
            InviteTransition::Stale => return Err(AppError::AlreadyResolved),
        };
        info!(
            "Invite request {} {} by {}",
            message_id,
            decision.status(),
            actor.email
        );

        let notification = match &notice {
            Some(notice) => Some(self.notify(notice, &actor.name, None).await),
            None => None,
        };

        Ok(InviteResolution {
            message_id,
            applicant_id: request.sender_id,
            status: decision.status(),
            notice,
            notification,
        })
    }

    // -- Conversations --

    pub async fn send_inquiry(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        listing_id: Uuid,
        text: &str,
    ) -> Result<Posted, AppError> {
        let text = non_empty(text)?;

        let (message, sender, title) = self
            .run_store(move |db| {
                let listing = db
                    .get_listing(listing_id)?
                    .filter(|l| l.is_active)
                    .ok_or(AppError::NotFound("listing"))?;
                if listing.owner_id != receiver_id {
                    return Err(AppError::validation("Inquiries go to the listing owner."));
                }
                let sender = db
                    .find_user_by_id(sender_id)?
                    .ok_or(AppError::NotFound("sender"))?;

                let message = db.insert_message(&NewMessage {
                    sender_id,
                    receiver_id,
                    content: format!("Inquiry about '{}'\n\n{}", listing.title, text),
                    kind: MessageKind::Inquiry,
                    listing_id: Some(listing.id),
                    parent_message_id: None,
                })?;
                Ok((message, sender, listing.title))
            })
            .await?;

        let notification = self.notify(&message, &sender.name, Some(&title)).await;
        Ok(Posted {
            message,
            notification,
        })
    }

    /// Inquiry addressed to whoever owns the listing.
    pub async fn inquire_about(
        &self,
        sender_id: Uuid,
        listing_id: Uuid,
        text: &str,
    ) -> Result<Posted, AppError> {
        let owner_id = self
            .run_store(move |db| {
                db.get_listing(listing_id)?
                    .filter(|l| l.is_active)
                    .map(|l| l.owner_id)
                    .ok_or(AppError::NotFound("listing"))
            })
            .await?;
        self.send_inquiry(sender_id, owner_id, listing_id, text).await
    }

    /// Reply within a thread. The replier must be the receiver of the parent
    /// and the reply goes back to the parent's sender.
    pub async fn send_reply(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        parent_message_id: Uuid,
        listing_id: Option<Uuid>,
    ) -> Result<Posted, AppError> {
        let content = non_empty(content)?;

        let (message, sender, title) = self
            .run_store(move |db| {
                let parent = db
                    .get_message(parent_message_id)?
                    .ok_or(AppError::NotFound("message"))?;
                if parent.receiver_id != sender_id || parent.sender_id != receiver_id {
                    return Err(AppError::Forbidden);
                }
                if parent.kind == MessageKind::InviteRequest {
                    return Err(AppError::validation(
                        "Membership requests are answered by approving or rejecting them.",
                    ));
                }
                let sender = db
                    .find_user_by_id(sender_id)?
                    .ok_or(AppError::NotFound("sender"))?;

                let listing_id = listing_id.or(parent.listing_id);
                let title = match listing_id {
                    Some(id) => Some(
                        db.get_listing(id)?
                            .ok_or(AppError::NotFound("listing"))?
                            .title,
                    ),
                    None => None,
                };

                let message = db.insert_message(&NewMessage {
                    sender_id,
                    receiver_id,
                    content,
                    kind: MessageKind::Reply,
                    listing_id,
                    parent_message_id: Some(parent.id),
                })?;
                Ok((message, sender, title))
            })
            .await?;

        let notification = self.notify(&message, &sender.name, title.as_deref()).await;
        Ok(Posted {
            message,
            notification,
        })
    }

    /// Reply to the sender of `parent_message_id`.
    pub async fn reply_to(
        &self,
        sender_id: Uuid,
        parent_message_id: Uuid,
        content: &str,
        listing_id: Option<Uuid>,
    ) -> Result<Posted, AppError> {
        let receiver_id = self
            .run_store(move |db| {
                db.get_message(parent_message_id)?
                    .map(|m| m.sender_id)
                    .ok_or(AppError::NotFound("message"))
            })
            .await?;
        self.send_reply(sender_id, receiver_id, content, parent_message_id, listing_id)
            .await
    }

    pub async fn hide_from_inbox(&self, message_id: Uuid, viewer_id: Uuid) -> Result<(), AppError> {
        self.run_store(move |db| {
            let message = db
                .get_message(message_id)?
                .ok_or(AppError::NotFound("message"))?;
            if message.receiver_id != viewer_id {
                return Err(AppError::Forbidden);
            }
            db.hide_message(message_id)?;
            Ok(())
        })
        .await
    }

    pub async fn inbox(&self, user_id: Uuid) -> Result<Vec<InboxEntry>, AppError> {
        let rows = self.run_store(move |db| Ok(db.inbox(user_id)?)).await?;
        Ok(rows
            .into_iter()
            .map(|row| InboxEntry {
                message: row.message,
                sender_name: row.sender_name,
                sender_email: row.sender_email,
                listing_title: row.listing_title,
            })
            .collect())
    }

    /// Email the receiver of `message`. Never fails: the outcome is returned
    /// as a report.
    async fn notify(
        &self,
        message: &Message,
        sender_name: &str,
        listing_title: Option<&str>,
    ) -> NotificationReport {
        let receiver_id = message.receiver_id;
        let receiver = match self
            .run_store(move |db| Ok(db.find_user_by_id(receiver_id)?))
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => return NotificationReport::failed(NotificationError::NoRecipient.to_string()),
            Err(e) => {
                warn!("Could not look up recipient {} for notification: {}", receiver_id, e);
                return NotificationReport::failed(e.to_string());
            }
        };

        let ctx = NotificationContext {
            kind: message.kind,
            sender_name,
            listing_title,
            content: &message.content,
        };
        match self.notifier.notify(&receiver.email, &ctx).await {
            Ok(()) => NotificationReport::delivered(),
            Err(e) => NotificationReport::failed(e.to_string()),
        }
    }
}

fn non_empty(text: &str) -> Result<String, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::validation("Message cannot be empty."));
    }
    Ok(text.to_string())
}

/// Shape check only: one `@`, a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    let invalid = || AppError::validation(format!("'{email}' is not a valid email address."));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let dotted = domain
        .split('.')
        .collect::<Vec<_>>();
    if dotted.len() < 2 || dotted.iter().any(|part| part.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Store(anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<(), AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Store(anyhow!("stored password hash is unreadable: {}", e)))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::InvalidCredentials)
}
