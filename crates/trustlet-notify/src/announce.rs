//! One-off announcement mail to members, run by an operator.
//!
//! Sends are sequential with a fixed pause between them to stay under the
//! provider's rate limit. A failed recipient is logged and counted; the batch
//! carries on.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{info, warn};

use crate::mailer::{Mailer, OutgoingEmail};

/// Placeholder replaced with each recipient's address.
pub const RECIPIENT_PLACEHOLDER: &str = "[to_email]";

#[derive(Debug, Clone)]
pub struct Announcement {
    pub subject: String,
    pub body_template: String,
}

impl Announcement {
    pub fn render_for(&self, to: &str) -> String {
        self.body_template.replace(RECIPIENT_PLACEHOLDER, to)
    }
}

#[derive(Debug, Default)]
pub struct AnnounceSummary {
    pub sent: usize,
    pub failed: Vec<(String, String)>,
}

/// Recipients for a batch. A non-empty retry list replaces the member list.
/// Addresses are trimmed, lower-cased, de-duplicated and sorted; excluded
/// addresses are always dropped.
pub fn build_recipients(active_emails: &[String], retry: &[String], exclude: &[String]) -> Vec<String> {
    let clean = |list: &[String]| -> BTreeSet<String> {
        list.iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    };

    let excluded = clean(exclude);
    let retry = clean(retry);
    let pool = if retry.is_empty() { clean(active_emails) } else { retry };

    pool.into_iter().filter(|e| !excluded.contains(e)).collect()
}

pub async fn send_announcement(
    mailer: &dyn Mailer,
    from: &str,
    announcement: &Announcement,
    recipients: &[String],
    delay: Duration,
) -> AnnounceSummary {
    let total = recipients.len();
    let mut summary = AnnounceSummary::default();
    info!("Total recipients: {}", total);

    for (idx, to) in recipients.iter().enumerate() {
        let email = OutgoingEmail {
            from: from.to_string(),
            to: to.clone(),
            subject: announcement.subject.clone(),
            html: announcement.render_for(to),
        };

        match mailer.send(&email).await {
            Ok(()) => {
                summary.sent += 1;
                info!("[{}/{}] Sent to {}", idx + 1, total, to);
            }
            Err(e) => {
                warn!("[{}/{}] FAILED for {}: {}", idx + 1, total, to, e);
                summary.failed.push((to.clone(), e.to_string()));
            }
        }

        if idx + 1 < total && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::{MemoryMailer, NotificationError};
    use async_trait::async_trait;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn recipients_from_members_minus_exclusions() {
        let members = list(&["Bob@Example.com ", "alice@example.com", "bob@example.com", "zed@example.com"]);
        let got = build_recipients(&members, &[], &list(&["ZED@example.com"]));
        assert_eq!(got, list(&["alice@example.com", "bob@example.com"]));
    }

    #[test]
    fn retry_list_replaces_members() {
        let members = list(&["alice@example.com"]);
        let got = build_recipients(&members, &list(&["carol@example.com", " "]), &[]);
        assert_eq!(got, list(&["carol@example.com"]));
    }

    #[test]
    fn body_is_personalised() {
        let a = Announcement {
            subject: "News".into(),
            body_template: "<p>Use my email as the inviter [to_email].</p>".into(),
        };
        assert_eq!(
            a.render_for("bob@example.com"),
            "<p>Use my email as the inviter bob@example.com.</p>"
        );
    }

    struct FlakyMailer;

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), NotificationError> {
            if email.to.starts_with("bad") {
                Err(NotificationError::Rejected {
                    status: 422,
                    body: "invalid address".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_batch() {
        let a = Announcement {
            subject: "News".into(),
            body_template: "hi [to_email]".into(),
        };
        let recipients = list(&["a@example.com", "bad@example.com", "c@example.com"]);
        let summary = send_announcement(&FlakyMailer, "admin@amstrustlet.app", &a, &recipients, Duration::ZERO).await;
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "bad@example.com");
    }

    #[tokio::test]
    async fn each_recipient_gets_their_own_body() {
        let mailer = MemoryMailer::new();
        let a = Announcement {
            subject: "News".into(),
            body_template: "hi [to_email]".into(),
        };
        let recipients = list(&["a@example.com", "b@example.com"]);
        send_announcement(&mailer, "admin@amstrustlet.app", &a, &recipients, Duration::from_millis(1)).await;

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].html, "hi b@example.com");
    }
}
