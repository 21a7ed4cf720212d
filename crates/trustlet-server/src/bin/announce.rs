//! Operator tool: email an announcement to every active member.
//!
//! ```text
//! TRUSTLET_ANNOUNCE_SUBJECT="Trustlet is growing" \
//! TRUSTLET_ANNOUNCE_BODY=announcement.html \
//! trustlet-announce
//! ```
//!
//! `TRUSTLET_ANNOUNCE_RETRY` (comma separated) resends to just those
//! addresses, `TRUSTLET_ANNOUNCE_EXCLUDE` skips addresses, and
//! `TRUSTLET_ANNOUNCE_DELAY_SECS` sets the pause between sends.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::{info, warn};

use trustlet_db::Database;
use trustlet_notify::{Announcement, build_recipients, send_announcement};
use trustlet_server::config::MailConfig;

const DEFAULT_DELAY_SECS: f64 = 2.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    trustlet_server::init_tracing("trustlet_announce=info,trustlet_notify=info");

    let env = |key: &str| std::env::var(key).ok();

    let mail = MailConfig::from_lookup(&env)?;
    if mail.api_key.is_none() {
        bail!("RESEND_API_KEY must be set to send announcements");
    }

    let subject = env("TRUSTLET_ANNOUNCE_SUBJECT")
        .filter(|s| !s.trim().is_empty())
        .context("TRUSTLET_ANNOUNCE_SUBJECT is not set")?;
    let body_path = env("TRUSTLET_ANNOUNCE_BODY").context("TRUSTLET_ANNOUNCE_BODY is not set")?;
    let body_template = std::fs::read_to_string(&body_path)
        .with_context(|| format!("reading announcement body from {}", body_path))?;

    let delay_secs: f64 = match env("TRUSTLET_ANNOUNCE_DELAY_SECS") {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("TRUSTLET_ANNOUNCE_DELAY_SECS has an invalid value '{}'", v))?,
        None => DEFAULT_DELAY_SECS,
    };
    let delay = Duration::try_from_secs_f64(delay_secs)
        .context("TRUSTLET_ANNOUNCE_DELAY_SECS must be a non-negative number")?;

    let retry = split_list(env("TRUSTLET_ANNOUNCE_RETRY"));
    let exclude = split_list(env("TRUSTLET_ANNOUNCE_EXCLUDE"));

    let members = if retry.is_empty() {
        let db_path = env("TRUSTLET_DB_PATH").unwrap_or_else(|| "trustlet.db".into());
        let db = Database::open(Path::new(&db_path), trustlet_db::DEFAULT_BUSY_TIMEOUT)?;
        db.active_user_emails()?
    } else {
        info!("Retry mode: {} addresses", retry.len());
        Vec::new()
    };

    let recipients = build_recipients(&members, &retry, &exclude);
    if recipients.is_empty() {
        warn!("No recipients, nothing to send");
        return Ok(());
    }

    let mailer = mail.mailer()?;
    let announcement = Announcement {
        subject,
        body_template,
    };
    let summary = send_announcement(mailer.as_ref(), &mail.from, &announcement, &recipients, delay).await;

    info!("Done. Sent {}, failed {}", summary.sent, summary.failed.len());
    for (to, error) in &summary.failed {
        warn!("  {}: {}", to, error);
    }
    if !summary.failed.is_empty() {
        info!("Rerun with TRUSTLET_ANNOUNCE_RETRY set to the failed addresses to retry them");
    }

    Ok(())
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
