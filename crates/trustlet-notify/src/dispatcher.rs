use std::sync::Arc;

use tracing::{debug, warn};

use crate::mailer::{Mailer, NotificationError, OutgoingEmail};
use crate::templates::{self, NotificationContext};

/// Renders the template for a message kind and hands it to the mailer.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    from: String,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
        }
    }

    /// Email `to` about a new message. Errors are returned for the caller to
    /// report; nothing here touches stored state.
    pub async fn notify(
        &self,
        to: &str,
        ctx: &NotificationContext<'_>,
    ) -> Result<(), NotificationError> {
        if to.trim().is_empty() {
            return Err(NotificationError::NoRecipient);
        }

        let rendered = templates::render(ctx);
        let email = OutgoingEmail {
            from: self.from.clone(),
            to: to.to_string(),
            subject: rendered.subject,
            html: rendered.html,
        };

        match self.mailer.send(&email).await {
            Ok(()) => {
                debug!("Sent {} notification to {}", ctx.kind, to);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to send {} notification to {}: {}", ctx.kind, to, e);
                Err(e)
            }
        }
    }
}
