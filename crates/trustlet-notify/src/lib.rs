pub mod announce;
pub mod dispatcher;
pub mod mailer;
pub mod templates;

pub use announce::{AnnounceSummary, Announcement, RECIPIENT_PLACEHOLDER, build_recipients, send_announcement};
pub use dispatcher::NotificationDispatcher;
pub use mailer::{DisabledMailer, Mailer, MemoryMailer, NotificationError, OutgoingEmail, ResendMailer};
pub use templates::{NotificationContext, RenderedEmail};
