use trustlet_types::MessageKind;

/// What a notification needs to know about the message that triggered it.
#[derive(Debug, Clone)]
pub struct NotificationContext<'a> {
    pub kind: MessageKind,
    pub sender_name: &'a str,
    pub listing_title: Option<&'a str>,
    pub content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Escape user text for an HTML body, keeping line breaks.
pub fn html_text(text: &str) -> String {
    html_escape::encode_text(text).replace('\n', "<br>")
}

/// Subjects are single header lines.
fn subject_line(text: String) -> String {
    text.split(['\r', '\n']).collect::<Vec<_>>().join(" ")
}

pub fn render(ctx: &NotificationContext<'_>) -> RenderedEmail {
    let sender = html_text(ctx.sender_name);
    let content = html_text(ctx.content);

    let (subject, html) = match ctx.kind {
        MessageKind::InviteRequest => (
            format!("New Trustlet membership request from {}", ctx.sender_name),
            format!(
                "<p>{sender} has asked to join Trustlet and named you as their inviter.</p>\
                 <p>{content}</p>\
                 <p>Log in to Trustlet to approve or reject the request.</p>"
            ),
        ),
        MessageKind::Inquiry => {
            let title = ctx.listing_title.unwrap_or("your listing");
            (
                format!("New inquiry about {title}"),
                format!(
                    "<p>{sender} sent you a message about <b>{}</b>:</p><p>{content}</p>",
                    html_text(title)
                ),
            )
        }
        MessageKind::Reply => {
            let regarding = ctx
                .listing_title
                .map(|t| format!(" regarding <b>{}</b>", html_text(t)))
                .unwrap_or_default();
            (
                format!("{} replied to your Trustlet message", ctx.sender_name),
                format!("<p>{sender} replied{regarding}:</p><p>{content}</p>"),
            )
        }
        MessageKind::System => (
            "Trustlet account update".to_string(),
            format!("<p>{content}</p>"),
        ),
        other => (
            format!("New Trustlet {} message", other.as_str()),
            format!("<p>You have a new message:</p><p>{content}</p>"),
        ),
    };

    RenderedEmail {
        subject: subject_line(subject),
        html,
    }
}
