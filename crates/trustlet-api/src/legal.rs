//! Static policy pages shown from the signup form.

use axum::response::{Html, IntoResponse};

pub const LAST_UPDATED: &str = "September 2025";
pub const CONTACT: &str = "admin@amstrustlet.app";

pub async fn terms() -> impl IntoResponse {
    Html(page(
        "Terms",
        &format!(
            "<h3>1. About Trustlet</h3>\
             <p>Trustlet connects hosts and guests. Trustlet does not manage properties, act as a host or provide accommodation.</p>\
             <h3>2. Responsibilities</h3>\
             <ul>\
             <li><strong>Hosts</strong> are solely responsible for the accuracy of their listings, compliance with local law \
             (leases, subletting and taxes included) and the safety of their guests.</li>\
             <li><strong>Guests</strong> are solely responsible for their behaviour, their agreements with hosts and following host rules.</li>\
             <li>Trustlet does not verify, endorse or guarantee the conduct of members.</li>\
             </ul>\
             <h3>3. Liability</h3>\
             <p>Trustlet is not liable for disputes, damage, accidents, cancellations or other issues between hosts and guests. \
             The service is provided as is during the beta.</p>\
             <h3>4. Accounts</h3>\
             <p>By creating an account you agree to provide accurate information. Accounts that break these terms may be suspended.</p>\
             <h3>5. Changes</h3>\
             <p>These terms may change at any time. Continued use after a change means you accept the new terms.</p>\
             <h3>6. Contact</h3>\
             <p>Questions: {CONTACT}</p>"
        ),
    ))
}

pub async fn privacy() -> impl IntoResponse {
    Html(page(
        "Privacy Policy",
        &format!(
            "<h3>1. Information we collect</h3>\
             <ul>\
             <li>Your email address, name and basic account details when you sign up.</li>\
             <li>Listing details such as dates and description.</li>\
             <li>Usage data such as logins and actions in the app.</li>\
             </ul>\
             <h3>2. How we use it</h3>\
             <p>To run and improve the service and to contact you about your account or listings. \
             We do not sell or rent your data to third parties.</p>\
             <h3>3. Storage</h3>\
             <p>Data is kept in our database and emails are sent through Resend. \
             You can ask for your account and data to be deleted at any time by writing to {CONTACT}.</p>\
             <h3>4. GDPR rights</h3>\
             <p>If you are in the EU you may access, correct or delete your data, and lodge a complaint with your local data authority.</p>\
             <h3>5. Changes</h3>\
             <p>Updates to this policy are announced by changing the date above.</p>\
             <h3>6. Contact</h3>\
             <p>Questions: {CONTACT}</p>"
        ),
    ))
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>Last updated: {LAST_UPDATED}</p>{body}</body></html>"
    )
}
