use std::sync::Arc;

use chrono::NaiveDate;

use trustlet_api::{AppError, Workflow, WorkflowConfig};
use trustlet_db::{Database, NewListing};
use trustlet_notify::{MemoryMailer, NotificationDispatcher};
use trustlet_types::{HomeType, MessageKind, MessageStatus, Neighborhood, User};

const PASSWORD: &str = "correct horse";

fn setup_with(config: WorkflowConfig) -> (Workflow, MemoryMailer) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let mailer = MemoryMailer::new();
    let notifier = NotificationDispatcher::new(Arc::new(mailer.clone()), "Trustlet <admin@amstrustlet.app>");
    (Workflow::new(db, notifier, config), mailer)
}

fn setup() -> (Workflow, MemoryMailer) {
    setup_with(WorkflowConfig::default())
}

async fn seed_alice(wf: &Workflow) -> User {
    let outcome = wf.signup("Alice", "alice@example.com", PASSWORD, None).await.unwrap();
    assert!(outcome.user.is_active);
    assert!(outcome.invite_request.is_none());
    outcome.user
}

/// Bob signs up via Alice and Alice approves. Returns Bob.
async fn approved_bob(wf: &Workflow, alice: &User) -> User {
    let outcome = wf
        .signup("Bob", "bob@example.com", PASSWORD, Some("alice@example.com"))
        .await
        .unwrap();
    let request = outcome.invite_request.unwrap();
    wf.approve_invite(request.id, alice.id).await.unwrap();
    wf.login("bob@example.com", PASSWORD).await.unwrap()
}

fn listing_for(owner: &User) -> NewListing {
    NewListing {
        owner_id: owner.id,
        title: "Sunny flat".into(),
        home_type: HomeType::EntireHome,
        bedrooms: 2,
        neighborhood: Neighborhood::Oost,
        street_name: "Linnaeusstraat".into(),
        cost: 500.0,
        start_date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 10, 11).unwrap(),
        photo_link: None,
    }
}

#[tokio::test]
async fn invite_approval_activates_applicant() {
    let (wf, mailer) = setup();
    let alice = seed_alice(&wf).await;

    let outcome = wf
        .signup("Bob", " Bob@Example.com ", PASSWORD, Some("ALICE@example.com"))
        .await
        .unwrap();
    assert!(!outcome.user.is_active);
    assert_eq!(outcome.user.email, "bob@example.com");
    assert_eq!(outcome.user.invited_by, Some(alice.id));
    assert!(outcome.notification.unwrap().delivered);

    let request = outcome.invite_request.unwrap();
    assert_eq!(request.kind, MessageKind::InviteRequest);
    assert_eq!(request.status, MessageStatus::Pending);
    assert_eq!(request.receiver_id, alice.id);
    assert_eq!(request.content, "Bob (bob@example.com) has requested to join Trustlet.");

    let to_alice = mailer.sent_to("alice@example.com");
    assert_eq!(to_alice.len(), 1);
    assert!(to_alice[0].subject.contains("Bob"));

    assert!(matches!(
        wf.login("bob@example.com", PASSWORD).await,
        Err(AppError::NotAuthorized)
    ));

    let inbox = wf.inbox(alice.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].sender_email.as_deref(), Some("bob@example.com"));

    let resolution = wf.approve_invite(request.id, alice.id).await.unwrap();
    assert_eq!(resolution.status, MessageStatus::Approved);
    assert_eq!(resolution.applicant_id, outcome.user.id);
    assert!(resolution.notification.unwrap().delivered);

    let bob = wf.login("bob@example.com", PASSWORD).await.unwrap();
    assert!(bob.is_active);

    // Resolved requests drop out of the inviter's inbox.
    assert!(wf.inbox(alice.id).await.unwrap().is_empty());

    let bob_inbox = wf.inbox(bob.id).await.unwrap();
    assert_eq!(bob_inbox.len(), 1);
    assert_eq!(bob_inbox[0].message.kind, MessageKind::System);
    assert_eq!(bob_inbox[0].message.sender_id, alice.id);
    assert_eq!(mailer.sent_to("bob@example.com").len(), 1);

    assert!(matches!(
        wf.approve_invite(request.id, alice.id).await,
        Err(AppError::AlreadyResolved)
    ));
}

#[tokio::test]
async fn unknown_inviter_writes_nothing() {
    let (wf, mailer) = setup();
    seed_alice(&wf).await;

    let err = wf
        .signup("Bob", "bob@example.com", PASSWORD, Some("ghost@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InviterNotFound));

    let db = wf.db();
    assert_eq!(db.count_users().unwrap(), 1);
    assert!(db.find_user_by_email("bob@example.com").unwrap().is_none());
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn inactive_inviter_is_not_found() {
    let (wf, _mailer) = setup();
    let alice = seed_alice(&wf).await;
    wf.signup("Bob", "bob@example.com", PASSWORD, Some("alice@example.com"))
        .await
        .unwrap();

    let err = wf
        .signup("Carol", "carol@example.com", PASSWORD, Some("bob@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InviterNotFound));
    assert_eq!(wf.inbox(alice.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn signup_input_is_validated() {
    let (wf, _mailer) = setup();
    seed_alice(&wf).await;

    for (name, email, password, inviter) in [
        ("", "bob@example.com", PASSWORD, Some("alice@example.com")),
        ("Bob", "not-an-email", PASSWORD, Some("alice@example.com")),
        ("Bob", "bob@example.com", "short", Some("alice@example.com")),
        ("Bob", "bob@example.com", PASSWORD, None),
    ] {
        let err = wf.signup(name, email, password, inviter).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "{name}/{email}");
    }

    let err = wf
        .signup("Alice again", "alice@example.com", PASSWORD, Some("alice@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEmail));
}

#[tokio::test]
async fn beta_cap_closes_signups() {
    let (wf, _mailer) = setup_with(WorkflowConfig {
        beta_cap: Some(1),
        ..Default::default()
    });
    seed_alice(&wf).await;

    let err = wf
        .signup("Bob", "bob@example.com", PASSWORD, Some("alice@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SignupsClosed));
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let (wf, _mailer) = setup();
    seed_alice(&wf).await;

    assert!(matches!(
        wf.login("alice@example.com", "wrong password").await,
        Err(AppError::InvalidCredentials)
    ));
    assert!(matches!(
        wf.login("nobody@example.com", PASSWORD).await,
        Err(AppError::InvalidCredentials)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_apply_once() {
    let (wf, mailer) = setup();
    let alice = seed_alice(&wf).await;
    let request = wf
        .signup("Bob", "bob@example.com", PASSWORD, Some("alice@example.com"))
        .await
        .unwrap()
        .invite_request
        .unwrap();

    let (a, b) = tokio::join!(
        wf.approve_invite(request.id, alice.id),
        wf.approve_invite(request.id, alice.id)
    );

    let wins = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(
        matches!(a, Err(AppError::AlreadyResolved)) || matches!(b, Err(AppError::AlreadyResolved))
    );

    let bob = wf.db().find_user_by_email("bob@example.com").unwrap().unwrap();
    let system: Vec<_> = wf
        .inbox(bob.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.message.kind == MessageKind::System)
        .collect();
    assert_eq!(system.len(), 1);
    assert_eq!(mailer.sent_to("bob@example.com").len(), 1);
}

#[tokio::test]
async fn only_the_inviter_can_resolve() {
    let (wf, _mailer) = setup();
    let alice = seed_alice(&wf).await;
    let bob = approved_bob(&wf, &alice).await;

    let request = wf
        .signup("Carol", "carol@example.com", PASSWORD, Some("alice@example.com"))
        .await
        .unwrap()
        .invite_request
        .unwrap();

    assert!(matches!(
        wf.approve_invite(request.id, bob.id).await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        wf.approve_invite(uuid::Uuid::new_v4(), alice.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn rejection_keeps_applicant_inactive_and_silent() {
    let (wf, mailer) = setup();
    let alice = seed_alice(&wf).await;
    let request = wf
        .signup("Carol", "carol@example.com", PASSWORD, Some("alice@example.com"))
        .await
        .unwrap()
        .invite_request
        .unwrap();

    let resolution = wf.reject_invite(request.id, alice.id).await.unwrap();
    assert_eq!(resolution.status, MessageStatus::Rejected);
    assert!(resolution.notice.is_none());
    assert!(resolution.notification.is_none());

    assert!(matches!(
        wf.login("carol@example.com", PASSWORD).await,
        Err(AppError::NotAuthorized)
    ));
    assert!(mailer.sent_to("carol@example.com").is_empty());
    assert!(wf.inbox(alice.id).await.unwrap().is_empty());

    assert!(matches!(
        wf.approve_invite(request.id, alice.id).await,
        Err(AppError::AlreadyResolved)
    ));
}

#[tokio::test]
async fn failed_email_does_not_undo_signup() {
    let (wf, mailer) = setup();
    let alice = seed_alice(&wf).await;
    mailer.set_failing(true);

    let outcome = wf
        .signup("Bob", "bob@example.com", PASSWORD, Some("alice@example.com"))
        .await
        .unwrap();
    let report = outcome.notification.unwrap();
    assert!(!report.delivered);
    assert!(report.error.is_some());

    assert!(wf.db().find_user_by_email("bob@example.com").unwrap().is_some());
    assert_eq!(wf.inbox(alice.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn inquiry_and_reply_thread() {
    let (wf, mailer) = setup();
    let alice = seed_alice(&wf).await;
    let bob = approved_bob(&wf, &alice).await;
    let listing = wf.db().create_listing(listing_for(&alice)).unwrap();

    let inquiry = wf
        .inquire_about(bob.id, listing.id, "  Is it free in October?  ")
        .await
        .unwrap();
    assert_eq!(inquiry.message.kind, MessageKind::Inquiry);
    assert_eq!(inquiry.message.status, MessageStatus::Sent);
    assert_eq!(inquiry.message.receiver_id, alice.id);
    assert_eq!(inquiry.message.listing_id, Some(listing.id));
    assert_eq!(
        inquiry.message.content,
        "Inquiry about 'Sunny flat'\n\nIs it free in October?"
    );
    assert!(inquiry.notification.delivered);
    assert!(
        mailer
            .sent_to("alice@example.com")
            .iter()
            .any(|m| m.subject == "New inquiry about Sunny flat")
    );

    let alice_inbox = wf.inbox(alice.id).await.unwrap();
    assert_eq!(alice_inbox[0].listing_title.as_deref(), Some("Sunny flat"));

    // Only the receiver of a message may answer it.
    assert!(matches!(
        wf.reply_to(bob.id, inquiry.message.id, "ping", None).await,
        Err(AppError::Forbidden)
    ));

    let reply = wf
        .reply_to(alice.id, inquiry.message.id, "Yes it is!", None)
        .await
        .unwrap();
    assert_eq!(reply.message.kind, MessageKind::Reply);
    assert_eq!(reply.message.receiver_id, bob.id);
    assert_eq!(reply.message.parent_message_id, Some(inquiry.message.id));
    assert_eq!(reply.message.listing_id, Some(listing.id));

    let bob_inbox = wf.inbox(bob.id).await.unwrap();
    assert_eq!(bob_inbox[0].message.id, reply.message.id);
}

#[tokio::test]
async fn inquiry_rules() {
    let (wf, _mailer) = setup();
    let alice = seed_alice(&wf).await;
    let bob = approved_bob(&wf, &alice).await;
    let listing = wf.db().create_listing(listing_for(&alice)).unwrap();

    assert!(matches!(
        wf.inquire_about(bob.id, listing.id, "   ").await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        wf.send_inquiry(alice.id, bob.id, listing.id, "wrong owner").await,
        Err(AppError::Validation(_))
    ));

    wf.db().set_listing_active(listing.id, false).unwrap();
    assert!(matches!(
        wf.inquire_about(bob.id, listing.id, "still there?").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn hiding_is_receiver_only_and_keeps_status() {
    let (wf, _mailer) = setup();
    let alice = seed_alice(&wf).await;
    let bob = approved_bob(&wf, &alice).await;
    let listing = wf.db().create_listing(listing_for(&alice)).unwrap();
    let inquiry = wf.inquire_about(bob.id, listing.id, "hello").await.unwrap();

    assert!(matches!(
        wf.hide_from_inbox(inquiry.message.id, bob.id).await,
        Err(AppError::Forbidden)
    ));

    wf.hide_from_inbox(inquiry.message.id, alice.id).await.unwrap();
    assert!(wf.inbox(alice.id).await.unwrap().is_empty());

    let stored = wf.db().get_message(inquiry.message.id).unwrap().unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.status, MessageStatus::Sent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_signups_make_one_seed() {
    for _ in 0..10 {
        let (wf, _mailer) = setup();

        let (a, b) = tokio::join!(
            wf.signup("Alice", "alice@example.com", PASSWORD, None),
            wf.signup("Bea", "bea@example.com", PASSWORD, None)
        );

        assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            matches!(a, Err(AppError::Validation(_))) || matches!(b, Err(AppError::Validation(_)))
        );
        assert_eq!(wf.db().count_users().unwrap(), 1);
        assert_eq!(wf.db().active_user_emails().unwrap().len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_signups_do_not_overshoot_the_cap() {
    let (wf, _mailer) = setup_with(WorkflowConfig {
        beta_cap: Some(2),
        ..Default::default()
    });
    seed_alice(&wf).await;

    let (b, c) = tokio::join!(
        wf.signup("Bob", "bob@example.com", PASSWORD, Some("alice@example.com")),
        wf.signup("Carol", "carol@example.com", PASSWORD, Some("alice@example.com"))
    );

    assert_eq!([&b, &c].iter().filter(|r| r.is_ok()).count(), 1);
    assert!(matches!(b, Err(AppError::SignupsClosed)) || matches!(c, Err(AppError::SignupsClosed)));
    assert_eq!(wf.db().count_users().unwrap(), 2);
}

#[tokio::test]
async fn invite_requests_cannot_be_replied_to() {
    let (wf, mailer) = setup();
    let alice = seed_alice(&wf).await;
    let request = wf
        .signup("Bob", "bob@example.com", PASSWORD, Some("alice@example.com"))
        .await
        .unwrap()
        .invite_request
        .unwrap();

    let err = wf
        .reply_to(alice.id, request.id, "Who are you?", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let bob = wf.db().find_user_by_email("bob@example.com").unwrap().unwrap();
    assert!(wf.inbox(bob.id).await.unwrap().is_empty());
    assert!(mailer.sent_to("bob@example.com").is_empty());

    // Still pending and resolvable the normal way.
    let resolution = wf.approve_invite(request.id, alice.id).await.unwrap();
    assert_eq!(resolution.status, MessageStatus::Approved);
}
