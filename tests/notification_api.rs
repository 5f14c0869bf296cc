// tests/notification_api.rs

mod common;

use std::time::Duration;

use common::{sample_post, TestSetup};

use marketplace_core::error::ActionError;
use marketplace_core::handlers::{chats, moderation, notifications, posts};
use marketplace_core::models::{NewNotification, NotificationKind};
use marketplace_core::store::EntityStore;
use uuid::Uuid;

#[tokio::test]
async fn test_inbox_is_private_and_newest_first() {
    let setup = TestSetup::new();
    let (alice, alice_session) = setup.create_user("Alice").await;
    let (bob, _) = setup.create_user("Bob").await;

    let older = setup
        .store
        .insert_notification(NewNotification {
            target_id: alice.id,
            actor_id: bob.id,
            kind: NotificationKind::NewMessage,
            message: "older".to_string(),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = setup
        .store
        .insert_notification(NewNotification {
            target_id: alice.id,
            actor_id: bob.id,
            kind: NotificationKind::NewMessage,
            message: "newer".to_string(),
        })
        .await
        .unwrap();
    setup
        .store
        .insert_notification(NewNotification {
            target_id: bob.id,
            actor_id: alice.id,
            kind: NotificationKind::NewMessage,
            message: "not Alice's".to_string(),
        })
        .await
        .unwrap();

    let inbox = notifications::list_notifications(&setup.state, &alice_session)
        .await
        .unwrap();
    let ids: Vec<Uuid> = inbox.iter().map(|notification| notification.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}

#[tokio::test]
async fn test_mark_as_read_is_idempotent() {
    let setup = TestSetup::new();
    let (alice, alice_session) = setup.create_user("Alice").await;
    let (bob, _) = setup.create_user("Bob").await;

    let notification = setup
        .store
        .insert_notification(NewNotification {
            target_id: alice.id,
            actor_id: bob.id,
            kind: NotificationKind::NewMessage,
            message: "hello".to_string(),
        })
        .await
        .unwrap();
    assert!(!notification.is_read);

    let read = notifications::mark_as_read(&setup.state, &alice_session, notification.id)
        .await
        .unwrap();
    assert!(read.is_read);

    // A second read is fine and never flips the flag back.
    let read_again = notifications::mark_as_read(&setup.state, &alice_session, notification.id)
        .await
        .unwrap();
    assert!(read_again.is_read);
}

#[tokio::test]
async fn test_only_the_target_may_mark_a_notification() {
    let setup = TestSetup::new();
    let (alice, _) = setup.create_user("Alice").await;
    let (bob, bob_session) = setup.create_user("Bob").await;

    let notification = setup
        .store
        .insert_notification(NewNotification {
            target_id: alice.id,
            actor_id: bob.id,
            kind: NotificationKind::NewMessage,
            message: "hello".to_string(),
        })
        .await
        .unwrap();

    let err = notifications::mark_as_read(&setup.state, &bob_session, notification.id)
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::Unauthorized);

    let saved = setup
        .store
        .notification(notification.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!saved.is_read);
}

#[tokio::test]
async fn test_marking_an_unknown_notification_is_not_found() {
    let setup = TestSetup::new();
    let (_, session) = setup.create_user("Alice").await;

    let err = notifications::mark_as_read(&setup.state, &session, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::NotFound);
}

#[tokio::test]
async fn test_failed_fanout_never_fails_the_action() {
    let setup = TestSetup::new();
    let (_, seller_session) = setup.create_user("Sella").await;
    let (bob, _) = setup.create_user("Bob").await;
    let (admin, admin_session) = setup.create_admin("Admin").await;

    setup.store.set_fail_notifications(true);

    // Creating a listing succeeds even though no admin can be told about it.
    let post = posts::create_post(&setup.state, &seller_session, sample_post("Bike"))
        .await
        .unwrap();
    assert!(setup.store.post(post.id).await.unwrap().is_some());

    // Same for a moderation decision and a chat message.
    let approved = moderation::approve_post(&setup.state, &admin_session, post.id)
        .await
        .unwrap();
    assert!(approved.is_approved);

    let chat = chats::start_chat(&setup.state, &seller_session, bob.id)
        .await
        .unwrap();
    let message = chats::send_message(&setup.state, &seller_session, chat.id, "hi".to_string())
        .await
        .unwrap();
    assert_eq!(message.text, "hi");

    // Nothing was delivered while the sink was down.
    assert!(setup.store.notifications_for(admin.id).await.unwrap().is_empty());
    assert!(setup.store.notifications_for(bob.id).await.unwrap().is_empty());

    // Once the sink recovers, later actions notify as usual.
    setup.store.set_fail_notifications(false);
    chats::send_message(&setup.state, &seller_session, chat.id, "again".to_string())
        .await
        .unwrap();
    assert_eq!(setup.store.notifications_for(bob.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_notification_handlers_require_a_session() {
    let setup = TestSetup::new();
    let bad = setup.bad_token();

    let err = notifications::list_notifications(&setup.state, &bad)
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::NotAuthenticated);

    let err = notifications::mark_as_read(&setup.state, &bad, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::NotAuthenticated);
}
