// tests/chat_api.rs

mod common;

use std::time::Duration;

use common::TestSetup;

use futures::future::join_all;
use marketplace_core::error::ActionError;
use marketplace_core::handlers::chats;
use marketplace_core::models::NotificationKind;
use marketplace_core::store::EntityStore;
use uuid::Uuid;

// --- Opening chats ---

#[tokio::test]
async fn test_start_chat_is_deduplicated_across_directions() {
    let setup = TestSetup::new();
    let (alice, alice_session) = setup.create_user("Alice").await;
    let (bob, bob_session) = setup.create_user("Bob").await;

    let first = chats::start_chat(&setup.state, &alice_session, bob.id)
        .await
        .unwrap();
    let second = chats::start_chat(&setup.state, &bob_session, alice.id)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert!(first.user_low < first.user_high);

    // One conversation, visible from both sides.
    let alice_list = chats::get_all_chats(&setup.state, &alice_session)
        .await
        .unwrap();
    let bob_list = chats::get_all_chats(&setup.state, &bob_session)
        .await
        .unwrap();
    assert_eq!(alice_list.len(), 1);
    assert_eq!(bob_list.len(), 1);
    assert_eq!(alice_list[0].chat.id, bob_list[0].chat.id);
}

#[tokio::test]
async fn test_start_chat_with_yourself_is_rejected() {
    let setup = TestSetup::new();
    let (alice, alice_session) = setup.create_user("Alice").await;

    let err = chats::start_chat(&setup.state, &alice_session, alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::ValidationFailed(_)));
}

#[tokio::test]
async fn test_start_chat_with_unknown_user_is_not_found() {
    let setup = TestSetup::new();
    let (_, alice_session) = setup.create_user("Alice").await;

    let err = chats::start_chat(&setup.state, &alice_session, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::NotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_racing_start_chat_converges_on_one_chat() {
    let setup = TestSetup::new();
    let (alice, alice_session) = setup.create_user("Alice").await;
    let (bob, bob_session) = setup.create_user("Bob").await;

    let from_alice = {
        let state = setup.state.clone();
        let session = alice_session.clone();
        tokio::spawn(async move { chats::start_chat(&state, &session, bob.id).await })
    };
    let from_bob = {
        let state = setup.state.clone();
        let session = bob_session.clone();
        tokio::spawn(async move { chats::start_chat(&state, &session, alice.id).await })
    };

    let results = join_all([from_alice, from_bob]).await;
    let ids: Vec<Uuid> = results
        .into_iter()
        .map(|result| result.unwrap().unwrap().id)
        .collect();
    assert_eq!(ids[0], ids[1]);

    let alice_list = chats::get_all_chats(&setup.state, &alice_session)
        .await
        .unwrap();
    assert_eq!(alice_list.len(), 1);
}

// --- Messages ---

#[tokio::test]
async fn test_messages_come_back_in_send_order() {
    let setup = TestSetup::new();
    let (_, alice_session) = setup.create_user("Alice").await;
    let (bob, bob_session) = setup.create_user("Bob").await;

    let chat = chats::start_chat(&setup.state, &alice_session, bob.id)
        .await
        .unwrap();

    for text in ["first", "second"] {
        chats::send_message(&setup.state, &alice_session, chat.id, text.to_string())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    chats::send_message(&setup.state, &bob_session, chat.id, "third".to_string())
        .await
        .unwrap();

    let thread = chats::get_chat(&setup.state, &alice_session, chat.id)
        .await
        .unwrap();
    let texts: Vec<&str> = thread
        .messages
        .iter()
        .map(|message| message.text.as_str())
        .collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    assert_eq!(thread.messages[2].sender_id, bob.id);
}

#[tokio::test]
async fn test_activity_orders_the_chat_list() {
    let setup = TestSetup::new();
    let (_, alice_session) = setup.create_user("Alice").await;
    let (bob, _) = setup.create_user("Bob").await;
    let (carol, _) = setup.create_user("Carol").await;

    let with_bob = chats::start_chat(&setup.state, &alice_session, bob.id)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let with_carol = chats::start_chat(&setup.state, &alice_session, carol.id)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Messaging the older chat moves it back to the top.
    let message = chats::send_message(&setup.state, &alice_session, with_bob.id, "hi".to_string())
        .await
        .unwrap();

    let list = chats::get_all_chats(&setup.state, &alice_session)
        .await
        .unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].chat.id, with_bob.id);
    assert_eq!(list[1].chat.id, with_carol.id);
    assert_eq!(list[0].chat.updated_at, message.created_at);

    // Each entry carries its latest message, or none for a quiet chat.
    assert_eq!(
        list[0].last_message.as_ref().map(|m| m.id),
        Some(message.id)
    );
    assert!(list[1].last_message.is_none());
}

#[tokio::test]
async fn test_outsiders_cannot_read_or_write_a_chat() {
    let setup = TestSetup::new();
    let (_, alice_session) = setup.create_user("Alice").await;
    let (bob, _) = setup.create_user("Bob").await;
    let (_, eve_session) = setup.create_user("Eve").await;

    let chat = chats::start_chat(&setup.state, &alice_session, bob.id)
        .await
        .unwrap();

    let err = chats::get_chat(&setup.state, &eve_session, chat.id)
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::Unauthorized);

    let err = chats::send_message(&setup.state, &eve_session, chat.id, "hi".to_string())
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::Unauthorized);

    // The chat does not show up in the outsider's list either.
    let list = chats::get_all_chats(&setup.state, &eve_session)
        .await
        .unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_message_text_is_validated() {
    let setup = TestSetup::new();
    let (_, alice_session) = setup.create_user("Alice").await;
    let (bob, _) = setup.create_user("Bob").await;
    let chat = chats::start_chat(&setup.state, &alice_session, bob.id)
        .await
        .unwrap();

    let err = chats::send_message(&setup.state, &alice_session, chat.id, "   ".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::ValidationFailed(_)));

    let err = chats::send_message(&setup.state, &alice_session, chat.id, "m".repeat(2001))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::ValidationFailed(_)));

    let thread = chats::get_chat(&setup.state, &alice_session, chat.id)
        .await
        .unwrap();
    assert!(thread.messages.is_empty());
}

#[tokio::test]
async fn test_sending_notifies_only_the_other_participant() {
    let setup = TestSetup::new();
    let (alice, alice_session) = setup.create_user("Alice").await;
    let (bob, _) = setup.create_user("Bob").await;
    let chat = chats::start_chat(&setup.state, &alice_session, bob.id)
        .await
        .unwrap();

    chats::send_message(&setup.state, &alice_session, chat.id, "hi".to_string())
        .await
        .unwrap();

    let bob_inbox = setup.store.notifications_for(bob.id).await.unwrap();
    assert_eq!(bob_inbox.len(), 1);
    assert_eq!(bob_inbox[0].kind, NotificationKind::NewMessage);
    assert_eq!(bob_inbox[0].actor_id, alice.id);
    assert!(bob_inbox[0].message.contains("Alice"));

    let alice_inbox = setup.store.notifications_for(alice.id).await.unwrap();
    assert!(alice_inbox.is_empty());
}

// --- Deleting messages ---

#[tokio::test]
async fn test_only_the_sender_may_delete_a_message() {
    let setup = TestSetup::new();
    let (_, alice_session) = setup.create_user("Alice").await;
    let (bob, bob_session) = setup.create_user("Bob").await;
    let chat = chats::start_chat(&setup.state, &alice_session, bob.id)
        .await
        .unwrap();

    let message = chats::send_message(&setup.state, &alice_session, chat.id, "oops".to_string())
        .await
        .unwrap();

    // The other participant may read it but not remove it.
    let err = chats::delete_message(&setup.state, &bob_session, chat.id, message.id)
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::Unauthorized);

    chats::delete_message(&setup.state, &alice_session, chat.id, message.id)
        .await
        .unwrap();
    let thread = chats::get_chat(&setup.state, &alice_session, chat.id)
        .await
        .unwrap();
    assert!(thread.messages.is_empty());
}

#[tokio::test]
async fn test_delete_under_the_wrong_chat_is_not_found() {
    let setup = TestSetup::new();
    let (_, alice_session) = setup.create_user("Alice").await;
    let (bob, _) = setup.create_user("Bob").await;
    let (carol, _) = setup.create_user("Carol").await;

    let with_bob = chats::start_chat(&setup.state, &alice_session, bob.id)
        .await
        .unwrap();
    let with_carol = chats::start_chat(&setup.state, &alice_session, carol.id)
        .await
        .unwrap();
    let message = chats::send_message(&setup.state, &alice_session, with_bob.id, "hi".to_string())
        .await
        .unwrap();

    let err = chats::delete_message(&setup.state, &alice_session, with_carol.id, message.id)
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::NotFound);
}

#[tokio::test]
async fn test_deleting_rolls_the_activity_timestamp_back() {
    let setup = TestSetup::new();
    let (_, alice_session) = setup.create_user("Alice").await;
    let (bob, _) = setup.create_user("Bob").await;
    let chat = chats::start_chat(&setup.state, &alice_session, bob.id)
        .await
        .unwrap();

    let first = chats::send_message(&setup.state, &alice_session, chat.id, "one".to_string())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = chats::send_message(&setup.state, &alice_session, chat.id, "two".to_string())
        .await
        .unwrap();

    chats::delete_message(&setup.state, &alice_session, chat.id, second.id)
        .await
        .unwrap();
    let rolled_back = setup.store.chat(chat.id).await.unwrap().unwrap();
    assert_eq!(rolled_back.updated_at, first.created_at);

    // With no messages left the chat falls back to its creation time.
    chats::delete_message(&setup.state, &alice_session, chat.id, first.id)
        .await
        .unwrap();
    let empty = setup.store.chat(chat.id).await.unwrap().unwrap();
    assert_eq!(empty.updated_at, chat.created_at);
}

#[tokio::test]
async fn test_chat_handlers_require_a_session() {
    let setup = TestSetup::new();
    let bad = setup.bad_token();

    let err = chats::start_chat(&setup.state, &bad, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err, ActionError::NotAuthenticated);

    let err = chats::get_all_chats(&setup.state, &bad).await.unwrap_err();
    assert_eq!(err, ActionError::NotAuthenticated);
}
