use contrace_storage::{watch_all, ContactStore, SqliteContactStore};
use contrace_types::{Contact, EphemeralId, Timestamp, UserId};
use futures::StreamExt;
use std::sync::Arc;

fn contact(millis: u64) -> Contact {
    Contact::new(
        UserId::from_uuid(uuid::Uuid::new_v4()),
        EphemeralId::parse("0123456789abcdef").unwrap(),
        Timestamp::from_millis(millis),
        60_500,
        -62,
        1.4,
    )
}

#[tokio::test]
async fn watch_all_emits_initial_then_updates() {
    let store = Arc::new(SqliteContactStore::open_in_memory().unwrap());
    store.insert(&contact(1_000)).unwrap();

    let mut feed = Box::pin(watch_all(store.clone()));
    let first = feed.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 1);

    store.insert(&contact(2_000)).unwrap();
    let second = feed.next().await.unwrap().unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].timestamp.as_millis(), 2_000);
}
