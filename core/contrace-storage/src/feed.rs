//! Live view of the contact log.

use crate::{run_blocking, ContactStore, StorageResult};
use contrace_types::Contact;
use futures::stream::{self, Stream};
use std::sync::Arc;

/// Streams the full contact list, newest first.
///
/// Yields the current contents immediately, then a fresh snapshot after every
/// modification. Bursts of writes between polls collapse into one snapshot.
/// The stream holds a handle to the store; drop it to stop watching.
pub fn watch_all(
    store: Arc<dyn ContactStore>,
) -> impl Stream<Item = StorageResult<Vec<Contact>>> + Send + 'static {
    let changes = store.subscribe();
    stream::unfold((store, changes, true), |(store, mut changes, first)| async move {
        if !first && changes.changed().await.is_err() {
            return None;
        }
        drop(changes.borrow_and_update());

        let reader = Arc::clone(&store);
        let snapshot = run_blocking(move || reader.query_all()).await;
        Some((snapshot, (store, changes, false)))
    })
}
