//! Word cache: lecture key → complete word list, filled lazily.
//!
//! Each key owns a `OnceCell`. Concurrent requests for a key that is still loading
//! await the same initialization instead of issuing a second fetch. A failed fetch
//! leaves the cell empty, so the next request retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::api::Backend;
use crate::domain::{LectureKey, Word};
use crate::error::ApiError;

type Slot = Arc<OnceCell<Arc<Vec<Word>>>>;

#[derive(Default)]
pub struct WordCache {
    slots: Mutex<HashMap<LectureKey, Slot>>,
}

impl WordCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: LectureKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key).or_default().clone()
    }

    /// Cached words for `key`, without fetching.
    pub fn get(&self, key: LectureKey) -> Option<Arc<Vec<Word>>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(&key).and_then(|s| s.get().cloned())
    }

    pub fn contains(&self, key: LectureKey) -> bool {
        self.get(key).is_some()
    }

    /// Words for `key`, fetching them once if absent.
    #[instrument(level = "debug", target = "training", skip(self, backend), fields(%key))]
    pub async fn get_or_fetch(
        &self,
        key: LectureKey,
        backend: &dyn Backend,
    ) -> Result<Arc<Vec<Word>>, ApiError> {
        let slot = self.slot(key);
        let words = slot
            .get_or_try_init(|| async {
                let fetched = backend.fetch_words(&[key]).await?;
                let words: Vec<Word> = match key {
                    LectureKey::Lecture(id) => {
                        fetched.into_iter().filter(|w| w.lecture == id).collect()
                    }
                    LectureKey::Random => fetched,
                };
                debug!(target: "training", %key, count = words.len(), "Cached words");
                Ok::<_, ApiError>(Arc::new(words))
            })
            .await?;
        Ok(words.clone())
    }

    /// Drops every entry. Fetches still in flight finish into detached cells.
    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.clear();
    }
}
