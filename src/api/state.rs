use std::sync::Arc;

use crate::backend::DataBackend;
use crate::bracket::BracketCache;
use crate::contact::{ContactSettings, Mailer};
use crate::realtime::ChangeFeed;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn DataBackend>,
    pub feed: ChangeFeed,
    pub brackets: BracketCache,
    pub mailer: Arc<dyn Mailer>,
    pub contact: Arc<ContactSettings>,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn DataBackend>,
        feed: ChangeFeed,
        mailer: Arc<dyn Mailer>,
        contact: ContactSettings,
    ) -> Self {
        let brackets = BracketCache::new(backend.clone(), feed.clone());
        Self {
            backend,
            feed,
            brackets,
            mailer,
            contact: Arc::new(contact),
        }
    }
}
