use std::sync::Arc;

use crate::{
    config::Config,
    services::{CaptureDispatcher, EntryStore, LogbookService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn EntryStore>,
    pub logbook: Arc<LogbookService>,
    pub dispatcher: Option<CaptureDispatcher>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn EntryStore>) -> Self {
        let logbook = LogbookService::new(Arc::new(config.logbook.clone()), store.clone());
        Self {
            config: Arc::new(config),
            store,
            logbook: Arc::new(logbook),
            dispatcher: None,
        }
    }

    pub fn with_logbook(mut self, logbook: LogbookService) -> Self {
        self.logbook = Arc::new(logbook);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: CaptureDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn retention_days(&self) -> u32 {
        self.config.logbook.retention_days
    }
}
