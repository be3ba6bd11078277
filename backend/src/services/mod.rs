pub mod dispatcher;
pub mod entry_store;
pub mod exchange;
pub mod logbook;
pub mod memory_store;
pub mod token_introspection;

pub use dispatcher::{CaptureDispatcher, CaptureJob};
pub use entry_store::{EntryStore, PgEntryStore, StoreError};
pub use exchange::{CaptureOverrides, RequestSnapshot, RequestView, ResponseSnapshot, ResponseView};
pub use logbook::{LogbookService, LogbookSubject};
pub use memory_store::MemoryEntryStore;
pub use token_introspection::{JwtIntrospector, TokenIntrospector};
