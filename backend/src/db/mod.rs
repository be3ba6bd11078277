pub mod connection;

pub use connection::{connect_store, create_pool, DbPool};
