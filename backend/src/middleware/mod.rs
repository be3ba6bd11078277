pub mod logbook;
pub mod request_id;

pub use logbook::{buffer_body, capture_exchange, AuthenticatedUser};
pub use request_id::request_id;
