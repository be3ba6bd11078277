pub mod body;
pub mod mask;
pub mod route_pattern;
pub mod time;

pub use body::*;
pub use mask::*;
pub use route_pattern::*;
pub use time::*;
