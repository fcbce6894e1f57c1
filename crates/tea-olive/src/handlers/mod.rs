//! HTTP request handlers.

mod check;
mod health;
mod providers;
mod stream;
mod version;

pub use check::check_equivalent;
pub use health::{livez, readyz};
pub use providers::list_providers;
pub use stream::stream_equivalent;
pub use version::version;
