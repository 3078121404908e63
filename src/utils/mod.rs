pub mod logging;

pub use logging::{redact, short_id, truncate_text};
