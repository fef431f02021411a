//! Request handlers.

pub mod compose;
pub mod generation;
pub mod health;

pub use compose::{process_video, vertical_concat};
pub use generation::{generate_video, generation_status};
pub use health::{health, ready};
