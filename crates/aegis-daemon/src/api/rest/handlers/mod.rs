//! API request handlers

mod events;
mod health;
mod lifecycle;
mod responses;
mod signals;
mod validators;

pub use events::*;
pub use health::*;
pub use lifecycle::*;
pub use responses::*;
pub use signals::*;
pub use validators::*;
