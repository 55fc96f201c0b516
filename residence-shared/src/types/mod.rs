pub mod api;
pub mod event;
pub mod session;

pub use api::*;
pub use event::*;
pub use session::*;
