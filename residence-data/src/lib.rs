//! Typed access to the portal tables touched by the notification slice.
//!
//! Every write goes through a [`Store`] implementation, and every committed
//! write is echoed on the store's [`ChangeFeed`] so realtime listeners see it.

pub mod feed;
pub mod models;
pub mod schema;
pub mod store;

pub use feed::ChangeFeed;
pub use store::memory::MemoryStore;
pub use store::pg::PgStore;
pub use store::Store;
