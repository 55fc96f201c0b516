pub mod listener;

pub use listener::{ChangeFilter, RealtimeListener, Subscription};
