pub mod health;
pub mod notifications;
pub mod push;
pub mod session;
pub mod telegram;
