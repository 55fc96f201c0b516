pub mod connection_service;
pub mod notification_service;
