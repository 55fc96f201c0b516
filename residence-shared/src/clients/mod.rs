pub mod db;
pub mod rabbitmq;
pub mod telegram;
