pub mod bot_gateway;
pub mod dm_dispatcher;
