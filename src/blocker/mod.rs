pub mod coordinator;
pub mod elevate;
pub mod hosts;
pub mod whitelist;
