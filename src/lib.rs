pub mod broker;
pub mod config;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod pulsar_client;
pub mod shutdown;
