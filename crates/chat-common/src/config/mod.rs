//! Configuration structs

mod app_config;

pub use app_config::{
    AppSettings, ClientConfig, ConfigError, Environment, GatewayConfig, RestConfig,
};
