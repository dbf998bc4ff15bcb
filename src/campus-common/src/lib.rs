//! Common utilities shared across the campus access client crates.

pub mod dirs;
pub mod http_client;

pub use dirs::{AppDirs, CAMPUS_HOME_ENV, get_app_dirs, get_campus_home};
pub use http_client::{
    DEFAULT_TIMEOUT, PROFILE_TIMEOUT, USER_AGENT, create_client_builder,
    create_client_with_timeout, create_default_client,
};
