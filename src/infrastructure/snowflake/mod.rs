//! Snowflake warehouse adapter.

pub mod session;
pub mod value_format;
pub mod wire;

pub use session::SnowflakeSessionProvider;
