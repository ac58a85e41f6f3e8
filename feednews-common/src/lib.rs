pub mod auth;
pub mod model;
pub mod snowflake;
pub mod util;
