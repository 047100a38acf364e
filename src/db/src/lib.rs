mod conn;
pub mod connect;
pub mod repo;
pub mod schema;

pub use conn::DbConn;
pub use connect::{connect_env, connect_memory};

pub use anyhow::Error;
