pub mod cfg;
pub mod log;
