pub mod core;
pub mod utils;

#[cfg(feature = "server")]
pub mod server;
