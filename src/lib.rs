pub mod config;
pub mod server;

pub use config::Config;
pub use server::GroveServer;

/// Release version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Release version plus the build suffix (commits since the release), if the
/// build provided one through `GROVE_MIN_VERSION`
pub fn full_version() -> String {
    format!("{}{}", VERSION, option_env!("GROVE_MIN_VERSION").unwrap_or(""))
}
