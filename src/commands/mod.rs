pub mod config;
pub mod replay;
pub mod route;

pub use config::handle_config;
pub use replay::handle_replay;
pub use route::handle_route;
