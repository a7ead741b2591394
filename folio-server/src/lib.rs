pub mod bot;
pub mod context;
pub mod http;
pub mod router;
pub mod subsystems;

pub use context::AppContext;
