pub mod app;
pub mod billing;
pub mod config;
pub mod food_handlers;
pub mod invoice_handlers;
pub mod menu_handlers;
pub mod metrics;
pub mod models;
pub mod order_handlers;
pub mod order_item_handlers;
pub mod paging;
pub mod pg_store;
pub mod sessions;
pub mod store;
pub mod table_handlers;
pub mod tokens;
pub mod user_handlers;

pub use app::{build_router, AppState};
