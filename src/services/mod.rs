pub mod auth_service;
pub mod memory_store;
pub mod notification_store;
pub mod notifier;
pub mod user_service;
pub mod user_store;
