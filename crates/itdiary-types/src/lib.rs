pub mod api;
pub mod models;
pub mod money;

pub use models::{ProjectStatus, Role};
pub use money::{Money, MoneyError};
