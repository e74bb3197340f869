//! HTTP handlers
//!
//! Handlers authorize the caller against the role permission table, call a
//! service and shape the response; all business rules live in the services.

pub mod analytics;
pub mod auth;
pub mod categories;
pub mod health;
pub mod inventory;
pub mod products;
pub mod sales;
pub mod settings;
pub mod stores;
pub mod users;

pub use analytics::*;
pub use auth::*;
pub use categories::*;
pub use health::*;
pub use inventory::*;
pub use products::*;
pub use sales::*;
pub use settings::*;
pub use stores::*;
pub use users::*;
