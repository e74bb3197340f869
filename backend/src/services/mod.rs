//! Business logic services for the Stockroom server

pub mod analytics;
pub mod auth;
pub mod backup;
pub mod categories;
pub mod import;
pub mod inventory;
pub mod products;
pub mod sales;
pub mod stores;
pub mod users;

pub use analytics::AnalyticsService;
pub use auth::AuthService;
pub use backup::BackupService;
pub use categories::CategoryService;
pub use import::ImportService;
pub use inventory::InventoryService;
pub use products::ProductService;
pub use sales::SaleService;
pub use stores::StoreService;
pub use users::UserService;
