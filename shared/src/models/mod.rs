//! Domain models for the Stockroom platform

mod analytics;
mod category;
mod inventory;
mod product;
mod sale;
mod store;
mod user;

pub use analytics::*;
pub use category::*;
pub use inventory::*;
pub use product::*;
pub use sale::*;
pub use store::*;
pub use user::*;
