pub mod error;
pub mod models;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use models::{
    AdIntelligence, DashboardStats, KeywordOverview, KeywordRow, KeywordState, NewProduct,
    ProductRow, ResultRow, ResultSort, StoreStats, TrafficRow, UpsertOutcome,
};
pub use store::ProductStore;
