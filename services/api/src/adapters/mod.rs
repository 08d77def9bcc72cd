//! services/api/src/adapters/mod.rs

pub mod coze;
pub mod db;

pub use coze::CozeAdapter;
pub use db::DirectoryAdapter;
