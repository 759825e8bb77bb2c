//! SQLite persistence for students, score snapshots and prediction history.

pub mod db;
pub mod error;
pub mod models;
pub mod predictions;
pub mod repository;
pub mod students;

pub use db::StudentDb;
pub use error::{StoreError, StoreResult};
