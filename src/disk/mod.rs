pub mod manager;

pub use manager::{DiskError, DiskManager};
