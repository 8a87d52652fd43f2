pub mod csv_ingest;
pub mod dataset_service;

pub use csv_ingest::*;
pub use dataset_service::*;
