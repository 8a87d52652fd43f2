pub mod datasets;
pub mod health;
