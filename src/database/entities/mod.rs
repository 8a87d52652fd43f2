pub mod datasets;
pub mod rows;

pub use datasets::Entity as Datasets;
pub use rows::Entity as Rows;
