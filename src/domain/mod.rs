pub mod apportion;
pub mod charge_export;
pub mod intensity_table;
pub mod models;
pub mod report;
pub mod summary;
