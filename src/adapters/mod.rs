pub mod charge_files;
pub mod export;
pub mod intensity_files;
pub mod source_files;
