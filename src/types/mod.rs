pub mod batch;
pub mod catalog;
pub mod payload;
pub mod work_unit;
