pub mod builder;
pub mod resume_filter;
pub mod sections;
