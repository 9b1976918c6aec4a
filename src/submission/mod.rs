pub mod api;
pub mod error;
pub mod pacing;
pub mod submit_loop;
