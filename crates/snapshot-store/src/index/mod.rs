pub mod mem;
pub mod persist;
