pub mod fallback;
pub mod generator;
