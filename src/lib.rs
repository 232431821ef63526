pub mod prelude;
pub mod error;
pub mod config;
pub mod geometry;
pub mod chunk;
pub mod loader;
pub mod compiler;
