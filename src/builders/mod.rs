//! Builders that turn configuration into running components.

pub mod pool_builder;

pub use pool_builder::build_registry;
