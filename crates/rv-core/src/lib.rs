//! rv-core - Core library for Rivulet
//!
//! This crate provides the algebraic type system, runtime values, trigger
//! specifications, and engine configuration shared by the planner and the
//! streaming runtime.

pub mod config;
pub mod error;
pub(crate) mod serde_helpers;
pub mod trigger;
pub mod types;
pub mod value;

pub use config::{EngineConfig, OptimizerConfig, StorageBackend, StorageConfig, StreamingConfig};
pub use error::{CoreError, CoreResult};
pub use trigger::TriggerSpec;
pub use types::{type_intersection, type_sum, StructField, Type, TypeRelation};
pub use value::Value;
