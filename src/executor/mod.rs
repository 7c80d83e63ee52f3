//! Query execution module
//!
//! This module contains the planner, the optimizer, the Volcano operators and the engine
//! that drives them.

pub mod engine;
pub mod operators;
pub mod planner;

pub mod optimizer;

pub use engine::{ExecutionEngine, QueryResult};
pub use operators::{build_executor, Executor};
pub use optimizer::{Optimizer, PhysicalPlan};
pub use planner::{LogicalPlan, Planner};
