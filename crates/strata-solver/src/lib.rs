//! Hierarchical QP solving for the Strata controller.
//!
//! Task stages are appended in arbitrary order, grouped by priority
//! and solved as a cascade: each level minimizes its own residual over
//! the freedom left by every level before it. The back end is
//! [Clarabel](https://clarabel.org) behind the narrow [`HqpSolver`]
//! contract, so swapping QP implementations does not touch the task
//! engine.

pub mod hqp;
pub mod stage;

pub use hqp::ClarabelHqpSolver;
pub use stage::{HqpSolver, Stage};
