//! The Strata task manager and its control surface.
//!
//! [`TaskManager`] owns the live task set and the primitive store
//! behind one lock, assembles solver stages every tick, and mediates
//! the non-realtime command surface against the realtime tick. The
//! host shell drives [`TaskManager::get_velocity_controls`] once per
//! control period and forwards transport requests to
//! [`TaskManager::handle_request`].

pub mod manager;
pub mod monitor;
pub mod preload;
pub mod requests;

pub use manager::{TaskInfo, TaskManager};
pub use monitor::{MonitorBatch, TaskMeasure, TaskMonitor};
pub use preload::apply_config;
pub use requests::{Reply, Request};
