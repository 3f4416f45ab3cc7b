//! Transport-agnostic command surface.
//!
//! Requests mirror the manager's operations one to one; replies carry
//! an `ok` flag, a human-readable message, and the diagnostic tables
//! for the listing calls. The host shell owns the actual transport
//! (services, sockets, a REPL) and just shuttles these records.

use serde::{Deserialize, Serialize};
use tracing::warn;

use strata_core::{
    config::{PrimitiveEntry, TaskEntry},
    error::ConfigError,
};
use strata_geom::{PrimitiveKind, PrimitiveRecord};
use strata_kin::RobotState;
use strata_tasks::TaskSpec;

use crate::manager::{TaskInfo, TaskManager};

/// One command-surface request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    SetTask(TaskEntry),
    RemoveTask { name: String },
    RemoveAllTasks,
    ListAllTasks,
    ActivateTask { name: String },
    DeactivateTask { name: String },
    MonitorTask { name: String },
    DemonitorTask { name: String },
    ActivatePriorityLevel { priority: u32 },
    DeactivatePriorityLevel { priority: u32 },
    MonitorPriorityLevel { priority: u32 },
    DemonitorPriorityLevel { priority: u32 },
    RemovePriorityLevel { priority: u32 },
    SetPrimitive(PrimitiveEntry),
    RemovePrimitive { name: String },
    RemoveAllPrimitives,
    ListAllPrimitives,
}

/// Command-surface reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
    /// Filled by `list_all_tasks`.
    #[serde(default)]
    pub tasks: Vec<TaskInfo>,
    /// Filled by `list_all_primitives`.
    #[serde(default)]
    pub primitives: Vec<PrimitiveRecord>,
}

impl Reply {
    fn ack() -> Self {
        Self {
            ok: true,
            message: String::new(),
            tasks: Vec::new(),
            primitives: Vec::new(),
        }
    }

    fn fail(message: String) -> Self {
        Self {
            ok: false,
            message,
            tasks: Vec::new(),
            primitives: Vec::new(),
        }
    }
}

/// Convert the wire form of a task into the build spec.
#[must_use]
pub fn spec_from_entry(entry: &TaskEntry) -> TaskSpec {
    TaskSpec {
        name: entry.name.clone(),
        task_type: entry.task_type.clone(),
        priority: entry.priority,
        visible: entry.visible,
        active: entry.active,
        monitored: entry.monitored,
        def_params: entry.def_params.clone(),
        dyn_params: entry.dyn_params.clone(),
    }
}

/// Convert the wire form of a primitive into the store record.
pub fn record_from_entry(entry: &PrimitiveEntry) -> Result<PrimitiveRecord, ConfigError> {
    Ok(PrimitiveRecord {
        name: entry.name.clone(),
        kind: PrimitiveKind::parse(&entry.kind)?,
        frame_id: entry.frame_id.clone(),
        visible: entry.visible,
        color: entry.color,
        parameters: entry.parameters.clone(),
    })
}

impl TaskManager {
    /// Dispatch one command-surface request.
    ///
    /// Errors never escape: they come back as `ok = false` with the
    /// error's message, and are logged with identifying context.
    pub fn handle_request(&self, request: &Request, state: &RobotState) -> Reply {
        match request {
            Request::SetTask(entry) => match self.set_task(&spec_from_entry(entry), state) {
                Ok(()) => Reply::ack(),
                Err(err) => {
                    warn!(task = %entry.name, code = err.code(), error = %err, "set_task rejected");
                    Reply::fail(format!("task '{}': {err} (status {})", entry.name, err.code()))
                }
            },
            Request::RemoveTask { name } => self.ack_or_fail(self.remove_task(name)),
            Request::RemoveAllTasks => {
                self.remove_all_tasks();
                Reply::ack()
            }
            Request::ListAllTasks => Reply {
                tasks: self.list_all_tasks(),
                ..Reply::ack()
            },
            Request::ActivateTask { name } => self.ack_or_fail(self.activate_task(name)),
            Request::DeactivateTask { name } => self.ack_or_fail(self.deactivate_task(name)),
            Request::MonitorTask { name } => self.ack_or_fail(self.monitor_task(name)),
            Request::DemonitorTask { name } => self.ack_or_fail(self.demonitor_task(name)),
            Request::ActivatePriorityLevel { priority } => {
                self.activate_priority_level(*priority);
                Reply::ack()
            }
            Request::DeactivatePriorityLevel { priority } => {
                self.deactivate_priority_level(*priority);
                Reply::ack()
            }
            Request::MonitorPriorityLevel { priority } => {
                self.monitor_priority_level(*priority);
                Reply::ack()
            }
            Request::DemonitorPriorityLevel { priority } => {
                self.demonitor_priority_level(*priority);
                Reply::ack()
            }
            Request::RemovePriorityLevel { priority } => {
                let removed = self.remove_priority_level(*priority);
                Reply {
                    message: format!("removed {removed} tasks"),
                    ..Reply::ack()
                }
            }
            Request::SetPrimitive(entry) => match record_from_entry(entry) {
                Ok(record) => self.ack_or_fail(self.set_primitive(&record)),
                Err(err) => {
                    warn!(primitive = %entry.name, error = %err, "set_primitive rejected");
                    Reply::fail(format!("primitive '{}': {err}", entry.name))
                }
            },
            Request::RemovePrimitive { name } => self.ack_or_fail(self.remove_primitive(name)),
            Request::RemoveAllPrimitives => {
                self.remove_all_primitives();
                Reply::ack()
            }
            Request::ListAllPrimitives => Reply {
                primitives: self.list_all_primitives(),
                ..Reply::ack()
            },
        }
    }

    fn ack_or_fail<E: std::fmt::Display>(&self, result: Result<(), E>) -> Reply {
        match result {
            Ok(()) => Reply::ack(),
            Err(err) => {
                warn!(error = %err, "request rejected");
                Reply::fail(err.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::sync::Arc;
    use strata_geom::NullVisualizer;
    use strata_kin::{RobotState, TreeBuilder};
    use strata_solver::ClarabelHqpSolver;

    fn fixture() -> (TaskManager, RobotState) {
        let state = RobotState::zeros(Arc::new(
            TreeBuilder::new("world")
                .revolute("j1", "l1", "world", Vector3::z(), [0.0; 3])
                .revolute("j2", "l2", "l1", Vector3::z(), [1.0, 0.0, 0.0])
                .build(),
        ));
        let mgr = TaskManager::new(
            Box::new(ClarabelHqpSolver::new()),
            Arc::new(NullVisualizer),
        );
        mgr.init(2);
        (mgr, state)
    }

    fn set_task_entry(name: &str) -> Request {
        Request::SetTask(TaskEntry {
            name: name.into(),
            task_type: "FullPose".into(),
            priority: 1,
            visible: true,
            active: true,
            monitored: false,
            def_params: vec!["0.1".into(), "0.2".into()],
            dyn_params: vec!["FirstOrder".into(), "1.0".into()],
        })
    }

    fn set_primitive_entry(name: &str) -> Request {
        Request::SetPrimitive(PrimitiveEntry {
            name: name.into(),
            kind: "point".into(),
            frame_id: "l2".into(),
            visible: true,
            color: [1.0, 0.0, 0.0, 1.0],
            parameters: vec![0.1, 0.2, 0.3],
        })
    }

    #[test]
    fn set_and_list_tasks_over_the_wire() {
        let (mgr, state) = fixture();
        assert!(mgr.handle_request(&set_task_entry("reach"), &state).ok);
        let reply = mgr.handle_request(&Request::ListAllTasks, &state);
        assert!(reply.ok);
        assert_eq!(reply.tasks.len(), 1);
        assert_eq!(reply.tasks[0].name, "reach");
    }

    #[test]
    fn failed_set_task_reports_status_code() {
        let (mgr, state) = fixture();
        let mut bad = set_task_entry("reach");
        if let Request::SetTask(entry) = &mut bad {
            entry.def_params = vec!["0.1".into()];
        }
        let reply = mgr.handle_request(&bad, &state);
        assert!(!reply.ok);
        assert!(reply.message.contains("status -2"));
    }

    #[test]
    fn unknown_names_fail_politely() {
        let (mgr, state) = fixture();
        assert!(!mgr
            .handle_request(&Request::ActivateTask { name: "ghost".into() }, &state)
            .ok);
        assert!(!mgr
            .handle_request(&Request::RemovePrimitive { name: "ghost".into() }, &state)
            .ok);
    }

    #[test]
    fn primitive_roundtrip_over_the_wire() {
        let (mgr, state) = fixture();
        assert!(mgr.handle_request(&set_primitive_entry("tip"), &state).ok);
        let reply = mgr.handle_request(&Request::ListAllPrimitives, &state);
        assert_eq!(reply.primitives.len(), 1);
        let record = &reply.primitives[0];
        assert_eq!(record.name, "tip");
        assert_eq!(record.parameters, vec![0.1, 0.2, 0.3]);
        assert_eq!(record.color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn bad_primitive_kind_is_rejected() {
        let (mgr, state) = fixture();
        let mut bad = set_primitive_entry("tip");
        if let Request::SetPrimitive(entry) = &mut bad {
            entry.kind = "cube".into();
        }
        let reply = mgr.handle_request(&bad, &state);
        assert!(!reply.ok);
        assert!(reply.message.contains("cube"));
    }

    #[test]
    fn requests_serialize_roundtrip() {
        let request = set_task_entry("reach");
        let json = serde_json::to_string(&request).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(request, back);

        let request = Request::RemovePriorityLevel { priority: 3 };
        let json = serde_json::to_string(&request).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(request, back);
    }

    #[test]
    fn priority_level_requests_always_ack() {
        let (mgr, state) = fixture();
        assert!(mgr
            .handle_request(&Request::DeactivatePriorityLevel { priority: 9 }, &state)
            .ok);
        let reply = mgr.handle_request(&Request::RemovePriorityLevel { priority: 9 }, &state);
        assert!(reply.ok);
        assert!(reply.message.contains("removed 0"));
    }
}
