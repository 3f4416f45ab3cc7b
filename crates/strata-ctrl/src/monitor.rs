//! Task monitoring: rate-gated snapshots of the monitored task set.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use strata_core::{Scalar, config::MonitoringConfig, time::CtrlTime};

use crate::manager::TaskManager;

/// One monitored task's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMeasure {
    pub task_name: String,
    /// Task value `e` at the snapshot.
    pub e: Vec<Scalar>,
    /// Desired rate `ė*` at the snapshot.
    pub e_dot_star: Vec<Scalar>,
    /// Task-defined summary scalars.
    pub performance_measures: Vec<Scalar>,
}

/// One publication of the monitoring stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorBatch {
    pub timestamp: CtrlTime,
    pub measures: Vec<TaskMeasure>,
}

/// Gates measure publication to the configured rate.
#[derive(Debug, Clone)]
pub struct TaskMonitor {
    active: bool,
    period: Duration,
    next_due: CtrlTime,
}

impl TaskMonitor {
    #[must_use]
    pub fn new(config: &MonitoringConfig) -> Self {
        Self {
            active: config.active,
            period: Duration::from_secs_f64(1.0 / config.publish_rate),
            next_due: CtrlTime::new(),
        }
    }

    /// Whether the stream publishes at all.
    #[must_use]
    pub const fn active(&self) -> bool {
        self.active
    }

    /// Produce a batch if monitoring is active and the publication
    /// period has elapsed.
    pub fn poll(&mut self, manager: &TaskManager, now: CtrlTime) -> Option<MonitorBatch> {
        if !self.active || now < self.next_due {
            return None;
        }
        self.next_due = now + self.period;
        let mut measures = Vec::new();
        manager.get_task_measures(&mut measures);
        Some(MonitorBatch {
            timestamp: now,
            measures,
        })
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
    use strata_tasks::TaskSpec;

    fn manager_with_monitored_task() -> (TaskManager, RobotState) {
        let state = RobotState::zeros(Arc::new(
            TreeBuilder::new("world")
                .revolute("j1", "l1", "world", Vector3::z(), [0.0; 3])
                .build(),
        ));
        let mgr = TaskManager::new(
            Box::new(ClarabelHqpSolver::new()),
            Arc::new(NullVisualizer),
        );
        mgr.init(1);
        mgr.set_task(
            &TaskSpec {
                name: "hold".into(),
                task_type: "FullPose".into(),
                priority: 1,
                visible: true,
                active: true,
                monitored: true,
                def_params: vec!["0.5".into()],
                dyn_params: Vec::new(),
            },
            &state,
        )
        .unwrap();
        (mgr, state)
    }

    #[test]
    fn inactive_monitor_never_publishes() {
        let (mgr, _state) = manager_with_monitored_task();
        let mut monitor = TaskMonitor::new(&MonitoringConfig {
            active: false,
            publish_rate: 100.0,
        });
        assert!(monitor.poll(&mgr, CtrlTime::from_secs(1.0)).is_none());
    }

    #[test]
    fn publishes_at_the_configured_rate() {
        let (mgr, _state) = manager_with_monitored_task();
        let mut monitor = TaskMonitor::new(&MonitoringConfig {
            active: true,
            publish_rate: 10.0, // 100 ms period
        });

        let mut t = CtrlTime::new();
        let first = monitor.poll(&mgr, t);
        assert!(first.is_some());
        assert_eq!(first.unwrap().measures.len(), 1);

        // 50 ms later: not due yet.
        t.advance_secs(0.05);
        assert!(monitor.poll(&mgr, t).is_none());

        // 100 ms after the first publication: due again.
        t.advance_secs(0.05);
        assert!(monitor.poll(&mgr, t).is_some());
    }

    #[test]
    fn batch_carries_task_values() {
        let (mgr, state) = manager_with_monitored_task();
        let mut u = nalgebra::DVector::zeros(1);
        mgr.get_velocity_controls(&state, &mut u);

        let mut monitor = TaskMonitor::new(&MonitoringConfig {
            active: true,
            publish_rate: 100.0,
        });
        let batch = monitor.poll(&mgr, CtrlTime::from_secs(0.01)).unwrap();
        let measure = &batch.measures[0];
        assert_eq!(measure.task_name, "hold");
        assert_eq!(measure.e.len(), 1);
        assert_eq!(measure.e_dot_star.len(), 1);
        assert!((measure.e[0] + 0.5).abs() < 1e-9);
    }
}
