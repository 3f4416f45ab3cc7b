//! The task manager: one lock over tasks, primitives and the solver.
//!
//! Mutations from the control surface and the realtime tick serialize
//! on the resource mutex, so a tick sees either all of a mutation or
//! none of it. The lock is held across the solve; the QP is CPU-bound
//! and short.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use strata_core::{
    Scalar,
    error::{BindingError, StrataError},
};
use strata_geom::{PrimitiveRecord, PrimitiveStore, PrimitiveVisitor, Visualizer};
use strata_kin::RobotState;
use strata_solver::HqpSolver;
use strata_tasks::{DistanceOracle, Task, TaskInitError, TaskSpec};

use crate::monitor::TaskMeasure;

/// Diagnostic row of `list_all_tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub task_type: String,
    pub priority: u32,
    pub active: bool,
    pub monitored: bool,
}

struct Resources {
    n_controls: usize,
    tasks: BTreeMap<String, Task>,
    store: PrimitiveStore,
    solver: Box<dyn HqpSolver>,
    oracle: Option<Arc<dyn DistanceOracle>>,
}

/// Owner of the live task set and primitive store.
pub struct TaskManager {
    resources: Mutex<Resources>,
}

impl TaskManager {
    /// Build a manager around a solver and a visualizer sink.
    #[must_use]
    pub fn new(solver: Box<dyn HqpSolver>, visualizer: Arc<dyn Visualizer>) -> Self {
        Self {
            resources: Mutex::new(Resources {
                n_controls: 0,
                tasks: BTreeMap::new(),
                store: PrimitiveStore::new(visualizer),
                solver,
                oracle: None,
            }),
        }
    }

    /// Inject the distance oracle used by obstacle-avoidance tasks.
    #[must_use]
    pub fn with_oracle(self, oracle: Arc<dyn DistanceOracle>) -> Self {
        self.lock().oracle = Some(oracle);
        self
    }

    /// Latch the number of controllable joints.
    pub fn init(&self, n_controls: usize) {
        self.lock().n_controls = n_controls;
    }

    fn lock(&self) -> MutexGuard<'_, Resources> {
        self.resources.lock().expect("task manager mutex poisoned")
    }

    // -- Tick ---------------------------------------------------------------

    /// Assemble and solve one tick. Writes the command into `controls`
    /// and returns whether it is usable; on any failure the command is
    /// all zeros.
    pub fn get_velocity_controls(
        &self,
        state: &RobotState,
        controls: &mut DVector<Scalar>,
    ) -> bool {
        let mut res = self.lock();
        let n_controls = res.n_controls;
        if controls.len() != n_controls {
            *controls = DVector::zeros(n_controls);
        }

        if res.tasks.is_empty() {
            controls.fill(0.0);
            return false;
        }

        let Resources {
            tasks,
            store,
            solver,
            ..
        } = &mut *res;

        solver.clear_stages();
        for (name, task) in tasks.iter_mut() {
            if !task.active() {
                continue;
            }
            match task.update(state, store) {
                Ok(()) => solver.append_stage(
                    task.priority(),
                    task.desired_rate().clone(),
                    task.jacobian().clone(),
                    task.row_types(),
                ),
                Err(err) => {
                    warn!(task = %name, error = %err, "task update failed; stage skipped this tick");
                }
            }
        }

        match solver.solve(n_controls) {
            Ok(u) => {
                controls.copy_from(&u);
                true
            }
            Err(err) => {
                warn!(error = %err, "hierarchical QP unsolvable; commanding zero velocities");
                controls.fill(0.0);
                false
            }
        }
    }

    // -- Task lifecycle -----------------------------------------------------

    /// Upsert a task. A failed init leaves any existing task of that
    /// name unchanged.
    pub fn set_task(&self, spec: &TaskSpec, state: &RobotState) -> Result<(), TaskInitError> {
        let mut res = self.lock();
        let n_controls = res.n_controls;
        let Resources {
            tasks,
            store,
            oracle,
            ..
        } = &mut *res;

        let task = Task::build(spec, state, store, n_controls, oracle.as_ref())?;

        let action = if tasks.contains_key(&spec.name) {
            store.remove_dependency(&spec.name);
            "updated"
        } else {
            "added"
        };
        for primitive in task.bound_primitives() {
            // Bindings were resolved during build; the store cannot have
            // lost them while we hold the lock.
            let _ = store.add_dependency(primitive, &spec.name);
        }
        tasks.insert(spec.name.clone(), task);
        info!(task = %spec.name, action, "task set");
        Ok(())
    }

    /// Remove a task by name, withdrawing its dependency edges.
    pub fn remove_task(&self, name: &str) -> Result<(), StrataError> {
        let mut res = self.lock();
        if res.tasks.remove(name).is_none() {
            return Err(BindingError::UnknownTask(name.to_string()).into());
        }
        res.store.remove_dependency(name);
        info!(task = %name, "task removed");
        Ok(())
    }

    /// Remove every task.
    pub fn remove_all_tasks(&self) {
        let mut res = self.lock();
        let names: Vec<String> = res.tasks.keys().cloned().collect();
        for name in &names {
            res.store.remove_dependency(name);
        }
        res.tasks.clear();
        info!(count = names.len(), "all tasks removed");
    }

    /// Remove every task at the given priority level. Returns how many
    /// were removed.
    pub fn remove_priority_level(&self, priority: u32) -> usize {
        let mut res = self.lock();
        let names: Vec<String> = res
            .tasks
            .iter()
            .filter(|(_, t)| t.priority() == priority)
            .map(|(n, _)| n.clone())
            .collect();
        for name in &names {
            res.tasks.remove(name);
            res.store.remove_dependency(name);
        }
        info!(priority, count = names.len(), "priority level removed");
        names.len()
    }

    fn with_task(
        &self,
        name: &str,
        apply: impl FnOnce(&mut Task),
    ) -> Result<(), StrataError> {
        let mut res = self.lock();
        match res.tasks.get_mut(name) {
            Some(task) => {
                apply(task);
                Ok(())
            }
            None => Err(BindingError::UnknownTask(name.to_string()).into()),
        }
    }

    pub fn activate_task(&self, name: &str) -> Result<(), StrataError> {
        self.with_task(name, |t| t.set_active(true))
    }

    pub fn deactivate_task(&self, name: &str) -> Result<(), StrataError> {
        self.with_task(name, |t| t.set_active(false))
    }

    pub fn monitor_task(&self, name: &str) -> Result<(), StrataError> {
        self.with_task(name, |t| t.set_monitored(true))
    }

    pub fn demonitor_task(&self, name: &str) -> Result<(), StrataError> {
        self.with_task(name, |t| t.set_monitored(false))
    }

    fn with_priority_level(&self, priority: u32, apply: impl Fn(&mut Task)) {
        let mut res = self.lock();
        for task in res.tasks.values_mut() {
            if task.priority() == priority {
                apply(task);
            }
        }
    }

    pub fn activate_priority_level(&self, priority: u32) {
        self.with_priority_level(priority, |t| t.set_active(true));
    }

    pub fn deactivate_priority_level(&self, priority: u32) {
        self.with_priority_level(priority, |t| t.set_active(false));
    }

    pub fn monitor_priority_level(&self, priority: u32) {
        self.with_priority_level(priority, |t| t.set_monitored(true));
    }

    pub fn demonitor_priority_level(&self, priority: u32) {
        self.with_priority_level(priority, |t| t.set_monitored(false));
    }

    /// Diagnostic listing, sorted by priority then name.
    #[must_use]
    pub fn list_all_tasks(&self) -> Vec<TaskInfo> {
        let res = self.lock();
        let mut infos: Vec<TaskInfo> = res
            .tasks
            .values()
            .map(|t| TaskInfo {
                name: t.name().to_string(),
                task_type: t.task_type().to_string(),
                priority: t.priority(),
                active: t.active(),
                monitored: t.monitored(),
            })
            .collect();
        infos.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));
        infos
    }

    // -- Monitoring ---------------------------------------------------------

    /// Snapshot the monitored tasks into `measures`.
    pub fn get_task_measures(&self, measures: &mut Vec<TaskMeasure>) {
        measures.clear();
        let mut res = self.lock();
        for task in res.tasks.values_mut() {
            if !task.monitored() {
                continue;
            }
            task.monitor();
            measures.push(TaskMeasure {
                task_name: task.name().to_string(),
                e: task.value().as_slice().to_vec(),
                e_dot_star: task.desired_rate().as_slice().to_vec(),
                performance_measures: task.performance_measures().to_vec(),
            });
        }
    }

    // -- Primitives ---------------------------------------------------------

    pub fn set_primitive(&self, record: &PrimitiveRecord) -> Result<(), StrataError> {
        self.lock().store.set_primitive(record)
    }

    pub fn remove_primitive(&self, name: &str) -> Result<(), StrataError> {
        Ok(self.lock().store.remove_primitive(name)?)
    }

    pub fn remove_all_primitives(&self) {
        self.lock().store.remove_all_primitives();
    }

    #[must_use]
    pub fn list_all_primitives(&self) -> Vec<PrimitiveRecord> {
        self.lock().store.list_records()
    }

    /// Push the current primitives to the visualizer sink.
    pub fn render_primitives(&self) {
        self.lock().store.render_all();
    }

    /// Visit stored primitives under the resource lock.
    pub fn accept_primitive_visitor(&self, visitor: &mut dyn PrimitiveVisitor, name: Option<&str>) {
        self.lock().store.accept_visitor(visitor, name);
    }

    /// Number of live tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
