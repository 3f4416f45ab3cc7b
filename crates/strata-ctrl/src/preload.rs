//! Startup preload: install configured limits, primitives and tasks.

use tracing::info;

use strata_core::{
    config::ControllerConfig,
    error::{BindingError, ConfigError, StrataError},
};
use strata_kin::RobotState;
use strata_tasks::TaskSpec;

use crate::manager::TaskManager;
use crate::requests::record_from_entry;
use crate::requests::spec_from_entry;

/// Validate the config against the tree, latch the control count and
/// install everything the config preloads, in order: joint limits,
/// primitives, tasks. The first failure aborts controller init.
pub fn apply_config(
    manager: &TaskManager,
    config: &ControllerConfig,
    state: &RobotState,
) -> Result<(), StrataError> {
    config.validate()?;

    // Every configured joint must exist in the tree.
    for joint in &config.joints {
        state
            .tree
            .joint(joint)
            .ok_or_else(|| BindingError::UnknownJoint(joint.clone()))?;
    }
    manager.init(state.tree.n_joints());

    for entry in &config.preload_joint_limits {
        let spec = TaskSpec {
            name: format!("limit_{}", entry.link_frame),
            task_type: "JointLimits".into(),
            priority: 1,
            visible: false,
            active: true,
            monitored: false,
            def_params: vec![
                entry.link_frame.clone(),
                entry.q_min.to_string(),
                entry.q_max.to_string(),
                entry.dq_max.to_string(),
            ],
            dyn_params: Vec::new(),
        };
        manager.set_task(&spec, state).map_err(|err| {
            StrataError::Config(ConfigError::InvalidValue {
                field: format!("preload_joint_limits.{}", entry.link_frame),
                message: err.to_string(),
            })
        })?;
    }

    for entry in &config.preload_geometric_primitives {
        let record = record_from_entry(entry)?;
        manager.set_primitive(&record)?;
    }

    for entry in &config.preload_tasks {
        manager.set_task(&spec_from_entry(entry), state).map_err(|err| {
            StrataError::Config(ConfigError::InvalidValue {
                field: format!("preload_tasks.{}", entry.name),
                message: err.to_string(),
            })
        })?;
    }

    info!(
        joint_limits = config.preload_joint_limits.len(),
        primitives = config.preload_geometric_primitives.len(),
        tasks = config.preload_tasks.len(),
        "controller preload applied"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_geom::NullVisualizer;
    use strata_kin::RobotState;
    use strata_solver::ClarabelHqpSolver;

    const PLANAR_ARM: &str = r#"
        <robot name="planar">
            <link name="world"/>
            <link name="l1"/>
            <link name="l2"/>
            <joint name="j1" type="revolute">
                <parent link="world"/><child link="l1"/>
                <axis xyz="0 0 1"/>
                <limit lower="-3" upper="3" effort="10" velocity="2"/>
            </joint>
            <joint name="j2" type="revolute">
                <parent link="l1"/><child link="l2"/>
                <origin xyz="1 0 0"/>
                <axis xyz="0 0 1"/>
                <limit lower="-3" upper="3" effort="10" velocity="2"/>
            </joint>
        </robot>
    "#;

    fn config_text() -> String {
        format!(
            r#"
            joints = ["j1", "j2"]
            robot_description = '''{PLANAR_ARM}'''

            [monitoring]
            active = true
            publish_rate = 50.0

            [[preload_joint_limits]]
            link_frame = "j1"
            q_min = -1.0
            q_max = 1.0
            dq_max = 0.2

            [[preload_geometric_primitives]]
            name = "tip"
            kind = "point"
            frame_id = "l2"
            parameters = [0.0, 0.0, 0.0]

            [[preload_tasks]]
            name = "home"
            task_type = "FullPose"
            priority = 2
            def_params = ["0.0", "0.0"]
            "#
        )
    }

    fn fixture() -> (TaskManager, RobotState, ControllerConfig) {
        let config = ControllerConfig::from_toml_str(&config_text()).unwrap();
        let tree = Arc::new(strata_kin::from_urdf_str(&config.robot_description).unwrap());
        let state = RobotState::zeros(tree);
        let mgr = TaskManager::new(
            Box::new(ClarabelHqpSolver::new()),
            Arc::new(NullVisualizer),
        );
        (mgr, state, config)
    }

    #[test]
    fn preload_installs_everything() {
        let (mgr, state, config) = fixture();
        apply_config(&mgr, &config, &state).unwrap();
        let tasks = mgr.list_all_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name, "limit_j1");
        assert_eq!(tasks[0].priority, 1);
        assert_eq!(tasks[1].name, "home");
        assert_eq!(mgr.list_all_primitives().len(), 1);
    }

    #[test]
    fn unknown_joint_in_config_aborts_init() {
        let (mgr, state, mut config) = fixture();
        config.joints.push("j9".into());
        let err = apply_config(&mgr, &config, &state).unwrap_err();
        assert!(err.to_string().contains("j9"));
    }

    #[test]
    fn broken_preload_task_aborts_init() {
        let (mgr, state, mut config) = fixture();
        config.preload_tasks[0].def_params = vec!["0.0".into()];
        assert!(apply_config(&mgr, &config, &state).is_err());
        // Limits were installed before the failure; the failing task
        // itself is not.
        assert!(mgr
            .list_all_tasks()
            .iter()
            .all(|t| t.name != "home"));
    }

    #[test]
    fn preloaded_controller_respects_limits_end_to_end() {
        let (mgr, state, config) = fixture();
        apply_config(&mgr, &config, &state).unwrap();
        let mut u = nalgebra::DVector::zeros(2);
        assert!(mgr.get_velocity_controls(&state, &mut u));
        // The home task asks for nothing; limits keep it that way.
        assert!(u.amax() < 1e-3);
    }
}
