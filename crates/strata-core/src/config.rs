use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_false() -> bool {
    false
}
const fn default_true() -> bool {
    true
}
const fn default_publish_rate() -> f64 {
    100.0
}
const fn default_color() -> [f64; 4] {
    [0.5, 0.5, 0.5, 1.0]
}

// ---------------------------------------------------------------------------
// MonitoringConfig
// ---------------------------------------------------------------------------

/// Settings for the task-measure publication stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Whether the monitoring stream is active at all.
    #[serde(default = "default_false")]
    pub active: bool,

    /// Publication rate in Hz (default: 100).
    #[serde(default = "default_publish_rate")]
    pub publish_rate: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            active: false,
            publish_rate: default_publish_rate(),
        }
    }
}

// ---------------------------------------------------------------------------
// Preload records
// ---------------------------------------------------------------------------

/// One joint-limit task to install at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLimitEntry {
    /// Joint to limit (a joint name in the tree).
    pub link_frame: String,
    pub q_min: f64,
    pub q_max: f64,
    pub dq_max: f64,
}

/// One geometric primitive to install at startup. Field-for-field the
/// wire form of `set_primitive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveEntry {
    pub name: String,
    /// Primitive kind name: `point`, `line`, `plane`, `sphere`,
    /// `cylinder` or `box`.
    pub kind: String,
    pub frame_id: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_color")]
    pub color: [f64; 4],
    pub parameters: Vec<f64>,
}

/// One task to install at startup. Field-for-field the wire form of
/// `set_task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub name: String,
    pub task_type: String,
    pub priority: u32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_false")]
    pub monitored: bool,
    #[serde(default)]
    pub def_params: Vec<String>,
    #[serde(default)]
    pub dyn_params: Vec<String>,
}

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

/// Startup configuration for the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Ordered list of controllable joint names.
    pub joints: Vec<String>,

    /// URDF XML describing the kinematic tree.
    pub robot_description: String,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub preload_joint_limits: Vec<JointLimitEntry>,

    #[serde(default)]
    pub preload_geometric_primitives: Vec<PrimitiveEntry>,

    #[serde(default)]
    pub preload_tasks: Vec<TaskEntry>,
}

impl ControllerConfig {
    /// Parse a TOML document into a config.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.joints.is_empty() {
            return Err(ConfigError::MissingField("joints".into()));
        }
        if self.robot_description.is_empty() {
            return Err(ConfigError::MissingField("robot_description".into()));
        }
        if self.monitoring.publish_rate <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "monitoring.publish_rate".into(),
                message: format!("must be positive, got {}", self.monitoring.publish_rate),
            });
        }
        for entry in &self.preload_joint_limits {
            if entry.q_min >= entry.q_max {
                return Err(ConfigError::InvalidValue {
                    field: format!("preload_joint_limits.{}", entry.link_frame),
                    message: format!("q_min {} >= q_max {}", entry.q_min, entry.q_max),
                });
            }
            if entry.dq_max <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("preload_joint_limits.{}", entry.link_frame),
                    message: format!("dq_max must be positive, got {}", entry.dq_max),
                });
            }
        }
        Ok(())
    }
}
