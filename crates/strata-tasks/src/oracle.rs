//! The distance-gradient oracle behind obstacle avoidance.
//!
//! The controller never owns a world model; it asks an injected oracle
//! for obstacle gradients at query points. A gradient points from the
//! nearest obstacle surface to the query point and its norm is the
//! distance.

use nalgebra::{Point3, Vector3};

use strata_core::{Scalar, error::OracleError};

/// External distance-gradient source, e.g. an SDF map.
pub trait DistanceOracle: Send + Sync {
    /// Obstacle gradients for a batch of points expressed in `frame`.
    ///
    /// One gradient per query point, same order. A transiently missing
    /// map is an [`OracleError`], not a panic.
    fn query_gradients(
        &self,
        points: &[Point3<Scalar>],
        frame: &str,
    ) -> Result<Vec<Vector3<Scalar>>, OracleError>;

    /// Whether a returned gradient is usable.
    fn is_valid(&self, gradient: &Vector3<Scalar>) -> bool {
        gradient.iter().all(|c| c.is_finite()) && gradient.norm_squared() > 0.0
    }
}

/// Analytic oracle for a single point obstacle.
///
/// Stands in for a real SDF map in tests and bench rigs.
#[derive(Debug, Clone)]
pub struct PointObstacleOracle {
    pub obstacle: Point3<Scalar>,
}

impl PointObstacleOracle {
    #[must_use]
    pub const fn new(obstacle: Point3<Scalar>) -> Self {
        Self { obstacle }
    }
}

impl DistanceOracle for PointObstacleOracle {
    fn query_gradients(
        &self,
        points: &[Point3<Scalar>],
        _frame: &str,
    ) -> Result<Vec<Vector3<Scalar>>, OracleError> {
        Ok(points.iter().map(|p| p - self.obstacle).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn point_obstacle_gradient_points_away() {
        let oracle = PointObstacleOracle::new(Point3::new(1.0, 0.0, 0.0));
        let grads = oracle
            .query_gradients(&[Point3::new(3.0, 0.0, 0.0)], "world")
            .unwrap();
        assert_relative_eq!(grads[0].x, 2.0);
        assert!(oracle.is_valid(&grads[0]));
    }

    #[test]
    fn zero_gradient_is_invalid() {
        let oracle = PointObstacleOracle::new(Point3::origin());
        assert!(!oracle.is_valid(&Vector3::zeros()));
        assert!(!oracle.is_valid(&Vector3::new(f64::NAN, 0.0, 0.0)));
    }
}
