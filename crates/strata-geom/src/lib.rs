//! Geometric primitives for the Strata controller.
//!
//! A primitive is a named, typed geometric object attached to a frame
//! of the kinematic tree. Tasks bind primitives by name and resolve
//! them through the [`PrimitiveStore`] every tick, so parameter updates
//! take effect without task re-creation.

pub mod primitive;
pub mod store;
pub mod visual;

pub use primitive::{
    BoxShape, CylinderShape, LineShape, PlaneShape, PointShape, Primitive, PrimitiveKind,
    PrimitiveRecord, PrimitiveShape, SphereShape,
};
pub use store::{PrimitiveStore, PrimitiveVisitor};
pub use visual::{NullVisualizer, RecordingVisualizer, VisualEvent, Visualizer};
