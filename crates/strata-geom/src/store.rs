//! The primitive store: named primitives plus task-dependency edges.
//!
//! The store owns all primitives. Tasks refer to primitives by name
//! and resolve them through the store every tick, so `set_primitive`
//! on an existing name updates the geometry in place without breaking
//! any binding. Dependency edges exist for diagnostics and removal
//! cascades; they do not pin a primitive's lifetime.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use strata_core::error::{BindingError, StrataError};

use crate::primitive::{
    BoxShape, CylinderShape, LineShape, PlaneShape, PointShape, Primitive, PrimitiveKind,
    PrimitiveRecord, SphereShape,
};
use crate::visual::Visualizer;

/// Visitor over stored primitives, for rendering and introspection.
pub trait PrimitiveVisitor {
    fn visit(&mut self, primitive: &Primitive);
}

struct StoredPrimitive {
    primitive: Primitive,
    /// Names of tasks currently bound to this primitive.
    dependencies: BTreeSet<String>,
}

/// Registry of named, frame-attached primitives.
pub struct PrimitiveStore {
    map: BTreeMap<String, StoredPrimitive>,
    visualizer: Arc<dyn Visualizer>,
}

impl PrimitiveStore {
    #[must_use]
    pub fn new(visualizer: Arc<dyn Visualizer>) -> Self {
        Self {
            map: BTreeMap::new(),
            visualizer,
        }
    }

    /// Upsert a primitive from its wire record.
    ///
    /// Changing the kind of an existing name is rejected; parameter
    /// updates preserve the primitive's identity and its dependency
    /// edges. The visualizer is notified either way.
    pub fn set_primitive(&mut self, record: &PrimitiveRecord) -> Result<(), StrataError> {
        let primitive = Primitive::from_record(record)?;
        if let Some(existing) = self.map.get_mut(&record.name) {
            if existing.primitive.kind() != record.kind {
                return Err(BindingError::PrimitiveKindMismatch {
                    name: record.name.clone(),
                    expected: existing.primitive.kind().name(),
                    found: record.kind.name(),
                }
                .into());
            }
            existing.primitive = primitive;
            debug!(primitive = %record.name, "updated geometric primitive");
            self.visualizer.upsert_primitive(&existing.primitive);
        } else {
            self.visualizer.upsert_primitive(&primitive);
            self.map.insert(
                record.name.clone(),
                StoredPrimitive {
                    primitive,
                    dependencies: BTreeSet::new(),
                },
            );
            debug!(primitive = %record.name, "added geometric primitive");
        }
        Ok(())
    }

    /// Look up a primitive by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Primitive> {
        self.map.get(name).map(|s| &s.primitive)
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: PrimitiveKind,
        accessor: impl Fn(&'a Primitive) -> Option<&'a T>,
    ) -> Result<(&'a Primitive, &'a T), BindingError> {
        let primitive = self
            .get(name)
            .ok_or_else(|| BindingError::UnknownPrimitive(name.to_string()))?;
        accessor(primitive).map(|shape| (primitive, shape)).ok_or(
            BindingError::PrimitiveKindMismatch {
                name: name.to_string(),
                expected: expected.name(),
                found: primitive.kind().name(),
            },
        )
    }

    /// Typed lookup of a point primitive. Returns the whole primitive
    /// (for its frame) together with the shape.
    pub fn point(&self, name: &str) -> Result<(&Primitive, &PointShape), BindingError> {
        self.typed(name, PrimitiveKind::Point, Primitive::as_point)
    }

    pub fn line(&self, name: &str) -> Result<(&Primitive, &LineShape), BindingError> {
        self.typed(name, PrimitiveKind::Line, Primitive::as_line)
    }

    pub fn plane(&self, name: &str) -> Result<(&Primitive, &PlaneShape), BindingError> {
        self.typed(name, PrimitiveKind::Plane, Primitive::as_plane)
    }

    pub fn sphere(&self, name: &str) -> Result<(&Primitive, &SphereShape), BindingError> {
        self.typed(name, PrimitiveKind::Sphere, Primitive::as_sphere)
    }

    pub fn cylinder(&self, name: &str) -> Result<(&Primitive, &CylinderShape), BindingError> {
        self.typed(name, PrimitiveKind::Cylinder, Primitive::as_cylinder)
    }

    pub fn boxed(&self, name: &str) -> Result<(&Primitive, &BoxShape), BindingError> {
        self.typed(name, PrimitiveKind::Box, Primitive::as_box)
    }

    /// Remove a primitive by name.
    ///
    /// Removal succeeds even while tasks depend on the primitive; the
    /// dependents are logged and will fail their next update with an
    /// unknown-primitive error.
    pub fn remove_primitive(&mut self, name: &str) -> Result<(), BindingError> {
        match self.map.remove(name) {
            Some(stored) => {
                if !stored.dependencies.is_empty() {
                    let dependents: Vec<&str> =
                        stored.dependencies.iter().map(String::as_str).collect();
                    warn!(
                        primitive = %name,
                        ?dependents,
                        "removed primitive still bound by tasks"
                    );
                }
                self.visualizer.remove_primitive(name);
                Ok(())
            }
            None => Err(BindingError::UnknownPrimitive(name.to_string())),
        }
    }

    /// Remove every primitive and erase all visuals.
    pub fn remove_all_primitives(&mut self) {
        let names: Vec<String> = self.map.keys().cloned().collect();
        for name in names {
            // Dependents of each primitive are logged individually.
            let _ = self.remove_primitive(&name);
        }
    }

    /// Record that `task` is bound to `primitive`.
    pub fn add_dependency(&mut self, primitive: &str, task: &str) -> Result<(), BindingError> {
        let stored = self
            .map
            .get_mut(primitive)
            .ok_or_else(|| BindingError::UnknownPrimitive(primitive.to_string()))?;
        stored.dependencies.insert(task.to_string());
        Ok(())
    }

    /// Withdraw every dependency declared by `task`.
    pub fn remove_dependency(&mut self, task: &str) {
        for stored in self.map.values_mut() {
            stored.dependencies.remove(task);
        }
    }

    /// Task names currently bound to `primitive`.
    #[must_use]
    pub fn dependents_of(&self, primitive: &str) -> Vec<String> {
        self.map
            .get(primitive)
            .map(|s| s.dependencies.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Visit one primitive by name, or all of them in name order.
    pub fn accept_visitor(&self, visitor: &mut dyn PrimitiveVisitor, name: Option<&str>) {
        match name {
            Some(name) => {
                if let Some(stored) = self.map.get(name) {
                    visitor.visit(&stored.primitive);
                }
            }
            None => {
                for stored in self.map.values() {
                    visitor.visit(&stored.primitive);
                }
            }
        }
    }

    /// Wire records for every stored primitive, in name order.
    #[must_use]
    pub fn list_records(&self) -> Vec<PrimitiveRecord> {
        self.map.values().map(|s| s.primitive.to_record()).collect()
    }

    /// Push every visible primitive to the visualizer again.
    pub fn render_all(&self) {
        for stored in self.map.values() {
            if stored.primitive.visible {
                self.visualizer.upsert_primitive(&stored.primitive);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visual::{RecordingVisualizer, VisualEvent};
    use approx::assert_relative_eq;

    fn record(name: &str, kind: PrimitiveKind, parameters: Vec<f64>) -> PrimitiveRecord {
        PrimitiveRecord {
            name: name.into(),
            kind,
            frame_id: "world".into(),
            visible: true,
            color: [0.5, 0.5, 0.5, 1.0],
            parameters,
        }
    }

    fn store_with_recorder() -> (PrimitiveStore, Arc<RecordingVisualizer>) {
        let viz = Arc::new(RecordingVisualizer::new());
        (PrimitiveStore::new(viz.clone()), viz)
    }

    #[test]
    fn set_and_get_primitive() {
        let (mut store, viz) = store_with_recorder();
        store
            .set_primitive(&record("p", PrimitiveKind::Point, vec![1.0, 2.0, 3.0]))
            .unwrap();
        let (primitive, point) = store.point("p").unwrap();
        assert_eq!(primitive.frame_id, "world");
        assert_relative_eq!(point.p.y, 2.0);
        assert_eq!(viz.take_events(), vec![VisualEvent::Upsert("p".into())]);
    }

    #[test]
    fn upsert_preserves_identity_and_dependencies() {
        let (mut store, _viz) = store_with_recorder();
        store
            .set_primitive(&record("p", PrimitiveKind::Point, vec![0.0, 0.0, 0.0]))
            .unwrap();
        store.add_dependency("p", "taskA").unwrap();

        store
            .set_primitive(&record("p", PrimitiveKind::Point, vec![1.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(store.len(), 1);
        let (_, point) = store.point("p").unwrap();
        assert_relative_eq!(point.p.x, 1.0);
        assert_eq!(store.dependents_of("p"), vec!["taskA".to_string()]);
    }

    #[test]
    fn kind_change_is_rejected() {
        let (mut store, _viz) = store_with_recorder();
        store
            .set_primitive(&record("p", PrimitiveKind::Point, vec![0.0, 0.0, 0.0]))
            .unwrap();
        let err = store
            .set_primitive(&record("p", PrimitiveKind::Sphere, vec![0.0, 0.0, 0.0, 1.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            StrataError::Binding(BindingError::PrimitiveKindMismatch { .. })
        ));
        // Original untouched.
        assert!(store.point("p").is_ok());
    }

    #[test]
    fn typed_lookup_errors() {
        let (mut store, _viz) = store_with_recorder();
        store
            .set_primitive(&record("s", PrimitiveKind::Sphere, vec![0.0, 0.0, 0.0, 1.0]))
            .unwrap();
        assert!(matches!(
            store.point("s"),
            Err(BindingError::PrimitiveKindMismatch { .. })
        ));
        assert!(matches!(
            store.point("missing"),
            Err(BindingError::UnknownPrimitive(_))
        ));
    }

    #[test]
    fn remove_notifies_visualizer() {
        let (mut store, viz) = store_with_recorder();
        store
            .set_primitive(&record("p", PrimitiveKind::Point, vec![0.0, 0.0, 0.0]))
            .unwrap();
        viz.take_events();
        store.remove_primitive("p").unwrap();
        assert_eq!(viz.take_events(), vec![VisualEvent::Remove("p".into())]);
        assert!(store.get("p").is_none());
        assert!(store.remove_primitive("p").is_err());
    }

    #[test]
    fn remove_all_clears_store() {
        let (mut store, viz) = store_with_recorder();
        store
            .set_primitive(&record("a", PrimitiveKind::Point, vec![0.0, 0.0, 0.0]))
            .unwrap();
        store
            .set_primitive(&record("b", PrimitiveKind::Sphere, vec![0.0, 0.0, 0.0, 1.0]))
            .unwrap();
        viz.take_events();
        store.remove_all_primitives();
        assert!(store.is_empty());
        assert_eq!(
            viz.take_events(),
            vec![
                VisualEvent::Remove("a".into()),
                VisualEvent::Remove("b".into())
            ]
        );
    }

    #[test]
    fn dependency_cascade() {
        let (mut store, _viz) = store_with_recorder();
        store
            .set_primitive(&record("a", PrimitiveKind::Point, vec![0.0, 0.0, 0.0]))
            .unwrap();
        store
            .set_primitive(&record("b", PrimitiveKind::Point, vec![0.0, 0.0, 0.0]))
            .unwrap();
        store.add_dependency("a", "t1").unwrap();
        store.add_dependency("b", "t1").unwrap();
        store.add_dependency("b", "t2").unwrap();

        store.remove_dependency("t1");
        assert!(store.dependents_of("a").is_empty());
        assert_eq!(store.dependents_of("b"), vec!["t2".to_string()]);
    }

    #[test]
    fn add_dependency_to_unknown_primitive_fails() {
        let (mut store, _viz) = store_with_recorder();
        assert!(store.add_dependency("nope", "t").is_err());
    }

    #[test]
    fn visitor_visits_in_name_order() {
        let (mut store, _viz) = store_with_recorder();
        for name in ["c", "a", "b"] {
            store
                .set_primitive(&record(name, PrimitiveKind::Point, vec![0.0, 0.0, 0.0]))
                .unwrap();
        }

        struct Names(Vec<String>);
        impl PrimitiveVisitor for Names {
            fn visit(&mut self, primitive: &Primitive) {
                self.0.push(primitive.name.clone());
            }
        }

        let mut names = Names(Vec::new());
        store.accept_visitor(&mut names, None);
        assert_eq!(names.0, vec!["a", "b", "c"]);

        let mut one = Names(Vec::new());
        store.accept_visitor(&mut one, Some("b"));
        assert_eq!(one.0, vec!["b"]);
    }

    #[test]
    fn render_all_skips_invisible() {
        let (mut store, viz) = store_with_recorder();
        let mut hidden = record("h", PrimitiveKind::Point, vec![0.0, 0.0, 0.0]);
        hidden.visible = false;
        store.set_primitive(&hidden).unwrap();
        store
            .set_primitive(&record("v", PrimitiveKind::Point, vec![0.0, 0.0, 0.0]))
            .unwrap();
        viz.take_events();
        store.render_all();
        assert_eq!(viz.take_events(), vec![VisualEvent::Upsert("v".into())]);
    }
}
