//! # Display Collaborator
//!
//! The streamer never touches rendering primitives. It talks to whatever owns the
//! visual objects through [`TerrainDisplay`]: create an object at a world position,
//! attach generated geometry, toggle visibility.
//!
//! Mesh continuations run on the consumer thread but are built on workers' behalf,
//! so implementations must be `Send + Sync` and take `&self`.
//!
//! [`HeadlessDisplay`] keeps the visual objects in memory. The demo binary and the
//! tests use it in place of a renderer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::Point3;

use super::mesh::SurfaceMesh;
use crate::core::MtResource;
use crate::engine_state::terrain::regions::ColorField;

/// Opaque reference to a visual object owned by the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayHandle(u64);

impl DisplayHandle {
    /// Wraps a display-specific identifier.
    pub fn new(id: u64) -> Self {
        DisplayHandle(id)
    }

    /// The display-specific identifier.
    pub fn id(self) -> u64 {
        self.0
    }
}

/// The visual side of terrain streaming.
pub trait TerrainDisplay: Send + Sync {
    /// Creates an empty visual object at `world_position`.
    fn create_visual_object(&self, world_position: Point3<f32>) -> DisplayHandle;

    /// Attaches a finished mesh and the colors to texture it with.
    fn set_geometry(&self, handle: DisplayHandle, mesh: &SurfaceMesh, colors: &ColorField);

    /// Shows or hides an object.
    fn set_visible(&self, handle: DisplayHandle, visible: bool);

    /// Whether an object is currently shown.
    fn is_visible(&self, handle: DisplayHandle) -> bool;

    /// Releases an object whose tile has been evicted.
    fn destroy_visual_object(&self, _handle: DisplayHandle) {}
}

/// What a [`HeadlessDisplay`] remembers about one visual object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualObject {
    /// Where the object was created.
    pub position: Point3<f32>,
    /// Current visibility.
    pub visible: bool,
    /// Vertices of the attached mesh, zero until geometry arrives.
    pub vertex_count: usize,
    /// Triangles of the attached mesh.
    pub triangle_count: usize,
    /// How many times geometry has been attached.
    pub geometry_updates: u32,
}

/// An in-memory display with no rendering backend.
pub struct HeadlessDisplay {
    objects: MtResource<HashMap<DisplayHandle, VisualObject>>,
    next_id: AtomicU64,
}

impl HeadlessDisplay {
    /// Creates an empty display.
    pub fn new() -> Self {
        HeadlessDisplay {
            objects: MtResource::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// A snapshot of one object, if it exists.
    pub fn object(&self, handle: DisplayHandle) -> Option<VisualObject> {
        self.objects.lock().get(&handle).copied()
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    /// Number of objects currently shown.
    pub fn visible_count(&self) -> usize {
        self.objects.lock().values().filter(|o| o.visible).count()
    }

    /// Number of objects that have received geometry.
    pub fn meshed_count(&self) -> usize {
        self.objects
            .lock()
            .values()
            .filter(|o| o.geometry_updates > 0)
            .count()
    }
}

impl Default for HeadlessDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainDisplay for HeadlessDisplay {
    fn create_visual_object(&self, world_position: Point3<f32>) -> DisplayHandle {
        let handle = DisplayHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.objects.lock().insert(
            handle,
            VisualObject {
                position: world_position,
                visible: false,
                vertex_count: 0,
                triangle_count: 0,
                geometry_updates: 0,
            },
        );
        handle
    }

    fn set_geometry(&self, handle: DisplayHandle, mesh: &SurfaceMesh, _colors: &ColorField) {
        match self.objects.lock().get_mut(&handle) {
            Some(object) => {
                object.vertex_count = mesh.vertex_count();
                object.triangle_count = mesh.triangle_count();
                object.geometry_updates += 1;
            }
            None => log::warn!("Geometry for unknown visual object {:?}", handle),
        }
    }

    fn set_visible(&self, handle: DisplayHandle, visible: bool) {
        if let Some(object) = self.objects.lock().get_mut(&handle) {
            object.visible = visible;
        }
    }

    fn is_visible(&self, handle: DisplayHandle) -> bool {
        self.objects
            .lock()
            .get(&handle)
            .is_some_and(|object| object.visible)
    }

    fn destroy_visual_object(&self, handle: DisplayHandle) {
        self.objects.lock().remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::mesh;
    use crate::engine_state::terrain::{noise_field::HeightField, regions};

    #[test]
    fn objects_start_hidden_and_empty() {
        let display = HeadlessDisplay::new();
        let handle = display.create_visual_object(Point3::new(240.0, 0.0, -240.0));

        let object = display.object(handle).unwrap();
        assert!(!object.visible);
        assert_eq!(object.vertex_count, 0);
        assert_eq!(object.position, Point3::new(240.0, 0.0, -240.0));
    }

    #[test]
    fn geometry_and_visibility_are_tracked() {
        let display = HeadlessDisplay::new();
        let handle = display.create_visual_object(Point3::new(0.0, 0.0, 0.0));
        let field = HeightField::filled(5, 5, 0.5);
        let colors = regions::classify(&field, &regions::default_bands());

        display.set_geometry(handle, &mesh::build(&field, 1.0, |h| h, 1), &colors);
        display.set_visible(handle, true);

        assert!(display.is_visible(handle));
        assert_eq!(display.visible_count(), 1);
        assert_eq!(display.meshed_count(), 1);
        assert_eq!(display.object(handle).unwrap().triangle_count, 32);
    }

    #[test]
    fn destroyed_objects_disappear() {
        let display = HeadlessDisplay::new();
        let first = display.create_visual_object(Point3::new(0.0, 0.0, 0.0));
        let second = display.create_visual_object(Point3::new(1.0, 0.0, 0.0));
        assert_ne!(first, second);

        display.destroy_visual_object(first);

        assert_eq!(display.object_count(), 1);
        assert!(display.object(first).is_none());
        assert!(!display.is_visible(first));
    }
}
