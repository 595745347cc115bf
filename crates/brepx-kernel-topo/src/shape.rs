//! The shape handle and its shared topological node.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::TopoError;
use crate::{Point3, Vec3};

/// Topological kind of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Free aggregate of any shapes.
    Compound,
    /// Volume bounded by shells.
    Solid,
    /// Connected set of faces.
    Shell,
    /// Bounded portion of a surface.
    Face,
    /// Chain of edges bounding a face.
    Wire,
    /// Bounded portion of a curve between two vertices.
    Edge,
    /// Point.
    Vertex,
}

impl ShapeKind {
    /// Lower-case name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Compound => "compound",
            ShapeKind::Solid => "solid",
            ShapeKind::Shell => "shell",
            ShapeKind::Face => "face",
            ShapeKind::Wire => "wire",
            ShapeKind::Edge => "edge",
            ShapeKind::Vertex => "vertex",
        }
    }

    /// Whether a node of this kind may directly own a child of `child` kind.
    pub fn accepts(self, child: ShapeKind) -> bool {
        match self {
            ShapeKind::Compound => true,
            ShapeKind::Solid => child == ShapeKind::Shell,
            ShapeKind::Shell => child == ShapeKind::Face,
            ShapeKind::Face => child == ShapeKind::Wire,
            ShapeKind::Wire => child == ShapeKind::Edge,
            ShapeKind::Edge => child == ShapeKind::Vertex,
            ShapeKind::Vertex => false,
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Orientation of a shape relative to its underlying node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// Same sense as the node.
    #[default]
    Forward,
    /// Opposite sense.
    Reversed,
}

impl Orientation {
    /// The opposite orientation.
    pub fn reversed(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Reversed,
            Orientation::Reversed => Orientation::Forward,
        }
    }

    /// `true` for [`Orientation::Forward`].
    pub fn is_forward(self) -> bool {
        self == Orientation::Forward
    }
}

/// Curve carried by an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    /// Straight segment between the edge vertices.
    Line,
    /// Circular arc between the edge vertices, counter-clockwise about `axis`.
    Arc {
        /// Circle center.
        center: Point3,
        /// Unit normal of the circle plane.
        axis: Vec3,
        /// Circle radius.
        radius: f64,
    },
    /// Zero-length edge collapsed onto a single vertex (sphere poles).
    Degenerate,
}

/// Surface carried by a face.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    /// Infinite plane.
    Plane {
        /// A point on the plane.
        origin: Point3,
        /// Unit normal.
        normal: Vec3,
    },
    /// Sphere.
    Sphere {
        /// Sphere center.
        center: Point3,
        /// Sphere radius.
        radius: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Geometry {
    None,
    Point(Point3),
    Curve(Curve),
    Surface(Surface),
}

#[derive(Debug)]
struct TShape {
    kind: ShapeKind,
    geometry: Geometry,
    children: Vec<Shape>,
    closed: bool,
}

/// Identity of a topological node, stable while any handle to it is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Handle to a topological node of the kernel.
///
/// A default-constructed shape is null. Cloning a shape never copies the
/// node: both handles refer to the same entity.
#[derive(Clone, Default)]
pub struct Shape {
    node: Option<Arc<TShape>>,
    orientation: Orientation,
}

impl Shape {
    /// A null shape.
    pub fn null() -> Self {
        Self::default()
    }

    fn assemble(kind: ShapeKind, geometry: Geometry, children: Vec<Shape>) -> Self {
        let closed = kind == ShapeKind::Shell && shell_is_closed(&children);
        Self {
            node: Some(Arc::new(TShape {
                kind,
                geometry,
                children,
                closed,
            })),
            orientation: Orientation::Forward,
        }
    }

    fn checked(
        kind: ShapeKind,
        geometry: Geometry,
        children: Vec<Shape>,
        allow_empty: bool,
    ) -> Result<Self, TopoError> {
        if children.is_empty() && !allow_empty {
            return Err(TopoError::Empty(kind));
        }
        for child in &children {
            let child_kind = child.kind().ok_or(TopoError::NullChild(kind))?;
            if !kind.accepts(child_kind) {
                return Err(TopoError::InvalidChild {
                    parent: kind,
                    child: child_kind,
                });
            }
        }
        Ok(Self::assemble(kind, geometry, children))
    }

    /// Build a vertex at `point`.
    pub fn vertex(point: Point3) -> Self {
        Self::assemble(ShapeKind::Vertex, Geometry::Point(point), Vec::new())
    }

    /// Build an edge on `curve` from `start` to `end`.
    ///
    /// Degenerate edges pass the same vertex twice.
    pub fn edge(curve: Curve, start: &Shape, end: &Shape) -> Result<Self, TopoError> {
        Self::checked(
            ShapeKind::Edge,
            Geometry::Curve(curve),
            vec![start.clone(), end.clone()],
            false,
        )
    }

    /// Build a wire from oriented edges, in traversal order.
    pub fn wire(edges: Vec<Shape>) -> Result<Self, TopoError> {
        Self::checked(ShapeKind::Wire, Geometry::None, edges, false)
    }

    /// Build a face on `surface`; the first wire is the outer bound.
    pub fn face(surface: Surface, wires: Vec<Shape>) -> Result<Self, TopoError> {
        Self::checked(ShapeKind::Face, Geometry::Surface(surface), wires, false)
    }

    /// Build a shell from faces. Closedness is derived from edge usage.
    pub fn shell(faces: Vec<Shape>) -> Result<Self, TopoError> {
        Self::checked(ShapeKind::Shell, Geometry::None, faces, false)
    }

    /// Build a solid; the first shell is the outer boundary.
    pub fn solid(shells: Vec<Shape>) -> Result<Self, TopoError> {
        Self::checked(ShapeKind::Solid, Geometry::None, shells, false)
    }

    /// Build a compound. An empty compound is allowed.
    pub fn compound(shapes: Vec<Shape>) -> Result<Self, TopoError> {
        Self::checked(ShapeKind::Compound, Geometry::None, shapes, true)
    }

    /// `true` when the handle refers to no node.
    pub fn is_null(&self) -> bool {
        self.node.is_none()
    }

    /// Kind of the node, `None` for a null shape.
    pub fn kind(&self) -> Option<ShapeKind> {
        self.node.as_ref().map(|n| n.kind)
    }

    /// Orientation of this handle.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Same node with the given orientation.
    pub fn oriented(&self, orientation: Orientation) -> Self {
        Self {
            node: self.node.clone(),
            orientation,
        }
    }

    /// Same node with the opposite orientation.
    pub fn reversed(&self) -> Self {
        self.oriented(self.orientation.reversed())
    }

    /// Direct children of the node (empty for null shapes and vertices).
    pub fn children(&self) -> &[Shape] {
        self.node.as_ref().map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Node identity, `None` for a null shape.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node
            .as_ref()
            .map(|n| NodeId(Arc::as_ptr(n) as *const () as usize))
    }

    /// `true` when both handles refer to the same node, whatever their orientation.
    pub fn is_same(&self, other: &Shape) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Position of a vertex.
    pub fn point(&self) -> Option<Point3> {
        match self.node.as_ref().map(|n| &n.geometry) {
            Some(Geometry::Point(p)) => Some(*p),
            _ => None,
        }
    }

    /// Curve of an edge.
    pub fn curve(&self) -> Option<&Curve> {
        match self.node.as_ref().map(|n| &n.geometry) {
            Some(Geometry::Curve(c)) => Some(c),
            _ => None,
        }
    }

    /// Surface of a face.
    pub fn surface(&self) -> Option<&Surface> {
        match self.node.as_ref().map(|n| &n.geometry) {
            Some(Geometry::Surface(s)) => Some(s),
            _ => None,
        }
    }

    /// Start and end vertices of an edge, following this handle's orientation.
    pub fn edge_vertices(&self) -> Option<(Shape, Shape)> {
        if self.kind() != Some(ShapeKind::Edge) {
            return None;
        }
        let children = self.children();
        let (first, last) = (children.first()?.clone(), children.last()?.clone());
        if self.orientation.is_forward() {
            Some((first, last))
        } else {
            Some((last, first))
        }
    }

    /// `true` for a degenerate edge.
    pub fn is_degenerate(&self) -> bool {
        matches!(self.curve(), Some(Curve::Degenerate))
    }

    /// Closedness: a shell is closed when every non-degenerate edge is used
    /// exactly twice by its faces; a solid when all its shells are.
    pub fn is_closed(&self) -> bool {
        match self.node.as_deref() {
            Some(n) if n.kind == ShapeKind::Shell => n.closed,
            Some(n) if n.kind == ShapeKind::Solid => n.children.iter().all(Shape::is_closed),
            _ => false,
        }
    }
}

fn shell_is_closed(faces: &[Shape]) -> bool {
    let mut uses: HashMap<NodeId, usize> = HashMap::new();
    for face in faces {
        for wire in face.children() {
            for edge in wire.children() {
                if edge.is_degenerate() {
                    continue;
                }
                if let Some(id) = edge.node_id() {
                    *uses.entry(id).or_default() += 1;
                }
            }
        }
    }
    !uses.is_empty() && uses.values().all(|&n| n == 2)
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            None => f.write_str("Shape(null)"),
            Some(n) => f
                .debug_struct("Shape")
                .field("kind", &n.kind)
                .field("orientation", &self.orientation)
                .field("children", &n.children.len())
                .finish(),
        }
    }
}

/// Values that may stand in for a shape at an API boundary.
///
/// Only real shapes answer `Some`; points, builders and other kernel values
/// answer `None` so callers can reject them.
pub trait AsShape {
    /// The shape behind this value, if it is one.
    fn as_shape(&self) -> Option<&Shape>;
}

impl AsShape for Shape {
    fn as_shape(&self) -> Option<&Shape> {
        Some(self)
    }
}

impl AsShape for Point3 {
    fn as_shape(&self) -> Option<&Shape> {
        None
    }
}
