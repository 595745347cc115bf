//! Unique sub-shape exploration.

use std::collections::HashSet;

use crate::{NodeId, Shape, ShapeKind};

/// Iterator over the unique sub-shapes of one kind, in depth-first order.
///
/// Shared nodes (an edge bounding two faces, a vertex ending several
/// edges) are yielded once. The root itself is included when it matches.
pub struct Explorer {
    items: std::vec::IntoIter<Shape>,
}

impl Explorer {
    /// Explore `shape` for sub-shapes of `kind`.
    pub fn new(shape: &Shape, kind: ShapeKind) -> Self {
        let mut found = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![shape.clone()];

        while let Some(current) = stack.pop() {
            let Some(id) = current.node_id() else {
                continue;
            };
            if !visited.insert(id) {
                continue;
            }
            if current.kind() == Some(kind) {
                found.push(current);
                continue;
            }
            // Push in reverse so the first child is visited first.
            for child in current.children().iter().rev() {
                stack.push(child.clone());
            }
        }

        Self {
            items: found.into_iter(),
        }
    }
}

impl Iterator for Explorer {
    type Item = Shape;

    fn next(&mut self) -> Option<Shape> {
        self.items.next()
    }
}

/// Counting and listing helpers over a shape's topology.
pub struct TopologyExplorer<'a> {
    shape: &'a Shape,
}

impl<'a> TopologyExplorer<'a> {
    /// Wrap `shape`.
    pub fn new(shape: &'a Shape) -> Self {
        Self { shape }
    }

    /// Unique sub-shapes of `kind`.
    pub fn of_kind(&self, kind: ShapeKind) -> Explorer {
        Explorer::new(self.shape, kind)
    }

    /// Number of unique sub-shapes of `kind`.
    pub fn count(&self, kind: ShapeKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Unique solids.
    pub fn solids(&self) -> Explorer {
        self.of_kind(ShapeKind::Solid)
    }

    /// Unique shells.
    pub fn shells(&self) -> Explorer {
        self.of_kind(ShapeKind::Shell)
    }

    /// Unique faces.
    pub fn faces(&self) -> Explorer {
        self.of_kind(ShapeKind::Face)
    }

    /// Unique wires.
    pub fn wires(&self) -> Explorer {
        self.of_kind(ShapeKind::Wire)
    }

    /// Unique edges.
    pub fn edges(&self) -> Explorer {
        self.of_kind(ShapeKind::Edge)
    }

    /// Unique vertices.
    pub fn vertices(&self) -> Explorer {
        self.of_kind(ShapeKind::Vertex)
    }

    /// Number of unique solids.
    pub fn number_of_solids(&self) -> usize {
        self.count(ShapeKind::Solid)
    }

    /// Number of unique shells.
    pub fn number_of_shells(&self) -> usize {
        self.count(ShapeKind::Shell)
    }

    /// Number of unique faces.
    pub fn number_of_faces(&self) -> usize {
        self.count(ShapeKind::Face)
    }

    /// Number of unique edges.
    pub fn number_of_edges(&self) -> usize {
        self.count(ShapeKind::Edge)
    }

    /// Number of unique vertices.
    pub fn number_of_vertices(&self) -> usize {
        self.count(ShapeKind::Vertex)
    }
}
