//! Primitive shape construction: box, sphere and straight edges.

use std::collections::HashMap;

use crate::error::TopoError;
use crate::{AsShape, Curve, Orientation, Point3, Shape, Surface, Vec3};

fn check_dimension(name: &str, value: f64) -> Result<(), TopoError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TopoError::InvalidDimension(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

/// Build a box solid with corner at origin and dimensions `(dx, dy, dz)`.
///
/// The box has 6 planar faces, 12 edges, and 8 vertices.
/// Vertex layout:
/// ```text
///     v4----v5
///    /|    /|
///   v7----v6|    z
///   | v0--|-v1   | y
///   |/    |/     |/
///   v3----v2     +---x
/// ```
pub fn make_box(dx: f64, dy: f64, dz: f64) -> Result<Shape, TopoError> {
    check_dimension("dx", dx)?;
    check_dimension("dy", dy)?;
    check_dimension("dz", dz)?;

    let corners = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(dx, 0.0, 0.0),
        Point3::new(dx, dy, 0.0),
        Point3::new(0.0, dy, 0.0),
        Point3::new(0.0, 0.0, dz),
        Point3::new(dx, 0.0, dz),
        Point3::new(dx, dy, dz),
        Point3::new(0.0, dy, dz),
    ];
    let vertices: Vec<Shape> = corners.iter().map(|p| Shape::vertex(*p)).collect();

    // Loops are counter-clockwise seen from outside.
    let face_defs: [([usize; 4], Vec3); 6] = [
        ([0, 3, 2, 1], -Vec3::z()),
        ([4, 5, 6, 7], Vec3::z()),
        ([0, 1, 5, 4], -Vec3::y()),
        ([2, 3, 7, 6], Vec3::y()),
        ([0, 4, 7, 3], -Vec3::x()),
        ([1, 2, 6, 5], Vec3::x()),
    ];

    // Edges keyed by sorted vertex pair, with the direction they were built in.
    let mut edges: HashMap<(usize, usize), (Shape, usize)> = HashMap::new();
    let mut faces = Vec::with_capacity(6);

    for (loop_ids, normal) in face_defs.iter() {
        let mut wire_edges = Vec::with_capacity(4);
        for j in 0..4 {
            let (a, b) = (loop_ids[j], loop_ids[(j + 1) % 4]);
            let key = (a.min(b), a.max(b));
            let (edge, start) = match edges.get(&key) {
                Some(found) => found.clone(),
                None => {
                    let edge = Shape::edge(Curve::Line, &vertices[a], &vertices[b])?;
                    edges.insert(key, (edge.clone(), a));
                    (edge, a)
                }
            };
            let orientation = if start == a {
                Orientation::Forward
            } else {
                Orientation::Reversed
            };
            wire_edges.push(edge.oriented(orientation));
        }
        let wire = Shape::wire(wire_edges)?;
        let surface = Surface::Plane {
            origin: corners[loop_ids[0]],
            normal: *normal,
        };
        faces.push(Shape::face(surface, vec![wire])?);
    }

    let shell = Shape::shell(faces)?;
    Shape::solid(vec![shell])
}

/// Build a sphere solid of `radius` centered at the origin.
pub fn make_sphere(radius: f64) -> Result<Shape, TopoError> {
    make_sphere_at(Point3::origin(), radius)
}

/// Build a sphere solid of `radius` centered at `center`.
///
/// The single spherical face is bounded by one seam edge (a meridian from
/// the south to the north pole, used twice) and a degenerate edge at each
/// pole: 1 face, 3 edges, 2 vertices.
pub fn make_sphere_at(center: Point3, radius: f64) -> Result<Shape, TopoError> {
    check_dimension("radius", radius)?;

    let south = Shape::vertex(center - Vec3::z() * radius);
    let north = Shape::vertex(center + Vec3::z() * radius);

    let seam = Shape::edge(
        Curve::Arc {
            center,
            axis: -Vec3::y(),
            radius,
        },
        &south,
        &north,
    )?;
    let south_pole = Shape::edge(Curve::Degenerate, &south, &south)?;
    let north_pole = Shape::edge(Curve::Degenerate, &north, &north)?;

    let wire = Shape::wire(vec![south_pole, seam.clone(), north_pole, seam.reversed()])?;
    let face = Shape::face(Surface::Sphere { center, radius }, vec![wire])?;
    let shell = Shape::shell(vec![face])?;
    Shape::solid(vec![shell])
}

/// Straight edge builder.
///
/// The builder owns the edge it made but is not itself a shape: handing
/// the builder where a shape is expected is rejected.
#[derive(Debug, Clone)]
pub struct EdgeMaker {
    edge: Shape,
}

impl EdgeMaker {
    /// Build a straight edge from `start` to `end`.
    pub fn new(start: Point3, end: Point3) -> Result<Self, TopoError> {
        if (end - start).norm() <= f64::EPSILON {
            return Err(TopoError::DegenerateEdge);
        }
        let edge = Shape::edge(Curve::Line, &Shape::vertex(start), &Shape::vertex(end))?;
        Ok(Self { edge })
    }

    /// The edge that was built.
    pub fn shape(&self) -> Shape {
        self.edge.clone()
    }
}

impl AsShape for EdgeMaker {
    fn as_shape(&self) -> Option<&Shape> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ShapeKind, TopologyExplorer};

    #[test]
    fn test_box_is_closed_solid() {
        let b = make_box(10.0, 20.0, 30.0).unwrap();
        assert_eq!(b.kind(), Some(ShapeKind::Solid));
        assert!(b.is_closed());
        let shell = TopologyExplorer::new(&b).shells().next().unwrap();
        assert!(shell.is_closed());
    }

    #[test]
    fn test_box_rejects_bad_dimensions() {
        assert!(matches!(
            make_box(0.0, 1.0, 1.0),
            Err(TopoError::InvalidDimension(_))
        ));
        assert!(make_box(1.0, f64::NAN, 1.0).is_err());
        assert!(make_sphere(-1.0).is_err());
    }

    #[test]
    fn test_sphere_is_closed() {
        let s = make_sphere(5.0).unwrap();
        assert!(s.is_closed());
        let face = TopologyExplorer::new(&s).faces().next().unwrap();
        assert!(matches!(face.surface(), Some(Surface::Sphere { .. })));
    }

    #[test]
    fn test_edge_maker() {
        let maker = EdgeMaker::new(Point3::origin(), Point3::new(10.0, 10.0, 10.0)).unwrap();
        assert!(maker.as_shape().is_none());
        assert_eq!(maker.shape().kind(), Some(ShapeKind::Edge));
        assert!(EdgeMaker::new(Point3::origin(), Point3::origin()).is_err());
    }
}
