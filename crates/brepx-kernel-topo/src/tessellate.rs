//! Triangulation of faces, used by mesh formats.

use std::f64::consts::PI;

use crate::error::TopoError;
use crate::{Point3, Shape, Surface, TopologyExplorer};

/// Tessellation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessellationParams {
    /// Longitudinal segment count for spherical faces (latitude uses half).
    pub sphere_segments: u32,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            sphere_segments: 16,
        }
    }
}

/// Triangle soup with outward counter-clockwise winding.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Triangles as indices into `vertices`.
    pub triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    fn push_vertex(&mut self, p: Point3) -> u32 {
        self.vertices.push(p);
        (self.vertices.len() - 1) as u32
    }

    /// Corner positions of triangle `i`.
    pub fn triangle(&self, i: usize) -> [Point3; 3] {
        let [a, b, c] = self.triangles[i];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Total surface area.
    pub fn area(&self) -> f64 {
        (0..self.num_triangles())
            .map(|i| {
                let [a, b, c] = self.triangle(i);
                (b - a).cross(&(c - a)).norm() * 0.5
            })
            .sum()
    }

    /// Signed enclosed volume (positive for outward winding of a closed mesh).
    pub fn signed_volume(&self) -> f64 {
        (0..self.num_triangles())
            .map(|i| {
                let [a, b, c] = self.triangle(i);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }
}

/// Triangulate every unique face of `shape`.
///
/// Planar faces are fan-triangulated from the vertices of their outer wire
/// (curved boundary edges are replaced by their chords, inner wires are
/// ignored). Spherical faces are meshed on a latitude/longitude grid.
pub fn tessellate(shape: &Shape, params: &TessellationParams) -> Result<TriangleMesh, TopoError> {
    let mut mesh = TriangleMesh::new();
    for face in TopologyExplorer::new(shape).faces() {
        let flip = !face.orientation().is_forward();
        match face.surface() {
            Some(Surface::Plane { .. }) => planar_face(&mut mesh, &face, flip)?,
            Some(Surface::Sphere { center, radius }) => {
                spherical_face(&mut mesh, *center, *radius, params.sphere_segments, flip)
            }
            None => return Err(TopoError::Tessellation("face without surface".into())),
        }
    }
    Ok(mesh)
}

fn planar_face(mesh: &mut TriangleMesh, face: &Shape, flip: bool) -> Result<(), TopoError> {
    let outer = face
        .children()
        .first()
        .ok_or_else(|| TopoError::Tessellation("face without wire".into()))?;

    let mut points = Vec::new();
    for edge in outer.children() {
        if edge.is_degenerate() {
            continue;
        }
        let (start, _) = edge
            .edge_vertices()
            .ok_or_else(|| TopoError::Tessellation("wire holds a non-edge".into()))?;
        let p = start
            .point()
            .ok_or_else(|| TopoError::Tessellation("edge without vertex point".into()))?;
        points.push(p);
    }
    if points.len() < 3 {
        return Err(TopoError::Tessellation(format!(
            "planar face with {} boundary vertices",
            points.len()
        )));
    }
    if flip {
        points.reverse();
    }

    let ids: Vec<u32> = points.into_iter().map(|p| mesh.push_vertex(p)).collect();
    for i in 1..ids.len() - 1 {
        mesh.triangles.push([ids[0], ids[i], ids[i + 1]]);
    }
    Ok(())
}

fn spherical_face(
    mesh: &mut TriangleMesh,
    center: Point3,
    radius: f64,
    segments: u32,
    flip: bool,
) {
    let n_lon = segments.max(3) as usize;
    let n_lat = (segments / 2).max(2) as usize;

    let at = |theta: f64, phi: f64| {
        Point3::new(
            center.x + radius * theta.sin() * phi.cos(),
            center.y + radius * theta.sin() * phi.sin(),
            center.z + radius * theta.cos(),
        )
    };

    let north = mesh.push_vertex(at(0.0, 0.0));
    let south = mesh.push_vertex(at(PI, 0.0));
    let rings: Vec<Vec<u32>> = (1..n_lat)
        .map(|i| {
            let theta = PI * i as f64 / n_lat as f64;
            (0..n_lon)
                .map(|j| mesh.push_vertex(at(theta, 2.0 * PI * j as f64 / n_lon as f64)))
                .collect()
        })
        .collect();

    let mut tris = Vec::new();
    if let (Some(first), Some(last)) = (rings.first(), rings.last()) {
        for j in 0..n_lon {
            let k = (j + 1) % n_lon;
            tris.push([north, first[j], first[k]]);
            tris.push([south, last[k], last[j]]);
        }
    }
    for band in rings.windows(2) {
        let (up, low) = (&band[0], &band[1]);
        for j in 0..n_lon {
            let k = (j + 1) % n_lon;
            tris.push([up[j], low[j], low[k]]);
            tris.push([up[j], low[k], up[k]]);
        }
    }
    if flip {
        for t in &mut tris {
            t.swap(1, 2);
        }
    }
    mesh.triangles.extend(tris);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{make_box, make_sphere};
    use approx::assert_relative_eq;

    #[test]
    fn test_box_tessellation() {
        let b = make_box(10.0, 20.0, 30.0).unwrap();
        let mesh = tessellate(&b, &TessellationParams::default()).unwrap();
        assert_eq!(mesh.num_triangles(), 12);
        assert_relative_eq!(mesh.area(), 2200.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.signed_volume(), 6000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_reversed_box_turns_inside_out() {
        let b = make_box(1.0, 1.0, 1.0).unwrap();
        let faces: Vec<_> = TopologyExplorer::new(&b).faces().map(|f| f.reversed()).collect();
        let inverted = Shape::shell(faces).unwrap();
        let mesh = tessellate(&inverted, &TessellationParams::default()).unwrap();
        assert_relative_eq!(mesh.signed_volume(), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sphere_tessellation() {
        let s = make_sphere(10.0).unwrap();
        let params = TessellationParams { sphere_segments: 16 };
        let mesh = tessellate(&s, &params).unwrap();
        // 2 caps of 16 plus 6 bands of 32
        assert_eq!(mesh.num_triangles(), 224);
        let exact = 4.0 / 3.0 * PI * 1000.0;
        let vol = mesh.signed_volume();
        assert!(vol > 0.0 && vol < exact, "volume {vol}");
        assert_relative_eq!(vol, exact, max_relative = 0.15);
    }
}
