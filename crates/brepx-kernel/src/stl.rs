//! STL mesh exchange.
//!
//! Writing tessellates the shape. Reading turns each facet into a planar
//! triangular face; vertices with identical coordinates are merged and
//! edges are shared between adjacent facets, so a watertight mesh reads
//! back as a closed shell.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use brepx_kernel_topo::{tessellate, Curve, Point3, Shape, Surface, TessellationParams, TriangleMesh, Vec3};

use crate::error::{Result, StlError};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// STL writer settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StlWriter {
    /// Write ASCII instead of binary STL.
    pub ascii: bool,
    /// Tessellation of curved faces.
    pub tessellation: TessellationParams,
}

impl StlWriter {
    /// Binary writer with default tessellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// ASCII writer with default tessellation.
    pub fn ascii() -> Self {
        Self {
            ascii: true,
            ..Self::default()
        }
    }

    /// Tessellate `shape` and write it to `path`, replacing any existing content.
    pub fn write(&self, shape: &Shape, path: impl AsRef<Path>) -> Result<()> {
        let data = self.to_bytes(shape)?;
        std::fs::write(path.as_ref(), &data)?;
        tracing::debug!(path = %path.as_ref().display(), bytes = data.len(), ascii = self.ascii, "wrote STL");
        Ok(())
    }

    /// Tessellate `shape` and encode it.
    pub fn to_bytes(&self, shape: &Shape) -> Result<Vec<u8>> {
        let mesh = tessellate(shape, &self.tessellation)?;
        if mesh.num_triangles() == 0 {
            return Err(StlError::EmptyMesh.into());
        }
        Ok(if self.ascii {
            ascii_stl(&mesh).into_bytes()
        } else {
            binary_stl(&mesh)
        })
    }
}

fn facet_normal([a, b, c]: &[Point3; 3]) -> Vec3 {
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len > 1e-15 {
        n / len
    } else {
        Vec3::z()
    }
}

fn binary_stl(mesh: &TriangleMesh) -> Vec<u8> {
    let n = mesh.num_triangles();
    let mut data = Vec::with_capacity(HEADER_LEN + 4 + n * FACET_LEN);

    let mut header = [0u8; HEADER_LEN];
    let banner = b"brepx binary STL";
    header[..banner.len()].copy_from_slice(banner);
    data.extend_from_slice(&header);
    data.extend_from_slice(&(n as u32).to_le_bytes());

    for i in 0..n {
        let corners = mesh.triangle(i);
        let normal = facet_normal(&corners);
        for v in [normal.x, normal.y, normal.z] {
            data.extend_from_slice(&(v as f32).to_le_bytes());
        }
        for p in &corners {
            for v in [p.x, p.y, p.z] {
                data.extend_from_slice(&(v as f32).to_le_bytes());
            }
        }
        data.extend_from_slice(&0u16.to_le_bytes());
    }
    data
}

fn ascii_stl(mesh: &TriangleMesh) -> String {
    let mut out = String::from("solid brepx\n");
    for i in 0..mesh.num_triangles() {
        let corners = mesh.triangle(i);
        let n = facet_normal(&corners);
        let _ = writeln!(out, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z);
        out.push_str("    outer loop\n");
        for p in &corners {
            let _ = writeln!(out, "      vertex {:e} {:e} {:e}", p.x, p.y, p.z);
        }
        out.push_str("    endloop\n  endfacet\n");
    }
    out.push_str("endsolid brepx\n");
    out
}

/// STL reader.
pub struct StlReader;

impl StlReader {
    /// Read an ASCII or binary STL file.
    pub fn read(path: impl AsRef<Path>) -> Result<Shape> {
        let data = std::fs::read(path.as_ref())?;
        let shape = Self::read_bytes(&data)?;
        tracing::debug!(path = %path.as_ref().display(), kind = ?shape.kind(), "read STL");
        Ok(shape)
    }

    /// Decode STL data, detecting the encoding.
    ///
    /// Binary is recognized by its facet count matching the data length
    /// exactly; otherwise data starting with `solid` is parsed as ASCII.
    pub fn read_bytes(data: &[u8]) -> Result<Shape> {
        let facets = if is_binary(data) {
            binary_facets(data)
        } else if data.trim_ascii_start().starts_with(b"solid") {
            ascii_facets(&String::from_utf8_lossy(data))?
        } else {
            return Err(StlError::Unrecognized(data.len()).into());
        };
        build_shape(&facets)
    }
}

fn is_binary(data: &[u8]) -> bool {
    let Some(count) = data.get(HEADER_LEN..HEADER_LEN + 4) else {
        return false;
    };
    let count = u32::from_le_bytes([count[0], count[1], count[2], count[3]]) as usize;
    count
        .checked_mul(FACET_LEN)
        .and_then(|n| n.checked_add(HEADER_LEN + 4))
        .is_some_and(|expected| expected == data.len())
}

fn binary_facets(data: &[u8]) -> Vec<[Point3; 3]> {
    let real = |at: usize| {
        f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as f64
    };
    data[HEADER_LEN + 4..]
        .chunks_exact(FACET_LEN)
        .enumerate()
        .map(|(i, _)| {
            // Skip the 12-byte normal.
            let base = HEADER_LEN + 4 + i * FACET_LEN + 12;
            let corner = |k: usize| {
                let at = base + 12 * k;
                Point3::new(real(at), real(at + 4), real(at + 8))
            };
            [corner(0), corner(1), corner(2)]
        })
        .collect()
}

struct Tokens<'a> {
    inner: std::iter::Enumerate<std::str::SplitWhitespace<'a>>,
    last: usize,
}

impl<'a> Tokens<'a> {
    fn err(&self, message: impl Into<String>) -> StlError {
        StlError::Parse {
            token: self.last,
            message: message.into(),
        }
    }

    fn next(&mut self) -> Option<&'a str> {
        let (i, token) = self.inner.next()?;
        self.last = i;
        Some(token)
    }

    fn expect(&mut self, keyword: &str) -> std::result::Result<(), StlError> {
        match self.next() {
            Some(t) if t.eq_ignore_ascii_case(keyword) => Ok(()),
            Some(t) => Err(self.err(format!("expected `{keyword}`, found `{t}`"))),
            None => Err(self.err(format!("expected `{keyword}`, found end of data"))),
        }
    }

    fn real(&mut self) -> std::result::Result<f64, StlError> {
        let token = self.next().ok_or_else(|| self.err("expected a number"))?;
        token.parse().map_err(|_| self.err(format!("invalid number `{token}`")))
    }

    fn point(&mut self) -> std::result::Result<Point3, StlError> {
        Ok(Point3::new(self.real()?, self.real()?, self.real()?))
    }
}

fn ascii_facets(text: &str) -> std::result::Result<Vec<[Point3; 3]>, StlError> {
    let mut tokens = Tokens {
        inner: text.split_whitespace().enumerate(),
        last: 0,
    };
    let mut facets = Vec::new();
    let mut in_solid = false;
    // Set after `solid`/`endsolid` while their optional name is being skipped.
    let mut naming = false;
    while let Some(token) = tokens.next() {
        let keyword = token.to_ascii_lowercase();
        match keyword.as_str() {
            "solid" if !in_solid => (in_solid, naming) = (true, true),
            "endsolid" if in_solid => (in_solid, naming) = (false, true),
            "facet" if in_solid => {
                naming = false;
                tokens.expect("normal")?;
                tokens.point()?;
                tokens.expect("outer")?;
                tokens.expect("loop")?;
                let mut corners = [Point3::origin(); 3];
                for corner in &mut corners {
                    tokens.expect("vertex")?;
                    *corner = tokens.point()?;
                }
                tokens.expect("endloop")?;
                tokens.expect("endfacet")?;
                facets.push(corners);
            }
            _ if naming => {}
            other => return Err(tokens.err(format!("unexpected `{other}`"))),
        }
    }
    if in_solid {
        return Err(tokens.err("missing `endsolid`"));
    }
    Ok(facets)
}

/// Exact coordinate key; `-0.0` and `0.0` merge.
fn vertex_key(p: &Point3) -> [u64; 3] {
    [(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits(), (p.z + 0.0).to_bits()]
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn build_shape(facets: &[[Point3; 3]]) -> Result<Shape> {
    let mut keys: HashMap<[u64; 3], usize> = HashMap::new();
    let mut vertices: Vec<Shape> = Vec::new();
    let mut triangles: Vec<[usize; 3]> = Vec::new();
    let mut skipped = 0usize;

    for corners in facets {
        let tri = corners.map(|p| {
            *keys.entry(vertex_key(&p)).or_insert_with(|| {
                vertices.push(Shape::vertex(p));
                vertices.len() - 1
            })
        });
        let [a, b, c] = tri;
        if a == b || b == c || a == c {
            skipped += 1;
            continue;
        }
        triangles.push(tri);
    }
    if skipped > 0 {
        tracing::debug!(skipped, "degenerate STL facets ignored");
    }

    let mut parent: Vec<usize> = (0..vertices.len()).collect();
    for [a, b, c] in &triangles {
        for (u, v) in [(*a, *b), (*b, *c)] {
            let (ru, rv) = (find(&mut parent, u), find(&mut parent, v));
            parent[ru] = rv;
        }
    }

    let mut edges: HashMap<(usize, usize), Shape> = HashMap::new();
    let mut components: Vec<usize> = Vec::new();
    let mut shell_faces: Vec<Vec<Shape>> = Vec::new();
    for tri in &triangles {
        let mut wire = Vec::with_capacity(3);
        for (u, v) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            let key = (u.min(v), u.max(v));
            let edge = match edges.get(&key) {
                Some(edge) => edge.clone(),
                None => {
                    let edge = Shape::edge(Curve::Line, &vertices[key.0], &vertices[key.1])?;
                    edges.insert(key, edge.clone());
                    edge
                }
            };
            wire.push(if u < v { edge } else { edge.reversed() });
        }

        let points = tri.map(|i| vertices[i].point().unwrap_or_else(Point3::origin));
        let normal = (points[1] - points[0]).cross(&(points[2] - points[0]));
        let normal = if normal.norm() > 0.0 { normal.normalize() } else { Vec3::z() };
        let face = Shape::face(
            Surface::Plane {
                origin: points[0],
                normal,
            },
            vec![Shape::wire(wire)?],
        )?;

        let root = find(&mut parent, tri[0]);
        let slot = match components.iter().position(|&r| r == root) {
            Some(slot) => slot,
            None => {
                components.push(root);
                shell_faces.push(Vec::new());
                components.len() - 1
            }
        };
        shell_faces[slot].push(face);
    }

    let mut shells = shell_faces
        .into_iter()
        .map(Shape::shell)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    tracing::debug!(
        facets = triangles.len(),
        vertices = vertices.len(),
        edges = edges.len(),
        shells = shells.len(),
        "built STL topology"
    );
    Ok(match shells.len() {
        0 => Shape::null(),
        1 => shells.remove(0),
        _ => Shape::compound(shells)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use brepx_kernel_topo::{make_box, make_sphere, ShapeKind, TopologyExplorer};

    fn faces_edges(shape: &Shape) -> (usize, usize) {
        let topo = TopologyExplorer::new(shape);
        (topo.number_of_faces(), topo.number_of_edges())
    }

    #[test]
    fn test_binary_box_round_trip() {
        let data = StlWriter::new().to_bytes(&make_box(10.0, 20.0, 30.0).unwrap()).unwrap();
        assert_eq!(data.len(), 84 + 12 * 50);
        let shape = StlReader::read_bytes(&data).unwrap();
        assert_eq!(shape.kind(), Some(ShapeKind::Shell));
        assert!(shape.is_closed());
        assert_eq!(faces_edges(&shape), (12, 18));
        assert_eq!(TopologyExplorer::new(&shape).number_of_vertices(), 8);
    }

    #[test]
    fn test_ascii_box_round_trip() {
        let data = StlWriter::ascii().to_bytes(&make_box(10.0, 20.0, 30.0).unwrap()).unwrap();
        assert!(data.starts_with(b"solid brepx"));
        let shape = StlReader::read_bytes(&data).unwrap();
        assert!(shape.is_closed());
        assert_eq!(faces_edges(&shape), (12, 18));
    }

    #[test]
    fn test_sphere_mesh_is_watertight() {
        let data = StlWriter::new().to_bytes(&make_sphere(5.0).unwrap()).unwrap();
        let shape = StlReader::read_bytes(&data).unwrap();
        assert_eq!(shape.kind(), Some(ShapeKind::Shell));
        assert!(shape.is_closed());
        let faces = TopologyExplorer::new(&shape).faces();
        for face in faces {
            match face.surface() {
                Some(Surface::Plane { normal, .. }) => assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-9),
                other => panic!("unexpected surface {other:?}"),
            }
        }
    }

    #[test]
    fn test_disjoint_components() {
        let text = "solid two
            facet normal 0 0 1 outer loop
              vertex 0 0 0 vertex 1 0 0 vertex 0 1 0
            endloop endfacet
            facet normal 0 0 1 outer loop
              vertex 5 0 0 vertex 6 0 0 vertex 5 1 0
            endloop endfacet
            endsolid two";
        let shape = StlReader::read_bytes(text.as_bytes()).unwrap();
        assert_eq!(shape.kind(), Some(ShapeKind::Compound));
        let topo = TopologyExplorer::new(&shape);
        assert_eq!(topo.number_of_shells(), 2);
        assert_eq!(topo.number_of_faces(), 2);
        assert_eq!(topo.number_of_edges(), 6);
        assert!(!shape.children()[0].is_closed());
    }

    #[test]
    fn test_empty_solid_is_null() {
        let shape = StlReader::read_bytes(b"solid empty\nendsolid empty\n").unwrap();
        assert!(shape.is_null());
    }

    #[test]
    fn test_corrupt_input_fails() {
        assert!(StlReader::read_bytes(b"").is_err());
        assert!(StlReader::read_bytes(&[7u8; 200]).is_err());
        assert!(StlReader::read_bytes(b"solid x\n facet normal 0 0 1\n outer loop\n vertex 0 0").is_err());
        let mut binary = StlWriter::new().to_bytes(&make_box(1.0, 1.0, 1.0).unwrap()).unwrap();
        binary.truncate(binary.len() - 10);
        assert!(StlReader::read_bytes(&binary).is_err());
    }

    #[test]
    fn test_edgeless_shape_is_rejected() {
        let err = StlWriter::new().to_bytes(&Shape::null()).unwrap_err();
        assert!(matches!(err, crate::KernelError::Stl(StlError::EmptyMesh)));
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.stl");
        StlWriter::new().write(&make_box(1.0, 1.0, 1.0).unwrap(), &path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 84 + 12 * 50);
        assert_eq!(faces_edges(&StlReader::read(&path).unwrap()), (12, 18));
    }
}
