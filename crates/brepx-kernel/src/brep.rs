//! Native BREP text format.
//!
//! ```text
//! BREPX Topology V1
//! Shapes 3
//! VE 0 0 0
//! VE 1 0 0
//! ED L +0 +1
//! Root 2 +
//! ```
//!
//! Nodes are listed in post-order so every child precedes its parents.
//! Shared nodes are written once and referenced by index; a reference
//! carries the orientation of the use (`+` forward, `-` reversed).

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use brepx_kernel_topo::{Curve, NodeId, Orientation, Point3, Shape, ShapeKind, Surface, Vec3};

use crate::error::{BrepError, Result};

const BANNER: &str = "BREPX Topology V1";

/// Read a BREP file.
///
/// A file whose root is `-` yields a null shape.
pub fn read_brep(path: impl AsRef<Path>) -> Result<Shape> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let shape = parse_brep(&text)?;
    tracing::debug!(path = %path.as_ref().display(), kind = ?shape.kind(), "read BREP");
    Ok(shape)
}

/// Write `shape` to a BREP file, replacing any existing content.
pub fn write_brep(shape: &Shape, path: impl AsRef<Path>) -> Result<()> {
    let text = brep_string(shape)?;
    std::fs::write(path.as_ref(), text)?;
    tracing::debug!(path = %path.as_ref().display(), "wrote BREP");
    Ok(())
}

/// Serialize `shape` to BREP text.
pub fn brep_string(shape: &Shape) -> std::result::Result<String, BrepError> {
    if shape.is_null() {
        return Err(BrepError::NullShape);
    }
    let mut table = Table::default();
    let root = table.visit(shape);

    let mut out = String::new();
    let _ = writeln!(out, "{BANNER}");
    let _ = writeln!(out, "Shapes {}", table.lines.len());
    for line in &table.lines {
        let _ = writeln!(out, "{line}");
    }
    let sign = match shape.orientation() {
        Orientation::Forward => '+',
        Orientation::Reversed => '-',
    };
    let _ = writeln!(out, "Root {root} {sign}");
    Ok(out)
}

#[derive(Default)]
struct Table {
    index: HashMap<NodeId, usize>,
    lines: Vec<String>,
}

impl Table {
    fn visit(&mut self, shape: &Shape) -> usize {
        let Some(id) = shape.node_id() else {
            return usize::MAX;
        };
        if let Some(&i) = self.index.get(&id) {
            return i;
        }
        let children: Vec<String> = shape
            .children()
            .iter()
            .map(|child| {
                let i = self.visit(child);
                reference(i, child.orientation())
            })
            .collect();

        let mut line = String::from(tag(shape));
        match (shape.point(), shape.curve(), shape.surface()) {
            (Some(p), _, _) => {
                let _ = write!(line, " {} {} {}", p.x, p.y, p.z);
            }
            (_, Some(curve), _) => match curve {
                Curve::Line => line.push_str(" L"),
                Curve::Degenerate => line.push_str(" D"),
                Curve::Arc {
                    center,
                    axis,
                    radius,
                } => {
                    let _ = write!(
                        line,
                        " A {} {} {} {} {} {} {radius}",
                        center.x, center.y, center.z, axis.x, axis.y, axis.z
                    );
                }
            },
            (_, _, Some(surface)) => match surface {
                Surface::Plane { origin, normal } => {
                    let _ = write!(
                        line,
                        " P {} {} {} {} {} {}",
                        origin.x, origin.y, origin.z, normal.x, normal.y, normal.z
                    );
                }
                Surface::Sphere { center, radius } => {
                    let _ = write!(line, " S {} {} {} {radius}", center.x, center.y, center.z);
                }
            },
            _ => {}
        }
        for child in children {
            line.push(' ');
            line.push_str(&child);
        }

        self.lines.push(line);
        let i = self.lines.len() - 1;
        self.index.insert(id, i);
        i
    }
}

fn tag(shape: &Shape) -> &'static str {
    match shape.kind() {
        Some(ShapeKind::Vertex) => "VE",
        Some(ShapeKind::Edge) => "ED",
        Some(ShapeKind::Wire) => "WI",
        Some(ShapeKind::Face) => "FA",
        Some(ShapeKind::Shell) => "SH",
        Some(ShapeKind::Solid) => "SO",
        Some(ShapeKind::Compound) | None => "CO",
    }
}

fn reference(index: usize, orientation: Orientation) -> String {
    match orientation {
        Orientation::Forward => format!("+{index}"),
        Orientation::Reversed => format!("-{index}"),
    }
}

/// Decode BREP text.
pub fn parse_brep(text: &str) -> std::result::Result<Shape, BrepError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));
    match lines.next() {
        Some((_, BANNER)) => {}
        _ => return Err(BrepError::BadHeader),
    }

    let (line_no, count_line) = lines.next().ok_or_else(|| BrepError::parse(2, "missing shape table"))?;
    let count: usize = count_line
        .strip_prefix("Shapes ")
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| BrepError::parse(line_no, "expected `Shapes <count>`"))?;

    let mut nodes: Vec<Shape> = Vec::new();
    for _ in 0..count {
        let (line_no, line) = lines
            .next()
            .ok_or_else(|| BrepError::parse(line_no + nodes.len() + 1, "shape table ends early"))?;
        let node = Node::new(line_no, line, &nodes).decode()?;
        nodes.push(node);
    }

    let (line_no, root) = lines
        .find(|(_, l)| !l.is_empty())
        .ok_or_else(|| BrepError::parse(count.saturating_add(3), "missing root line"))?;
    let root = root
        .strip_prefix("Root")
        .map(str::trim)
        .ok_or_else(|| BrepError::parse(line_no, "expected `Root`"))?;
    if root == "-" {
        return Ok(Shape::null());
    }
    let mut parts = root.split_whitespace();
    let index = parts.next().unwrap_or_default();
    let sign = match parts.next() {
        Some("+") | None => "+",
        Some("-") => "-",
        Some(other) => return Err(BrepError::parse(line_no, format!("bad root orientation `{other}`"))),
    };
    Node::new(line_no, "", &nodes).child(&format!("{sign}{index}"))
}

/// One line of the shape table being decoded.
struct Node<'a> {
    line: usize,
    tokens: std::str::SplitWhitespace<'a>,
    nodes: &'a [Shape],
}

impl<'a> Node<'a> {
    fn new(line: usize, text: &'a str, nodes: &'a [Shape]) -> Self {
        Self {
            line,
            tokens: text.split_whitespace(),
            nodes,
        }
    }

    fn err(&self, message: impl Into<String>) -> BrepError {
        BrepError::parse(self.line, message)
    }

    fn token(&mut self) -> std::result::Result<&'a str, BrepError> {
        self.tokens.next().ok_or_else(|| self.err("unexpected end of line"))
    }

    fn real(&mut self) -> std::result::Result<f64, BrepError> {
        let token = self.token()?;
        token.parse().map_err(|_| self.err(format!("invalid number `{token}`")))
    }

    fn point(&mut self) -> std::result::Result<Point3, BrepError> {
        Ok(Point3::new(self.real()?, self.real()?, self.real()?))
    }

    fn vector(&mut self) -> std::result::Result<Vec3, BrepError> {
        Ok(Vec3::new(self.real()?, self.real()?, self.real()?))
    }

    fn child(&self, token: &str) -> std::result::Result<Shape, BrepError> {
        let (orientation, index) = if let Some(rest) = token.strip_prefix('+') {
            (Orientation::Forward, rest)
        } else if let Some(rest) = token.strip_prefix('-') {
            (Orientation::Reversed, rest)
        } else {
            return Err(self.err(format!("bad reference `{token}`")));
        };
        let shape = index
            .parse::<usize>()
            .ok()
            .and_then(|i| self.nodes.get(i))
            .ok_or_else(|| self.err(format!("reference `{token}` is not defined yet")))?;
        Ok(shape.oriented(orientation))
    }

    fn children(&mut self) -> std::result::Result<Vec<Shape>, BrepError> {
        let tokens: Vec<&str> = self.tokens.by_ref().collect();
        tokens.into_iter().map(|t| self.child(t)).collect()
    }

    fn decode(mut self) -> std::result::Result<Shape, BrepError> {
        let tag = self.token()?;
        let built = match tag {
            "VE" => return Ok(Shape::vertex(self.point()?)),
            "ED" => {
                let curve = match self.token()? {
                    "L" => Curve::Line,
                    "D" => Curve::Degenerate,
                    "A" => Curve::Arc {
                        center: self.point()?,
                        axis: self.vector()?,
                        radius: self.real()?,
                    },
                    other => return Err(self.err(format!("unknown curve `{other}`"))),
                };
                let vertices = self.children()?;
                let [start, end] = vertices.as_slice() else {
                    return Err(self.err("an edge needs two vertices"));
                };
                Shape::edge(curve, start, end)
            }
            "WI" => Shape::wire(self.children()?),
            "FA" => {
                let surface = match self.token()? {
                    "P" => Surface::Plane {
                        origin: self.point()?,
                        normal: self.vector()?,
                    },
                    "S" => Surface::Sphere {
                        center: self.point()?,
                        radius: self.real()?,
                    },
                    other => return Err(self.err(format!("unknown surface `{other}`"))),
                };
                Shape::face(surface, self.children()?)
            }
            "SH" => Shape::shell(self.children()?),
            "SO" => Shape::solid(self.children()?),
            "CO" => Shape::compound(self.children()?),
            other => return Err(self.err(format!("unknown shape tag `{other}`"))),
        };
        built.map_err(|e| self.err(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brepx_kernel_topo::{make_box, make_sphere, EdgeMaker, TopologyExplorer};

    fn counts(shape: &Shape) -> (usize, usize, usize, usize) {
        let topo = TopologyExplorer::new(shape);
        (
            topo.number_of_solids(),
            topo.number_of_faces(),
            topo.number_of_edges(),
            topo.number_of_vertices(),
        )
    }

    #[test]
    fn test_box_round_trip() {
        let solid = make_box(10.0, 20.0, 30.0).unwrap();
        let text = brep_string(&solid).unwrap();
        assert!(text.starts_with("BREPX Topology V1\nShapes "));
        let back = parse_brep(&text).unwrap();
        assert_eq!(back.kind(), Some(ShapeKind::Solid));
        assert!(back.is_closed());
        assert_eq!(counts(&back), (1, 6, 12, 8));
    }

    #[test]
    fn test_sphere_round_trip() {
        let sphere = make_sphere(2.5).unwrap();
        let back = parse_brep(&brep_string(&sphere).unwrap()).unwrap();
        assert_eq!(counts(&back), (1, 1, 3, 2));
        let face = TopologyExplorer::new(&back).faces().next().unwrap();
        assert_eq!(
            face.surface(),
            Some(&Surface::Sphere {
                center: Point3::origin(),
                radius: 2.5
            })
        );
    }

    #[test]
    fn test_orientation_preserved() {
        let edge = EdgeMaker::new(Point3::origin(), Point3::new(1.0, 2.0, 3.0))
            .unwrap()
            .shape()
            .reversed();
        let back = parse_brep(&brep_string(&edge).unwrap()).unwrap();
        assert_eq!(back.orientation(), Orientation::Reversed);
        let (start, _) = back.edge_vertices().unwrap();
        assert_eq!(start.point(), Some(Point3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_null_root() {
        let shape = parse_brep("BREPX Topology V1\nShapes 0\nRoot -\n").unwrap();
        assert!(shape.is_null());
        assert!(matches!(brep_string(&Shape::null()), Err(BrepError::NullShape)));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(parse_brep("garbage"), Err(BrepError::BadHeader)));
        let forward_ref = "BREPX Topology V1\nShapes 1\nED L +0 +1\nRoot 0 +\n";
        assert!(matches!(parse_brep(forward_ref), Err(BrepError::Parse { line: 3, .. })));
        let truncated = "BREPX Topology V1\nShapes 2\nVE 0 0 0\n";
        assert!(parse_brep(truncated).is_err());
        let bad_kind = "BREPX Topology V1\nShapes 2\nVE 0 0 0\nSO +0\nRoot 1 +\n";
        assert!(parse_brep(bad_kind).is_err());
    }

    #[test]
    fn test_oversized_shape_table() {
        let text = format!("BREPX Topology V1\nShapes {}\nRoot -\n", usize::MAX);
        assert!(matches!(parse_brep(&text), Err(BrepError::Parse { .. })));
        assert!(parse_brep("BREPX Topology V1\nShapes 99999999999999999999999\nRoot -\n").is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.brep");
        write_brep(&make_box(1.0, 2.0, 3.0).unwrap(), &path).unwrap();
        write_brep(&make_sphere(1.0).unwrap(), &path).unwrap();
        let back = read_brep(&path).unwrap();
        assert_eq!(counts(&back), (1, 1, 3, 2));
    }
}
