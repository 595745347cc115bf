//! IGES reader: rebuilds kernel topology from independent B-rep, curve and
//! point entities.

use std::collections::HashMap;
use std::path::Path;

use brepx_kernel_topo::{Curve, Point3, Shape, Surface, Vec3};

use crate::error::{IgesError, Result};
use crate::record::{de_pointer, Entity, IgesFile};
use crate::IgesVersion;

/// Entity types that are translated when independent.
const ROOT_TYPES: [i32; 7] = [186, 514, 510, 102, 100, 110, 116];

/// Distance under which curve end points are one vertex.
const TOLERANCE: f64 = 1e-7;

/// Reader session over one IGES file.
#[derive(Debug, Default)]
pub struct IgesReader {
    file: Option<IgesFile>,
    shapes: Vec<Shape>,
}

impl IgesReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse a file; previous transfers are discarded.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let data = std::fs::read(path)?;
        self.read_buffer(&data)
    }

    /// Parse an in-memory IGES file.
    pub fn read_buffer(&mut self, data: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(data);
        self.file = Some(IgesFile::parse(&text)?);
        self.shapes.clear();
        Ok(())
    }

    /// Version declared by the global section.
    pub fn version(&self) -> Option<IgesVersion> {
        self.file.as_ref()?.version_flag().and_then(IgesVersion::from_flag)
    }

    fn root_pointers(&self) -> Vec<usize> {
        let Some(file) = &self.file else {
            return Vec::new();
        };
        file.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.independent && ROOT_TYPES.contains(&e.type_code))
            .map(|(i, _)| de_pointer(i))
            .collect()
    }

    /// Number of independent entities available for transfer.
    pub fn nb_roots_for_transfer(&self) -> usize {
        self.root_pointers().len()
    }

    /// Translate every root, returning how many succeeded.
    ///
    /// A root that fails is logged and skipped.
    pub fn transfer_roots(&mut self) -> usize {
        self.shapes.clear();
        let Some(file) = &self.file else {
            return 0;
        };
        let mut translator = Translator::new(file);
        for de in self.root_pointers() {
            match translator.root(de) {
                Ok(shape) => self.shapes.push(shape),
                Err(e) => tracing::warn!(de, error = %e, "IGES root skipped"),
            }
        }
        tracing::debug!(roots = self.shapes.len(), "IGES transfer finished");
        self.shapes.len()
    }

    /// Transferred roots, in directory order.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Result of the transfer as one shape: null, the single root, or a
    /// compound of all roots.
    pub fn one_shape(&self) -> Shape {
        match self.shapes.as_slice() {
            [] => Shape::null(),
            [single] => single.clone(),
            // Roots are non-null, which a compound always accepts.
            many => Shape::compound(many.to_vec()).unwrap_or_default(),
        }
    }
}

/// Typed parameter access for one entity.
struct View<'a> {
    de: usize,
    entity: &'a Entity,
}

impl View<'_> {
    fn int(&self, i: usize) -> Result<i64> {
        self.entity
            .params
            .get(i)
            .and_then(|p| p.as_int())
            .ok_or_else(|| IgesError::bad_parameter(self.de, format!("expected an integer at parameter {}", i + 1)))
    }

    fn real(&self, i: usize) -> Result<f64> {
        self.entity
            .params
            .get(i)
            .and_then(|p| p.as_real())
            .ok_or_else(|| IgesError::bad_parameter(self.de, format!("expected a real at parameter {}", i + 1)))
    }

    fn ptr(&self, i: usize) -> Result<usize> {
        match self.int(i)? {
            p if p > 0 => Ok(p as usize),
            _ => Err(IgesError::bad_parameter(self.de, format!("expected a pointer at parameter {}", i + 1))),
        }
    }

    fn xyz(&self, first: usize) -> Result<[f64; 3]> {
        Ok([self.real(first)?, self.real(first + 1)?, self.real(first + 2)?])
    }

    /// Offset of the 1-based `index` record of a 502/504 list whose records
    /// are `width` parameters wide.
    fn record(&self, index: i64, width: usize, what: &str) -> Result<usize> {
        let stored = (self.entity.params.len().saturating_sub(1) / width) as i64;
        if index < 1 || index > self.int(0)?.min(stored) {
            return Err(IgesError::bad_parameter(self.de, format!("{what} index {index} out of range")));
        }
        Ok(1 + width * (index as usize - 1))
    }
}

struct Translator<'a> {
    file: &'a IgesFile,
    vertices: HashMap<(usize, i64), Shape>,
    edges: HashMap<(usize, i64), Shape>,
    faces: HashMap<usize, Shape>,
    shells: HashMap<usize, Shape>,
}

impl<'a> Translator<'a> {
    fn new(file: &'a IgesFile) -> Self {
        Self {
            file,
            vertices: HashMap::new(),
            edges: HashMap::new(),
            faces: HashMap::new(),
            shells: HashMap::new(),
        }
    }

    fn entity(&self, de: usize, expected: i32) -> Result<View<'a>> {
        let entity = self.file.get(de)?;
        if entity.type_code != expected {
            return Err(IgesError::bad_parameter(
                de,
                format!("expected entity type {expected}, found {}", entity.type_code),
            ));
        }
        Ok(View { de, entity })
    }

    fn root(&mut self, de: usize) -> Result<Shape> {
        match self.file.get(de)?.type_code {
            186 => self.solid(de),
            514 => self.shell(de),
            510 => self.face(de),
            102 => self.composite(de),
            100 | 110 => {
                let (curve, p, q) = self.free_curve(de)?;
                let start = Shape::vertex(p);
                let end = if near(&start, &q) { start.clone() } else { Shape::vertex(q) };
                Ok(Shape::edge(curve, &start, &end)?)
            }
            116 => Ok(Shape::vertex(self.point(de)?)),
            other => Err(IgesError::UnsupportedEntity(other)),
        }
    }

    /// Wire along a 102 composite curve; consecutive curves share their
    /// joining vertex, and a closed chain shares its first vertex.
    fn composite(&self, de: usize) -> Result<Shape> {
        let v = self.entity(de, 102)?;
        let count = v.int(0)?.max(0) as usize;
        let mut edges = Vec::new();
        let mut first: Option<Shape> = None;
        let mut last: Option<Shape> = None;
        for k in 0..count {
            let (curve, p, q) = self.free_curve(v.ptr(1 + k)?)?;
            let start = match last.take() {
                Some(previous) if near(&previous, &p) => previous,
                _ => Shape::vertex(p),
            };
            let first = first.get_or_insert_with(|| start.clone());
            let end = if k + 1 == count && near(first, &q) {
                first.clone()
            } else if near(&start, &q) {
                start.clone()
            } else {
                Shape::vertex(q)
            };
            edges.push(Shape::edge(curve, &start, &end)?);
            last = Some(end);
        }
        Ok(Shape::wire(edges)?)
    }

    /// Geometry and end points of a standalone line or arc.
    fn free_curve(&self, de: usize) -> Result<(Curve, Point3, Point3)> {
        let entity = self.file.get(de)?;
        let v = View { de, entity };
        match entity.type_code {
            110 => {
                let [x1, y1, z1] = v.xyz(0)?;
                let [x2, y2, z2] = v.xyz(3)?;
                let (p, q) = (Point3::new(x1, y1, z1), Point3::new(x2, y2, z2));
                let curve = if (q - p).norm() <= TOLERANCE { Curve::Degenerate } else { Curve::Line };
                Ok((curve, p, q))
            }
            100 => {
                let zt = v.real(0)?;
                let local = |x: usize| -> Result<Point3> { Ok(Point3::new(v.real(x)?, v.real(x + 1)?, zt)) };
                let (center, start, end) = (local(1)?, local(3)?, local(5)?);
                let radius = (start - center).norm();
                let ((center, axis), start, end) = if entity.transform == 0 {
                    ((center, Vec3::z()), start, end)
                } else {
                    (
                        self.placed(entity.transform, &center)?,
                        self.placed(entity.transform, &start)?.0,
                        self.placed(entity.transform, &end)?.0,
                    )
                };
                Ok((Curve::Arc { center, axis, radius }, start, end))
            }
            other => Err(IgesError::UnsupportedEntity(other)),
        }
    }

    fn solid(&mut self, de: usize) -> Result<Shape> {
        let v = self.entity(de, 186)?;
        let mut shells = vec![oriented(self.shell(v.ptr(0)?)?, v.int(1)?)];
        for k in 0..v.int(2)?.max(0) as usize {
            shells.push(oriented(self.shell(v.ptr(3 + 2 * k)?)?, v.int(4 + 2 * k)?));
        }
        Ok(Shape::solid(shells)?)
    }

    fn shell(&mut self, de: usize) -> Result<Shape> {
        if let Some(shell) = self.shells.get(&de) {
            return Ok(shell.clone());
        }
        let v = self.entity(de, 514)?;
        let mut faces = Vec::new();
        for k in 0..v.int(0)?.max(0) as usize {
            faces.push(oriented(self.face(v.ptr(1 + 2 * k)?)?, v.int(2 + 2 * k)?));
        }
        let shell = Shape::shell(faces)?;
        self.shells.insert(de, shell.clone());
        Ok(shell)
    }

    fn face(&mut self, de: usize) -> Result<Shape> {
        if let Some(face) = self.faces.get(&de) {
            return Ok(face.clone());
        }
        let v = self.entity(de, 510)?;
        let surface = self.surface(v.ptr(0)?)?;
        let mut wires = Vec::new();
        for k in 0..v.int(1)?.max(0) as usize {
            wires.push(self.edge_loop(v.ptr(3 + k)?)?);
        }
        let face = Shape::face(surface, wires)?;
        self.faces.insert(de, face.clone());
        Ok(face)
    }

    fn edge_loop(&mut self, de: usize) -> Result<Shape> {
        let v = self.entity(de, 508)?;
        let mut edges = Vec::new();
        let mut at = 1;
        for _ in 0..v.int(0)?.max(0) {
            if v.int(at)? != 0 {
                return Err(IgesError::bad_parameter(de, "vertex loop members are not supported"));
            }
            let edge = self.edge(v.ptr(at + 1)?, v.int(at + 2)?)?;
            edges.push(oriented(edge, v.int(at + 3)?));
            let k = v.int(at + 4)?.max(0) as usize;
            at = k
                .checked_mul(2)
                .and_then(|n| n.checked_add(at + 5))
                .ok_or_else(|| IgesError::bad_parameter(de, "edge loop parameter count overflows"))?;
        }
        Ok(Shape::wire(edges)?)
    }

    fn edge(&mut self, list: usize, index: i64) -> Result<Shape> {
        if let Some(edge) = self.edges.get(&(list, index)) {
            return Ok(edge.clone());
        }
        let v = self.entity(list, 504)?;
        let at = v.record(index, 5, "edge")?;
        let start = self.vertex(v.ptr(at + 1)?, v.int(at + 2)?)?;
        let end = self.vertex(v.ptr(at + 3)?, v.int(at + 4)?)?;
        let curve = self.curve(v.ptr(at)?, &start, &end)?;
        let edge = Shape::edge(curve, &start, &end)?;
        self.edges.insert((list, index), edge.clone());
        Ok(edge)
    }

    fn vertex(&mut self, list: usize, index: i64) -> Result<Shape> {
        if let Some(vertex) = self.vertices.get(&(list, index)) {
            return Ok(vertex.clone());
        }
        let v = self.entity(list, 502)?;
        let [x, y, z] = v.xyz(v.record(index, 3, "vertex")?)?;
        let vertex = Shape::vertex(Point3::new(x, y, z));
        self.vertices.insert((list, index), vertex.clone());
        Ok(vertex)
    }

    fn curve(&self, de: usize, start: &Shape, end: &Shape) -> Result<Curve> {
        let entity = self.file.get(de)?;
        let v = View { de, entity };
        match entity.type_code {
            110 => {
                let [x1, y1, z1] = v.xyz(0)?;
                let [x2, y2, z2] = v.xyz(3)?;
                let length = (Point3::new(x2, y2, z2) - Point3::new(x1, y1, z1)).norm();
                if start.is_same(end) {
                    if length > f64::EPSILON {
                        return Err(IgesError::bad_parameter(de, "closed edge on an open line"));
                    }
                    Ok(Curve::Degenerate)
                } else {
                    Ok(Curve::Line)
                }
            }
            100 => {
                let zt = v.real(0)?;
                let (x1, y1) = (v.real(1)?, v.real(2)?);
                let (x2, y2) = (v.real(3)?, v.real(4)?);
                let radius = (x2 - x1).hypot(y2 - y1);
                let local = Point3::new(x1, y1, zt);
                let (center, axis) = if entity.transform == 0 {
                    (local, Vec3::z())
                } else {
                    self.placed(entity.transform, &local)?
                };
                Ok(Curve::Arc {
                    center,
                    axis,
                    radius,
                })
            }
            other => Err(IgesError::UnsupportedEntity(other)),
        }
    }

    /// Apply a 124 transformation to `local`, also returning its Z axis.
    fn placed(&self, de: usize, local: &Point3) -> Result<(Point3, Vec3)> {
        let v = self.entity(de, 124)?;
        let m = (0..12).map(|i| v.real(i)).collect::<Result<Vec<_>>>()?;
        let row = |r: usize| m[4 * r] * local.x + m[4 * r + 1] * local.y + m[4 * r + 2] * local.z + m[4 * r + 3];
        let axis = Vec3::new(m[2], m[6], m[10]);
        if axis.norm() <= f64::EPSILON {
            return Err(IgesError::bad_parameter(de, "degenerate transformation"));
        }
        Ok((Point3::new(row(0), row(1), row(2)), axis.normalize()))
    }

    fn surface(&self, de: usize) -> Result<Surface> {
        let entity = self.file.get(de)?;
        let v = View { de, entity };
        match entity.type_code {
            190 => Ok(Surface::Plane {
                origin: self.point(v.ptr(0)?)?,
                normal: self.direction(v.ptr(1)?)?,
            }),
            196 => Ok(Surface::Sphere {
                center: self.point(v.ptr(0)?)?,
                radius: v.real(1)?,
            }),
            other => Err(IgesError::UnsupportedEntity(other)),
        }
    }

    fn point(&self, de: usize) -> Result<Point3> {
        let [x, y, z] = self.entity(de, 116)?.xyz(0)?;
        Ok(Point3::new(x, y, z))
    }

    fn direction(&self, de: usize) -> Result<Vec3> {
        let [x, y, z] = self.entity(de, 123)?.xyz(0)?;
        let d = Vec3::new(x, y, z);
        if d.norm() <= f64::EPSILON {
            return Err(IgesError::bad_parameter(de, "zero-length direction"));
        }
        Ok(d.normalize())
    }
}

fn near(vertex: &Shape, p: &Point3) -> bool {
    vertex.point().is_some_and(|v| (v - p).norm() <= TOLERANCE)
}

/// Orientation flag 0 means the member is used reversed.
fn oriented(shape: Shape, flag: i64) -> Shape {
    if flag == 0 {
        shape.reversed()
    } else {
        shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IgesWriter;
    use approx::assert_relative_eq;
    use brepx_kernel_topo::{make_box, make_sphere, make_sphere_at, ShapeKind, TopologyExplorer};

    fn round_trip(version: IgesVersion, shapes: &[Shape]) -> IgesReader {
        let mut writer = IgesWriter::new(version);
        for shape in shapes {
            writer.add_shape(shape).unwrap();
        }
        let text = writer.to_iges_string("model.igs").unwrap();
        let mut reader = IgesReader::new();
        reader.read_buffer(text.as_bytes()).unwrap();
        assert_eq!(reader.version(), Some(version));
        assert_eq!(reader.transfer_roots(), reader.nb_roots_for_transfer());
        reader
    }

    #[test]
    fn test_faces_mode_box() {
        let reader = round_trip(IgesVersion::V5_1, &[make_box(10.0, 20.0, 30.0).unwrap()]);
        assert_eq!(reader.shapes().len(), 6);
        let shape = reader.one_shape();
        assert_eq!(shape.kind(), Some(ShapeKind::Compound));
        let topo = TopologyExplorer::new(&shape);
        assert_eq!(topo.number_of_faces(), 6);
        assert_eq!(topo.number_of_edges(), 24);
        assert_eq!(topo.number_of_solids(), 0);
    }

    #[test]
    fn test_brep_mode_box() {
        let reader = round_trip(IgesVersion::V5_3, &[make_box(10.0, 20.0, 30.0).unwrap()]);
        let shape = reader.one_shape();
        assert_eq!(shape.kind(), Some(ShapeKind::Solid));
        assert!(shape.is_closed());
        let topo = TopologyExplorer::new(&shape);
        assert_eq!(topo.number_of_faces(), 6);
        assert_eq!(topo.number_of_edges(), 12);
        assert_eq!(topo.number_of_vertices(), 8);
    }

    #[test]
    fn test_sphere_arc_placement() {
        let center = Point3::new(1.0, -2.0, 3.0);
        let reader = round_trip(IgesVersion::V5_3, &[make_sphere_at(center, 4.0).unwrap()]);
        let shape = reader.one_shape();
        let topo = TopologyExplorer::new(&shape);
        assert_eq!(topo.number_of_faces(), 1);
        assert_eq!(topo.number_of_edges(), 3);
        let seam = topo.edges().find(|e| !e.is_degenerate()).unwrap();
        match seam.curve() {
            Some(Curve::Arc { center: c, axis, radius }) => {
                assert_relative_eq!(*c, center, epsilon = 1e-9);
                assert_relative_eq!(*axis, -Vec3::y(), epsilon = 1e-9);
                assert_relative_eq!(*radius, 4.0, epsilon = 1e-9);
            }
            other => panic!("unexpected seam curve {other:?}"),
        }
    }

    #[test]
    fn test_accumulated_faces() {
        let reader = round_trip(
            IgesVersion::V5_3,
            &[make_box(1.0, 1.0, 1.0).unwrap(), make_sphere(1.0).unwrap()],
        );
        let shape = reader.one_shape();
        let topo = TopologyExplorer::new(&shape);
        assert_eq!(topo.number_of_solids(), 2);
        assert_eq!(topo.number_of_faces(), 7);
    }

    #[test]
    fn test_broken_root_is_skipped() {
        let mut writer = IgesWriter::new(IgesVersion::V5_1);
        writer.add_shape(&make_box(1.0, 1.0, 1.0).unwrap()).unwrap();
        let text = writer.to_iges_string("box.igs").unwrap();
        let mut file = IgesFile::parse(&text).unwrap();
        let face = file.entities.iter_mut().find(|e| e.type_code == 510).unwrap();
        face.params[0] = crate::Param::Int(9999);
        let mut reader = IgesReader::new();
        reader.read_buffer(file.to_text().as_bytes()).unwrap();
        assert_eq!(reader.nb_roots_for_transfer(), 6);
        assert_eq!(reader.transfer_roots(), 5);
    }

    #[test]
    fn test_wireframe_round_trip() {
        let b = make_box(1.0, 2.0, 3.0).unwrap();
        let wire = TopologyExplorer::new(&b).wires().next().unwrap();
        let center = Point3::new(1.0, 1.0, 1.0);
        let seam = TopologyExplorer::new(&make_sphere_at(center, 2.0).unwrap())
            .edges()
            .find(|e| !e.is_degenerate())
            .unwrap();
        let vertex = Shape::vertex(Point3::new(4.0, 5.0, 6.0));
        let items = Shape::compound(vec![wire, seam.reversed(), vertex]).unwrap();

        for version in IgesVersion::ALL {
            let reader = round_trip(version, &[items.clone()]);
            let roots = reader.shapes();
            let kinds: Vec<_> = roots.iter().map(|s| s.kind()).collect();
            assert_eq!(kinds, [ShapeKind::Wire, ShapeKind::Edge, ShapeKind::Vertex].map(Some), "{version}");

            let topo = TopologyExplorer::new(&roots[0]);
            assert_eq!(topo.number_of_edges(), 4);
            assert_eq!(topo.number_of_vertices(), 4);

            let (start, end) = roots[1].edge_vertices().unwrap();
            assert_relative_eq!(start.point().unwrap(), Point3::new(1.0, 1.0, 3.0), epsilon = 1e-9);
            assert_relative_eq!(end.point().unwrap(), Point3::new(1.0, 1.0, -1.0), epsilon = 1e-9);
            match roots[1].curve() {
                Some(Curve::Arc { center: c, radius, .. }) => {
                    assert_relative_eq!(*c, center, epsilon = 1e-9);
                    assert_relative_eq!(*radius, 2.0, epsilon = 1e-9);
                }
                other => panic!("unexpected curve {other:?}"),
            }
            assert_eq!(roots[2].point(), Some(Point3::new(4.0, 5.0, 6.0)));
        }
    }

    fn transfer_edited(edit: impl Fn(&mut Entity)) -> usize {
        let mut writer = IgesWriter::new(IgesVersion::V5_3);
        writer.add_shape(&make_box(1.0, 1.0, 1.0).unwrap()).unwrap();
        let mut file = IgesFile::parse(&writer.to_iges_string("box.igs").unwrap()).unwrap();
        file.entities.iter_mut().for_each(edit);
        let mut reader = IgesReader::new();
        reader.read_buffer(file.to_text().as_bytes()).unwrap();
        assert_eq!(reader.nb_roots_for_transfer(), 1);
        reader.transfer_roots()
    }

    #[test]
    fn test_oversized_list_counts() {
        let huge = crate::Param::Int(i64::MAX);
        let transferred = transfer_edited(|entity| match entity.type_code {
            502 | 504 => entity.params[0] = huge.clone(),
            508 => entity.params[3] = huge.clone(),
            _ => {}
        });
        assert_eq!(transferred, 0);

        let transferred = transfer_edited(|entity| {
            if entity.type_code == 508 {
                entity.params[5] = huge.clone();
            }
        });
        assert_eq!(transferred, 0);
    }

    #[test]
    fn test_empty_and_unreadable() {
        let reader = IgesReader::new();
        assert!(reader.one_shape().is_null());
        assert_eq!(reader.nb_roots_for_transfer(), 0);
        let mut reader = IgesReader::new();
        assert!(reader.read_buffer(b"not an iges file").is_err());
    }
}
