//! STEP reader: rebuilds kernel topology from `MANIFOLD_SOLID_BREP`,
//! `SHELL_BASED_SURFACE_MODEL` and `GEOMETRIC_CURVE_SET` roots.

use std::collections::HashMap;
use std::path::Path;

use brepx_kernel_topo::{Curve, Shape, Surface};

use crate::entities::{parse_axis2_placement_3d, parse_cartesian_point, parse_vector, EntityArgs};
use crate::error::{Result, StepError};
use crate::parser::{StepEntity, StepFile, StepValue};
use crate::style::{read_styles, ShapeStyle};
use crate::StepSchema;

const ROOT_TYPES: [&str; 3] = ["MANIFOLD_SOLID_BREP", "SHELL_BASED_SURFACE_MODEL", "GEOMETRIC_CURVE_SET"];

/// Reader session over one STEP file.
///
/// ```no_run
/// use brepx_kernel_step::StepReader;
///
/// let mut reader = StepReader::new();
/// reader.read_file("part.step")?;
/// let transferred = reader.transfer_roots();
/// let shape = reader.one_shape();
/// # Ok::<(), brepx_kernel_step::StepError>(())
/// ```
#[derive(Debug, Default)]
pub struct StepReader {
    file: Option<StepFile>,
    shapes: Vec<Shape>,
    styles: Vec<ShapeStyle>,
}

impl StepReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse a file; previous transfers are discarded.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let data = std::fs::read(path)?;
        self.read_buffer(&data)
    }

    /// Parse an in-memory exchange file.
    pub fn read_buffer(&mut self, data: &[u8]) -> Result<()> {
        self.file = Some(StepFile::parse(data)?);
        self.shapes.clear();
        self.styles.clear();
        Ok(())
    }

    /// Schema named in the file header, when it is one this kernel knows.
    pub fn schema(&self) -> Option<StepSchema> {
        self.file
            .as_ref()?
            .schema_names()
            .iter()
            .find_map(|name| StepSchema::from_file_schema(name))
    }

    /// Number of root entities available for transfer.
    pub fn nb_roots_for_transfer(&self) -> usize {
        self.root_ids().len()
    }

    fn root_ids(&self) -> Vec<u64> {
        let Some(file) = &self.file else {
            return Vec::new();
        };
        file.entities
            .values()
            .filter(|e| ROOT_TYPES.contains(&e.type_name.as_str()))
            .map(|e| e.id)
            .collect()
    }

    /// Translate every root, returning how many succeeded.
    ///
    /// A root that fails is logged and skipped.
    pub fn transfer_roots(&mut self) -> usize {
        self.shapes.clear();
        self.styles.clear();
        let Some(file) = &self.file else {
            return 0;
        };
        let mut styles = read_styles(file);
        let mut translator = Translator::new(file);
        for id in self.root_ids() {
            match translator.root(id) {
                Ok(shape) => {
                    self.shapes.push(shape);
                    self.styles.push(styles.remove(&id).unwrap_or_default());
                }
                Err(e) => tracing::warn!(entity = id, error = %e, "STEP root skipped"),
            }
        }
        tracing::debug!(roots = self.shapes.len(), "STEP transfer finished");
        self.shapes.len()
    }

    /// Transferred roots, in entity id order.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Colour and layer of each transferred root, aligned with
    /// [`shapes`](Self::shapes).
    pub fn styles(&self) -> &[ShapeStyle] {
        &self.styles
    }

    /// Result of the transfer as one shape: null when nothing was
    /// transferred, the root itself for a single root, a compound otherwise.
    pub fn one_shape(&self) -> Shape {
        match self.shapes.as_slice() {
            [] => Shape::null(),
            [single] => single.clone(),
            // Roots are non-null shapes, which a compound always accepts.
            many => Shape::compound(many.to_vec()).unwrap_or_default(),
        }
    }
}

/// Per-transfer caches keyed by entity id, so shared entities map to
/// shared shapes.
struct Translator<'a> {
    file: &'a StepFile,
    vertices: HashMap<u64, Shape>,
    edges: HashMap<u64, Shape>,
    faces: HashMap<u64, Shape>,
    shells: HashMap<u64, Shape>,
    points: HashMap<u64, Shape>,
    curves: HashMap<u64, Shape>,
}

impl<'a> Translator<'a> {
    fn new(file: &'a StepFile) -> Self {
        Self {
            file,
            vertices: HashMap::new(),
            edges: HashMap::new(),
            faces: HashMap::new(),
            shells: HashMap::new(),
            points: HashMap::new(),
            curves: HashMap::new(),
        }
    }

    fn root(&mut self, id: u64) -> Result<Shape> {
        let entity = self.file.require(id)?;
        match entity.type_name.as_str() {
            "MANIFOLD_SOLID_BREP" => {
                let shell = self.shell(entity.entity_ref(1)?)?;
                Ok(Shape::solid(vec![shell])?)
            }
            "SHELL_BASED_SURFACE_MODEL" => {
                let shells = entity
                    .entity_ref_list(1)?
                    .into_iter()
                    .map(|s| self.shell(s))
                    .collect::<Result<Vec<_>>>()?;
                single_or_compound(shells)
            }
            "GEOMETRIC_CURVE_SET" => {
                let elements = entity
                    .entity_ref_list(1)?
                    .into_iter()
                    .map(|e| self.curve_set_element(e))
                    .collect::<Result<Vec<_>>>()?;
                single_or_compound(elements)
            }
            other => Err(StepError::UnsupportedEntity(other.to_string())),
        }
    }

    fn curve_set_element(&mut self, id: u64) -> Result<Shape> {
        let entity = self.file.require(id)?;
        match entity.type_name.as_str() {
            "CARTESIAN_POINT" => self.point_vertex(id),
            "TRIMMED_CURVE" => self.trimmed_curve(id),
            "COMPOSITE_CURVE" => {
                let mut edges = Vec::new();
                for segment_id in entity.entity_ref_list(1)? {
                    let segment = self.file.require(segment_id)?;
                    if segment.type_name != "COMPOSITE_CURVE_SEGMENT" {
                        return Err(StepError::type_mismatch(
                            segment_id,
                            "COMPOSITE_CURVE_SEGMENT",
                            &segment.type_name,
                        ));
                    }
                    let edge = self.trimmed_curve(segment.entity_ref(2)?)?;
                    edges.push(if segment.boolean(1)? { edge } else { edge.reversed() });
                }
                Ok(Shape::wire(edges)?)
            }
            other => Err(StepError::UnsupportedEntity(other.to_string())),
        }
    }

    /// Edge for a `TRIMMED_CURVE` trimmed by points; a false sense flag
    /// reverses it.
    fn trimmed_curve(&mut self, id: u64) -> Result<Shape> {
        if let Some(edge) = self.curves.get(&id) {
            return Ok(edge.clone());
        }
        let entity = self.file.require(id)?;
        if entity.type_name != "TRIMMED_CURVE" {
            return Err(StepError::type_mismatch(id, "TRIMMED_CURVE", &entity.type_name));
        }
        let start = self.point_vertex(trim_point(entity, 2)?)?;
        let end = self.point_vertex(trim_point(entity, 3)?)?;
        let curve = self.curve(entity.entity_ref(1)?)?;
        if start.is_same(&end) && matches!(curve, Curve::Line) {
            return Err(StepError::bad_argument(id, "closed straight edge"));
        }
        let mut edge = Shape::edge(curve, &start, &end)?;
        if !entity.boolean(4)? {
            edge = edge.reversed();
        }
        self.curves.insert(id, edge.clone());
        Ok(edge)
    }

    fn point_vertex(&mut self, id: u64) -> Result<Shape> {
        if let Some(vertex) = self.points.get(&id) {
            return Ok(vertex.clone());
        }
        let vertex = Shape::vertex(parse_cartesian_point(self.file, id)?);
        self.points.insert(id, vertex.clone());
        Ok(vertex)
    }

    fn shell(&mut self, id: u64) -> Result<Shape> {
        if let Some(shell) = self.shells.get(&id) {
            return Ok(shell.clone());
        }
        let entity = self.file.require(id)?;
        if !matches!(entity.type_name.as_str(), "CLOSED_SHELL" | "OPEN_SHELL") {
            return Err(StepError::type_mismatch(id, "CLOSED_SHELL", &entity.type_name));
        }
        let faces = entity
            .entity_ref_list(1)?
            .into_iter()
            .map(|f| self.face(f))
            .collect::<Result<Vec<_>>>()?;
        let shell = Shape::shell(faces)?;
        self.shells.insert(id, shell.clone());
        Ok(shell)
    }

    fn face(&mut self, id: u64) -> Result<Shape> {
        if let Some(face) = self.faces.get(&id) {
            return Ok(face.clone());
        }
        let entity = self.file.require(id)?;
        if !matches!(entity.type_name.as_str(), "ADVANCED_FACE" | "FACE_SURFACE") {
            return Err(StepError::type_mismatch(id, "ADVANCED_FACE", &entity.type_name));
        }

        let mut outer = Vec::new();
        let mut inner = Vec::new();
        for bound_id in entity.entity_ref_list(1)? {
            let bound = self.file.require(bound_id)?;
            let wire = match bound.type_name.as_str() {
                "FACE_OUTER_BOUND" | "FACE_BOUND" => {
                    self.edge_loop(bound.entity_ref(1)?, bound.boolean(2)?)?
                }
                other => return Err(StepError::type_mismatch(bound_id, "FACE_BOUND", other)),
            };
            if bound.type_name == "FACE_OUTER_BOUND" {
                outer.push(wire);
            } else {
                inner.push(wire);
            }
        }
        outer.extend(inner);

        let surface = self.surface(entity.entity_ref(2)?)?;
        let mut face = Shape::face(surface, outer)?;
        if !entity.boolean(3)? {
            face = face.reversed();
        }
        self.faces.insert(id, face.clone());
        Ok(face)
    }

    fn edge_loop(&mut self, id: u64, same_sense: bool) -> Result<Shape> {
        let entity = self.file.require(id)?;
        if entity.type_name != "EDGE_LOOP" {
            return Err(StepError::type_mismatch(id, "EDGE_LOOP", &entity.type_name));
        }
        let mut edges = entity
            .entity_ref_list(1)?
            .into_iter()
            .map(|oe| self.oriented_edge(oe))
            .collect::<Result<Vec<_>>>()?;
        if !same_sense {
            edges = edges.iter().rev().map(Shape::reversed).collect();
        }
        Ok(Shape::wire(edges)?)
    }

    fn oriented_edge(&mut self, id: u64) -> Result<Shape> {
        let entity = self.file.require(id)?;
        if entity.type_name != "ORIENTED_EDGE" {
            return Err(StepError::type_mismatch(id, "ORIENTED_EDGE", &entity.type_name));
        }
        let edge = self.edge(entity.entity_ref(3)?)?;
        Ok(if entity.boolean(4)? { edge } else { edge.reversed() })
    }

    fn edge(&mut self, id: u64) -> Result<Shape> {
        if let Some(edge) = self.edges.get(&id) {
            return Ok(edge.clone());
        }
        let entity = self.file.require(id)?;
        if entity.type_name != "EDGE_CURVE" {
            return Err(StepError::type_mismatch(id, "EDGE_CURVE", &entity.type_name));
        }
        let start = self.vertex(entity.entity_ref(1)?)?;
        let end = self.vertex(entity.entity_ref(2)?)?;
        let mut curve = self.curve(entity.entity_ref(3)?)?;
        if start.is_same(&end) && matches!(curve, Curve::Line) {
            return Err(StepError::bad_argument(id, "closed straight edge"));
        }
        if let Curve::Arc { axis, .. } = &mut curve {
            if !entity.boolean(4)? {
                *axis = -*axis;
            }
        }
        let edge = Shape::edge(curve, &start, &end)?;
        self.edges.insert(id, edge.clone());
        Ok(edge)
    }

    fn curve(&self, id: u64) -> Result<Curve> {
        let entity = self.file.require(id)?;
        match entity.type_name.as_str() {
            "LINE" => {
                let (_, magnitude) = parse_vector(self.file, entity.entity_ref(2)?)?;
                Ok(if magnitude == 0.0 {
                    Curve::Degenerate
                } else {
                    Curve::Line
                })
            }
            "CIRCLE" => {
                let placement = parse_axis2_placement_3d(self.file, entity.entity_ref(1)?)?;
                Ok(Curve::Arc {
                    center: placement.location,
                    axis: placement.axis,
                    radius: entity.real(2)?,
                })
            }
            other => Err(StepError::UnsupportedEntity(other.to_string())),
        }
    }

    fn vertex(&mut self, id: u64) -> Result<Shape> {
        if let Some(vertex) = self.vertices.get(&id) {
            return Ok(vertex.clone());
        }
        let entity = self.file.require(id)?;
        if entity.type_name != "VERTEX_POINT" {
            return Err(StepError::type_mismatch(id, "VERTEX_POINT", &entity.type_name));
        }
        let vertex = Shape::vertex(parse_cartesian_point(self.file, entity.entity_ref(1)?)?);
        self.vertices.insert(id, vertex.clone());
        Ok(vertex)
    }

    fn surface(&self, id: u64) -> Result<Surface> {
        let entity = self.file.require(id)?;
        match entity.type_name.as_str() {
            "PLANE" => {
                let placement = parse_axis2_placement_3d(self.file, entity.entity_ref(1)?)?;
                Ok(Surface::Plane {
                    origin: placement.location,
                    normal: placement.axis,
                })
            }
            "SPHERICAL_SURFACE" => {
                let placement = parse_axis2_placement_3d(self.file, entity.entity_ref(1)?)?;
                Ok(Surface::Sphere {
                    center: placement.location,
                    radius: entity.real(2)?,
                })
            }
            other => Err(StepError::UnsupportedEntity(other.to_string())),
        }
    }
}

/// First point reference of the trimming select set at `idx`.
fn trim_point(entity: &StepEntity, idx: usize) -> Result<u64> {
    entity
        .arg(idx)?
        .as_list()
        .and_then(|trims| trims.iter().find_map(StepValue::as_entity_ref))
        .ok_or_else(|| StepError::bad_argument(entity.id, format!("trim {} is not a point", idx - 1)))
}

fn single_or_compound(shapes: Vec<Shape>) -> Result<Shape> {
    match <[Shape; 1]>::try_from(shapes) {
        Ok([shape]) => Ok(shape),
        Err(shapes) => Ok(Shape::compound(shapes)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brepx_kernel_topo::{ShapeKind, TopologyExplorer};

    const TRIANGLE: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('CONFIG_CONTROL_DESIGN'));
ENDSEC;
DATA;
#1 = CARTESIAN_POINT('', (0., 0., 0.));
#2 = CARTESIAN_POINT('', (1., 0., 0.));
#3 = CARTESIAN_POINT('', (0., 1., 0.));
#4 = VERTEX_POINT('', #1);
#5 = VERTEX_POINT('', #2);
#6 = VERTEX_POINT('', #3);
#7 = DIRECTION('', (1., 0., 0.));
#8 = VECTOR('', #7, 1.);
#9 = LINE('', #1, #8);
#10 = EDGE_CURVE('', #4, #5, #9, .T.);
#11 = EDGE_CURVE('', #5, #6, #9, .T.);
#12 = EDGE_CURVE('', #6, #4, #9, .T.);
#13 = ORIENTED_EDGE('', *, *, #10, .T.);
#14 = ORIENTED_EDGE('', *, *, #11, .T.);
#15 = ORIENTED_EDGE('', *, *, #12, .T.);
#16 = EDGE_LOOP('', (#13, #14, #15));
#17 = FACE_OUTER_BOUND('', #16, .T.);
#18 = DIRECTION('', (0., 0., 1.));
#19 = AXIS2_PLACEMENT_3D('', #1, #18, $);
#20 = PLANE('', #19);
#21 = ADVANCED_FACE('', (#17), #20, .T.);
#22 = OPEN_SHELL('', (#21));
#23 = SHELL_BASED_SURFACE_MODEL('', (#22));
#24 = MANIFOLD_SOLID_BREP('', #99);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_transfer_skips_broken_roots() {
        let mut reader = StepReader::new();
        reader.read_buffer(TRIANGLE.as_bytes()).unwrap();
        assert_eq!(reader.schema(), Some(StepSchema::Ap203));
        assert_eq!(reader.nb_roots_for_transfer(), 2);
        assert_eq!(reader.transfer_roots(), 1);

        let shape = reader.one_shape();
        assert_eq!(shape.kind(), Some(ShapeKind::Shell));
        let topo = TopologyExplorer::new(&shape);
        assert_eq!(topo.number_of_faces(), 1);
        assert_eq!(topo.number_of_edges(), 3);
        assert_eq!(topo.number_of_vertices(), 3);
        assert!(!shape.is_closed());
    }

    #[test]
    fn test_no_roots_gives_null_shape() {
        let mut reader = StepReader::new();
        assert_eq!(reader.transfer_roots(), 0);
        reader
            .read_buffer(b"ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\nENDSEC;\nEND-ISO-10303-21;\n")
            .unwrap();
        assert_eq!(reader.nb_roots_for_transfer(), 0);
        assert_eq!(reader.transfer_roots(), 0);
        assert!(reader.one_shape().is_null());
        assert_eq!(reader.schema(), None);
    }

    #[test]
    fn test_garbage_is_an_error() {
        let mut reader = StepReader::new();
        assert!(reader.read_buffer(b"solid not a step file").is_err());
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            reader.read_file(dir.path().join("missing.step")),
            Err(StepError::Io(_))
        ));
    }
}
