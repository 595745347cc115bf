//! STEP writer: accumulates transferred shapes into one entity model.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use brepx_kernel_topo::{Curve, NodeId, Orientation, Point3, Shape, ShapeKind, Surface, Vec3};

use crate::entities::{perpendicular, quoted, real, write_cartesian_point, write_direction};
use crate::error::{Result, StepError};
use crate::style::{Color, ShapeStyle};

/// Application protocol written into `FILE_SCHEMA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StepSchema {
    /// AP203, configuration controlled design.
    Ap203,
    /// AP214, automotive design (committee draft).
    #[default]
    Ap214Cd,
}

impl StepSchema {
    /// All supported schemas.
    pub const ALL: [StepSchema; 2] = [StepSchema::Ap203, StepSchema::Ap214Cd];

    /// Short name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            StepSchema::Ap203 => "AP203",
            StepSchema::Ap214Cd => "AP214CD",
        }
    }

    /// Schema identifier written to the file header.
    pub fn file_schema(self) -> &'static str {
        match self {
            StepSchema::Ap203 => "CONFIG_CONTROL_DESIGN",
            StepSchema::Ap214Cd => "AUTOMOTIVE_DESIGN_CC2 { 1 2 10303 214 -1 1 5 4 }",
        }
    }

    /// Recognize a header schema identifier.
    pub fn from_file_schema(identifier: &str) -> Option<Self> {
        let upper = identifier.trim().to_ascii_uppercase();
        if upper.starts_with("CONFIG_CONTROL_DESIGN") {
            Some(StepSchema::Ap203)
        } else if upper.starts_with("AUTOMOTIVE_DESIGN") {
            Some(StepSchema::Ap214Cd)
        } else {
            None
        }
    }
}

impl fmt::Display for StepSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StepSchema {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|schema| schema.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StepError::UnknownSchema(s.to_string()))
    }
}

/// How a shape is mapped onto STEP representation items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// Solids become `MANIFOLD_SOLID_BREP`; shells and faces become
    /// `SHELL_BASED_SURFACE_MODEL`; wires, edges and vertices become
    /// `GEOMETRIC_CURVE_SET`.
    #[default]
    AsIs,
    /// Solids, shells and faces become `SHELL_BASED_SURFACE_MODEL`.
    /// Wireframe shapes are rejected.
    ShellBasedSurfaceModel,
}

/// Writer session holding an entity model.
///
/// Each [`transfer`](Self::transfer) appends roots; [`write`](Self::write)
/// serializes the whole model and may be called any number of times.
/// Sub-shapes shared between transfers are written once.
#[derive(Debug, Default)]
pub struct StepWriter {
    schema: StepSchema,
    entities: Vec<String>,
    roots: Vec<u64>,
    vertices: HashMap<NodeId, u64>,
    edges: HashMap<NodeId, u64>,
    faces: HashMap<(NodeId, Orientation), u64>,
    shells: HashMap<NodeId, u64>,
    points: HashMap<NodeId, u64>,
    curves: HashMap<(NodeId, Orientation), u64>,
    // Layer name and its root items, in first-use order.
    layers: Vec<(String, Vec<u64>)>,
    // Keeps transferred nodes alive so their ids stay unique.
    held: Vec<Shape>,
}

impl StepWriter {
    /// Create an empty model for `schema`.
    pub fn new(schema: StepSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Schema written to the header.
    pub fn schema(&self) -> StepSchema {
        self.schema
    }

    /// Shapes transferred so far, in transfer order.
    pub fn shapes(&self) -> &[Shape] {
        &self.held
    }

    /// Number of root representation items in the model.
    pub fn nb_roots(&self) -> usize {
        self.roots.len()
    }

    /// Translate `shape` into the model, returning the number of roots added.
    ///
    /// Compounds are flattened into one root per member. On error the model
    /// is left exactly as it was.
    pub fn transfer(&mut self, shape: &Shape, mode: TransferMode) -> Result<usize> {
        self.transfer_styled(shape, mode, &ShapeStyle::default())
    }

    /// Like [`transfer`](Self::transfer), attaching `style` to every root
    /// added.
    ///
    /// AP203 has no presentation entities, so the style is dropped there.
    pub fn transfer_styled(&mut self, shape: &Shape, mode: TransferMode, style: &ShapeStyle) -> Result<usize> {
        let mut items = Vec::new();
        collect_roots(shape, &mut items)?;

        let mark = self.entities.len() as u64;
        let root_count = self.roots.len();
        for item in &items {
            match self.root(item, mode) {
                Ok(id) => self.roots.push(id),
                Err(e) => {
                    self.rollback(mark, root_count);
                    return Err(e);
                }
            }
        }
        if !style.is_empty() {
            if self.schema == StepSchema::Ap203 {
                tracing::debug!("AP203 carries no presentation, style dropped");
            } else {
                let added = self.roots[root_count..].to_vec();
                self.style_roots(&added, style);
            }
        }
        self.held.push(shape.clone());
        tracing::debug!(roots = items.len(), entities = self.entities.len(), "STEP transfer");
        Ok(items.len())
    }

    fn style_roots(&mut self, roots: &[u64], style: &ShapeStyle) {
        if let Some(color) = style.color {
            let assignment = self.surface_colour(&color);
            for root in roots {
                self.add(format!("STYLED_ITEM('color',(#{assignment}),#{root})"));
            }
        }
        if let Some(name) = &style.layer {
            match self.layers.iter_mut().find(|(layer, _)| layer == name) {
                Some((_, items)) => items.extend_from_slice(roots),
                None => self.layers.push((name.clone(), roots.to_vec())),
            }
        }
    }

    /// `PRESENTATION_STYLE_ASSIGNMENT` filling both surface sides with `color`.
    fn surface_colour(&mut self, color: &Color) -> u64 {
        let rgb = self.add(format!(
            "COLOUR_RGB('',{},{},{})",
            real(color.r()),
            real(color.g()),
            real(color.b())
        ));
        let fill_colour = self.add(format!("FILL_AREA_STYLE_COLOUR('',#{rgb})"));
        let fill = self.add(format!("FILL_AREA_STYLE('',(#{fill_colour}))"));
        let area = self.add(format!("SURFACE_STYLE_FILL_AREA(#{fill})"));
        let side = self.add(format!("SURFACE_SIDE_STYLE('',(#{area}))"));
        let usage = self.add(format!("SURFACE_STYLE_USAGE(.BOTH.,#{side})"));
        self.add(format!("PRESENTATION_STYLE_ASSIGNMENT((#{usage}))"))
    }

    fn rollback(&mut self, mark: u64, root_count: usize) {
        self.entities.truncate(mark as usize);
        self.roots.truncate(root_count);
        self.vertices.retain(|_, id| *id <= mark);
        self.edges.retain(|_, id| *id <= mark);
        self.faces.retain(|_, id| *id <= mark);
        self.shells.retain(|_, id| *id <= mark);
        self.points.retain(|_, id| *id <= mark);
        self.curves.retain(|_, id| *id <= mark);
    }

    /// Serialize the model, overwriting `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = self.to_step_string(&name)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Serialize the model as exchange file text.
    pub fn to_step_string(&self, file_name: &str) -> Result<String> {
        if self.roots.is_empty() {
            return Err(StepError::EmptyModel);
        }
        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S");
        let mut out = String::new();
        out.push_str("ISO-10303-21;\nHEADER;\n");
        out.push_str("FILE_DESCRIPTION(('brepx boundary representation'),'2;1');\n");
        out.push_str(&format!(
            "FILE_NAME({},'{timestamp}',(''),(''),'brepx {}','brepx','');\n",
            quoted(file_name),
            env!("CARGO_PKG_VERSION"),
        ));
        out.push_str(&format!("FILE_SCHEMA(({}));\n", quoted(self.schema.file_schema())));
        out.push_str("ENDSEC;\nDATA;\n");
        for (i, body) in self.entities.iter().enumerate() {
            out.push_str(&format!("#{}={body};\n", i + 1));
        }
        // Layers follow the model so later transfers can still join them.
        for (i, (name, items)) in self.layers.iter().enumerate() {
            out.push_str(&format!(
                "#{}=PRESENTATION_LAYER_ASSIGNMENT({},'',({}));\n",
                self.entities.len() + i + 1,
                quoted(name),
                refs(items)
            ));
        }
        out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
        Ok(out)
    }

    fn add(&mut self, body: String) -> u64 {
        self.entities.push(body);
        self.entities.len() as u64
    }

    fn root(&mut self, item: &Shape, mode: TransferMode) -> Result<u64> {
        match (item.kind(), mode) {
            (Some(ShapeKind::Solid), TransferMode::AsIs) => {
                let shell = self.shell(outer_shell(item)?)?;
                Ok(self.add(format!("MANIFOLD_SOLID_BREP('',#{shell})")))
            }
            (Some(ShapeKind::Solid), TransferMode::ShellBasedSurfaceModel) => {
                let shell = self.shell(outer_shell(item)?)?;
                Ok(self.add(format!("SHELL_BASED_SURFACE_MODEL('',(#{shell}))")))
            }
            (Some(ShapeKind::Shell), _) => {
                let shell = self.shell(item)?;
                Ok(self.add(format!("SHELL_BASED_SURFACE_MODEL('',(#{shell}))")))
            }
            (Some(ShapeKind::Face), _) => {
                let face = self.face(item)?;
                let shell = self.add(format!("OPEN_SHELL('',(#{face}))"));
                Ok(self.add(format!("SHELL_BASED_SURFACE_MODEL('',(#{shell}))")))
            }
            (Some(ShapeKind::Wire | ShapeKind::Edge | ShapeKind::Vertex), TransferMode::AsIs) => {
                let element = self.wireframe(item)?;
                Ok(self.add(format!("GEOMETRIC_CURVE_SET('',(#{element}))")))
            }
            (Some(kind), _) => Err(StepError::UnsupportedShape(kind)),
            (None, _) => Err(StepError::NullShape),
        }
    }

    /// Curve set element for a wire (`COMPOSITE_CURVE`), an edge
    /// (`TRIMMED_CURVE`) or a vertex (`CARTESIAN_POINT`).
    fn wireframe(&mut self, item: &Shape) -> Result<u64> {
        match item.kind() {
            Some(ShapeKind::Vertex) => self.trim_point(item),
            Some(ShapeKind::Edge) => self.trimmed_curve(item),
            Some(ShapeKind::Wire) => {
                let mut segments = Vec::new();
                for edge in item.children() {
                    let curve = self.trimmed_curve(&edge.oriented(Orientation::Forward))?;
                    let sense = bool_enum(edge.orientation().is_forward());
                    segments.push(self.add(format!("COMPOSITE_CURVE_SEGMENT(.CONTINUOUS.,{sense},#{curve})")));
                }
                Ok(self.add(format!("COMPOSITE_CURVE('',({}),.U.)", refs(&segments))))
            }
            kind => Err(StepError::InvalidTopology(format!("{kind:?} in a curve set"))),
        }
    }

    /// `TRIMMED_CURVE` between the edge vertices, in node order; the sense
    /// flag carries the handle orientation.
    fn trimmed_curve(&mut self, edge: &Shape) -> Result<u64> {
        let key = (node(edge)?, edge.orientation());
        if let Some(&id) = self.curves.get(&key) {
            return Ok(id);
        }
        let (start, end) = edge
            .oriented(Orientation::Forward)
            .edge_vertices()
            .ok_or_else(|| StepError::InvalidTopology("edge without vertices".into()))?;
        let basis = self.basis_curve(edge, &point(&start)?, &point(&end)?)?;
        let trim_1 = self.trim_point(&start)?;
        let trim_2 = self.trim_point(&end)?;
        let sense = bool_enum(edge.orientation().is_forward());
        let id = self.add(format!(
            "TRIMMED_CURVE('',#{basis},(#{trim_1}),(#{trim_2}),{sense},.CARTESIAN.)"
        ));
        self.curves.insert(key, id);
        Ok(id)
    }

    fn trim_point(&mut self, vertex: &Shape) -> Result<u64> {
        let key = node(vertex)?;
        if let Some(&id) = self.points.get(&key) {
            return Ok(id);
        }
        let id = self.add(write_cartesian_point(&point(vertex)?));
        self.points.insert(key, id);
        Ok(id)
    }

    fn shell(&mut self, shell: &Shape) -> Result<u64> {
        let key = node(shell)?;
        if let Some(&id) = self.shells.get(&key) {
            return Ok(id);
        }
        let faces = shell
            .children()
            .iter()
            .map(|f| self.face(f))
            .collect::<Result<Vec<_>>>()?;
        let kind = if shell.is_closed() { "CLOSED_SHELL" } else { "OPEN_SHELL" };
        let id = self.add(format!("{kind}('',({}))", refs(&faces)));
        self.shells.insert(key, id);
        Ok(id)
    }

    fn face(&mut self, face: &Shape) -> Result<u64> {
        let key = (node(face)?, face.orientation());
        if let Some(&id) = self.faces.get(&key) {
            return Ok(id);
        }
        let mut bounds = Vec::new();
        for (i, wire) in face.children().iter().enumerate() {
            let edge_loop = self.edge_loop(wire)?;
            let kind = if i == 0 { "FACE_OUTER_BOUND" } else { "FACE_BOUND" };
            bounds.push(self.add(format!("{kind}('',#{edge_loop},.T.)")));
        }

        let surface = match face.surface() {
            Some(Surface::Plane { origin, normal }) => {
                let placement = self.placement(origin, normal, &perpendicular(normal));
                self.add(format!("PLANE('',#{placement})"))
            }
            Some(Surface::Sphere { center, radius }) => {
                let placement = self.placement(center, &Vec3::z(), &Vec3::x());
                self.add(format!("SPHERICAL_SURFACE('',#{placement},{})", real(*radius)))
            }
            None => return Err(StepError::InvalidTopology("face without surface".into())),
        };
        let sense = bool_enum(face.orientation().is_forward());
        let id = self.add(format!("ADVANCED_FACE('',({}),#{surface},{sense})", refs(&bounds)));
        self.faces.insert(key, id);
        Ok(id)
    }

    fn edge_loop(&mut self, wire: &Shape) -> Result<u64> {
        let mut oriented = Vec::new();
        for edge in wire.children() {
            let curve = self.edge(edge)?;
            let sense = bool_enum(edge.orientation().is_forward());
            oriented.push(self.add(format!("ORIENTED_EDGE('',*,*,#{curve},{sense})")));
        }
        Ok(self.add(format!("EDGE_LOOP('',({}))", refs(&oriented))))
    }

    fn edge(&mut self, edge: &Shape) -> Result<u64> {
        let key = node(edge)?;
        if let Some(&id) = self.edges.get(&key) {
            return Ok(id);
        }
        let (start, end) = edge
            .oriented(Orientation::Forward)
            .edge_vertices()
            .ok_or_else(|| StepError::InvalidTopology("edge without vertices".into()))?;
        let (p, q) = (point(&start)?, point(&end)?);
        let v1 = self.vertex(&start)?;
        let v2 = self.vertex(&end)?;
        let curve = self.basis_curve(edge, &p, &q)?;
        let id = self.add(format!("EDGE_CURVE('',#{v1},#{v2},#{curve},.T.)"));
        self.edges.insert(key, id);
        Ok(id)
    }

    /// Unbounded curve under `edge`, which runs from `p` to `q`.
    fn basis_curve(&mut self, edge: &Shape, p: &Point3, q: &Point3) -> Result<u64> {
        let curve = match edge.curve() {
            Some(Curve::Line) => self.line(p, &(q - p)),
            Some(Curve::Degenerate) => self.line(p, &Vec3::zeros()),
            Some(Curve::Arc {
                center,
                axis,
                radius,
            }) => {
                let radial = p - center;
                let ref_direction = if radial.norm() > f64::EPSILON {
                    radial.normalize()
                } else {
                    perpendicular(axis)
                };
                let placement = self.placement(center, axis, &ref_direction);
                self.add(format!("CIRCLE('',#{placement},{})", real(*radius)))
            }
            None => return Err(StepError::InvalidTopology("edge without curve".into())),
        };
        Ok(curve)
    }

    /// `LINE` through `origin` along `span`; a zero span gives a zero
    /// magnitude, which marks a degenerate edge.
    fn line(&mut self, origin: &Point3, span: &Vec3) -> u64 {
        let length = span.norm();
        let direction = if length > f64::EPSILON { span / length } else { Vec3::x() };
        let pnt = self.add(write_cartesian_point(origin));
        let dir = self.add(write_direction(&direction));
        let vector = self.add(format!("VECTOR('',#{dir},{})", real(length)));
        self.add(format!("LINE('',#{pnt},#{vector})"))
    }

    fn vertex(&mut self, vertex: &Shape) -> Result<u64> {
        let key = node(vertex)?;
        if let Some(&id) = self.vertices.get(&key) {
            return Ok(id);
        }
        let p = self.add(write_cartesian_point(&point(vertex)?));
        let id = self.add(format!("VERTEX_POINT('',#{p})"));
        self.vertices.insert(key, id);
        Ok(id)
    }

    fn placement(&mut self, origin: &Point3, axis: &Vec3, ref_direction: &Vec3) -> u64 {
        let location = self.add(write_cartesian_point(origin));
        let z = self.add(write_direction(axis));
        let x = self.add(write_direction(ref_direction));
        self.add(format!("AXIS2_PLACEMENT_3D('',#{location},#{z},#{x})"))
    }
}

/// Check `shape` and list the items that become roots.
fn collect_roots(shape: &Shape, out: &mut Vec<Shape>) -> Result<()> {
    match shape.kind() {
        None => Err(StepError::NullShape),
        Some(ShapeKind::Compound) => {
            for member in shape.children() {
                collect_roots(member, out)?;
            }
            Ok(())
        }
        Some(ShapeKind::Solid) if shape.children().len() > 1 => Err(StepError::SolidWithVoids),
        Some(_) => {
            out.push(shape.clone());
            Ok(())
        }
    }
}

fn outer_shell(solid: &Shape) -> Result<&Shape> {
    solid
        .children()
        .first()
        .ok_or_else(|| StepError::InvalidTopology("solid without shell".into()))
}

fn node(shape: &Shape) -> Result<NodeId> {
    shape.node_id().ok_or(StepError::NullShape)
}

fn point(vertex: &Shape) -> Result<Point3> {
    vertex
        .point()
        .ok_or_else(|| StepError::InvalidTopology("vertex without point".into()))
}

fn bool_enum(value: bool) -> &'static str {
    if value {
        ".T."
    } else {
        ".F."
    }
}

fn refs(ids: &[u64]) -> String {
    ids.iter().map(|id| format!("#{id}")).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StepFile, StepReader};
    use brepx_kernel_topo::{make_box, make_sphere, EdgeMaker, TopologyExplorer};

    fn read_back(writer: &StepWriter) -> Shape {
        let text = writer.to_step_string("test.step").unwrap();
        let mut reader = StepReader::new();
        reader.read_buffer(text.as_bytes()).unwrap();
        assert_eq!(reader.transfer_roots(), reader.nb_roots_for_transfer());
        reader.one_shape()
    }

    #[test]
    fn test_schema_names() {
        assert_eq!("ap203".parse::<StepSchema>().unwrap(), StepSchema::Ap203);
        assert_eq!("AP214CD".parse::<StepSchema>().unwrap(), StepSchema::Ap214Cd);
        assert!(matches!("AP242".parse::<StepSchema>(), Err(StepError::UnknownSchema(_))));
        assert_eq!(StepSchema::default(), StepSchema::Ap214Cd);
    }

    #[test]
    fn test_box_round_trip() {
        let mut writer = StepWriter::new(StepSchema::Ap203);
        assert_eq!(writer.transfer(&make_box(10.0, 20.0, 30.0).unwrap(), TransferMode::AsIs).unwrap(), 1);
        let shape = read_back(&writer);
        assert_eq!(shape.kind(), Some(ShapeKind::Solid));
        assert!(shape.is_closed());
        let topo = TopologyExplorer::new(&shape);
        assert_eq!(topo.number_of_faces(), 6);
        assert_eq!(topo.number_of_edges(), 12);
        assert_eq!(topo.number_of_vertices(), 8);
    }

    #[test]
    fn test_header_names_schema() {
        let mut writer = StepWriter::new(StepSchema::Ap214Cd);
        writer.transfer(&make_box(1.0, 1.0, 1.0).unwrap(), TransferMode::AsIs).unwrap();
        let text = writer.to_step_string("it's.step").unwrap();
        assert!(text.contains("'it''s.step'"));
        let file = StepFile::parse(text.as_bytes()).unwrap();
        assert_eq!(file.schema_names(), vec![StepSchema::Ap214Cd.file_schema().to_string()]);
    }

    #[test]
    fn test_sphere_keeps_seam_and_poles() {
        let mut writer = StepWriter::new(StepSchema::Ap214Cd);
        writer.transfer(&make_sphere(5.0).unwrap(), TransferMode::AsIs).unwrap();
        let shape = read_back(&writer);
        let topo = TopologyExplorer::new(&shape);
        assert_eq!(topo.number_of_faces(), 1);
        assert_eq!(topo.number_of_edges(), 3);
        assert_eq!(topo.number_of_vertices(), 2);
        assert_eq!(topo.edges().filter(|e| e.is_degenerate()).count(), 2);
        assert!(shape.is_closed());
    }

    #[test]
    fn test_accumulated_transfers() {
        let mut writer = StepWriter::new(StepSchema::Ap214Cd);
        writer.transfer(&make_box(1.0, 2.0, 3.0).unwrap(), TransferMode::AsIs).unwrap();
        writer.transfer(&make_sphere(1.0).unwrap(), TransferMode::AsIs).unwrap();
        let shape = read_back(&writer);
        assert_eq!(shape.kind(), Some(ShapeKind::Compound));
        let topo = TopologyExplorer::new(&shape);
        assert_eq!(topo.number_of_solids(), 2);
        assert_eq!(topo.number_of_faces(), 7);
    }

    #[test]
    fn test_shared_shape_written_once() {
        let b = make_box(1.0, 1.0, 1.0).unwrap();
        let mut writer = StepWriter::new(StepSchema::Ap214Cd);
        writer.transfer(&b, TransferMode::AsIs).unwrap();
        let size = writer.entities.len();
        writer.transfer(&b, TransferMode::AsIs).unwrap();
        assert_eq!(writer.entities.len(), size + 1);
        assert_eq!(writer.nb_roots(), 2);
    }

    #[test]
    fn test_shell_based_mode() {
        let mut writer = StepWriter::new(StepSchema::Ap203);
        writer
            .transfer(&make_box(1.0, 1.0, 1.0).unwrap(), TransferMode::ShellBasedSurfaceModel)
            .unwrap();
        let shape = read_back(&writer);
        assert_eq!(shape.kind(), Some(ShapeKind::Shell));
        assert_eq!(TopologyExplorer::new(&shape).number_of_faces(), 6);
    }

    #[test]
    fn test_rejected_transfer_leaves_model_unchanged() {
        let mut writer = StepWriter::new(StepSchema::Ap214Cd);
        assert!(matches!(writer.to_step_string("x"), Err(StepError::EmptyModel)));
        let edge = EdgeMaker::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).unwrap().shape();
        let b = make_box(1.0, 1.0, 1.0).unwrap();
        let mixed = Shape::compound(vec![b.clone(), edge]).unwrap();
        assert!(matches!(
            writer.transfer(&mixed, TransferMode::ShellBasedSurfaceModel),
            Err(StepError::UnsupportedShape(ShapeKind::Edge))
        ));
        assert!(matches!(writer.transfer(&Shape::null(), TransferMode::AsIs), Err(StepError::NullShape)));
        let shell = b.children()[0].clone();
        let hollow = Shape::solid(vec![shell.clone(), shell.reversed()]).unwrap();
        assert!(matches!(writer.transfer(&hollow, TransferMode::AsIs), Err(StepError::SolidWithVoids)));
        assert_eq!(writer.nb_roots(), 0);
        assert!(writer.entities.is_empty());
        assert!(writer.shells.is_empty() && writer.curves.is_empty());
    }

    #[test]
    fn test_wireframe_round_trip() {
        let edge = EdgeMaker::new(Point3::origin(), Point3::new(1.0, 2.0, 3.0)).unwrap().shape();
        let b = make_box(1.0, 2.0, 3.0).unwrap();
        let wire = TopologyExplorer::new(&b).wires().next().unwrap();
        let seam = TopologyExplorer::new(&make_sphere(2.0).unwrap())
            .edges()
            .find(|e| !e.is_degenerate())
            .unwrap();
        let vertex = Shape::vertex(Point3::new(4.0, 5.0, 6.0));

        let mut writer = StepWriter::new(StepSchema::Ap214Cd);
        let items = Shape::compound(vec![edge.reversed(), wire, seam, vertex]).unwrap();
        assert_eq!(writer.transfer(&items, TransferMode::AsIs).unwrap(), 4);
        let text = writer.to_step_string("wires.step").unwrap();
        assert_eq!(text.matches("GEOMETRIC_CURVE_SET").count(), 4);

        let mut reader = StepReader::new();
        reader.read_buffer(text.as_bytes()).unwrap();
        assert_eq!(reader.transfer_roots(), 4);
        let roots = reader.shapes();
        let kinds: Vec<_> = roots.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            [ShapeKind::Edge, ShapeKind::Wire, ShapeKind::Edge, ShapeKind::Vertex].map(Some)
        );

        let (start, end) = roots[0].edge_vertices().unwrap();
        assert_eq!(start.point(), Some(Point3::new(1.0, 2.0, 3.0)));
        assert_eq!(end.point(), Some(Point3::origin()));

        let topo = TopologyExplorer::new(&roots[1]);
        assert_eq!(topo.number_of_edges(), 4);
        assert_eq!(topo.number_of_vertices(), 4);

        match roots[2].curve() {
            Some(Curve::Arc { radius, .. }) => assert_eq!(*radius, 2.0),
            other => panic!("unexpected seam curve {other:?}"),
        }
        assert_eq!(roots[3].point(), Some(Point3::new(4.0, 5.0, 6.0)));
    }

    #[test]
    fn test_styled_round_trip() {
        let red = Color::new(1.0, 0.0, 0.0).unwrap();
        let green = Color::new(0.0, 1.0, 0.25).unwrap();
        let mut writer = StepWriter::new(StepSchema::Ap214Cd);
        let b = make_box(1.0, 1.0, 1.0).unwrap();
        let s = make_sphere(1.0).unwrap();
        writer
            .transfer_styled(&b, TransferMode::AsIs, &ShapeStyle::new().with_color(red).with_layer("red"))
            .unwrap();
        writer
            .transfer_styled(&s, TransferMode::AsIs, &ShapeStyle::new().with_color(green).with_layer("green"))
            .unwrap();
        writer.transfer(&b, TransferMode::AsIs).unwrap();
        writer
            .transfer_styled(&s, TransferMode::AsIs, &ShapeStyle::new().with_layer("red"))
            .unwrap();

        let text = writer.to_step_string("styled.step").unwrap();
        assert_eq!(text.matches("STYLED_ITEM").count(), 2);
        assert_eq!(text.matches("PRESENTATION_LAYER_ASSIGNMENT").count(), 2);

        let mut reader = StepReader::new();
        reader.read_buffer(text.as_bytes()).unwrap();
        assert_eq!(reader.transfer_roots(), 4);
        let styles = reader.styles();
        assert_eq!(styles.len(), reader.shapes().len());
        assert_eq!(styles[0], ShapeStyle::new().with_color(red).with_layer("red"));
        assert_eq!(styles[1], ShapeStyle::new().with_color(green).with_layer("green"));
        assert_eq!(styles[2], ShapeStyle::new());
        assert_eq!(styles[3], ShapeStyle::new().with_layer("red"));
    }

    #[test]
    fn test_ap203_drops_styles() {
        let mut writer = StepWriter::new(StepSchema::Ap203);
        let style = ShapeStyle::new()
            .with_color(Color::new(0.5, 0.5, 0.5).unwrap())
            .with_layer("grey");
        writer
            .transfer_styled(&make_box(1.0, 1.0, 1.0).unwrap(), TransferMode::AsIs, &style)
            .unwrap();
        let text = writer.to_step_string("plain.step").unwrap();
        assert!(!text.contains("STYLED_ITEM"));
        assert!(!text.contains("PRESENTATION_LAYER_ASSIGNMENT"));
    }

    #[test]
    fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.step");
        std::fs::write(&path, "stale").unwrap();
        let mut writer = StepWriter::new(StepSchema::Ap214Cd);
        writer.transfer(&make_box(1.0, 1.0, 1.0).unwrap(), TransferMode::AsIs).unwrap();
        writer.write(&path).unwrap();
        let mut reader = StepReader::new();
        reader.read_file(&path).unwrap();
        assert_eq!(reader.transfer_roots(), 1);
    }
}
