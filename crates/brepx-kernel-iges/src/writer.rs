//! IGES writer: translates shapes into entities and serializes the model.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use brepx_kernel_topo::{Curve, NodeId, Orientation, Point3, Shape, ShapeKind, Surface, TopologyExplorer, Vec3};

use crate::error::{IgesError, Result};
use crate::record::{de_pointer, Entity, IgesFile, Param};

/// IGES version written to the global section.
///
/// 5.1 writes faces as independent trimmed surfaces (faces mode); 5.3
/// writes the B-rep entities 186/514 with shared vertex and edge lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IgesVersion {
    /// IGES 5.1, version flag 10.
    #[default]
    V5_1,
    /// IGES 5.3, version flag 11.
    V5_3,
}

impl IgesVersion {
    /// All supported versions.
    pub const ALL: [IgesVersion; 2] = [IgesVersion::V5_1, IgesVersion::V5_3];

    /// Version string, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            IgesVersion::V5_1 => "5.1",
            IgesVersion::V5_3 => "5.3",
        }
    }

    /// Global section parameter 23.
    pub fn flag(self) -> i64 {
        match self {
            IgesVersion::V5_1 => 10,
            IgesVersion::V5_3 => 11,
        }
    }

    /// Version for a global section flag.
    pub fn from_flag(flag: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.flag() == flag)
    }

    /// `true` when solids are written as B-rep objects.
    pub fn brep_mode(self) -> bool {
        self == IgesVersion::V5_3
    }
}

impl fmt::Display for IgesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IgesVersion {
    type Err = IgesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.name() == s.trim())
            .ok_or_else(|| IgesError::UnknownVersion(s.to_string()))
    }
}

/// Writer session accumulating shapes into one IGES model.
#[derive(Debug, Default)]
pub struct IgesWriter {
    version: IgesVersion,
    entities: Vec<Entity>,
    roots: usize,
    shapes: Vec<Shape>,
}

impl IgesWriter {
    /// Create an empty model.
    pub fn new(version: IgesVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Version written to the global section.
    pub fn version(&self) -> IgesVersion {
        self.version
    }

    /// Number of independent entities in the model.
    pub fn nb_roots(&self) -> usize {
        self.roots
    }

    /// Shapes added so far.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Translate `shape` into the model. The model is unchanged on error.
    ///
    /// Wires become composite curves (102), edges lines (110) or arcs
    /// (100), and vertices points (116), in either version.
    pub fn add_shape(&mut self, shape: &Shape) -> Result<()> {
        let mut items = Vec::new();
        collect_roots(shape, &mut items)?;
        let (surfaces, wireframe): (Vec<Shape>, Vec<Shape>) = items
            .into_iter()
            .partition(|item| matches!(item.kind(), Some(ShapeKind::Solid | ShapeKind::Shell | ShapeKind::Face)));
        let mut builder = Builder::new(self.entities.len());
        let mut roots = 0;

        if self.version.brep_mode() {
            if !surfaces.is_empty() {
                builder.open_lists();
                for item in &surfaces {
                    let index = match item.kind() {
                        Some(ShapeKind::Solid) => builder.solid(item)?,
                        Some(ShapeKind::Shell) => builder.shell(item)?,
                        _ => builder.face(item)?,
                    };
                    builder.entities[index].independent = true;
                    roots += 1;
                }
                builder.close_lists();
            }
        } else {
            for item in &surfaces {
                for face in TopologyExplorer::new(item).faces() {
                    builder.open_lists();
                    let index = builder.face(&face)?;
                    builder.entities[index].independent = true;
                    builder.close_lists();
                    roots += 1;
                }
            }
        }
        for item in &wireframe {
            let index = builder.wireframe(item)?;
            builder.entities[index].independent = true;
            roots += 1;
        }

        self.entities.extend(builder.entities);
        self.roots += roots;
        self.shapes.push(shape.clone());
        tracing::debug!(roots, entities = self.entities.len(), version = %self.version, "IGES shape added");
        Ok(())
    }

    /// Serialize the model, overwriting `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = self.to_iges_string(&name)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Serialize the model as 80-column text.
    pub fn to_iges_string(&self, file_name: &str) -> Result<String> {
        if self.roots == 0 {
            return Err(IgesError::EmptyModel);
        }
        let product = file_name
            .rsplit_once('.')
            .map_or(file_name, |(stem, _)| stem)
            .to_string();
        let stamp = chrono::Local::now().format("%Y%m%d.%H%M%S").to_string();
        let global = vec![
            Param::Str(",".into()),
            Param::Str(";".into()),
            Param::Str(product.clone()),
            Param::Str(file_name.to_string()),
            Param::Str("brepx".into()),
            Param::Str(format!("brepx {}", env!("CARGO_PKG_VERSION"))),
            Param::Int(32),
            Param::Int(38),
            Param::Int(6),
            Param::Int(308),
            Param::Int(15),
            Param::Str(product),
            Param::Real(1.0),
            Param::Int(2),
            Param::Str("MM".into()),
            Param::Int(1),
            Param::Real(1.0),
            Param::Str(stamp.clone()),
            Param::Real(1e-7),
            Param::Real(0.0),
            Param::Default,
            Param::Default,
            Param::Int(self.version.flag()),
            Param::Int(0),
            Param::Str(stamp),
        ];
        let file = IgesFile {
            start: format!("brepx IGES {} export", self.version),
            global,
            entities: self.entities.clone(),
        };
        Ok(file.to_text())
    }
}

/// Flatten compounds into the shapes that become independent entities.
fn collect_roots(shape: &Shape, out: &mut Vec<Shape>) -> Result<()> {
    match shape.kind() {
        None => Err(IgesError::NullShape),
        Some(ShapeKind::Compound) => {
            for member in shape.children() {
                collect_roots(member, out)?;
            }
            Ok(())
        }
        Some(_) => {
            out.push(shape.clone());
            Ok(())
        }
    }
}

/// Vertex and edge lists (502/504) currently being filled.
#[derive(Default)]
struct Lists {
    vertex_list: usize,
    edge_list: usize,
    vertices: HashMap<NodeId, i64>,
    coords: Vec<Point3>,
    edges: HashMap<NodeId, i64>,
    records: Vec<[i64; 5]>,
}

/// Entities produced by one `add_shape`, indexed from `base`.
struct Builder {
    base: usize,
    entities: Vec<Entity>,
    lists: Lists,
}

impl Builder {
    fn new(base: usize) -> Self {
        Self {
            base,
            entities: Vec::new(),
            lists: Lists::default(),
        }
    }

    fn ptr(&self, index: usize) -> i64 {
        de_pointer(self.base + index) as i64
    }

    fn push(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    fn push_ptr(&mut self, entity: Entity) -> i64 {
        let index = self.push(entity);
        self.ptr(index)
    }

    /// Reserve a fresh vertex list and edge list.
    fn open_lists(&mut self) {
        let vertex_list = self.push(Entity::new(502, 1, Vec::new()));
        let edge_list = self.push(Entity::new(504, 1, Vec::new()));
        self.lists = Lists {
            vertex_list,
            edge_list,
            ..Lists::default()
        };
    }

    fn close_lists(&mut self) {
        let lists = std::mem::take(&mut self.lists);

        let mut vertex_params = vec![Param::Int(lists.coords.len() as i64)];
        for p in &lists.coords {
            vertex_params.extend([Param::Real(p.x), Param::Real(p.y), Param::Real(p.z)]);
        }
        self.entities[lists.vertex_list].params = vertex_params;

        let mut edge_params = vec![Param::Int(lists.records.len() as i64)];
        for record in &lists.records {
            edge_params.extend(record.iter().map(|v| Param::Int(*v)));
        }
        self.entities[lists.edge_list].params = edge_params;
    }

    fn solid(&mut self, solid: &Shape) -> Result<usize> {
        let shells = solid
            .children()
            .iter()
            .map(|s| self.shell(s).map(|index| self.ptr(index)))
            .collect::<Result<Vec<_>>>()?;
        let (outer, voids) = shells
            .split_first()
            .ok_or_else(|| IgesError::InvalidTopology("solid without shell".into()))?;
        let mut params = vec![Param::Int(*outer), Param::Int(1), Param::Int(voids.len() as i64)];
        for void in voids {
            params.extend([Param::Int(*void), Param::Int(1)]);
        }
        Ok(self.push(Entity::new(186, 0, params)))
    }

    fn shell(&mut self, shell: &Shape) -> Result<usize> {
        let mut params = vec![Param::Int(shell.children().len() as i64)];
        for face in shell.children() {
            let index = self.face(face)?;
            let agrees = i64::from(face.orientation().is_forward());
            params.extend([Param::Int(self.ptr(index)), Param::Int(agrees)]);
        }
        let form = if shell.is_closed() { 1 } else { 2 };
        Ok(self.push(Entity::new(514, form, params)))
    }

    fn face(&mut self, face: &Shape) -> Result<usize> {
        let surface = match face.surface() {
            Some(Surface::Plane { origin, normal }) => {
                let point = self.point(origin);
                let normal = self.direction(normal);
                self.push_ptr(Entity::new(190, 0, vec![Param::Int(point), Param::Int(normal)]))
            }
            Some(Surface::Sphere { center, radius }) => {
                let center = self.point(center);
                self.push_ptr(Entity::new(196, 0, vec![Param::Int(center), Param::Real(*radius)]))
            }
            None => return Err(IgesError::InvalidTopology("face without surface".into())),
        };

        let loops = face
            .children()
            .iter()
            .map(|wire| self.edge_loop(wire))
            .collect::<Result<Vec<_>>>()?;
        let mut params = vec![
            Param::Int(surface),
            Param::Int(loops.len() as i64),
            Param::Int(1),
        ];
        params.extend(loops.into_iter().map(Param::Int));
        Ok(self.push(Entity::new(510, 1, params)))
    }

    fn edge_loop(&mut self, wire: &Shape) -> Result<i64> {
        let mut params = vec![Param::Int(wire.children().len() as i64)];
        for edge in wire.children() {
            let index = self.edge(edge)?;
            let agrees = i64::from(edge.orientation().is_forward());
            params.extend([
                Param::Int(0),
                Param::Int(self.ptr(self.lists.edge_list)),
                Param::Int(index),
                Param::Int(agrees),
                Param::Int(0),
            ]);
        }
        Ok(self.push_ptr(Entity::new(508, 1, params)))
    }

    /// Index of `edge` in the current edge list, adding it when new.
    fn edge(&mut self, edge: &Shape) -> Result<i64> {
        let key = edge
            .node_id()
            .ok_or_else(|| IgesError::InvalidTopology("null edge".into()))?;
        if let Some(&index) = self.lists.edges.get(&key) {
            return Ok(index);
        }
        let (start, end) = edge
            .oriented(Orientation::Forward)
            .edge_vertices()
            .ok_or_else(|| IgesError::InvalidTopology("edge without vertices".into()))?;
        let (p, q) = (point_of(&start)?, point_of(&end)?);
        let sv = self.vertex(&start, p)?;
        let tv = self.vertex(&end, q)?;

        let curve = self.curve(edge, &p, &q, false)?;
        let curve = self.ptr(curve);
        let list = self.ptr(self.lists.vertex_list);
        self.lists.records.push([curve, list, sv, list, tv]);
        let index = self.lists.records.len() as i64;
        self.lists.edges.insert(key, index);
        Ok(index)
    }

    fn vertex(&mut self, vertex: &Shape, p: Point3) -> Result<i64> {
        let key = vertex
            .node_id()
            .ok_or_else(|| IgesError::InvalidTopology("null vertex".into()))?;
        if let Some(&index) = self.lists.vertices.get(&key) {
            return Ok(index);
        }
        self.lists.coords.push(p);
        let index = self.lists.coords.len() as i64;
        self.lists.vertices.insert(key, index);
        Ok(index)
    }

    /// Standalone curve entity for a wire or an edge.
    fn wireframe(&mut self, item: &Shape) -> Result<usize> {
        match item.kind() {
            Some(ShapeKind::Vertex) => {
                let p = point_of(item)?;
                Ok(self.push(Entity::new(116, 0, vec![Param::Real(p.x), Param::Real(p.y), Param::Real(p.z)])))
            }
            Some(ShapeKind::Edge) => self.traversed_curve(item),
            Some(ShapeKind::Wire) => {
                let mut params = vec![Param::Int(item.children().len() as i64)];
                for edge in item.children() {
                    let index = self.traversed_curve(edge)?;
                    params.push(Param::Int(self.ptr(index)));
                }
                Ok(self.push(Entity::new(102, 0, params)))
            }
            kind => Err(IgesError::InvalidTopology(format!("{kind:?} as a curve"))),
        }
    }

    /// Curve following the edge in the direction this handle traverses it.
    fn traversed_curve(&mut self, edge: &Shape) -> Result<usize> {
        let (start, end) = edge
            .edge_vertices()
            .ok_or_else(|| IgesError::InvalidTopology("edge without vertices".into()))?;
        let reversed = !edge.orientation().is_forward();
        self.curve(edge, &point_of(&start)?, &point_of(&end)?, reversed)
    }

    /// Curve entity from `p` to `q`; `reversed` arcs run clockwise.
    fn curve(&mut self, edge: &Shape, p: &Point3, q: &Point3, reversed: bool) -> Result<usize> {
        match edge.curve() {
            Some(Curve::Line) => Ok(self.line(p, q)),
            Some(Curve::Degenerate) => Ok(self.line(p, p)),
            Some(Curve::Arc { center, axis, radius }) => {
                let axis = if reversed { -axis } else { *axis };
                Ok(self.arc(center, &axis, *radius, p, q))
            }
            None => Err(IgesError::InvalidTopology("edge without curve".into())),
        }
    }

    fn line(&mut self, p: &Point3, q: &Point3) -> usize {
        let params = [p.x, p.y, p.z, q.x, q.y, q.z].map(Param::Real).to_vec();
        self.push(Entity::new(110, 0, params))
    }

    /// Circular arc 100 in the XY plane of a 124 placement at `center`.
    fn arc(&mut self, center: &Point3, axis: &Vec3, radius: f64, p: &Point3, q: &Point3) -> usize {
        let z = axis.normalize();
        let radial = p - center;
        let x = if radial.norm() > f64::EPSILON {
            radial.normalize()
        } else {
            let seed = if z.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
            (seed - z * seed.dot(&z)).normalize()
        };
        let y = z.cross(&x);
        let matrix = [
            x.x, y.x, z.x, center.x, x.y, y.y, z.y, center.y, x.z, y.z, z.z, center.z,
        ];
        let transform = self.push_ptr(Entity::new(124, 0, matrix.map(Param::Real).to_vec()));

        let end = q - center;
        let params = [0.0, 0.0, 0.0, radius, 0.0, end.dot(&x), end.dot(&y)]
            .map(Param::Real)
            .to_vec();
        let mut arc = Entity::new(100, 0, params);
        arc.transform = transform as usize;
        self.push(arc)
    }

    fn point(&mut self, p: &Point3) -> i64 {
        self.push_ptr(Entity::new(116, 0, vec![Param::Real(p.x), Param::Real(p.y), Param::Real(p.z)]))
    }

    fn direction(&mut self, d: &Vec3) -> i64 {
        self.push_ptr(Entity::new(123, 0, vec![Param::Real(d.x), Param::Real(d.y), Param::Real(d.z)]))
    }
}

fn point_of(vertex: &Shape) -> Result<Point3> {
    vertex
        .point()
        .ok_or_else(|| IgesError::InvalidTopology("vertex without point".into()))
}
