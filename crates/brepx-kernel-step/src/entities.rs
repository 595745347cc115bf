//! Typed access to entity arguments, and the geometry entities shared by
//! the reader and the writer.

use brepx_kernel_topo::{Point3, Vec3};

use crate::error::{Result, StepError};
use crate::parser::{StepEntity, StepFile, StepValue};

/// Helper trait for extracting argument values from STEP entities.
pub trait EntityArgs {
    /// Argument at `idx`, failing when absent.
    fn arg(&self, idx: usize) -> Result<&StepValue>;

    /// Required real argument.
    fn real(&self, idx: usize) -> Result<f64>;

    /// Required enumeration argument.
    fn enumeration(&self, idx: usize) -> Result<&str>;

    /// Required boolean (`.T.` / `.F.`) argument.
    fn boolean(&self, idx: usize) -> Result<bool>;

    /// Required entity reference.
    fn entity_ref(&self, idx: usize) -> Result<u64>;

    /// Required list of reals.
    fn real_list(&self, idx: usize) -> Result<Vec<f64>>;

    /// Required list of entity references.
    fn entity_ref_list(&self, idx: usize) -> Result<Vec<u64>>;

    /// `true` when the argument is `$` or absent.
    fn is_null(&self, idx: usize) -> bool;
}

impl StepEntity {
    fn expected(&self, what: &str, idx: usize) -> StepError {
        StepError::bad_argument(self.id, format!("expected {what} at arg {idx} of {}", self.type_name))
    }
}

impl EntityArgs for StepEntity {
    fn arg(&self, idx: usize) -> Result<&StepValue> {
        self.args.get(idx).ok_or_else(|| self.expected("a value", idx))
    }

    fn real(&self, idx: usize) -> Result<f64> {
        self.arg(idx)?.as_real().ok_or_else(|| self.expected("a real", idx))
    }

    fn enumeration(&self, idx: usize) -> Result<&str> {
        self.arg(idx)?
            .as_enum()
            .ok_or_else(|| self.expected("an enumeration", idx))
    }

    fn boolean(&self, idx: usize) -> Result<bool> {
        match self.enumeration(idx)? {
            "T" | "TRUE" => Ok(true),
            "F" | "FALSE" => Ok(false),
            _ => Err(self.expected("a boolean", idx)),
        }
    }

    fn entity_ref(&self, idx: usize) -> Result<u64> {
        self.arg(idx)?
            .as_entity_ref()
            .ok_or_else(|| self.expected("an entity reference", idx))
    }

    fn real_list(&self, idx: usize) -> Result<Vec<f64>> {
        let list = self.arg(idx)?.as_list().ok_or_else(|| self.expected("a list", idx))?;
        list.iter()
            .map(|v| v.as_real().ok_or_else(|| self.expected("a list of reals", idx)))
            .collect()
    }

    fn entity_ref_list(&self, idx: usize) -> Result<Vec<u64>> {
        let list = self.arg(idx)?.as_list().ok_or_else(|| self.expected("a list", idx))?;
        list.iter()
            .map(|v| {
                v.as_entity_ref()
                    .ok_or_else(|| self.expected("a list of references", idx))
            })
            .collect()
    }

    fn is_null(&self, idx: usize) -> bool {
        self.args.get(idx).map_or(true, StepValue::is_null)
    }
}

/// Require entity `id` to have type `expected`.
pub fn require_entity<'a>(file: &'a StepFile, id: u64, expected: &str) -> Result<&'a StepEntity> {
    let entity = file.require(id)?;
    if entity.type_name != expected {
        return Err(StepError::type_mismatch(id, expected, &entity.type_name));
    }
    Ok(entity)
}

fn xyz(entity: &StepEntity) -> Result<[f64; 3]> {
    match entity.real_list(1)?.as_slice() {
        [x, y, z, ..] => Ok([*x, *y, *z]),
        short => Err(StepError::bad_argument(
            entity.id,
            format!("{} needs 3 coordinates, got {}", entity.type_name, short.len()),
        )),
    }
}

/// Parse a `CARTESIAN_POINT(name, (x, y, z))`.
pub fn parse_cartesian_point(file: &StepFile, id: u64) -> Result<Point3> {
    let [x, y, z] = xyz(require_entity(file, id, "CARTESIAN_POINT")?)?;
    Ok(Point3::new(x, y, z))
}

/// Parse a `DIRECTION(name, (x, y, z))`, normalized.
pub fn parse_direction(file: &StepFile, id: u64) -> Result<Vec3> {
    let [x, y, z] = xyz(require_entity(file, id, "DIRECTION")?)?;
    let v = Vec3::new(x, y, z);
    if v.norm() <= f64::EPSILON {
        return Err(StepError::bad_argument(id, "zero-length direction"));
    }
    Ok(v.normalize())
}

/// Parse a `VECTOR(name, direction, magnitude)` into direction and magnitude.
pub fn parse_vector(file: &StepFile, id: u64) -> Result<(Vec3, f64)> {
    let entity = require_entity(file, id, "VECTOR")?;
    let direction = parse_direction(file, entity.entity_ref(1)?)?;
    Ok((direction, entity.real(2)?))
}

/// A resolved `AXIS2_PLACEMENT_3D`.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Origin.
    pub location: Point3,
    /// Z axis, `+Z` when unset.
    pub axis: Vec3,
    /// X axis, derived from the Z axis when unset.
    pub ref_direction: Vec3,
}

/// Parse an `AXIS2_PLACEMENT_3D(name, location, axis, ref_direction)`.
pub fn parse_axis2_placement_3d(file: &StepFile, id: u64) -> Result<Placement> {
    let entity = require_entity(file, id, "AXIS2_PLACEMENT_3D")?;
    let location = parse_cartesian_point(file, entity.entity_ref(1)?)?;
    let axis = if entity.is_null(2) {
        Vec3::z()
    } else {
        parse_direction(file, entity.entity_ref(2)?)?
    };
    let ref_direction = if entity.is_null(3) {
        perpendicular(&axis)
    } else {
        parse_direction(file, entity.entity_ref(3)?)?
    };
    Ok(Placement {
        location,
        axis,
        ref_direction,
    })
}

/// A unit vector perpendicular to the unit vector `z`.
pub fn perpendicular(z: &Vec3) -> Vec3 {
    let seed = if z.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    (seed - z * seed.dot(z)).normalize()
}

/// Format a real the way Part 21 expects (always with a decimal point).
pub fn real(v: f64) -> String {
    format!("{v:.15E}")
}

/// Quote a string, doubling embedded quotes.
pub fn quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Entity text for a `CARTESIAN_POINT` (without id).
pub fn write_cartesian_point(p: &Point3) -> String {
    format!("CARTESIAN_POINT('', ({}, {}, {}))", real(p.x), real(p.y), real(p.z))
}

/// Entity text for a `DIRECTION` (without id).
pub fn write_direction(d: &Vec3) -> String {
    format!("DIRECTION('', ({}, {}, {}))", real(d.x), real(d.y), real(d.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse_step(data: &str) -> StepFile {
        let text = format!("ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n{data}\nENDSEC;\nEND-ISO-10303-21;\n");
        StepFile::parse(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_placement_defaults() {
        let file = parse_step(
            "#1 = CARTESIAN_POINT('', (1., 2., 3.));\n\
             #2 = DIRECTION('', (0., 0., 2.));\n\
             #3 = AXIS2_PLACEMENT_3D('', #1, #2, $);",
        );
        let p = parse_axis2_placement_3d(&file, 3).unwrap();
        assert_eq!(p.location, Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(p.axis, Vec3::z());
        assert_relative_eq!(p.ref_direction.dot(&p.axis), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_type_mismatch_and_bad_arguments() {
        let file = parse_step(
            "#1 = DIRECTION('', (1., 0., 0.));\n\
             #2 = CARTESIAN_POINT('', (1., 2.));\n\
             #3 = DIRECTION('', (0., 0., 0.));",
        );
        assert!(matches!(
            parse_cartesian_point(&file, 1),
            Err(StepError::TypeMismatch { entity_id: 1, .. })
        ));
        assert!(matches!(
            parse_cartesian_point(&file, 2),
            Err(StepError::BadArgument { entity_id: 2, .. })
        ));
        assert!(parse_direction(&file, 3).is_err());
    }

    #[test]
    fn test_written_reals_parse_back() {
        let text = write_cartesian_point(&Point3::new(10.0, -0.5, 1e-7));
        let file = parse_step(&format!("#1 = {text};"));
        let p = parse_cartesian_point(&file, 1).unwrap();
        assert_relative_eq!(p, Point3::new(10.0, -0.5, 1e-7));
        assert_eq!(quoted("it's"), "'it''s'");
    }
}
