//! Presentation attributes: surface colours and layer names.
//!
//! Colours are written as a `STYLED_ITEM` over a root, resolving to a
//! `COLOUR_RGB`. Layers are `PRESENTATION_LAYER_ASSIGNMENT` entities
//! listing their roots.

use std::collections::HashMap;

use crate::entities::EntityArgs;
use crate::error::{Result, StepError};
use crate::parser::{StepFile, StepValue};

// Steps from a STYLED_ITEM down to its COLOUR_RGB in a surface style chain.
const MAX_STYLE_DEPTH: usize = 8;

/// An RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    r: f64,
    g: f64,
    b: f64,
}

impl Color {
    /// Create a colour, rejecting components outside the unit interval.
    pub fn new(r: f64, g: f64, b: f64) -> Result<Self> {
        for c in [r, g, b] {
            if !(0.0..=1.0).contains(&c) {
                return Err(StepError::InvalidColor(c));
            }
        }
        Ok(Self { r, g, b })
    }

    /// Red component.
    pub fn r(&self) -> f64 {
        self.r
    }

    /// Green component.
    pub fn g(&self) -> f64 {
        self.g
    }

    /// Blue component.
    pub fn b(&self) -> f64 {
        self.b
    }
}

/// Colour and layer attached to a transferred root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeStyle {
    /// Surface colour.
    pub color: Option<Color>,
    /// Layer name.
    pub layer: Option<String>,
}

impl ShapeStyle {
    /// Unstyled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the colour.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Set the layer.
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// `true` when neither a colour nor a layer is set.
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.layer.is_none()
    }
}

/// Styles found in `file`, keyed by the id of the styled representation item.
pub(crate) fn read_styles(file: &StepFile) -> HashMap<u64, ShapeStyle> {
    let mut styles: HashMap<u64, ShapeStyle> = HashMap::new();

    for styled in file.entities_of_type("STYLED_ITEM") {
        let Ok(item) = styled.entity_ref(2) else {
            continue;
        };
        let color = styled
            .arg(1)
            .ok()
            .and_then(|styles| find_colour(file, styles, 0));
        if let Some(color) = color {
            styles.entry(item).or_default().color = Some(color);
        }
    }

    for layer in file.entities_of_type("PRESENTATION_LAYER_ASSIGNMENT") {
        let Some(name) = layer.arg(0).ok().and_then(StepValue::as_string) else {
            continue;
        };
        let Ok(items) = layer.entity_ref_list(2) else {
            tracing::debug!(entity = layer.id, "layer without an item list");
            continue;
        };
        for id in items {
            // Layers may list the styled item instead of the root.
            let item = match file.get(id) {
                Some(e) if e.type_name == "STYLED_ITEM" => e.entity_ref(2).unwrap_or(id),
                _ => id,
            };
            styles.entry(item).or_default().layer = Some(name.to_string());
        }
    }
    styles
}

fn find_colour(file: &StepFile, value: &StepValue, depth: usize) -> Option<Color> {
    if depth > MAX_STYLE_DEPTH {
        return None;
    }
    match value {
        StepValue::List(values) => values.iter().find_map(|v| find_colour(file, v, depth + 1)),
        StepValue::EntityRef(id) => {
            let entity = file.get(*id)?;
            if entity.type_name == "COLOUR_RGB" {
                let components = (entity.real(1), entity.real(2), entity.real(3));
                return match components {
                    (Ok(r), Ok(g), Ok(b)) => match Color::new(r, g, b) {
                        Ok(color) => Some(color),
                        Err(e) => {
                            tracing::debug!(entity = id, error = %e, "colour ignored");
                            None
                        }
                    },
                    _ => None,
                };
            }
            entity.args.iter().find_map(|v| find_colour(file, v, depth + 1))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_range() {
        let red = Color::new(1.0, 0.0, 0.0).unwrap();
        assert_eq!((red.r(), red.g(), red.b()), (1.0, 0.0, 0.0));
        assert!(matches!(Color::new(1.5, 0.0, 0.0), Err(StepError::InvalidColor(c)) if c == 1.5));
        assert!(Color::new(0.0, -0.1, 0.0).is_err());
        assert!(Color::new(0.0, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_read_styles() {
        let text = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n\
            #1=CARTESIAN_POINT('',(0.,0.,0.));\n\
            #2=COLOUR_RGB('',0.,1.,0.);\n\
            #3=FILL_AREA_STYLE_COLOUR('',#2);\n\
            #4=FILL_AREA_STYLE('',(#3));\n\
            #5=SURFACE_STYLE_FILL_AREA(#4);\n\
            #6=SURFACE_SIDE_STYLE('',(#5));\n\
            #7=SURFACE_STYLE_USAGE(.BOTH.,#6);\n\
            #8=PRESENTATION_STYLE_ASSIGNMENT((#7));\n\
            #9=STYLED_ITEM('color',(#8),#1);\n\
            #10=PRESENTATION_LAYER_ASSIGNMENT('green','',(#9));\n\
            #11=COLOUR_RGB('',2.,0.,0.);\n\
            #12=STYLED_ITEM('color',(#11),#20);\n\
            ENDSEC;\nEND-ISO-10303-21;\n";
        let file = StepFile::parse(text.as_bytes()).unwrap();
        let styles = read_styles(&file);
        let expected = ShapeStyle::new()
            .with_color(Color::new(0.0, 1.0, 0.0).unwrap())
            .with_layer("green");
        assert_eq!(styles.get(&1), Some(&expected));
        // Out-of-range colours are dropped.
        assert_eq!(styles.get(&20), None);
    }
}
