use std::io::Read;

use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::error::AmbianceError;

/// Global lighting and atmosphere of a frame, parsed from an ambiance preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbianceState {
    pub sky_color: Vec3,
    pub ambient_color: Vec3,
    pub sun_direction: Vec3,
    pub sun_color: Vec3,
    pub fog_color: Vec3,
    pub fog_near: f32,
    pub fog_far: f32,
    pub exposure: f32,
}

impl Default for AmbianceState {
    fn default() -> Self {
        Self {
            sky_color: Vec3::new(0.03, 0.03, 0.05),
            ambient_color: Vec3::splat(0.15),
            sun_direction: Vec3::new(0.0, -1.0, 0.0),
            sun_color: Vec3::ONE,
            fog_color: Vec3::splat(0.5),
            fog_near: 50.0,
            fog_far: 500.0,
            exposure: 1.0,
        }
    }
}

impl AmbianceState {
    /// Parses a preset from a byte stream.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, AmbianceError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let xml = String::from_utf8(bytes)?;
        Self::from_xml(&xml)
    }

    /// Parses a preset document. Elements that are absent keep their default.
    ///
    /// Colours are given as `r g b` in 0-255, vectors and scalars as plain
    /// floats.
    pub fn from_xml(xml: &str) -> Result<Self, AmbianceError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if !root.has_tag_name("ambiance") {
            return Err(AmbianceError::MissingRoot);
        }

        let defaults = Self::default();
        let sun_direction = parse_vec3(&root, "sunDirection", defaults.sun_direction)?;
        Ok(Self {
            sky_color: parse_color(&root, "skyColor", defaults.sky_color)?,
            ambient_color: parse_color(&root, "ambientColor", defaults.ambient_color)?,
            sun_direction: sun_direction.normalize_or_zero(),
            sun_color: parse_color(&root, "sunColor", defaults.sun_color)?,
            fog_color: parse_color(&root, "fogColor", defaults.fog_color)?,
            fog_near: parse_f32(&root, "fogNear", defaults.fog_near)?,
            fog_far: parse_f32(&root, "fogFar", defaults.fog_far)?,
            exposure: parse_f32(&root, "exposure", defaults.exposure)?,
        })
    }
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn invalid(tag: &str, value: &str) -> AmbianceError {
    AmbianceError::InvalidValue {
        tag: tag.to_string(),
        value: value.to_string(),
    }
}

fn parse_components(node: &Node<'_, '_>, tag: &str) -> Result<Option<Vec3>, AmbianceError> {
    let Some(value) = optional_text(node, tag) else {
        return Ok(None);
    };
    let numbers = value
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid(tag, &value))?;
    match numbers.as_slice() {
        [x, y, z] => Ok(Some(Vec3::new(*x, *y, *z))),
        _ => Err(invalid(tag, &value)),
    }
}

fn parse_vec3(node: &Node<'_, '_>, tag: &str, default: Vec3) -> Result<Vec3, AmbianceError> {
    Ok(parse_components(node, tag)?.unwrap_or(default))
}

fn parse_color(node: &Node<'_, '_>, tag: &str, default: Vec3) -> Result<Vec3, AmbianceError> {
    Ok(parse_components(node, tag)?
        .map(|rgb| rgb / 255.0)
        .unwrap_or(default))
}

fn parse_f32(node: &Node<'_, '_>, tag: &str, default: f32) -> Result<f32, AmbianceError> {
    match optional_text(node, tag) {
        Some(value) => value.parse::<f32>().map_err(|_| invalid(tag, &value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESET: &str = r#"
    <ambiance>
        <skyColor>51 102 204</skyColor>
        <sunDirection>0 -2 0</sunDirection>
        <fogNear>10</fogNear>
        <fogFar>80.5</fogFar>
        <exposure>1.25</exposure>
    </ambiance>
    "#;

    #[test]
    fn parse_preset_overrides_defaults() {
        let ambiance = AmbianceState::from_xml(PRESET).unwrap();
        assert_eq!(ambiance.sky_color, Vec3::new(0.2, 0.4, 0.8));
        assert_eq!(ambiance.sun_direction, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(ambiance.fog_near, 10.0);
        assert_eq!(ambiance.fog_far, 80.5);
        assert_eq!(ambiance.exposure, 1.25);
        assert_eq!(ambiance.ambient_color, AmbianceState::default().ambient_color);
    }

    #[test]
    fn from_reader_accepts_byte_streams() {
        let ambiance = AmbianceState::from_reader(PRESET.as_bytes()).unwrap();
        assert_eq!(ambiance.exposure, 1.25);
    }

    #[test]
    fn wrong_root_is_rejected() {
        let err = AmbianceState::from_xml("<scene/>").unwrap_err();
        assert!(matches!(err, AmbianceError::MissingRoot));
    }

    #[test]
    fn malformed_values_name_the_tag() {
        let err = AmbianceState::from_xml("<ambiance><fogColor>1 2</fogColor></ambiance>")
            .unwrap_err();
        match err {
            AmbianceError::InvalidValue { tag, .. } => assert_eq!(tag, "fogColor"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
