//! Panel placement relative to the marker origin

use nalgebra::{Matrix4, Rotation3, Translation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// Rotation axis in marker space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    fn unit(&self) -> Unit<Vector3<f64>> {
        match self {
            Axis::X => Vector3::x_axis(),
            Axis::Y => Vector3::y_axis(),
            Axis::Z => Vector3::z_axis(),
        }
    }
}

/// Fixed offset, scale and rotation of the panel in marker units.
///
/// Configured once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelAnchor {
    position: Vector3<f64>,
    scale: Vector3<f64>,
    rotation_axis: Axis,
    /// Degrees
    rotation_angle: f64,
}

impl Default for PanelAnchor {
    /// Centred on a 184x274 target, lifted slightly off its surface
    fn default() -> Self {
        Self {
            position: Vector3::new(92.0, 137.0, 2.0),
            scale: Vector3::new(184.0, 274.0, 1.0),
            rotation_axis: Axis::Z,
            rotation_angle: 0.0,
        }
    }
}

impl PanelAnchor {
    pub fn new(
        position: Vector3<f64>,
        scale: Vector3<f64>,
        rotation_axis: Axis,
        rotation_angle: f64,
    ) -> Self {
        Self {
            position,
            scale,
            rotation_axis,
            rotation_angle,
        }
    }

    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    pub fn scale(&self) -> &Vector3<f64> {
        &self.scale
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&self.rotation_axis.unit(), self.rotation_angle.to_radians())
    }

    /// Translation * rotation * scale, in marker space
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        Translation3::from(self.position).to_homogeneous()
            * self.rotation().to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_default_anchor_places_panel_centre() {
        let anchor = PanelAnchor::default();
        let centre = anchor.to_homogeneous().transform_point(&Point3::origin());
        assert_relative_eq!(centre, Point3::new(92.0, 137.0, 2.0), epsilon = 1e-12);

        let corner = anchor.to_homogeneous().transform_point(&Point3::new(0.5, 0.5, 0.0));
        assert_relative_eq!(corner, Point3::new(184.0, 274.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_applied_before_translation() {
        let anchor = PanelAnchor::new(
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            Axis::Z,
            90.0,
        );
        let p = anchor.to_homogeneous().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(10.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_deserialize_partial() {
        let anchor: PanelAnchor =
            serde_json::from_str(r#"{"rotation_axis": "x", "rotation_angle": 45.0}"#).unwrap();
        assert_eq!(anchor.position(), &Vector3::new(92.0, 137.0, 2.0));
        assert_relative_eq!(anchor.rotation().angle(), 45f64.to_radians(), epsilon = 1e-12);
    }
}
