//! Axis conventions and attribute parsing helpers.
//!
//! The data files use the viewer frame (x forward, y left, z up). The rig
//! frame faces -y with the character's left on +x. Positions and rotations
//! are converted with [`s2b`], scales (which are unsigned extents) with
//! [`s2b_scale`].

use glam::{DMat3, DQuat, DVec3, EulerRot};

use crate::error::{DataError, DataResult};

/// Converts a viewer-frame position into the rig frame.
pub fn s2b(v: DVec3) -> DVec3 {
    DVec3::new(v.y, -v.x, v.z)
}

/// Converts a rig-frame position back into the viewer frame.
pub fn b2s(v: DVec3) -> DVec3 {
    DVec3::new(-v.y, v.x, v.z)
}

/// Converts a viewer-frame scale triple into the rig frame.
pub fn s2b_scale(v: DVec3) -> DVec3 {
    DVec3::new(v.y, v.x, v.z)
}

/// Converts a viewer-frame Euler rotation (degrees) into rig-frame radians.
pub fn s2b_euler_degrees(v: DVec3) -> DVec3 {
    s2b(v) * std::f64::consts::PI / 180.0
}

/// Rotation matrix for a rig-frame XYZ Euler triple in radians.
pub fn euler_matrix(euler: DVec3) -> DMat3 {
    DMat3::from_quat(euler_quat(euler))
}

/// Quaternion for a rig-frame XYZ Euler triple in radians.
pub fn euler_quat(euler: DVec3) -> DQuat {
    DQuat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z)
}

/// Parses a whitespace separated triple such as `"0.000 0.000 1.067"`.
pub fn parse_vec3(attribute: &str, value: &str) -> DataResult<DVec3> {
    let mut parts = value.split_whitespace().map(|p| {
        p.parse::<f64>()
            .map_err(|_| DataError::invalid_number(attribute, value))
    });
    let mut next = || {
        parts
            .next()
            .unwrap_or_else(|| Err(DataError::invalid_number(attribute, value)))
    };
    let v = DVec3::new(next()?, next()?, next()?);
    Ok(v)
}

/// Parses a single floating point attribute. Leading dots (`".5"`) are valid.
pub fn parse_f64(attribute: &str, value: &str) -> DataResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| DataError::invalid_number(attribute, value))
}

/// Parses an XML boolean attribute (`true`/`false`, `1`/`0`).
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "true" | "TRUE" | "True" | "1")
}
