//! Minimal pose types carried by planning and navigation requests.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Orientation as a unit quaternion. The default is the identity rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

impl Pose {
    /// A pose at `(x, y, z)` with identity orientation.
    pub fn from_position(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Point { x, y, z },
            orientation: Quaternion::default(),
        }
    }
}

/// A [`Pose`] expressed in a named reference frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseStamped {
    pub frame_id: String,
    pub pose: Pose,
}

impl PoseStamped {
    pub fn new(frame_id: impl Into<String>, pose: Pose) -> Self {
        Self {
            frame_id: frame_id.into(),
            pose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_orientation_is_identity() {
        let pose = Pose::default();
        assert!((pose.orientation.w - 1.0).abs() < f64::EPSILON);
        assert!(pose.orientation.x.abs() < f64::EPSILON);
    }

    #[test]
    fn from_position_keeps_coordinates() {
        let pose = Pose::from_position(0.4, -0.2, 1.1);
        assert!((pose.position.x - 0.4).abs() < f64::EPSILON);
        assert!((pose.position.y + 0.2).abs() < f64::EPSILON);
        assert!((pose.position.z - 1.1).abs() < f64::EPSILON);
    }
}
