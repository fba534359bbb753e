//! Animation clip model shared by both encoders.

use avarig_data::HandPosture;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::AnimResult;

/// Default clip and joint priority.
pub const DEFAULT_PRIORITY: i32 = 3;

/// A rotation key. Rotations are local to the joint's rest orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationKey {
    pub time: f32,
    pub rotation: Quat,
}

/// A location key, an offset in metres from the joint's rest position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionKey {
    pub time: f32,
    pub position: Vec3,
}

/// Keys of one joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointTrack {
    /// Avatar bone name (`mPelvis`).
    pub name: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub rotations: Vec<RotationKey>,
    #[serde(default)]
    pub positions: Vec<PositionKey>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl JointTrack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: DEFAULT_PRIORITY,
            rotations: Vec::new(),
            positions: Vec::new(),
        }
    }

    pub fn with_rotation(mut self, time: f32, rotation: Quat) -> Self {
        self.rotations.push(RotationKey { time, rotation });
        self
    }

    pub fn with_position(mut self, time: f32, position: Vec3) -> Self {
        self.positions.push(PositionKey { time, position });
        self
    }

    /// Rotation at `time`, spherically interpolated between keys and held
    /// before the first and after the last key.
    pub fn rotation_at(&self, time: f32) -> Quat {
        sample(&self.rotations, time, |k| k.time, |k| k.rotation, Quat::IDENTITY, |a, b, t| {
            a.slerp(b, t)
        })
    }

    /// Location offset at `time`, linearly interpolated.
    pub fn position_at(&self, time: f32) -> Vec3 {
        sample(&self.positions, time, |k| k.time, |k| k.position, Vec3::ZERO, |a, b, t| {
            a.lerp(b, t)
        })
    }
}

fn sample<K, V: Copy>(
    keys: &[K],
    time: f32,
    time_of: impl Fn(&K) -> f32,
    value_of: impl Fn(&K) -> V,
    empty: V,
    mix: impl Fn(V, V, f32) -> V,
) -> V {
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return empty;
    };
    if time <= time_of(first) {
        return value_of(first);
    }
    if time >= time_of(last) {
        return value_of(last);
    }
    for pair in keys.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if time <= time_of(b) {
            let span = time_of(b) - time_of(a);
            let t = if span > 0.0 { (time - time_of(a)) / span } else { 1.0 };
            return mix(value_of(a), value_of(b), t);
        }
    }
    value_of(last)
}

/// A complete clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimClip {
    pub priority: i32,
    /// Length in seconds.
    pub duration: f32,
    /// Facial emote played with the clip; empty for none.
    pub emote: String,
    pub loop_in: f32,
    pub loop_out: f32,
    pub looped: bool,
    pub ease_in: f32,
    pub ease_out: f32,
    pub hand_posture: HandPosture,
    pub joints: Vec<JointTrack>,
}

impl Default for AnimClip {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            duration: 0.0,
            emote: String::new(),
            loop_in: 0.0,
            loop_out: 0.0,
            looped: false,
            ease_in: 0.8,
            ease_out: 0.8,
            hand_posture: HandPosture::default(),
            joints: Vec::new(),
        }
    }
}

impl AnimClip {
    /// Creates an empty clip of the given length that loops over its whole
    /// duration when looping is enabled.
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            loop_out: duration,
            ..Self::default()
        }
    }

    /// Parses a JSON clip description.
    pub fn from_json(text: &str) -> AnimResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_joint(mut self, track: JointTrack) -> Self {
        self.joints.push(track);
        self
    }

    /// Looks up the track of a joint.
    pub fn joint(&self, name: &str) -> Option<&JointTrack> {
        self.joints.iter().find(|j| j.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sampling_holds_and_interpolates() {
        let track = JointTrack::new("mPelvis")
            .with_position(0.0, Vec3::ZERO)
            .with_position(1.0, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(track.position_at(-1.0), Vec3::ZERO);
        assert_eq!(track.position_at(0.25), Vec3::new(0.0, 0.0, 0.25));
        assert_eq!(track.position_at(3.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(JointTrack::new("x").rotation_at(0.5), Quat::IDENTITY);
    }

    #[test]
    fn test_rotation_slerp_midpoint() {
        let track = JointTrack::new("mHead")
            .with_rotation(0.0, Quat::IDENTITY)
            .with_rotation(2.0, Quat::from_rotation_z(1.0));
        let mid = track.rotation_at(1.0);
        assert!(mid.angle_between(Quat::from_rotation_z(0.5)) < 1e-5);
    }

    #[test]
    fn test_json_defaults() {
        let clip = AnimClip::from_json(
            r#"{"duration": 2.0, "joints": [{"name": "mPelvis", "rotations": [{"time": 0.0, "rotation": [0.0, 0.0, 0.0, 1.0]}]}]}"#,
        )
        .unwrap();
        assert_eq!(clip.priority, DEFAULT_PRIORITY);
        assert_eq!(clip.ease_in, 0.8);
        assert_eq!(clip.joint("mPelvis").unwrap().priority, DEFAULT_PRIORITY);
        assert_eq!(clip.joint("mPelvis").unwrap().rotations[0].rotation, Quat::IDENTITY);
        assert!(AnimClip::from_json("{\"duration\": \"long\"}").is_err());
    }
}
