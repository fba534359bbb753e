//! Binary `.anim` clips.
//!
//! Little-endian layout:
//!
//! ```text
//! u16 version, u16 sub_version, i32 priority, f32 duration, cstr emote,
//! f32 loop_in, f32 loop_out, i32 loop, f32 ease_in, f32 ease_out,
//! i32 hand_posture, i32 joint_count,
//!   joint: cstr name, i32 priority,
//!          i32 rot_count, rot_count x [u16 time, u16 x, u16 y, u16 z],
//!          i32 pos_count, pos_count x [u16 time, u16 x, u16 y, u16 z],
//! i32 constraint_count
//! ```
//!
//! Times are quantized over `[0, duration]`, rotation components over
//! `[-1, 1]` and locations over `[-LL_MAX_PELVIS_OFFSET, LL_MAX_PELVIS_OFFSET]`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use avarig_data::HandPosture;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Quat, Vec3};
use log::{debug, warn};

use crate::clip::{AnimClip, JointTrack, PositionKey, RotationKey};
use crate::error::{AnimError, AnimResult};

/// Format version.
pub const ANIM_VERSION: u16 = 1;

/// Format sub-version.
pub const ANIM_SUB_VERSION: u16 = 0;

/// Largest location offset, in metres, a clip can carry.
pub const LL_MAX_PELVIS_OFFSET: f32 = 5.0;

/// Largest number of keys per channel.
pub const MAX_KEYS: usize = u16::MAX as usize;

/// Quantizes `value` into `[lower, upper]`.
pub fn quantize(value: f32, lower: f32, upper: f32) -> u16 {
    if upper <= lower {
        return 0;
    }
    let v = value.clamp(lower, upper);
    ((v - lower) / (upper - lower) * 65535.0).round() as u16
}

/// Inverse of [`quantize`]. Values within one step of zero decode to zero.
pub fn dequantize(quantized: u16, lower: f32, upper: f32) -> f32 {
    if upper <= lower {
        return lower;
    }
    let step = (upper - lower) / 65535.0;
    let v = quantized as f32 * step + lower;
    if v.abs() < step {
        0.0
    } else {
        v
    }
}

/// Writes a clip.
pub fn encode<W: Write>(clip: &AnimClip, writer: &mut W) -> AnimResult<()> {
    writer.write_u16::<LittleEndian>(ANIM_VERSION)?;
    writer.write_u16::<LittleEndian>(ANIM_SUB_VERSION)?;
    writer.write_i32::<LittleEndian>(clip.priority)?;
    writer.write_f32::<LittleEndian>(clip.duration)?;
    write_cstr(writer, &clip.emote)?;
    writer.write_f32::<LittleEndian>(clip.loop_in)?;
    writer.write_f32::<LittleEndian>(clip.loop_out)?;
    writer.write_i32::<LittleEndian>(i32::from(clip.looped))?;
    writer.write_f32::<LittleEndian>(clip.ease_in)?;
    writer.write_f32::<LittleEndian>(clip.ease_out)?;
    writer.write_i32::<LittleEndian>(clip.hand_posture.code())?;
    writer.write_i32::<LittleEndian>(count(clip.joints.len(), "joints")?)?;

    for joint in &clip.joints {
        write_joint(writer, joint, clip.duration)?;
    }
    writer.write_i32::<LittleEndian>(0)?;
    Ok(())
}

fn write_joint<W: Write>(writer: &mut W, joint: &JointTrack, duration: f32) -> AnimResult<()> {
    for len in [joint.rotations.len(), joint.positions.len()] {
        if len > MAX_KEYS {
            return Err(AnimError::TooManyKeys {
                joint: joint.name.clone(),
                count: len,
                max: MAX_KEYS,
            });
        }
    }
    write_cstr(writer, &joint.name)?;
    writer.write_i32::<LittleEndian>(joint.priority)?;

    writer.write_i32::<LittleEndian>(count(joint.rotations.len(), &joint.name)?)?;
    for key in &joint.rotations {
        let mut q = key.rotation.normalize();
        if q.w < 0.0 {
            q = -q;
        }
        writer.write_u16::<LittleEndian>(quantize(key.time, 0.0, duration))?;
        for c in [q.x, q.y, q.z] {
            writer.write_u16::<LittleEndian>(quantize(c, -1.0, 1.0))?;
        }
    }

    writer.write_i32::<LittleEndian>(count(joint.positions.len(), &joint.name)?)?;
    for key in &joint.positions {
        writer.write_u16::<LittleEndian>(quantize(key.time, 0.0, duration))?;
        for c in key.position.to_array() {
            writer.write_u16::<LittleEndian>(quantize(c, -LL_MAX_PELVIS_OFFSET, LL_MAX_PELVIS_OFFSET))?;
        }
    }
    Ok(())
}

fn count(len: usize, what: &str) -> AnimResult<i32> {
    i32::try_from(len).map_err(|_| AnimError::TooManyKeys {
        joint: what.to_string(),
        count: len,
        max: i32::MAX as usize,
    })
}

fn write_cstr<W: Write>(writer: &mut W, text: &str) -> io::Result<()> {
    let bytes = text.as_bytes();
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    writer.write_all(&bytes[..end])?;
    writer.write_u8(0)
}

/// Encodes a clip into memory.
pub fn to_bytes(clip: &AnimClip) -> AnimResult<Vec<u8>> {
    let mut out = Vec::new();
    encode(clip, &mut out)?;
    Ok(out)
}

/// Writes a clip file.
pub fn write_file(clip: &AnimClip, path: &Path) -> AnimResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    encode(clip, &mut writer)?;
    writer.flush()?;
    debug!("Wrote {} joints to {}", clip.joints.len(), path.display());
    Ok(())
}

/// Reads a clip. Values come back at the precision of the encoding.
pub fn decode<R: Read>(reader: &mut R) -> AnimResult<AnimClip> {
    let version = read_u16(reader, "header")?;
    let sub_version = read_u16(reader, "header")?;
    if version != ANIM_VERSION || sub_version != ANIM_SUB_VERSION {
        return Err(AnimError::InvalidMagic { version, sub_version });
    }

    let mut clip = AnimClip {
        priority: read_i32(reader, "header")?,
        duration: read_f32(reader, "header")?,
        emote: read_cstr(reader, "emote name")?,
        ..AnimClip::default()
    };
    clip.loop_in = read_f32(reader, "header")?;
    clip.loop_out = read_f32(reader, "header")?;
    clip.looped = read_i32(reader, "header")? != 0;
    clip.ease_in = read_f32(reader, "header")?;
    clip.ease_out = read_f32(reader, "header")?;
    let posture = read_i32(reader, "header")?;
    clip.hand_posture = HandPosture::from_code(posture).unwrap_or_else(|| {
        warn!("Unknown hand posture {}, using the default", posture);
        HandPosture::default()
    });

    let joints = read_count(reader, "joint count")?;
    for _ in 0..joints {
        clip.joints.push(read_joint(reader, clip.duration)?);
    }
    let constraints = read_i32(reader, "constraint count")?;
    if constraints != 0 {
        warn!("Ignoring {} joint constraints", constraints);
    }
    Ok(clip)
}

fn read_joint<R: Read>(reader: &mut R, duration: f32) -> AnimResult<JointTrack> {
    let mut track = JointTrack::new(read_cstr(reader, "joint name")?);
    let context = format!("joint '{}'", track.name);
    track.priority = read_i32(reader, &context)?;

    let rotations = read_count(reader, &context)?;
    for _ in 0..rotations {
        let time = dequantize(read_u16(reader, &context)?, 0.0, duration);
        let mut v = [0.0f32; 3];
        for c in v.iter_mut() {
            *c = dequantize(read_u16(reader, &context)?, -1.0, 1.0);
        }
        let xyz = Vec3::from_array(v);
        let w = (1.0 - xyz.length_squared()).max(0.0).sqrt();
        track.rotations.push(RotationKey {
            time,
            rotation: Quat::from_xyzw(xyz.x, xyz.y, xyz.z, w).normalize(),
        });
    }

    let positions = read_count(reader, &context)?;
    for _ in 0..positions {
        let time = dequantize(read_u16(reader, &context)?, 0.0, duration);
        let mut v = [0.0f32; 3];
        for c in v.iter_mut() {
            *c = dequantize(read_u16(reader, &context)?, -LL_MAX_PELVIS_OFFSET, LL_MAX_PELVIS_OFFSET);
        }
        track.positions.push(PositionKey {
            time,
            position: Vec3::from_array(v),
        });
    }
    Ok(track)
}

fn read_u16<R: Read>(reader: &mut R, context: &str) -> AnimResult<u16> {
    reader
        .read_u16::<LittleEndian>()
        .map_err(|e| AnimError::from_read(e, context))
}

fn read_i32<R: Read>(reader: &mut R, context: &str) -> AnimResult<i32> {
    reader
        .read_i32::<LittleEndian>()
        .map_err(|e| AnimError::from_read(e, context))
}

fn read_f32<R: Read>(reader: &mut R, context: &str) -> AnimResult<f32> {
    reader
        .read_f32::<LittleEndian>()
        .map_err(|e| AnimError::from_read(e, context))
}

fn read_count<R: Read>(reader: &mut R, context: &str) -> AnimResult<usize> {
    let n = read_i32(reader, context)?;
    usize::try_from(n).map_err(|_| AnimError::truncated(format!("{} (negative count {})", context, n)))
}

fn read_cstr<R: Read>(reader: &mut R, context: &str) -> AnimResult<String> {
    let mut bytes = Vec::new();
    loop {
        match reader.read_u8().map_err(|e| AnimError::from_read(e, context))? {
            0 => break,
            b => bytes.push(b),
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads a clip file.
pub fn read_file(path: &Path) -> AnimResult<AnimClip> {
    let mut reader = BufReader::new(File::open(path)?);
    decode(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quantize_bounds() {
        assert_eq!(quantize(-1.0, -1.0, 1.0), 0);
        assert_eq!(quantize(1.0, -1.0, 1.0), 65535);
        assert_eq!(quantize(7.0, -1.0, 1.0), 65535);
        assert_eq!(quantize(0.5, 0.0, 0.0), 0);
        assert_eq!(dequantize(quantize(0.0, -1.0, 1.0), -1.0, 1.0), 0.0);
        assert_eq!(dequantize(65535, -5.0, 5.0), 5.0);
    }

    #[test]
    fn test_header_layout() {
        let mut clip = AnimClip::new(2.0);
        clip.priority = 4;
        clip.emote = "smile".into();
        clip.looped = true;
        let bytes = to_bytes(&clip).unwrap();

        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &4i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[12..18], b"smile\0");
        // loop_in, loop_out, loop, ease_in, ease_out, hand posture, joints, constraints
        assert_eq!(bytes.len(), 18 + 4 * 8);
        assert_eq!(&bytes[26..30], &1i32.to_le_bytes());
        assert_eq!(&bytes[38..42], &HandPosture::Relaxed.code().to_le_bytes());
    }

    #[test]
    fn test_negative_w_is_flipped() {
        let q = Quat::from_xyzw(0.0, 0.0, 0.6, -0.8);
        let clip = AnimClip::new(1.0).with_joint(JointTrack::new("mHead").with_rotation(0.0, q));
        let decoded = decode(&mut to_bytes(&clip).unwrap().as_slice()).unwrap();
        let r = decoded.joints[0].rotations[0].rotation;
        assert!(r.w > 0.0);
        assert!(r.angle_between(q) < 1e-3);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = to_bytes(&AnimClip::new(1.0)).unwrap();
        bytes[0] = 2;
        let err = decode(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, AnimError::InvalidMagic { version: 2, sub_version: 0 }));
    }

    #[test]
    fn test_truncated_input() {
        let clip = AnimClip::new(1.0).with_joint(JointTrack::new("mPelvis").with_position(0.5, Vec3::X));
        let bytes = to_bytes(&clip).unwrap();
        let err = decode(&mut &bytes[..bytes.len() - 6]).unwrap_err();
        match err {
            AnimError::Truncated { context } => assert!(context.contains("mPelvis")),
            other => panic!("unexpected error {other}"),
        }
    }
}
