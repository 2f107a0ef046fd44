//! # Replay Codecs
//!
//! Fixed-size little-endian records for committed states and inputs, plus
//! an input log that re-drives an actor tick by tick.
//!
//! ## Layout
//!
//! ```text
//! SimulationState (69 bytes)
//! [mode u8][position 3xf32][orientation 4xf32][velocity 3xf32]
//! [angular_velocity 3xf32][move_intent 3xf32][tags u32]
//!
//! MoverInputs (25 bytes)
//! [move_intent 3xf32][orientation_intent 3xf32][abilities u8]
//!
//! InputLog
//! [frame count u32] then per frame: [step_ms f32][MoverInputs]
//! ```
//!
//! Floats are written as their raw bits, so a decoded state compares equal
//! bit for bit with the one that was encoded.

use strider_shared::{AbilityInputs, ModeId, MoverInputs, Quaternion, TagSet, Vec3};

use crate::collision::CollisionQuery;
use crate::driver::MoverActor;
use crate::error::{MoverError, MoverResult};
use crate::state::SimulationState;

/// Encoded size of a [`SimulationState`].
pub const STATE_BYTES: usize = 1 + 4 * (3 + 4 + 3 + 3 + 3) + 4;

/// Encoded size of a [`MoverInputs`].
pub const INPUTS_BYTES: usize = 4 * (3 + 3) + 1;

/// Encoded size of one [`InputLog`] frame.
pub const FRAME_BYTES: usize = 4 + INPUTS_BYTES;

/// Ability bits [`AbilityInputs::pack`] can produce.
const ABILITY_MASK: u8 = 0x7F;

// =============================================================================
// WRITER / READER
// =============================================================================

struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self { buffer: Vec::with_capacity(capacity) }
    }

    fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    fn write_words<const N: usize>(&mut self, words: [u32; N]) {
        for word in words {
            self.write_u32(word);
        }
    }

    fn write_vec3(&mut self, value: Vec3) {
        self.write_words(bytemuck::cast::<Vec3, [u32; 3]>(value));
    }

    fn write_quat(&mut self, value: Quaternion) {
        self.write_words(bytemuck::cast::<Quaternion, [u32; 4]>(value));
    }

    fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Fails up front when `bytes` cannot hold `expected` bytes.
    fn new(bytes: &'a [u8], expected: usize) -> MoverResult<Self> {
        if bytes.len() < expected {
            return Err(MoverError::Truncated { expected, actual: bytes.len() });
        }
        Ok(Self { bytes, position: 0 })
    }

    fn take<const N: usize>(&mut self) -> MoverResult<[u8; N]> {
        let end = self.position + N;
        let Some(slice) = self.bytes.get(self.position..end) else {
            return Err(MoverError::Truncated { expected: end, actual: self.bytes.len() });
        };
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.position = end;
        Ok(out)
    }

    fn read_u8(&mut self) -> MoverResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn read_u32(&mut self) -> MoverResult<u32> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    fn read_f32(&mut self) -> MoverResult<f32> {
        self.read_u32().map(f32::from_bits)
    }

    fn read_words<const N: usize>(&mut self) -> MoverResult<[u32; N]> {
        let mut words = [0u32; N];
        for word in &mut words {
            *word = self.read_u32()?;
        }
        Ok(words)
    }

    fn read_vec3(&mut self) -> MoverResult<Vec3> {
        Ok(bytemuck::cast::<[u32; 3], Vec3>(self.read_words()?))
    }

    fn read_quat(&mut self) -> MoverResult<Quaternion> {
        Ok(bytemuck::cast::<[u32; 4], Quaternion>(self.read_words()?))
    }

    fn read_abilities(&mut self) -> MoverResult<AbilityInputs> {
        let bits = self.read_u8()?;
        if bits & !ABILITY_MASK != 0 {
            return Err(MoverError::InvalidDiscriminant { what: "ability bits", value: bits });
        }
        Ok(AbilityInputs::unpack(bits))
    }
}

// =============================================================================
// RECORDS
// =============================================================================

fn write_state(writer: &mut ByteWriter, state: &SimulationState) {
    writer.write_u8(state.mode.as_u8());
    writer.write_vec3(state.position);
    writer.write_quat(state.orientation);
    writer.write_vec3(state.velocity);
    writer.write_vec3(state.angular_velocity);
    writer.write_vec3(state.move_intent);
    writer.write_u32(bytemuck::cast::<TagSet, u32>(state.tags));
}

fn read_state(reader: &mut ByteReader<'_>) -> MoverResult<SimulationState> {
    let raw_mode = reader.read_u8()?;
    let mode = ModeId::from_u8(raw_mode).ok_or(MoverError::InvalidDiscriminant { what: "mode", value: raw_mode })?;
    Ok(SimulationState {
        mode,
        position: reader.read_vec3()?,
        orientation: reader.read_quat()?,
        velocity: reader.read_vec3()?,
        angular_velocity: reader.read_vec3()?,
        move_intent: reader.read_vec3()?,
        tags: bytemuck::cast::<u32, TagSet>(reader.read_u32()?),
    })
}

fn write_inputs(writer: &mut ByteWriter, inputs: &MoverInputs) {
    writer.write_vec3(inputs.move_intent);
    writer.write_vec3(inputs.orientation_intent);
    writer.write_u8(inputs.abilities.pack());
}

fn read_inputs(reader: &mut ByteReader<'_>) -> MoverResult<MoverInputs> {
    Ok(MoverInputs {
        move_intent: reader.read_vec3()?,
        orientation_intent: reader.read_vec3()?,
        abilities: reader.read_abilities()?,
    })
}

/// Encodes a committed state.
#[must_use]
pub fn state_to_bytes(state: &SimulationState) -> Vec<u8> {
    let mut writer = ByteWriter::with_capacity(STATE_BYTES);
    write_state(&mut writer, state);
    writer.into_inner()
}

/// Decodes a committed state. Bytes past [`STATE_BYTES`] are ignored.
///
/// # Errors
///
/// [`MoverError::Truncated`] for short input, [`MoverError::InvalidDiscriminant`]
/// for an unknown mode.
pub fn state_from_bytes(bytes: &[u8]) -> MoverResult<SimulationState> {
    read_state(&mut ByteReader::new(bytes, STATE_BYTES)?)
}

/// Encodes one tick's inputs.
#[must_use]
pub fn inputs_to_bytes(inputs: &MoverInputs) -> Vec<u8> {
    let mut writer = ByteWriter::with_capacity(INPUTS_BYTES);
    write_inputs(&mut writer, inputs);
    writer.into_inner()
}

/// Decodes one tick's inputs.
///
/// # Errors
///
/// [`MoverError::Truncated`] for short input, [`MoverError::InvalidDiscriminant`]
/// for ability bits outside the packed range.
pub fn inputs_from_bytes(bytes: &[u8]) -> MoverResult<MoverInputs> {
    read_inputs(&mut ByteReader::new(bytes, INPUTS_BYTES)?)
}

// =============================================================================
// INPUT LOG
// =============================================================================

/// One recorded tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputFrame {
    /// Step length (ms).
    pub step_ms: f32,
    /// Inputs of the tick.
    pub inputs: MoverInputs,
}

/// Recorded ticks, in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputLog {
    frames: Vec<InputFrame>,
}

impl InputLog {
    /// Empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Appends a tick.
    pub fn record(&mut self, step_ms: f32, inputs: MoverInputs) {
        self.frames.push(InputFrame { step_ms, inputs });
    }

    /// Recorded frames.
    #[must_use]
    pub fn frames(&self) -> &[InputFrame] {
        &self.frames
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Encodes the log.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(4 + self.frames.len() * FRAME_BYTES);
        writer.write_u32(u32::try_from(self.frames.len()).unwrap_or(u32::MAX));
        for frame in self.frames.iter().take(u32::MAX as usize) {
            writer.write_f32(frame.step_ms);
            write_inputs(&mut writer, &frame.inputs);
        }
        writer.into_inner()
    }

    /// Decodes a log written by [`InputLog::to_bytes`].
    ///
    /// # Errors
    ///
    /// [`MoverError::Truncated`] when the buffer holds fewer frames than its
    /// header announces, [`MoverError::InvalidDiscriminant`] for bad ability bits.
    pub fn from_bytes(bytes: &[u8]) -> MoverResult<Self> {
        let mut header = ByteReader::new(bytes, 4)?;
        let count = header.read_u32()? as usize;
        let expected = count.saturating_mul(FRAME_BYTES).saturating_add(4);

        let mut reader = ByteReader::new(bytes, expected)?;
        reader.read_u32()?;
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            let step_ms = reader.read_f32()?;
            let inputs = read_inputs(&mut reader)?;
            frames.push(InputFrame { step_ms, inputs });
        }
        Ok(Self { frames })
    }
}

/// Re-runs `log` on `actor` and returns the committed state after every tick.
pub fn replay(actor: &mut MoverActor, world: &dyn CollisionQuery, log: &InputLog) -> Vec<SimulationState> {
    log.frames().iter().map(|frame| *actor.tick(world, frame.step_ms, &frame.inputs)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SimulationState {
        SimulationState {
            position: Vec3::new(1.5, -2.25, 90.15),
            orientation: Quaternion::from_axis_angle(Vec3::Z, 0.7),
            velocity: Vec3::new(600.0, 0.0, -12.5),
            angular_velocity: Vec3::new(0.0, 0.0, 45.0),
            mode: ModeId::WallRunning,
            move_intent: Vec3::new(0.0, 1.0, 0.0),
            tags: TagSet::SPRINTING.union(TagSet::CROUCHING),
        }
    }

    #[test]
    fn test_state_layout_is_little_endian() {
        let bytes = state_to_bytes(&sample_state());
        assert_eq!(bytes.len(), STATE_BYTES);
        assert_eq!(bytes[0], ModeId::WallRunning.as_u8());
        assert_eq!(&bytes[1..5], &1.5f32.to_le_bytes());
        assert_eq!(state_from_bytes(&bytes), Ok(sample_state()));
    }

    #[test]
    fn test_state_decode_errors() {
        let mut bytes = state_to_bytes(&sample_state());
        assert_eq!(
            state_from_bytes(&bytes[..10]),
            Err(MoverError::Truncated { expected: STATE_BYTES, actual: 10 })
        );
        bytes[0] = 9;
        assert_eq!(
            state_from_bytes(&bytes),
            Err(MoverError::InvalidDiscriminant { what: "mode", value: 9 })
        );
    }

    #[test]
    fn test_nan_bits_survive() {
        let mut state = sample_state();
        state.velocity.x = f32::from_bits(0x7FC0_1234);
        let decoded = state_from_bytes(&state_to_bytes(&state)).unwrap();
        assert_eq!(decoded.velocity.x.to_bits(), 0x7FC0_1234);
    }

    #[test]
    fn test_inputs_reject_unknown_ability_bits() {
        let inputs = MoverInputs::moving(Vec3::X).with_abilities(AbilityInputs {
            jump_just_pressed: true,
            crouch_just_pressed: true,
            ..AbilityInputs::default()
        });
        let mut bytes = inputs_to_bytes(&inputs);
        assert_eq!(bytes.len(), INPUTS_BYTES);
        assert_eq!(inputs_from_bytes(&bytes), Ok(inputs));

        bytes[INPUTS_BYTES - 1] |= 0x80;
        assert!(matches!(
            inputs_from_bytes(&bytes),
            Err(MoverError::InvalidDiscriminant { what: "ability bits", .. })
        ));
    }

    #[test]
    fn test_input_log_header_and_truncation() {
        let mut log = InputLog::new();
        log.record(16.0, MoverInputs::moving(Vec3::X));
        log.record(33.3, MoverInputs::default());
        let bytes = log.to_bytes();
        assert_eq!(bytes.len(), 4 + 2 * FRAME_BYTES);
        assert_eq!(&bytes[..4], &2u32.to_le_bytes());
        assert_eq!(InputLog::from_bytes(&bytes), Ok(log));

        assert_eq!(
            InputLog::from_bytes(&bytes[..bytes.len() - 1]),
            Err(MoverError::Truncated { expected: bytes.len(), actual: bytes.len() - 1 })
        );
        assert_eq!(InputLog::from_bytes(&[]), Err(MoverError::Truncated { expected: 4, actual: 0 }));
    }
}
