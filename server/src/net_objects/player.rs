//! Player character components

use log::debug;
use shared::codec::{CodecError, MessageReader, MessageWriter};
use shared::protocol::RpcCall;

/// Both axes of a synced position share this range.
const AXIS_MIN: f32 = -40.0;
const AXIS_MAX: f32 = 40.0;

/// Position or velocity quantized to two u16 values
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn decode(reader: &mut MessageReader<'_>) -> Result<Self, CodecError> {
        let x = reader.read_u16()?;
        let y = reader.read_u16()?;
        Ok(Self {
            x: dequantize(x),
            y: dequantize(y),
        })
    }

    pub fn encode(&self, writer: &mut MessageWriter) {
        writer.write_u16(quantize(self.x));
        writer.write_u16(quantize(self.y));
    }
}

fn dequantize(value: u16) -> f32 {
    let t = f32::from(value) / f32::from(u16::MAX);
    AXIS_MIN + (AXIS_MAX - AXIS_MIN) * t
}

fn quantize(value: f32) -> u16 {
    let t = ((value - AXIS_MIN) / (AXIS_MAX - AXIS_MIN)).clamp(0.0, 1.0);
    (t * f32::from(u16::MAX)) as u16
}

/// True when `new` comes after `last` in u16 sequence space.
pub(crate) fn sequence_newer(new: u16, last: u16) -> bool {
    (1..=0x7FFF).contains(&new.wrapping_sub(last))
}

/// Identity and cosmetics of one player character
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerControlState {
    pub is_new: bool,
    pub player_id: u8,
    pub name: Option<String>,
    pub color_id: Option<u8>,
    pub hat_id: Option<u32>,
    pub skin_id: Option<u32>,
    pub pet_id: Option<u32>,
}

impl PlayerControlState {
    pub(super) fn decode(
        &mut self,
        reader: &mut MessageReader<'_>,
        initial_state: bool,
    ) -> Result<(), CodecError> {
        if initial_state {
            self.is_new = reader.read_bool()?;
        }
        self.player_id = reader.read_u8()?;
        Ok(())
    }

    pub(super) fn encode(&self, writer: &mut MessageWriter, initial_state: bool) -> bool {
        if initial_state {
            writer.write_bool(self.is_new);
        }
        writer.write_u8(self.player_id);
        true
    }

    /// Returns `Ok(false)` for calls this component does not interpret.
    pub(super) fn handle_rpc(
        &mut self,
        call: RpcCall,
        reader: &mut MessageReader<'_>,
    ) -> Result<bool, CodecError> {
        match call {
            RpcCall::SetName => self.name = Some(reader.read_string()?),
            RpcCall::SetColor => self.color_id = Some(reader.read_u8()?),
            RpcCall::SetHat => self.hat_id = Some(reader.read_packed_u32()?),
            RpcCall::SetSkin => self.skin_id = Some(reader.read_packed_u32()?),
            RpcCall::SetPet => self.pet_id = Some(reader.read_packed_u32()?),
            RpcCall::SendChat => {
                let text = reader.read_string()?;
                debug!("Chat from player {}: {}", self.player_id, text);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Movement of one player character
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkTransformState {
    pub sequence: u16,
    pub position: Vector2,
    pub velocity: Vector2,
}

impl NetworkTransformState {
    /// `u16 sequence, vec2 position, vec2 velocity`; stale deltas are dropped.
    pub(super) fn decode(
        &mut self,
        reader: &mut MessageReader<'_>,
        initial_state: bool,
    ) -> Result<(), CodecError> {
        let sequence = reader.read_u16()?;
        if !initial_state && !sequence_newer(sequence, self.sequence) {
            return Ok(());
        }

        let position = Vector2::decode(reader)?;
        let velocity = Vector2::decode(reader)?;

        self.sequence = sequence;
        self.position = position;
        self.velocity = velocity;
        Ok(())
    }

    pub(super) fn encode(&self, writer: &mut MessageWriter) -> bool {
        writer.write_u16(self.sequence);
        self.position.encode(writer);
        self.velocity.encode(writer);
        true
    }

    pub(super) fn handle_rpc(
        &mut self,
        call: RpcCall,
        reader: &mut MessageReader<'_>,
    ) -> Result<bool, CodecError> {
        if call != RpcCall::SnapTo {
            return Ok(false);
        }

        let position = Vector2::decode(reader)?;
        let sequence = reader.read_u16()?;
        if sequence_newer(sequence, self.sequence) {
            self.sequence = sequence;
            self.position = position;
            self.velocity = Vector2::default();
        }
        Ok(true)
    }
}
