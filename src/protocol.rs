//! ASCII control frame sent to the puppet controller once per poll cycle.
//!
//! Layout: `<drive>,<turn>,<headLift>,<headTurn>,<talking>,<openMouth>:`
//! followed on the wire by a single `?` terminator.

use std::fmt;

#[cfg(test)]
use crate::error::FrameError;
use crate::input::NormalizedInput;

/// Encoded frames (including the `:` delimiter) must stay below this length.
pub const MAX_FRAME_LEN: usize = 32;

pub const FRAME_DELIMITER: char = ':';

/// Appended by the sender after the length check.
pub const PROTOCOL_TERMINATOR: char = '?';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlFrame {
    pub drive: i32,
    pub turn: i32,
    pub head_lift: i32,
    pub head_turn: i32,
    pub talking: bool,
    pub open_mouth: bool,
}

/// Scale a normalized axis to a whole percentage, truncating toward zero.
fn percent(value: f32) -> i32 {
    (value * 100.0) as i32
}

impl ControlFrame {
    /// Build a frame from one cycle's normalized input. `talking` is passed
    /// separately because a sound effect may override the operator's button.
    pub fn from_input(input: &NormalizedInput, talking: bool) -> Self {
        Self {
            drive: percent(input.drive),
            turn: percent(input.turn),
            head_lift: percent(input.head_lift),
            head_turn: percent(input.head_turn),
            talking,
            open_mouth: input.open_mouth,
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a frame, accepting an optional trailing protocol terminator.
    #[cfg(test)]
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let text = text.strip_suffix(PROTOCOL_TERMINATOR).unwrap_or(text);
        let body = text
            .strip_suffix(FRAME_DELIMITER)
            .ok_or(FrameError::MissingTerminator)?;

        let fields: Vec<&str> = body.split(',').collect();
        if fields.len() != 6 {
            return Err(FrameError::FieldCount(fields.len()));
        }

        let mut values = [0i32; 6];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field
                .trim()
                .parse()
                .map_err(|_| FrameError::InvalidField(field.to_string()))?;
        }

        let flag = |value: i32, raw: &str| match value {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(FrameError::InvalidField(raw.to_string())),
        };

        Ok(Self {
            drive: values[0],
            turn: values[1],
            head_lift: values[2],
            head_turn: values[3],
            talking: flag(values[4], fields[4])?,
            open_mouth: flag(values[5], fields[5])?,
        })
    }
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}{}",
            self.drive,
            self.turn,
            self.head_lift,
            self.head_turn,
            u8::from(self.talking),
            u8::from(self.open_mouth),
            FRAME_DELIMITER,
        )
    }
}
