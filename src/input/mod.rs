//! Operator input: the polled device capability and the normalization applied
//! to it every control cycle.

pub mod joystick;

/// Analog values with a magnitude below this are treated as stick drift.
pub const DEAD_ZONE: f32 = 0.05;

/// A gamepad-like device polled once per control cycle.
///
/// Axis getters return values in `[-1.0, 1.0]`; all getters report the state
/// captured by the most recent `poll_once`.
pub trait InputSource: Send {
    fn poll_once(&mut self);
    fn is_connected(&self) -> bool;

    fn drive(&self) -> f32;
    fn turn(&self) -> f32;
    fn head_lift(&self) -> f32;
    fn head_turn(&self) -> f32;

    fn open_mouth(&self) -> bool;
    fn talking(&self) -> bool;
    fn play_sound(&self) -> bool;
    fn previous_file_request(&self) -> bool;
    fn next_file_request(&self) -> bool;
}

/// Clamp to `[-1, 1]` and snap the dead-zone around zero to exactly `0.0`.
pub fn dead_zone(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    let value = value.clamp(-1.0, 1.0);
    if value.abs() < DEAD_ZONE { 0.0 } else { value }
}

/// One cycle's worth of input after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedInput {
    pub drive: f32,
    pub turn: f32,
    pub head_lift: f32,
    pub head_turn: f32,
    pub open_mouth: bool,
    pub talking: bool,
    pub play_sound: bool,
    pub select_previous: bool,
    pub select_next: bool,
}

impl NormalizedInput {
    /// Read the source's last polled state and apply the dead-zone.
    pub fn sample(source: &dyn InputSource) -> Self {
        Self {
            drive: dead_zone(source.drive()),
            turn: dead_zone(source.turn()),
            head_lift: dead_zone(source.head_lift()),
            head_turn: dead_zone(source.head_turn()),
            open_mouth: source.open_mouth(),
            talking: source.talking(),
            play_sound: source.play_sound(),
            select_previous: source.previous_file_request(),
            select_next: source.next_file_request(),
        }
    }
}
