//! Linux joystick (`/dev/input/jsN`) input source.
//!
//! A reader thread owns the device file and posts [`DeviceEvent`]s over a
//! channel, including attach/detach. The control loop consumes them at the
//! top of each `poll_once`, so polled state is only ever written by the
//! polling thread.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use super::InputSource;
use crate::config::{AxisMapping, Config};

const JS_EVENT_BUTTON: u8 = 0x01;
const JS_EVENT_AXIS: u8 = 0x02;
const JS_EVENT_INIT: u8 = 0x80;

/// Size of `struct js_event`: u32 time, i16 value, u8 type, u8 number.
const JS_EVENT_SIZE: usize = 8;

const AXIS_FULL_SCALE: f32 = 32767.0;

/// D-pad axes report ±32767; anything past half travel counts as pressed.
const DPAD_THRESHOLD: i16 = 16384;

const REOPEN_INTERVAL: Duration = Duration::from_secs(1);

/// Which joystick axes and buttons drive which puppet signals.
#[derive(Debug, Clone, Copy)]
pub struct JoystickMapping {
    pub drive: AxisMapping,
    pub turn: AxisMapping,
    pub head_lift: AxisMapping,
    pub head_turn: AxisMapping,
    pub open_mouth_button: u8,
    pub talk_button: u8,
    pub stationary_button: u8,
    pub play_sound_button: u8,
    pub dpad_vertical_axis: u8,
}

impl JoystickMapping {
    pub fn from_config(config: &Config) -> Self {
        Self {
            drive: config.input_drive,
            turn: config.input_turn,
            head_lift: config.input_head_lift,
            head_turn: config.input_head_turn,
            open_mouth_button: config.input_open_mouth_button,
            talk_button: config.input_talk_button,
            stationary_button: config.input_stationary_button,
            play_sound_button: config.input_play_sound_button,
            dpad_vertical_axis: config.input_dpad_vertical_axis,
        }
    }
}

/// Messages from the device reader thread to the polling side.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Attached(String),
    Detached,
    Axis { number: u8, value: i16 },
    Button { number: u8, pressed: bool },
}

/// Decode one raw `js_event`. Synthetic init events are treated like live ones.
pub fn parse_event(raw: &[u8; JS_EVENT_SIZE]) -> Option<DeviceEvent> {
    let value = i16::from_ne_bytes([raw[4], raw[5]]);
    let number = raw[7];
    match raw[6] & !JS_EVENT_INIT {
        JS_EVENT_BUTTON => Some(DeviceEvent::Button {
            number,
            pressed: value != 0,
        }),
        JS_EVENT_AXIS => Some(DeviceEvent::Axis { number, value }),
        _ => None,
    }
}

pub struct JoystickInput {
    mapping: JoystickMapping,
    events: Receiver<DeviceEvent>,
    alive: Arc<AtomicBool>,
    connected: bool,
    axes: Vec<i16>,
    buttons: Vec<bool>,
}

impl JoystickInput {
    /// Start the reader thread for the device at `path`. A missing device is
    /// not an error: the reader keeps retrying and the input reads as idle.
    pub fn spawn(path: &str, mapping: JoystickMapping) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let input = Self::from_events(rx, mapping);
        let alive = input.alive.clone();
        let path = PathBuf::from(path);

        thread::Builder::new()
            .name("joystick".into())
            .spawn(move || reader_thread(path, tx, &alive))?;

        Ok(input)
    }

    /// Build an input fed by an arbitrary event channel.
    pub fn from_events(events: Receiver<DeviceEvent>, mapping: JoystickMapping) -> Self {
        Self {
            mapping,
            events,
            alive: Arc::new(AtomicBool::new(true)),
            connected: false,
            axes: vec![0; 256],
            buttons: vec![false; 256],
        }
    }

    fn reset(&mut self) {
        self.axes.iter_mut().for_each(|a| *a = 0);
        self.buttons.iter_mut().for_each(|b| *b = false);
    }

    fn apply(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Attached(name) => {
                log::info!("Gamepad attached: {}", name);
                self.reset();
                self.connected = true;
            }
            DeviceEvent::Detached => {
                log::warn!("Gamepad detached");
                self.reset();
                self.connected = false;
            }
            DeviceEvent::Axis { number, value } => self.axes[number as usize] = value,
            DeviceEvent::Button { number, pressed } => self.buttons[number as usize] = pressed,
        }
    }

    fn axis(&self, mapping: AxisMapping) -> f32 {
        if !self.connected {
            return 0.0;
        }
        let value = (self.axes[mapping.number as usize] as f32 / AXIS_FULL_SCALE).clamp(-1.0, 1.0);
        if mapping.invert { -value } else { value }
    }

    fn button(&self, number: u8) -> bool {
        self.connected && self.buttons[number as usize]
    }

    // Held (or device absent) keeps the puppet from driving.
    fn stationary(&self) -> bool {
        !self.connected || self.buttons[self.mapping.stationary_button as usize]
    }

    fn dpad(&self) -> i16 {
        if self.connected {
            self.axes[self.mapping.dpad_vertical_axis as usize]
        } else {
            0
        }
    }
}

impl Drop for JoystickInput {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}

impl InputSource for JoystickInput {
    fn poll_once(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.connected {
                        self.apply(DeviceEvent::Detached);
                    }
                    break;
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn drive(&self) -> f32 {
        if self.stationary() { 0.0 } else { self.axis(self.mapping.drive) }
    }

    fn turn(&self) -> f32 {
        if self.stationary() { 0.0 } else { self.axis(self.mapping.turn) }
    }

    fn head_lift(&self) -> f32 {
        self.axis(self.mapping.head_lift)
    }

    fn head_turn(&self) -> f32 {
        self.axis(self.mapping.head_turn)
    }

    fn open_mouth(&self) -> bool {
        self.button(self.mapping.open_mouth_button)
    }

    fn talking(&self) -> bool {
        self.button(self.mapping.talk_button)
    }

    fn play_sound(&self) -> bool {
        self.button(self.mapping.play_sound_button)
    }

    fn previous_file_request(&self) -> bool {
        self.dpad() <= -DPAD_THRESHOLD
    }

    fn next_file_request(&self) -> bool {
        self.dpad() >= DPAD_THRESHOLD
    }
}

fn reader_thread(path: PathBuf, tx: Sender<DeviceEvent>, alive: &AtomicBool) {
    let mut reported_missing = false;

    while alive.load(Ordering::Relaxed) {
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                if !reported_missing {
                    log::warn!("Gamepad {} not available: {}", path.display(), e);
                    reported_missing = true;
                }
                thread::sleep(REOPEN_INTERVAL);
                continue;
            }
        };
        reported_missing = false;

        if tx.send(DeviceEvent::Attached(path.display().to_string())).is_err() {
            return;
        }

        let mut raw = [0u8; JS_EVENT_SIZE];
        while alive.load(Ordering::Relaxed) {
            match file.read_exact(&mut raw) {
                Ok(()) => {
                    if let Some(event) = parse_event(&raw) {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Gamepad read error on {}: {}", path.display(), e);
                    if tx.send(DeviceEvent::Detached).is_err() {
                        return;
                    }
                    break;
                }
            }
        }

        thread::sleep(REOPEN_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> JoystickMapping {
        JoystickMapping {
            drive: AxisMapping { number: 4, invert: true },
            turn: AxisMapping { number: 0, invert: true },
            head_lift: AxisMapping { number: 1, invert: false },
            head_turn: AxisMapping { number: 3, invert: true },
            open_mouth_button: 4,
            talk_button: 5,
            stationary_button: 6,
            play_sound_button: 7,
            dpad_vertical_axis: 7,
        }
    }

    fn raw_event(kind: u8, number: u8, value: i16) -> [u8; JS_EVENT_SIZE] {
        let v = value.to_ne_bytes();
        [0, 0, 0, 0, v[0], v[1], kind, number]
    }

    #[test]
    fn parses_axis_button_and_init_events() {
        assert_eq!(
            parse_event(&raw_event(JS_EVENT_AXIS, 3, -1200)),
            Some(DeviceEvent::Axis { number: 3, value: -1200 })
        );
        assert_eq!(
            parse_event(&raw_event(JS_EVENT_BUTTON | JS_EVENT_INIT, 5, 1)),
            Some(DeviceEvent::Button { number: 5, pressed: true })
        );
        assert_eq!(parse_event(&raw_event(0x04, 0, 0)), None);
    }

    #[test]
    fn detached_device_reads_idle() {
        let (_tx, rx) = mpsc::channel();
        let mut input = JoystickInput::from_events(rx, mapping());
        input.poll_once();
        assert!(!input.is_connected());
        assert_eq!(input.drive(), 0.0);
        assert_eq!(input.head_turn(), 0.0);
        assert!(!input.talking());
        assert!(!input.next_file_request());
    }

    #[test]
    fn events_are_applied_at_next_poll() {
        let (tx, rx) = mpsc::channel();
        let mut input = JoystickInput::from_events(rx, mapping());

        tx.send(DeviceEvent::Attached("js0".into())).unwrap();
        tx.send(DeviceEvent::Axis { number: 4, value: -32767 }).unwrap();
        tx.send(DeviceEvent::Axis { number: 1, value: 16384 }).unwrap();
        tx.send(DeviceEvent::Button { number: 5, pressed: true }).unwrap();
        tx.send(DeviceEvent::Axis { number: 7, value: 32767 }).unwrap();

        assert!(!input.is_connected());
        input.poll_once();

        assert!(input.is_connected());
        assert_eq!(input.drive(), 1.0);
        assert!((input.head_lift() - 0.5).abs() < 0.001);
        assert!(input.talking());
        assert!(input.next_file_request());
        assert!(!input.previous_file_request());
    }

    #[test]
    fn stationary_button_blocks_drive_and_turn() {
        let (tx, rx) = mpsc::channel();
        let mut input = JoystickInput::from_events(rx, mapping());

        tx.send(DeviceEvent::Attached("js0".into())).unwrap();
        tx.send(DeviceEvent::Axis { number: 4, value: 20000 }).unwrap();
        tx.send(DeviceEvent::Axis { number: 0, value: 20000 }).unwrap();
        tx.send(DeviceEvent::Axis { number: 3, value: 20000 }).unwrap();
        tx.send(DeviceEvent::Button { number: 6, pressed: true }).unwrap();
        input.poll_once();

        assert_eq!(input.drive(), 0.0);
        assert_eq!(input.turn(), 0.0);
        assert!(input.head_turn() < 0.0);
    }

    #[test]
    fn detach_resets_state() {
        let (tx, rx) = mpsc::channel();
        let mut input = JoystickInput::from_events(rx, mapping());

        tx.send(DeviceEvent::Attached("js0".into())).unwrap();
        tx.send(DeviceEvent::Button { number: 7, pressed: true }).unwrap();
        input.poll_once();
        assert!(input.play_sound());

        tx.send(DeviceEvent::Detached).unwrap();
        input.poll_once();
        assert!(!input.is_connected());
        assert!(!input.play_sound());
    }
}
