use serde::{Deserialize, Serialize};

/// One analog axis of the joystick and whether its sign is flipped.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    pub number: u8,
    pub invert: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    // 音频中继配置
    pub audio_remote_host: &'static str,
    pub audio_send_port: u16,
    pub audio_receive_port: u16,
    pub audio_capture_device: &'static str,
    pub audio_playback_device: &'static str,
    pub audio_packet_delay_ms: u64,
    pub audio_packet_delay_min_ms: u64,
    pub audio_packet_delay_max_ms: u64,

    // 控制帧配置
    pub control_remote_host: &'static str,
    pub control_remote_port: u16,
    pub control_period_ms: u64,

    // GUI进程配置
    pub gui_local_port: u16,
    pub gui_remote_port: u16,
    pub gui_local_ip: &'static str,
    pub gui_remote_ip: &'static str,
    pub gui_buffer_size: usize,

    // 音效文件
    pub sounds_directory: &'static str,
    pub sounds_extension: &'static str,

    // 手柄映射
    pub input_device: &'static str,
    pub input_drive: AxisMapping,
    pub input_turn: AxisMapping,
    pub input_head_lift: AxisMapping,
    pub input_head_turn: AxisMapping,
    pub input_open_mouth_button: u8,
    pub input_talk_button: u8,
    pub input_stationary_button: u8,
    pub input_play_sound_button: u8,
    pub input_dpad_vertical_axis: u8,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            audio_remote_host: env!("AUDIO_REMOTE_HOST"),
            audio_send_port: env!("AUDIO_SEND_PORT").parse()
                .map_err(|_| "Failed to parse AUDIO_SEND_PORT")?,
            audio_receive_port: env!("AUDIO_RECEIVE_PORT").parse()
                .map_err(|_| "Failed to parse AUDIO_RECEIVE_PORT")?,
            audio_capture_device: env!("AUDIO_CAPTURE_DEVICE"),
            audio_playback_device: env!("AUDIO_PLAYBACK_DEVICE"),
            audio_packet_delay_ms: env!("AUDIO_PACKET_DELAY_MS").parse()
                .map_err(|_| "Failed to parse AUDIO_PACKET_DELAY_MS")?,
            audio_packet_delay_min_ms: env!("AUDIO_PACKET_DELAY_MIN_MS").parse()
                .map_err(|_| "Failed to parse AUDIO_PACKET_DELAY_MIN_MS")?,
            audio_packet_delay_max_ms: env!("AUDIO_PACKET_DELAY_MAX_MS").parse()
                .map_err(|_| "Failed to parse AUDIO_PACKET_DELAY_MAX_MS")?,

            control_remote_host: env!("CONTROL_REMOTE_HOST"),
            control_remote_port: env!("CONTROL_REMOTE_PORT").parse()
                .map_err(|_| "Failed to parse CONTROL_REMOTE_PORT")?,
            control_period_ms: env!("CONTROL_PERIOD_MS").parse()
                .map_err(|_| "Failed to parse CONTROL_PERIOD_MS")?,

            gui_local_port: env!("GUI_LOCAL_PORT").parse()
                .map_err(|_| "Failed to parse GUI_LOCAL_PORT")?,
            gui_remote_port: env!("GUI_REMOTE_PORT").parse()
                .map_err(|_| "Failed to parse GUI_REMOTE_PORT")?,
            gui_local_ip: env!("GUI_LOCAL_IP"),
            gui_remote_ip: env!("GUI_REMOTE_IP"),
            gui_buffer_size: env!("GUI_BUFFER_SIZE").parse()
                .map_err(|_| "Failed to parse GUI_BUFFER_SIZE")?,

            sounds_directory: env!("SOUNDS_DIRECTORY"),
            sounds_extension: env!("SOUNDS_EXTENSION"),

            input_device: env!("INPUT_DEVICE"),
            input_drive: AxisMapping {
                number: env!("INPUT_DRIVE_AXIS").parse()
                    .map_err(|_| "Failed to parse INPUT_DRIVE_AXIS")?,
                invert: env!("INPUT_DRIVE_INVERT").parse()
                    .map_err(|_| "Failed to parse INPUT_DRIVE_INVERT")?,
            },
            input_turn: AxisMapping {
                number: env!("INPUT_TURN_AXIS").parse()
                    .map_err(|_| "Failed to parse INPUT_TURN_AXIS")?,
                invert: env!("INPUT_TURN_INVERT").parse()
                    .map_err(|_| "Failed to parse INPUT_TURN_INVERT")?,
            },
            input_head_lift: AxisMapping {
                number: env!("INPUT_HEAD_LIFT_AXIS").parse()
                    .map_err(|_| "Failed to parse INPUT_HEAD_LIFT_AXIS")?,
                invert: env!("INPUT_HEAD_LIFT_INVERT").parse()
                    .map_err(|_| "Failed to parse INPUT_HEAD_LIFT_INVERT")?,
            },
            input_head_turn: AxisMapping {
                number: env!("INPUT_HEAD_TURN_AXIS").parse()
                    .map_err(|_| "Failed to parse INPUT_HEAD_TURN_AXIS")?,
                invert: env!("INPUT_HEAD_TURN_INVERT").parse()
                    .map_err(|_| "Failed to parse INPUT_HEAD_TURN_INVERT")?,
            },
            input_open_mouth_button: env!("INPUT_OPEN_MOUTH_BUTTON").parse()
                .map_err(|_| "Failed to parse INPUT_OPEN_MOUTH_BUTTON")?,
            input_talk_button: env!("INPUT_TALK_BUTTON").parse()
                .map_err(|_| "Failed to parse INPUT_TALK_BUTTON")?,
            input_stationary_button: env!("INPUT_STATIONARY_BUTTON").parse()
                .map_err(|_| "Failed to parse INPUT_STATIONARY_BUTTON")?,
            input_play_sound_button: env!("INPUT_PLAY_SOUND_BUTTON").parse()
                .map_err(|_| "Failed to parse INPUT_PLAY_SOUND_BUTTON")?,
            input_dpad_vertical_axis: env!("INPUT_DPAD_VERTICAL_AXIS").parse()
                .map_err(|_| "Failed to parse INPUT_DPAD_VERTICAL_AXIS")?,
        })
    }

    /// Clamp a requested file-playback packet delay into the configured range.
    pub fn clamp_packet_delay(&self, ms: u64) -> u64 {
        ms.clamp(self.audio_packet_delay_min_ms, self.audio_packet_delay_max_ms)
    }
}
