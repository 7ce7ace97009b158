use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    audio: Audio,
    control: Control,
    gui: Gui,
    sounds: Sounds,
    input: Input,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Audio {
    remote_host: String,
    send_port: u16,
    receive_port: u16,
    capture_device: String,
    playback_device: String,
    packet_delay_ms: u64,
    packet_delay_min_ms: u64,
    packet_delay_max_ms: u64,
}

#[derive(Deserialize)]
struct Control {
    remote_host: String,
    remote_port: u16,
    period_ms: u64,
}

#[derive(Deserialize)]
struct Gui {
    local_port: u16,
    remote_port: u16,
    local_ip: String,
    remote_ip: String,
    buffer_size: usize,
}

#[derive(Deserialize)]
struct Sounds {
    directory: String,
    extension: String,
}

#[derive(Deserialize)]
struct Axis {
    number: u8,
    invert: bool,
}

#[derive(Deserialize)]
struct Input {
    device: String,
    drive: Axis,
    turn: Axis,
    head_lift: Axis,
    head_turn: Axis,
    open_mouth_button: u8,
    talk_button: u8,
    stationary_button: u8,
    play_sound_button: u8,
    dpad_vertical_axis: u8,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 音频配置
    println!("cargo:rustc-env=AUDIO_REMOTE_HOST={}", config.audio.remote_host);
    println!("cargo:rustc-env=AUDIO_SEND_PORT={}", config.audio.send_port);
    println!("cargo:rustc-env=AUDIO_RECEIVE_PORT={}", config.audio.receive_port);
    println!("cargo:rustc-env=AUDIO_CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=AUDIO_PLAYBACK_DEVICE={}", config.audio.playback_device);
    println!("cargo:rustc-env=AUDIO_PACKET_DELAY_MS={}", config.audio.packet_delay_ms);
    println!("cargo:rustc-env=AUDIO_PACKET_DELAY_MIN_MS={}", config.audio.packet_delay_min_ms);
    println!("cargo:rustc-env=AUDIO_PACKET_DELAY_MAX_MS={}", config.audio.packet_delay_max_ms);

    // 控制帧配置
    println!("cargo:rustc-env=CONTROL_REMOTE_HOST={}", config.control.remote_host);
    println!("cargo:rustc-env=CONTROL_REMOTE_PORT={}", config.control.remote_port);
    println!("cargo:rustc-env=CONTROL_PERIOD_MS={}", config.control.period_ms);

    // GUI 配置
    println!("cargo:rustc-env=GUI_LOCAL_PORT={}", config.gui.local_port);
    println!("cargo:rustc-env=GUI_REMOTE_PORT={}", config.gui.remote_port);
    println!("cargo:rustc-env=GUI_LOCAL_IP={}", config.gui.local_ip);
    println!("cargo:rustc-env=GUI_REMOTE_IP={}", config.gui.remote_ip);
    println!("cargo:rustc-env=GUI_BUFFER_SIZE={}", config.gui.buffer_size);

    println!("cargo:rustc-env=SOUNDS_DIRECTORY={}", config.sounds.directory);
    println!("cargo:rustc-env=SOUNDS_EXTENSION={}", config.sounds.extension);

    // 手柄映射
    let input = &config.input;
    println!("cargo:rustc-env=INPUT_DEVICE={}", input.device);
    for (name, axis) in [
        ("DRIVE", &input.drive),
        ("TURN", &input.turn),
        ("HEAD_LIFT", &input.head_lift),
        ("HEAD_TURN", &input.head_turn),
    ] {
        println!("cargo:rustc-env=INPUT_{}_AXIS={}", name, axis.number);
        println!("cargo:rustc-env=INPUT_{}_INVERT={}", name, axis.invert);
    }
    println!("cargo:rustc-env=INPUT_OPEN_MOUTH_BUTTON={}", input.open_mouth_button);
    println!("cargo:rustc-env=INPUT_TALK_BUTTON={}", input.talk_button);
    println!("cargo:rustc-env=INPUT_STATIONARY_BUTTON={}", input.stationary_button);
    println!("cargo:rustc-env=INPUT_PLAY_SOUND_BUTTON={}", input.play_sound_button);
    println!("cargo:rustc-env=INPUT_DPAD_VERTICAL_AXIS={}", input.dpad_vertical_axis);
}
