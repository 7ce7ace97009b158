mod audio;
mod config;
mod control_sender;
mod controller;
mod display;
mod error;
mod gui_bridge;
mod input;
mod protocol;
mod sound_board;
mod state_machine;
mod transport;

use audio::{AlsaDevices, AudioControls, AudioRelay};
use config::Config;
use control_sender::ControlSender;
use controller::ControlLoop;
use gui_bridge::{GuiBridge, GuiEvent};
use input::joystick::{JoystickInput, JoystickMapping};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let config = Config::new().map_err(anyhow::Error::msg)?;
    log::info!("{} {} starting", env!("APP_NAME"), env!("APP_VERSION"));

    // GUI进程通道
    let (tx_gui_event, mut rx_gui_event) = mpsc::channel::<GuiEvent>(16);

    // 启动GUI桥，与状态窗口进程通信
    let gui_bridge = Arc::new(GuiBridge::new(&config, tx_gui_event).await?);
    let gui_bridge_clone = gui_bridge.clone();
    tokio::spawn(async move {
        if let Err(e) = gui_bridge_clone.run().await {
            log::error!("GuiBridge error: {}", e);
        }
    });

    // 启动音频中继
    let devices = Arc::new(AlsaDevices::new(
        config.audio_capture_device,
        config.audio_playback_device,
    ));
    let audio = Arc::new(AudioRelay::new(
        config.audio_remote_host,
        config.audio_send_port,
        config.audio_receive_port,
        devices,
        config.clamp_packet_delay(config.audio_packet_delay_ms),
    ));
    audio.start();
    let (speaker_state, outgoing_state) = audio.states();
    log::info!("Audio relay: speaker {:?}, outgoing {:?}", speaker_state, outgoing_state);

    // 手柄输入与控制帧发送
    let joystick = JoystickInput::spawn(config.input_device, JoystickMapping::from_config(&config))?;
    let sender = ControlSender::new(config.control_remote_host, config.control_remote_port).await?;
    let control = ControlLoop::new(
        Box::new(joystick),
        gui_bridge.clone(),
        audio.clone(),
        sender,
        Duration::from_millis(config.control_period_ms),
    )
    .spawn();

    loop {
        tokio::select! {
            // 监听 Ctrl+C 信号
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }

            Some(event) = rx_gui_event.recv() => match event {
                GuiEvent::PacketDelay(ms) => {
                    let ms = config.clamp_packet_delay(ms);
                    log::info!("File packet delay set to {} ms", ms);
                    audio.set_streaming_delay(ms);
                }
            },
        }
    }

    control.stop();
    control.join().await;
    audio.stop();

    Ok(())
}
