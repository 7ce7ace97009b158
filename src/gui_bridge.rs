use crate::config::Config;
use crate::display::DisplaySink;
use crate::sound_board::SoundBoard;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Requests from the status window that the core has to act on.
#[derive(Debug, PartialEq)]
pub enum GuiEvent {
    PacketDelay(u64),
}

/// Commands accepted from the status-window process.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuiCommand {
    RefreshSounds,
    SelectSound { index: usize },
    PacketDelay { ms: u64 },
}

/// What the status window shows, sent once per control cycle.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct StatusSnapshot {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub drive: f32,
    pub turn: f32,
    pub head_lift: f32,
    pub head_turn: f32,
    pub open_mouth: bool,
    pub talking: bool,
    pub play_sound: bool,
    pub sounds: Vec<String>,
    pub selected_sound: Option<usize>,
}

pub struct GuiBridge {
    socket: UdpSocket,
    target_addr: SocketAddr,
    buffer_size: usize,
    tx: mpsc::Sender<GuiEvent>,
    status: Mutex<StatusSnapshot>,
    sounds: Mutex<SoundBoard>,
}

// 状态窗口进程和Core进程通过本地UDP通信，端口在配置中指定
impl GuiBridge {
    pub async fn new(config: &Config, tx: mpsc::Sender<GuiEvent>) -> anyhow::Result<Self> {
        let local = format!("{}:{}", config.gui_local_ip, config.gui_local_port);
        let target = format!("{}:{}", config.gui_remote_ip, config.gui_remote_port).parse()?;
        let sounds = SoundBoard::new(config.sounds_directory, config.sounds_extension);
        Self::bind(&local, target, config.gui_buffer_size, sounds, tx).await
    }

    pub async fn bind(
        local: &str,
        target_addr: SocketAddr,
        buffer_size: usize,
        sounds: SoundBoard,
        tx: mpsc::Sender<GuiEvent>,
    ) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        // flush 使用 try_send_to，先等待套接字可写
        socket.writable().await?;
        log::info!("GUI bridge on {} -> {}", socket.local_addr()?, target_addr);

        Ok(Self {
            socket,
            target_addr,
            buffer_size,
            tx,
            status: Mutex::new(StatusSnapshot {
                kind: "status",
                ..Default::default()
            }),
            sounds: Mutex::new(sounds),
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn status(&self) -> MutexGuard<'_, StatusSnapshot> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sounds(&self) -> MutexGuard<'_, SoundBoard> {
        self.sounds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let (len, _) = self.socket.recv_from(&mut buf).await?;
            let command = match serde_json::from_slice::<GuiCommand>(&buf[..len]) {
                Ok(command) => command,
                Err(e) => {
                    log::warn!("Ignoring GUI message: {}", e);
                    continue;
                }
            };

            if let Some(event) = self.handle(command) {
                if let Err(e) = self.tx.send(event).await {
                    log::error!("Failed to send GUI event: {}", e);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Apply a command locally; returns the event the core must handle, if any.
    fn handle(&self, command: GuiCommand) -> Option<GuiEvent> {
        match command {
            GuiCommand::RefreshSounds => {
                self.sounds().refresh();
                None
            }
            GuiCommand::SelectSound { index } => {
                if !self.sounds().select(index) {
                    log::warn!("No sound at index {}", index);
                }
                None
            }
            GuiCommand::PacketDelay { ms } => Some(GuiEvent::PacketDelay(ms)),
        }
    }
}

impl DisplaySink for GuiBridge {
    fn set_drive(&self, value: f32) {
        self.status().drive = value;
    }

    fn set_turn(&self, value: f32) {
        self.status().turn = value;
    }

    fn set_head_lift(&self, value: f32) {
        self.status().head_lift = value;
    }

    fn set_head_turn(&self, value: f32) {
        self.status().head_turn = value;
    }

    fn set_open_mouth(&self, on: bool) {
        self.status().open_mouth = on;
    }

    fn set_talking(&self, on: bool) {
        self.status().talking = on;
    }

    fn set_play_sound(&self, on: bool) {
        self.status().play_sound = on;
    }

    fn selected_audio_file_path(&self) -> Option<PathBuf> {
        self.sounds().selected_path()
    }

    fn select_previous_audio_file(&self) {
        self.sounds().select_previous();
    }

    fn select_next_audio_file(&self) {
        self.sounds().select_next();
    }

    // 状态窗口不在时发送失败是正常的，只记录调试日志
    fn flush(&self) {
        let snapshot = {
            let sounds = self.sounds();
            let mut status = self.status();
            status.sounds = sounds.files().to_vec();
            status.selected_sound = sounds.selected_index();
            status.clone()
        };

        match serde_json::to_vec(&snapshot) {
            Ok(msg) => {
                if let Err(e) = self.socket.try_send_to(&msg, self.target_addr) {
                    log::debug!("GUI status not sent: {}", e);
                }
            }
            Err(e) => log::error!("Failed to encode GUI status: {}", e),
        }
    }
}
