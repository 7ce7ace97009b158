//! Outgoing audio: microphone capture or a paced sound-effect file, sent to
//! the puppet one frame-buffer per datagram.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::device::{AudioDevices, CaptureDevice};
use super::file_stream::FileAudioSession;
use super::format::AudioFormat;
use super::mode::{transition, ModeRequest, OutgoingAudioMode, Source};
use crate::error::RelayError;
use crate::state_machine::{RelayWorkerState, RunFlag};
use crate::transport::SendTransport;

const ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// State shared between the control side and the outgoing thread.
struct Shared {
    flag: RunFlag,
    source: Mutex<Source>,
    source_changed: Condvar,
    delay_ms: AtomicU64,
}

impl Shared {
    fn lock_source(&self) -> MutexGuard<'_, Source> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, request: ModeRequest) {
        let mut source = self.lock_source();
        let current = std::mem::replace(&mut *source, Source::Idle);
        let before = current.mode();
        *source = transition(current, request);
        let after = source.mode();
        self.source_changed.notify_all();
        drop(source);

        if before != after {
            log::debug!("Outgoing audio {:?} -> {:?}", before, after);
        }
    }

    fn wake(&self) {
        // Taking the lock orders the wake-up after any in-progress predicate check.
        let _source = self.lock_source();
        self.source_changed.notify_all();
    }
}

pub struct OutgoingAudio {
    remote_host: String,
    send_port: u16,
    format: AudioFormat,
    devices: Arc<dyn AudioDevices>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OutgoingAudio {
    pub fn new(
        remote_host: &str,
        send_port: u16,
        format: AudioFormat,
        devices: Arc<dyn AudioDevices>,
        delay_ms: u64,
    ) -> Self {
        Self {
            remote_host: remote_host.to_string(),
            send_port,
            format,
            devices,
            shared: Arc::new(Shared {
                flag: RunFlag::new(),
                source: Mutex::new(Source::Idle),
                source_changed: Condvar::new(),
                delay_ms: AtomicU64::new(delay_ms),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RelayWorkerState {
        self.shared.flag.state()
    }

    pub fn mode(&self) -> OutgoingAudioMode {
        self.shared.lock_source().mode()
    }

    /// Path of the file being streamed, if any.
    #[cfg(test)]
    pub fn current_file(&self) -> Option<std::path::PathBuf> {
        match &*self.shared.lock_source() {
            Source::File(session) => Some(session.path().to_path_buf()),
            _ => None,
        }
    }

    pub fn streaming_delay(&self) -> u64 {
        self.shared.delay_ms.load(Ordering::Relaxed)
    }

    /// Takes effect from the next file packet.
    pub fn set_streaming_delay(&self, ms: u64) {
        self.shared.delay_ms.store(ms, Ordering::Relaxed);
    }

    /// Start streaming `path`. Ignored while a file is already playing; a file
    /// that cannot be opened leaves the mode unchanged.
    pub fn request_play_file(&self, path: &Path) {
        if self.mode() == OutgoingAudioMode::File {
            return;
        }
        match FileAudioSession::open(path, &self.format) {
            Ok(session) => self.shared.apply(ModeRequest::PlayFile(session)),
            Err(e) => log::warn!("Cannot play {}: {}", path.display(), e),
        }
    }

    pub fn request_stop_file(&self) {
        self.shared.apply(ModeRequest::StopFile);
    }

    pub fn request_microphone(&self) {
        self.shared.apply(ModeRequest::Microphone);
    }

    pub fn request_stop_microphone(&self) {
        self.shared.apply(ModeRequest::StopMicrophone);
    }

    /// Tear down any previous run, then open the socket and capture device and
    /// start the sender thread.
    pub fn start(&self) -> Result<(), RelayError> {
        self.stop();

        let transport = SendTransport::connect(&self.remote_host, self.send_port)?;
        let capture = self.devices.open_capture(&self.format)?;
        let buffer = vec![0u8; self.format.frame_buffer_len(capture.buffer_bytes())];

        log::info!(
            "Outgoing audio to {} ({} byte packets, {} ms file pacing)",
            transport.target(),
            buffer.len(),
            self.streaming_delay()
        );

        self.shared.flag.start();
        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("audio-outgoing".into())
            .spawn(move || {
                send_loop(&shared, &transport, capture, buffer);
                log::info!("Outgoing audio stopped");
            });

        match spawned {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.flag.stop();
                Err(RelayError::ThreadSpawn(e))
            }
        }
    }

    /// Stop the sender thread, close the capture device and socket and drop
    /// any file session. Idempotent.
    pub fn stop(&self) {
        self.shared.flag.stop();
        self.shared.wake();

        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Outgoing audio thread panicked");
            }
            *self.shared.lock_source() = Source::Idle;
        }
    }
}

fn send_loop(
    shared: &Shared,
    transport: &SendTransport,
    mut capture: Box<dyn CaptureDevice>,
    mut buffer: Vec<u8>,
) {
    let running = || shared.flag.is_running();
    let mut last_mode = OutgoingAudioMode::Idle;

    while running() {
        let mut source = shared.lock_source();
        let mode = source.mode();
        if mode == OutgoingAudioMode::Microphone && last_mode != OutgoingAudioMode::Microphone {
            // 空闲期间采集缓冲里积压的旧音频不发送
            capture.discard();
        }
        last_mode = mode;

        match mode {
            OutgoingAudioMode::Idle => {
                let _idle = shared
                    .source_changed
                    .wait_while(source, |s| matches!(s, Source::Idle) && running())
                    .unwrap_or_else(PoisonError::into_inner);
            }
            OutgoingAudioMode::File => {
                let read = match &mut *source {
                    Source::File(session) => session.read_chunk(&mut buffer),
                    _ => continue,
                };
                match read {
                    Ok(0) => {
                        // 文件播放完毕，等待模式切换
                        let _done = shared
                            .source_changed
                            .wait_while(source, |s| matches!(s, Source::File(_)) && running())
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    Ok(len) => {
                        buffer[len..].fill(0);
                        let delay = Duration::from_millis(shared.delay_ms.load(Ordering::Relaxed));
                        let (source, _) = shared
                            .source_changed
                            .wait_timeout_while(source, delay, |s| {
                                matches!(s, Source::File(_)) && running()
                            })
                            .unwrap_or_else(PoisonError::into_inner);

                        let still_playing = matches!(*source, Source::File(_));
                        drop(source);
                        if still_playing && running() {
                            send(transport, &buffer);
                        }
                    }
                    Err(e) => {
                        drop(source);
                        log::warn!("Sound file read failed: {}", e);
                        shared.flag.sleep(ERROR_BACKOFF);
                    }
                }
            }
            OutgoingAudioMode::Microphone => {
                drop(source);
                match capture.read(&mut buffer) {
                    Ok(0) => {}
                    Ok(len) => {
                        // 读取期间可能已切换到文件模式
                        let still_talking = matches!(*shared.lock_source(), Source::Microphone);
                        if still_talking && running() {
                            buffer[len..].fill(0);
                            send(transport, &buffer);
                        }
                    }
                    Err(e) => {
                        log::warn!("Microphone capture failed: {}", e);
                        shared.flag.sleep(ERROR_BACKOFF);
                    }
                }
            }
        }
    }

    capture.close();
}

fn send(transport: &SendTransport, payload: &[u8]) {
    if let Err(e) = transport.send(payload) {
        log::warn!("Outgoing audio send failed: {}", e);
    }
}
