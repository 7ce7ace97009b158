use crate::audio::AudioControls;
use crate::control_sender::ControlSender;
use crate::display::DisplaySink;
use crate::input::{InputSource, NormalizedInput};
use crate::protocol::ControlFrame;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Sound files whose name starts with this make the puppet's mouth move.
const SPEAK_PREFIX: &str = "speak";

/// Fixed-period sampler: input in, control frame and audio mode out.
pub struct ControlLoop {
    input: Box<dyn InputSource>,
    display: Arc<dyn DisplaySink>,
    audio: Arc<dyn AudioControls>,
    sender: ControlSender,
    period: Duration,
    previous_held: bool,
    next_held: bool,
    last_connected: Option<bool>,
}

impl ControlLoop {
    pub fn new(
        input: Box<dyn InputSource>,
        display: Arc<dyn DisplaySink>,
        audio: Arc<dyn AudioControls>,
        sender: ControlSender,
        period: Duration,
    ) -> Self {
        Self {
            input,
            display,
            audio,
            sender,
            period,
            previous_held: false,
            next_held: false,
            last_connected: None,
        }
    }

    /// One control cycle. Returns the frame that was built.
    pub fn step(&mut self) -> ControlFrame {
        self.input.poll_once();
        self.log_connection();

        let input = NormalizedInput::sample(self.input.as_ref());

        // 播放音效，文件名以 speak 开头时同时张嘴说话
        let mut talking = input.talking;
        if input.play_sound {
            if let Some(path) = self.display.selected_audio_file_path() {
                if is_speech(&path) {
                    talking = true;
                }
                self.audio.request_play_file(&path);
            }
        } else {
            self.audio.request_stop_file();
        }

        if input.talking {
            self.audio.request_microphone();
        } else {
            self.audio.request_stop_microphone();
        }

        self.display.set_drive(input.drive);
        self.display.set_turn(input.turn);
        self.display.set_head_lift(input.head_lift);
        self.display.set_head_turn(input.head_turn);
        self.display.set_open_mouth(input.open_mouth);
        self.display.set_talking(input.talking);
        self.display.set_play_sound(input.play_sound);

        // 只在按下的那一刻切换文件
        if input.select_previous && !self.previous_held {
            self.display.select_previous_audio_file();
        }
        if input.select_next && !self.next_held {
            self.display.select_next_audio_file();
        }
        self.previous_held = input.select_previous;
        self.next_held = input.select_next;

        self.display.flush();

        let frame = ControlFrame::from_input(&input, talking);
        self.sender.send(&frame);
        frame
    }

    fn log_connection(&mut self) {
        let connected = self.input.is_connected();
        if self.last_connected != Some(connected) {
            if connected {
                log::info!("Gamepad connected");
            } else {
                log::warn!("Gamepad not connected");
            }
            self.last_connected = Some(connected);
        }
    }

    /// Run the loop on the tokio runtime until the handle is stopped.
    pub fn spawn(self) -> ControlLoopHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = self.period;

        let task = tokio::spawn(async move {
            log::info!("Control loop started, period {} ms", period.as_millis());
            let mut control = self;
            loop {
                // 打开音效文件是阻塞操作，放到阻塞线程池执行
                let cycle = tokio::task::spawn_blocking(move || {
                    control.step();
                    control
                });
                control = match cycle.await {
                    Ok(control) => control,
                    Err(e) => {
                        log::error!("Control cycle failed: {}", e);
                        break;
                    }
                };
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = stop_rx.changed() => break,
                }
            }
            log::info!("Control loop stopped");
        });

        ControlLoopHandle { stop_tx, task }
    }
}

fn is_speech(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(SPEAK_PREFIX))
}

pub struct ControlLoopHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ControlLoopHandle {
    #[cfg(test)]
    pub fn state(&self) -> crate::state_machine::RunState {
        use crate::state_machine::RunState;
        if self.task.is_finished() {
            RunState::Stopped
        } else {
            RunState::Running
        }
    }

    /// Ask the loop to stop; a pending period sleep is cut short.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            log::error!("Control loop task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::RunState;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Instant;
    use tokio::net::UdpSocket;

    #[derive(Default, Clone, Copy)]
    struct Pad {
        drive: f32,
        turn: f32,
        head_lift: f32,
        head_turn: f32,
        open_mouth: bool,
        talking: bool,
        play_sound: bool,
        previous: bool,
        next: bool,
    }

    struct MockInput {
        pad: Arc<Mutex<Pad>>,
        polled: Pad,
        polls: Arc<Mutex<usize>>,
    }

    impl InputSource for MockInput {
        fn poll_once(&mut self) {
            self.polled = *self.pad.lock().unwrap();
            *self.polls.lock().unwrap() += 1;
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn drive(&self) -> f32 {
            self.polled.drive
        }
        fn turn(&self) -> f32 {
            self.polled.turn
        }
        fn head_lift(&self) -> f32 {
            self.polled.head_lift
        }
        fn head_turn(&self) -> f32 {
            self.polled.head_turn
        }
        fn open_mouth(&self) -> bool {
            self.polled.open_mouth
        }
        fn talking(&self) -> bool {
            self.polled.talking
        }
        fn play_sound(&self) -> bool {
            self.polled.play_sound
        }
        fn previous_file_request(&self) -> bool {
            self.polled.previous
        }
        fn next_file_request(&self) -> bool {
            self.polled.next
        }
    }

    #[derive(Default)]
    struct MockDisplay {
        selected: Option<PathBuf>,
        talking: Mutex<Option<bool>>,
        drive: Mutex<f32>,
        previous_calls: Mutex<usize>,
        next_calls: Mutex<usize>,
        flushes: Mutex<usize>,
    }

    impl DisplaySink for MockDisplay {
        fn set_drive(&self, value: f32) {
            *self.drive.lock().unwrap() = value;
        }
        fn set_turn(&self, _value: f32) {}
        fn set_head_lift(&self, _value: f32) {}
        fn set_head_turn(&self, _value: f32) {}
        fn set_open_mouth(&self, _on: bool) {}
        fn set_talking(&self, on: bool) {
            *self.talking.lock().unwrap() = Some(on);
        }
        fn set_play_sound(&self, _on: bool) {}
        fn selected_audio_file_path(&self) -> Option<PathBuf> {
            self.selected.clone()
        }
        fn select_previous_audio_file(&self) {
            *self.previous_calls.lock().unwrap() += 1;
        }
        fn select_next_audio_file(&self) {
            *self.next_calls.lock().unwrap() += 1;
        }
        fn flush(&self) {
            *self.flushes.lock().unwrap() += 1;
        }
    }

    #[derive(Default)]
    struct MockAudio {
        calls: Mutex<Vec<String>>,
        // 模拟打开音效文件的耗时
        open_delay: Mutex<Duration>,
    }

    impl MockAudio {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    impl AudioControls for MockAudio {
        fn request_play_file(&self, path: &Path) {
            std::thread::sleep(*self.open_delay.lock().unwrap());
            self.calls.lock().unwrap().push(format!("play {}", path.display()));
        }
        fn request_stop_file(&self) {
            self.calls.lock().unwrap().push("stop_file".into());
        }
        fn request_microphone(&self) {
            self.calls.lock().unwrap().push("microphone".into());
        }
        fn request_stop_microphone(&self) {
            self.calls.lock().unwrap().push("stop_microphone".into());
        }
        fn set_streaming_delay(&self, ms: u64) {
            self.calls.lock().unwrap().push(format!("delay {}", ms));
        }
    }

    struct Rig {
        pad: Arc<Mutex<Pad>>,
        polls: Arc<Mutex<usize>>,
        display: Arc<MockDisplay>,
        audio: Arc<MockAudio>,
        puppet: UdpSocket,
        control: ControlLoop,
    }

    async fn rig(selected: Option<&str>, period: Duration) -> Rig {
        let pad = Arc::new(Mutex::new(Pad::default()));
        let polls = Arc::new(Mutex::new(0));
        let input = MockInput {
            pad: pad.clone(),
            polled: Pad::default(),
            polls: polls.clone(),
        };
        let display = Arc::new(MockDisplay {
            selected: selected.map(PathBuf::from),
            ..Default::default()
        });
        let audio = Arc::new(MockAudio::default());
        let puppet = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = ControlSender::new("127.0.0.1", puppet.local_addr().unwrap().port())
            .await
            .unwrap();
        let control = ControlLoop::new(
            Box::new(input),
            display.clone(),
            audio.clone(),
            sender,
            period,
        );
        Rig {
            pad,
            polls,
            display,
            audio,
            puppet,
            control,
        }
    }

    async fn recv(socket: &UdpSocket) -> String {
        let mut buf = [0u8; 64];
        let len = tokio::time::timeout(Duration::from_secs(2), socket.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    #[tokio::test]
    async fn scenario_frame_reaches_puppet() {
        let mut rig = rig(None, Duration::from_millis(40)).await;
        *rig.pad.lock().unwrap() = Pad {
            drive: 0.5,
            turn: -0.2,
            head_lift: 0.0,
            head_turn: 0.03,
            talking: true,
            ..Default::default()
        };

        rig.control.step();

        assert_eq!(recv(&rig.puppet).await, "50,-20,0,0,1,0:?");
        assert_eq!(rig.audio.take(), vec!["stop_file", "microphone"]);
        assert_eq!(*rig.display.talking.lock().unwrap(), Some(true));
        assert_eq!(*rig.display.drive.lock().unwrap(), 0.5);
        assert_eq!(*rig.display.flushes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn speak_file_forces_talking_in_frame_only() {
        let mut rig = rig(Some("sounds/speak_hello.wav"), Duration::from_millis(40)).await;
        rig.pad.lock().unwrap().play_sound = true;

        let frame = rig.control.step();

        assert!(frame.talking);
        assert_eq!(recv(&rig.puppet).await, "0,0,0,0,1,0:?");
        assert_eq!(
            rig.audio.take(),
            vec!["play sounds/speak_hello.wav", "stop_microphone"]
        );
        // the status window shows the operator's own button
        assert_eq!(*rig.display.talking.lock().unwrap(), Some(false));
    }

    #[tokio::test]
    async fn other_sound_files_do_not_force_talking() {
        let mut rig = rig(Some("sounds/horn.wav"), Duration::from_millis(40)).await;
        rig.pad.lock().unwrap().play_sound = true;

        let frame = rig.control.step();
        assert!(!frame.talking);
    }

    #[tokio::test]
    async fn file_selection_is_edge_triggered() {
        let mut rig = rig(None, Duration::from_millis(40)).await;

        rig.pad.lock().unwrap().next = true;
        for _ in 0..5 {
            rig.control.step();
        }
        assert_eq!(*rig.display.next_calls.lock().unwrap(), 1);

        rig.pad.lock().unwrap().next = false;
        rig.control.step();
        rig.pad.lock().unwrap().next = true;
        rig.control.step();
        assert_eq!(*rig.display.next_calls.lock().unwrap(), 2);

        rig.pad.lock().unwrap().previous = true;
        rig.control.step();
        rig.control.step();
        assert_eq!(*rig.display.previous_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn stop_interrupts_period_sleep() {
        let rig = rig(None, Duration::from_secs(3600)).await;
        let polls = rig.polls.clone();

        let handle = rig.control.spawn();
        // first cycle runs immediately
        let _ = recv(&rig.puppet).await;
        assert_eq!(handle.state(), RunState::Running);

        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .unwrap();
        assert_eq!(*polls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn slow_file_open_does_not_stall_the_runtime() {
        let rig = rig(Some("sounds/horn.wav"), Duration::from_secs(3600)).await;
        rig.pad.lock().unwrap().play_sound = true;
        *rig.audio.open_delay.lock().unwrap() = Duration::from_millis(300);

        let handle = rig.control.spawn();
        let begun = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(begun.elapsed() < Duration::from_millis(200));

        let _ = recv(&rig.puppet).await;
        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .unwrap();
        assert_eq!(rig.audio.take()[0], "play sounds/horn.wav");
    }
}
