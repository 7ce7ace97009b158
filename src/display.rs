use std::path::PathBuf;

/// Operator-facing status view, updated once per control cycle.
///
/// Also owns the sound-file selection, since the operator picks the effect
/// to play from the status window.
pub trait DisplaySink: Send + Sync {
    fn set_drive(&self, value: f32);
    fn set_turn(&self, value: f32);
    fn set_head_lift(&self, value: f32);
    fn set_head_turn(&self, value: f32);

    fn set_open_mouth(&self, on: bool);
    fn set_talking(&self, on: bool);
    fn set_play_sound(&self, on: bool);

    fn selected_audio_file_path(&self) -> Option<PathBuf>;
    fn select_previous_audio_file(&self);
    fn select_next_audio_file(&self);

    /// Publish the values set during this cycle.
    fn flush(&self) {}
}
