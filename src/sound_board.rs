//! Sound-effect files available for playback and the operator's selection.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct SoundBoard {
    directory: PathBuf,
    extension: String,
    files: Vec<String>,
    selected: usize,
}

impl SoundBoard {
    /// Scan `directory` for files ending in `.extension`. A missing directory
    /// yields an empty board.
    pub fn new(directory: impl Into<PathBuf>, extension: &str) -> Self {
        let mut board = Self {
            directory: directory.into(),
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
            files: Vec::new(),
            selected: 0,
        };
        board.refresh();
        board
    }

    /// Rescan the directory, keeping the selection on the same file if it
    /// still exists.
    pub fn refresh(&mut self) {
        let previous = self.selected_name().map(str::to_owned);

        self.files = match list_files(&self.directory, &self.extension) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Cannot list sounds in {}: {}", self.directory.display(), e);
                Vec::new()
            }
        };

        self.selected = previous
            .and_then(|name| self.files.iter().position(|f| *f == name))
            .unwrap_or(0);
        log::info!("{} sound files in {}", self.files.len(), self.directory.display());
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn selected_index(&self) -> Option<usize> {
        if self.files.is_empty() { None } else { Some(self.selected) }
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.files.get(self.selected).map(String::as_str)
    }

    pub fn selected_path(&self) -> Option<PathBuf> {
        self.selected_name().map(|name| self.directory.join(name))
    }

    /// Selection stops at the first entry.
    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Selection stops at the last entry.
    pub fn select_next(&mut self) {
        if self.selected + 1 < self.files.len() {
            self.selected += 1;
        }
    }

    /// Returns false when `index` is out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.files.len() {
            self.selected = index;
            true
        } else {
            false
        }
    }
}

fn list_files(directory: &Path, extension: &str) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if let (true, Some(name)) = (matches, path.file_name().and_then(|n| n.to_str())) {
            files.push(name.to_string());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sounds_dir(name: &str, files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("robotpi_sounds_{}_{}", std::process::id(), name));
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), b"").unwrap();
        }
        dir
    }

    #[test]
    fn lists_matching_files_sorted() {
        let dir = sounds_dir("list", &["b_laugh.wav", "speak_hello.WAV", "a_horn.wav", "notes.txt"]);
        let board = SoundBoard::new(&dir, "wav");
        assert_eq!(board.files(), &["a_horn.wav", "b_laugh.wav", "speak_hello.WAV"]);
        assert_eq!(board.selected_path(), Some(dir.join("a_horn.wav")));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn selection_is_bounded() {
        let dir = sounds_dir("bounds", &["1.wav", "2.wav", "3.wav"]);
        let mut board = SoundBoard::new(&dir, "wav");

        board.select_previous();
        assert_eq!(board.selected_index(), Some(0));
        for _ in 0..5 {
            board.select_next();
        }
        assert_eq!(board.selected_name(), Some("3.wav"));
        assert!(!board.select(7));
        assert!(board.select(1));
        assert_eq!(board.selected_name(), Some("2.wav"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn refresh_keeps_selected_file() {
        let dir = sounds_dir("refresh", &["b.wav", "c.wav"]);
        let mut board = SoundBoard::new(&dir, "wav");
        board.select_next();
        assert_eq!(board.selected_name(), Some("c.wav"));

        fs::write(dir.join("a.wav"), b"").unwrap();
        board.refresh();
        assert_eq!(board.selected_name(), Some("c.wav"));
        assert_eq!(board.selected_index(), Some(2));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_directory_is_empty() {
        let board = SoundBoard::new("/nonexistent/robotpi/sounds", "wav");
        assert!(board.files().is_empty());
        assert_eq!(board.selected_path(), None);
        assert_eq!(board.selected_index(), None);
    }
}
