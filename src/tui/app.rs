//! Monitor application state and key handling.

use std::io::Write;
use std::path::Path;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{info, warn};

use super::editor::Editor;
use super::tree::FileTree;
use crate::ipc::Message;
use crate::supervisor::{EditorLoad, MonitorState};

/// Which panel receives keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    Tree,
    #[default]
    Editor,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Tree => Focus::Editor,
            Focus::Editor => Focus::Tree,
        }
    }
}

#[derive(Debug, Default)]
pub struct App {
    pub monitor: MonitorState,
    pub editor: Editor,
    pub tree: FileTree,
    pub focus: Focus,
    pub should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a worker message and fold its effects into the panels
    pub fn apply(&mut self, message: Message) {
        self.monitor.apply(message);
        self.sync();
    }

    /// Pick up directory changes and pending editor loads from the monitor
    pub fn sync(&mut self) {
        if let Some(dir) = self.monitor.directory.clone()
            && self.tree.root() != Some(dir.as_path())
        {
            self.tree.set_root(&dir);
        }

        if let Some(load) = self.monitor.take_editor_load() {
            self.load_editor(load);
        }
    }

    /// Periodic refresh of the file tree
    pub fn tick(&mut self) {
        self.tree.refresh();
    }

    fn load_editor(&mut self, load: EditorLoad) {
        match load.path {
            Some(path) => {
                let text = std::fs::read_to_string(&path).unwrap_or_else(|e| {
                    warn!("Cannot read {}: {}, showing message content", path.display(), e);
                    load.content.clone()
                });
                self.editor.open(Some(path), &text, false);
                self.focus = Focus::Editor;
            }
            None => self.editor.set_text(&load.content),
        }
    }

    /// Handle a key press. Returns true when the monitor should close.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c')) {
            self.should_quit = true;
            return true;
        }

        if self.monitor.modal.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                self.monitor.dismiss_modal();
            }
            return false;
        }

        match (ctrl, key.code) {
            (true, KeyCode::Char('s')) => self.save(),
            (true, KeyCode::Char('l')) => {
                if !self.editor.is_read_only() {
                    self.editor.clear();
                }
            }
            (_, KeyCode::Tab) => self.focus = self.focus.next(),
            _ => match self.focus {
                Focus::Tree => self.handle_tree_key(key),
                Focus::Editor => self.handle_editor_key(key),
            },
        }
        false
    }

    pub fn handle_paste(&mut self, text: &str) {
        if self.focus == Focus::Editor && self.monitor.modal.is_none() {
            self.editor.insert_str(text);
        }
    }

    fn handle_tree_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.tree.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.tree.select_next(),
            KeyCode::Enter => self.open_selected(),
            _ => {}
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.editor.insert_char(c),
            KeyCode::Enter => self.editor.newline(),
            KeyCode::Backspace => self.editor.backspace(),
            KeyCode::Delete => self.editor.delete(),
            KeyCode::Left => self.editor.move_left(),
            KeyCode::Right => self.editor.move_right(),
            KeyCode::Up => self.editor.move_up(),
            KeyCode::Down => self.editor.move_down(),
            KeyCode::Home => self.editor.home(),
            KeyCode::End => self.editor.end(),
            _ => {}
        }
    }

    /// Directories toggle; files open read-only
    fn open_selected(&mut self) {
        let Some(entry) = self.tree.selected().cloned() else {
            return;
        };
        if entry.is_dir {
            self.tree.toggle();
            return;
        }
        match std::fs::read_to_string(&entry.path) {
            Ok(text) => {
                self.editor.open(Some(entry.path), &text, true);
                self.monitor.editor_status = format!("Viewing {}", entry.name);
            }
            Err(e) => self.monitor.editor_status = format!("Cannot open {}: {}", entry.name, e),
        }
    }

    /// Write the buffer back to the file it was loaded from, then clear it
    pub fn save(&mut self) {
        let Some(path) = self.editor.path().map(|p| p.to_path_buf()) else {
            self.monitor.editor_status = "No file to save".to_string();
            return;
        };
        if self.editor.is_read_only() {
            self.monitor.editor_status = "Read-only".to_string();
            return;
        }

        match write_atomic(&path, self.editor.text().as_bytes()) {
            Ok(()) => {
                info!("Saved editor to {}", path.display());
                self.monitor.editor_status = "Saved".to_string();
                self.editor.clear();
            }
            Err(e) => {
                warn!("Save to {} failed: {}", path.display(), e);
                self.monitor.editor_status = format!("Save failed: {}", e);
            }
        }
    }
}

/// Write through a hidden sibling and rename it over `path`, so readers only
/// ever see the old or the new content.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("quimera");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));
    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)
}
