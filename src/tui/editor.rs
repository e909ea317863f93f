//! Plain text editor buffer.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Editor {
    lines: Vec<String>,
    /// Cursor row
    row: usize,
    /// Cursor column, in chars
    col: usize,
    /// First visible line
    pub scroll: usize,
    path: Option<PathBuf>,
    read_only: bool,
}

impl Default for Editor {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
            scroll: 0,
            path: None,
            read_only: false,
        }
    }
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer, keeping the current file
    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect();
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.row = 0;
        self.col = 0;
        self.scroll = 0;
    }

    /// Load `text` as the contents of `path`
    pub fn open(&mut self, path: Option<PathBuf>, text: &str, read_only: bool) {
        self.set_text(text);
        self.path = path;
        self.read_only = read_only;
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn clear(&mut self) {
        self.set_text("");
    }

    pub fn insert_char(&mut self, c: char) {
        if self.read_only {
            return;
        }
        if c == '\n' {
            self.newline();
            return;
        }
        let idx = self.byte_index();
        self.lines[self.row].insert(idx, c);
        self.col += 1;
    }

    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars().filter(|c| *c != '\r') {
            self.insert_char(c);
        }
    }

    pub fn newline(&mut self) {
        if self.read_only {
            return;
        }
        let idx = self.byte_index();
        let rest = self.lines[self.row].split_off(idx);
        self.row += 1;
        self.lines.insert(self.row, rest);
        self.col = 0;
    }

    pub fn backspace(&mut self) {
        if self.read_only {
            return;
        }
        if self.col > 0 {
            self.col -= 1;
            let idx = self.byte_index();
            self.lines[self.row].remove(idx);
        } else if self.row > 0 {
            let line = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.lines[self.row].chars().count();
            self.lines[self.row].push_str(&line);
        }
    }

    pub fn delete(&mut self) {
        if self.read_only {
            return;
        }
        if self.col < self.line_len() {
            let idx = self.byte_index();
            self.lines[self.row].remove(idx);
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
        }
    }

    pub fn move_left(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = self.line_len();
        }
    }

    pub fn move_right(&mut self) {
        if self.col < self.line_len() {
            self.col += 1;
        } else if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.row > 0 {
            self.row -= 1;
            self.col = self.col.min(self.line_len());
        }
    }

    pub fn move_down(&mut self) {
        if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = self.col.min(self.line_len());
        }
    }

    pub fn home(&mut self) {
        self.col = 0;
    }

    pub fn end(&mut self) {
        self.col = self.line_len();
    }

    /// Keep the cursor row inside a viewport of `height` lines
    pub fn scroll_to_cursor(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.row < self.scroll {
            self.scroll = self.row;
        } else if self.row >= self.scroll + height {
            self.scroll = self.row + 1 - height;
        }
    }

    fn line_len(&self) -> usize {
        self.lines[self.row].chars().count()
    }

    fn byte_index(&self) -> usize {
        self.lines[self.row]
            .char_indices()
            .nth(self.col)
            .map(|(i, _)| i)
            .unwrap_or(self.lines[self.row].len())
    }
}
