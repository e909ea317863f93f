//! Directory tree for the side panel.
//!
//! Directories start collapsed; `toggle` expands or collapses the selected
//! one. Hidden entries are not listed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    pub name: String,
    pub depth: usize,
    pub is_dir: bool,
    pub expanded: bool,
}

#[derive(Debug, Default)]
pub struct FileTree {
    root: Option<PathBuf>,
    expanded: HashSet<PathBuf>,
    visible: Vec<TreeEntry>,
    selected: usize,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Show `root`, resetting expansion if it changed
    pub fn set_root(&mut self, root: &Path) {
        if self.root.as_deref() != Some(root) {
            self.root = Some(root.to_path_buf());
            self.expanded.clear();
            self.selected = 0;
        }
        self.refresh();
    }

    /// Re-read the directory, keeping the selection where possible
    pub fn refresh(&mut self) {
        let selected = self.selected().map(|e| e.path.clone());
        self.visible.clear();
        if let Some(root) = self.root.clone() {
            self.collect(&root, 0);
        }
        self.selected = selected
            .and_then(|path| self.visible.iter().position(|e| e.path == path))
            .unwrap_or(0)
            .min(self.visible.len().saturating_sub(1));
    }

    fn collect(&mut self, dir: &Path, depth: usize) {
        let mut entries: Vec<(String, PathBuf, bool)> = match std::fs::read_dir(dir) {
            Ok(read) => read
                .filter_map(|entry| entry.ok())
                .map(|entry| {
                    let path = entry.path();
                    let is_dir = path.is_dir();
                    (entry.file_name().to_string_lossy().to_string(), path, is_dir)
                })
                .filter(|(name, _, _)| !name.starts_with('.'))
                .collect(),
            Err(e) => {
                debug!("Cannot list {}: {}", dir.display(), e);
                return;
            }
        };
        // Directories first, then by name
        entries.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

        for (name, path, is_dir) in entries {
            let expanded = is_dir && self.expanded.contains(&path);
            self.visible.push(TreeEntry {
                path: path.clone(),
                name,
                depth,
                is_dir,
                expanded,
            });
            if expanded {
                self.collect(&path, depth + 1);
            }
        }
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.visible
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&TreeEntry> {
        self.visible.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.visible.is_empty() {
            self.selected = (self.selected + 1) % self.visible.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.visible.is_empty() {
            self.selected = self.selected.checked_sub(1).unwrap_or(self.visible.len() - 1);
        }
    }

    /// Expand or collapse the selected directory
    pub fn toggle(&mut self) {
        let Some(entry) = self.selected() else { return };
        if !entry.is_dir {
            return;
        }
        let path = entry.path.clone();
        if !self.expanded.remove(&path) {
            self.expanded.insert(path);
        }
        self.refresh();
    }
}
