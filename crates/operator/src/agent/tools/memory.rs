//! Markdown knowledge base.
//!
//! Read/write operations for the agent's persistent memory: a tree of
//! markdown documents under one root (cluster notes, known issues, saved
//! incident reports). Plain filesystem I/O, no caching.

use chrono::Utc;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::info;

use super::{ToolError, ToolResult};

const REPORTS_DIR: &str = "reports";

pub struct MemoryStore {
    root: PathBuf,
}

impl MemoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a relative document path inside the root. Absolute paths and
    /// parent-directory components are rejected.
    fn resolve(&self, filename: &str) -> std::result::Result<PathBuf, ToolError> {
        let path = Path::new(filename);
        if path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(ToolError::InvalidArgs(format!(
                "'{filename}' must be a relative path inside the memory root"
            )));
        }
        Ok(self.root.join(path))
    }

    /// All markdown files under the root, as sorted relative paths.
    pub fn list_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        collect_markdown(&self.root, &self.root, &mut files);
        files.sort();
        files
    }

    pub fn read_file(&self, filename: &str) -> ToolResult {
        let path = self.resolve(filename)?;
        if !path.exists() {
            return Err(ToolError::NotFound(format!(
                "'{filename}' not found in memory. Available files: {}",
                self.list_files().join(", ")
            )));
        }
        let content = fs::read_to_string(&path)?;
        info!(filename, bytes = content.len(), "Read memory file");
        Ok(content)
    }

    pub fn write_file(&self, filename: &str, content: &str) -> ToolResult {
        let path = self.resolve(filename)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        info!(filename, bytes = content.len(), "Wrote memory file");
        Ok(format!("Wrote {} bytes to {filename}", content.len()))
    }

    pub fn append_file(&self, filename: &str, content: &str) -> ToolResult {
        let path = self.resolve(filename)?;
        if !path.exists() {
            return Err(ToolError::NotFound(format!(
                "'{filename}' not found. Use write_file to create it first."
            )));
        }
        let mut existing = fs::read_to_string(&path)?;
        existing.push_str(content);
        fs::write(&path, existing)?;
        info!(filename, bytes = content.len(), "Appended to memory file");
        Ok(format!("Appended {} bytes to {filename}", content.len()))
    }

    /// Case-insensitive substring search, reported with line numbers.
    pub fn search_in_file(&self, filename: &str, term: &str) -> ToolResult {
        let path = self.resolve(filename)?;
        if !path.exists() {
            return Err(ToolError::NotFound(format!("'{filename}' not found")));
        }

        let content = fs::read_to_string(&path)?;
        let term_lower = term.to_lowercase();
        let matches: Vec<String> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| line.to_lowercase().contains(&term_lower))
            .map(|(i, line)| format!("Line {}: {}", i + 1, line.trim_end()))
            .collect();

        if matches.is_empty() {
            return Ok(format!("No matches found for '{term}' in {filename}"));
        }
        Ok(format!(
            "Found {} matches in {filename}:\n{}",
            matches.len(),
            matches.join("\n")
        ))
    }

    /// Save an incident report under `reports/` with a timestamped,
    /// sanitized filename.
    pub fn save_report(&self, alert_name: &str, content: &str) -> ToolResult {
        let timestamp = Utc::now().format("%Y-%m-%d-%H%M%S");
        let filename = format!(
            "{REPORTS_DIR}/{timestamp}-{}.md",
            sanitize_report_name(alert_name)
        );
        self.write_file(&filename, content)?;
        Ok(format!("Report saved as {filename}"))
    }

    /// Recent report filenames, newest first by modification time.
    pub fn recent_reports(&self, limit: usize) -> Vec<String> {
        let reports_path = self.root.join(REPORTS_DIR);
        let Ok(entries) = fs::read_dir(&reports_path) else {
            return Vec::new();
        };

        let mut reports: Vec<(std::time::SystemTime, String)> = entries
            .flatten()
            .filter(|entry| {
                entry.path().extension().is_some_and(|ext| ext == "md")
            })
            .filter_map(|entry| {
                let modified = entry.metadata().ok()?.modified().ok()?;
                let name = entry.file_name().to_string_lossy().into_owned();
                Some((modified, format!("{REPORTS_DIR}/{name}")))
            })
            .collect();

        reports.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        reports.into_iter().take(limit).map(|(_, name)| name).collect()
    }
}

fn collect_markdown(dir: &Path, root: &Path, files: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_markdown(&path, root, files);
        } else if path.extension().is_some_and(|ext| ext == "md") {
            if let Ok(relative) = path.strip_prefix(root) {
                files.push(relative.to_string_lossy().into_owned());
            }
        }
    }
}

fn sanitize_report_name(alert_name: &str) -> String {
    alert_name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, MemoryStore) {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn write_read_append_roundtrip() {
        let (_dir, store) = store();

        let written = store.write_file("known-issues.md", "# Known Issues\n").unwrap();
        assert!(written.contains("known-issues.md"));

        store.append_file("known-issues.md", "- OOMKilled in prod\n").unwrap();
        let content = store.read_file("known-issues.md").unwrap();
        assert_eq!(content, "# Known Issues\n- OOMKilled in prod\n");
    }

    #[test]
    fn append_requires_existing_file() {
        let (_dir, store) = store();
        let err = store.append_file("missing.md", "text").unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn list_files_is_recursive_and_sorted() {
        let (_dir, store) = store();
        store.write_file("namespace-map.md", "# Map").unwrap();
        store.write_file("reports/2024-incident.md", "# Incident").unwrap();
        store.write_file("notes.txt", "ignored").unwrap();

        assert_eq!(
            store.list_files(),
            vec!["namespace-map.md", "reports/2024-incident.md"]
        );
    }

    #[test]
    fn search_reports_matching_lines() {
        let (_dir, store) = store();
        store
            .write_file("known-issues.md", "# Issues\n\nOOMKilled in api pods\nnetwork flake\n")
            .unwrap();

        let result = store.search_in_file("known-issues.md", "oomkilled").unwrap();
        assert!(result.contains("Found 1 matches"));
        assert!(result.contains("Line 3: OOMKilled in api pods"));

        let none = store.search_in_file("known-issues.md", "etcd").unwrap();
        assert!(none.contains("No matches found"));
    }

    #[test]
    fn save_report_uses_sanitized_timestamped_name() {
        let (_dir, store) = store();
        let message = store
            .save_report("KubePod CrashLooping!", "# Report body")
            .unwrap();

        assert!(message.contains("reports/"));
        assert!(message.contains("kubepod-crashlooping-"));

        let reports = store.recent_reports(10);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with("reports/"));
        assert!(reports[0].ends_with(".md"));
    }

    #[test]
    fn path_traversal_is_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.read_file("../outside.md").unwrap_err(),
            ToolError::InvalidArgs(_)
        ));
        assert!(matches!(
            store.write_file("/etc/passwd", "x").unwrap_err(),
            ToolError::InvalidArgs(_)
        ));
    }
}
