/// Export table rendering and all-or-nothing publication
use crate::config::types::{ParamountError, Result};
use crate::exports::slot::ExportSlot;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Options shared by every export line; `fsid=` is appended per slot
pub const EXPORT_OPTIONS: &str = "rw,no_subtree_check,no_root_squash";

/// Any client may mount
pub const CLIENT_SPEC: &str = "*";

pub fn begin_marker(tag: &str) -> String {
    format!("### BEGIN {}", tag)
}

pub fn end_marker(tag: &str) -> String {
    format!("### END {}", tag)
}

/// Option list for one slot
pub fn export_options(slot: &ExportSlot) -> String {
    format!("{},fsid={}", EXPORT_OPTIONS, slot.export_id.hyphenated())
}

/// One exports(5) line; the path is quoted so whitespace survives
pub fn export_line(slot: &ExportSlot) -> String {
    format!(
        "\"{}\"\t{}({})",
        slot.export_dir.display(),
        CLIENT_SPEC,
        export_options(slot)
    )
}

/// Builds and publishes the export table for a run
#[derive(Debug, Clone)]
pub struct ExportTableWriter {
    path: PathBuf,
    tag: String,
}

impl ExportTableWriter {
    pub fn new(path: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tag: tag.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full file content: marker-delimited block with one line per slot, in slot order
    pub fn render(&self, slots: &[ExportSlot]) -> String {
        let mut content = String::new();
        content.push_str(&begin_marker(&self.tag));
        content.push('\n');
        for slot in slots {
            let line = export_line(slot);
            log::debug!("options: {}", export_options(slot));
            content.push_str(&line);
            content.push('\n');
        }
        content.push_str(&end_marker(&self.tag));
        content.push('\n');
        content
    }

    /// Write the table atomically: temp sibling, fsync, rename over the target.
    /// On failure nothing is left at the target path.
    pub fn write(&self, slots: &[ExportSlot]) -> Result<()> {
        let content = self.render(slots);
        let tmp = self.temp_path();

        if let Err(e) = write_synced(&tmp, content.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(ParamountError::ExportTable(format!(
                "Failed to write {}: {}",
                tmp.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(ParamountError::ExportTable(format!(
                "Failed to publish {}: {}",
                self.path.display(),
                e
            )));
        }

        if let Some(parent) = self.path.parent() {
            if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
                log::warn!("Failed to fsync {}: {}", parent.display(), e);
            }
        }

        log::info!(
            "Wrote {} exports to {}",
            slots.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Remove the published table; an absent file counts as removed
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ParamountError::ExportTable(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    // Must not end in `.exports` or exportfs would read a half-written file.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.tag.clone());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Export lines found between the markers for `tag`
pub fn block_lines<'a>(content: &'a str, tag: &str) -> Vec<&'a str> {
    let begin = begin_marker(tag);
    let end = end_marker(tag);
    content
        .lines()
        .skip_while(|line| *line != begin)
        .skip(1)
        .take_while(|line| *line != end)
        .collect()
}
