/// Live mount table (`/proc/self/mounts`) parsing
use crate::config::types::{ParamountError, Result, TRACKED_FSTYPES};
use std::fs;
use std::path::Path;

pub const PROC_MOUNTS: &str = "/proc/self/mounts";

// Field layout: device mountpoint filesystem options dump pass
const FIELD_SOURCE: usize = 0;
const FIELD_TARGET: usize = 1;
const FIELD_FSTYPE: usize = 2;
const FIELD_OPTIONS: usize = 3;

/// One line of the live mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveMountRecord {
    pub source: String,
    pub target: String,
    pub fstype: String,
    pub options: String,
}

impl LiveMountRecord {
    /// Whether this record belongs to the NFS family this tool provisions
    pub fn is_tracked(&self) -> bool {
        TRACKED_FSTYPES.contains(&self.fstype.as_str())
    }

    /// Server part of an NFS source (`server:/path`)
    pub fn server(&self) -> Option<&str> {
        match self.source.split_once(':') {
            Some((server, path)) if path.starts_with('/') => Some(server),
            _ => None,
        }
    }

    /// Exported path of an NFS source (`server:/path`), or the whole source otherwise
    pub fn export_path(&self) -> &str {
        match self.source.split_once(':') {
            Some((_, path)) if path.starts_with('/') => path,
            _ => &self.source,
        }
    }
}

/// Undo the kernel's octal escaping of whitespace and backslashes (`\040` etc.)
fn unescape_field(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Parse a single mount table line; lines with fewer than three fields are skipped
pub fn parse_mount_line(line: &str) -> Option<LiveMountRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() <= FIELD_FSTYPE {
        return None;
    }

    Some(LiveMountRecord {
        source: unescape_field(fields[FIELD_SOURCE]),
        target: unescape_field(fields[FIELD_TARGET]),
        fstype: fields[FIELD_FSTYPE].to_string(),
        options: fields
            .get(FIELD_OPTIONS)
            .map(|s| s.to_string())
            .unwrap_or_default(),
    })
}

/// Parse a whole mount table, preserving line order
pub fn parse_mount_table(content: &str) -> Vec<LiveMountRecord> {
    content.lines().filter_map(parse_mount_line).collect()
}

/// Read and parse a mount table file
pub fn read_mount_table(path: &Path) -> Result<Vec<LiveMountRecord>> {
    let content = fs::read_to_string(path).map_err(|e| {
        ParamountError::MountTable(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Ok(parse_mount_table(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nfs_line() {
        let line = "127.0.0.1:/tmp/paramount.abc/mount/d0000 /tmp/paramount.abc/client/d0000 nfs rw,relatime,vers=3 0 0";
        let record = parse_mount_line(line).unwrap();
        assert_eq!(record.source, "127.0.0.1:/tmp/paramount.abc/mount/d0000");
        assert_eq!(record.target, "/tmp/paramount.abc/client/d0000");
        assert_eq!(record.fstype, "nfs");
        assert_eq!(record.options, "rw,relatime,vers=3");
        assert!(record.is_tracked());
        assert_eq!(record.export_path(), "/tmp/paramount.abc/mount/d0000");
        assert_eq!(record.server(), Some("127.0.0.1"));
    }

    #[test]
    fn test_nfs4_is_tracked_proc_is_not() {
        let nfs4 = parse_mount_line("srv:/export /mnt nfs4 rw 0 0").unwrap();
        assert!(nfs4.is_tracked());

        let proc_ = parse_mount_line("proc /proc proc rw,nosuid 0 0").unwrap();
        assert!(!proc_.is_tracked());
        assert_eq!(proc_.export_path(), "proc");
        assert_eq!(proc_.server(), None);
    }

    #[test]
    fn test_escaped_whitespace() {
        let record = parse_mount_line("srv:/a\\040b /mnt/x\\040y nfs rw 0 0").unwrap();
        assert_eq!(record.export_path(), "/a b");
        assert_eq!(record.target, "/mnt/x y");
    }

    #[test]
    fn test_short_and_blank_lines_skipped() {
        let table = "\nrootfs /\nsysfs /sys sysfs rw 0 0\n";
        let records = parse_mount_table(table);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fstype, "sysfs");
    }

    #[test]
    fn test_read_proc_mounts() {
        let records = read_mount_table(Path::new(PROC_MOUNTS)).unwrap();
        assert!(!records.is_empty());
    }
}
