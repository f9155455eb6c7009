//! Export slots and the intended export-to-client mapping.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One requested export/mount pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSlot {
    pub index: usize,
    /// Server-side exported directory
    pub export_dir: PathBuf,
    /// Client-side mount target
    pub client_dir: PathBuf,
    /// `fsid=` tag; exports share one filesystem so each needs its own
    pub export_id: Uuid,
}

impl ExportSlot {
    pub fn new(index: usize, export_dir: PathBuf, client_dir: PathBuf) -> Self {
        Self {
            index,
            export_dir,
            client_dir,
            export_id: export_id_for(index),
        }
    }
}

/// Stable synthetic export id for slot `index`: `00000000-0000-0000-0000-00000000002a`
pub fn export_id_for(index: usize) -> Uuid {
    Uuid::from_u128(index as u128)
}

/// Directory name for slot `index` under both the export and client roots
pub fn slot_dir_name(index: usize) -> String {
    format!("d{:04}", index)
}

/// What should be mounted where: export directory -> client directory
#[derive(Debug, Clone, Default)]
pub struct MountIntentMap {
    intents: HashMap<PathBuf, PathBuf>,
}

impl MountIntentMap {
    pub fn from_slots(slots: &[ExportSlot]) -> Self {
        Self {
            intents: slots
                .iter()
                .map(|slot| (slot.export_dir.clone(), slot.client_dir.clone()))
                .collect(),
        }
    }

    /// Intended client directory for an export, if the export belongs to this run
    pub fn expected_client(&self, export_dir: &Path) -> Option<&Path> {
        self.intents.get(export_dir).map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_id_format() {
        assert_eq!(
            export_id_for(0).hyphenated().to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            export_id_for(0x2a).hyphenated().to_string(),
            "00000000-0000-0000-0000-00000000002a"
        );
        assert_ne!(export_id_for(1), export_id_for(2));
    }

    #[test]
    fn test_slot_dir_name() {
        assert_eq!(slot_dir_name(0), "d0000");
        assert_eq!(slot_dir_name(127), "d0127");
        assert_eq!(slot_dir_name(12345), "d12345");
    }

    #[test]
    fn test_intent_map_lookup() {
        let slots = vec![
            ExportSlot::new(0, PathBuf::from("/ws/mount/d0000"), PathBuf::from("/ws/client/d0000")),
            ExportSlot::new(1, PathBuf::from("/ws/mount/d0001"), PathBuf::from("/ws/client/d0001")),
        ];
        let map = MountIntentMap::from_slots(&slots);
        assert_eq!(
            map.expected_client(Path::new("/ws/mount/d0000")),
            Some(Path::new("/ws/client/d0000"))
        );
        assert_eq!(
            map.expected_client(Path::new("/ws/mount/d0001")),
            Some(Path::new("/ws/client/d0001"))
        );
        assert!(map.expected_client(Path::new("/ws/mount/d0002")).is_none());
    }
}
