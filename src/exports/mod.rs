//! Export slots and the export table
//!
//! Each slot pairs a server-side export directory with a client mount target.

pub mod slot;
pub mod table;

pub use slot::{export_id_for, slot_dir_name, ExportSlot, MountIntentMap};
pub use table::ExportTableWriter;
