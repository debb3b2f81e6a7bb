//! Layout of surviving tracks in the intermediate file.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::models::{SourceSlot, StreamRecord, TrackKind, TrackStage};

/// File name of the intermediate multiplex inside the work directory.
pub const INTERMEDIATE_NAME: &str = "merged_split.mkv";

/// One surviving track on its way into the intermediate file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
    /// Index into the record list.
    pub record: usize,
    pub kind: TrackKind,
    pub slot: SourceSlot,
    pub stream_order: u32,
    pub extract_path: PathBuf,
    pub convert_path: PathBuf,
    /// Track id inside the intermediate file.
    pub intermediate_id: u32,
    pub stage: TrackStage,
}

impl Fragment {
    /// Move to the next stage. Stages never go back.
    pub fn advance(&mut self) -> TrackStage {
        if let Some(next) = self.stage.next() {
            self.stage = next;
        }
        self.stage
    }
}

/// Path of the intermediate file for `work_dir`.
pub fn intermediate_path(work_dir: &Path) -> PathBuf {
    work_dir.join(INTERMEDIATE_NAME)
}

/// Lay out kept records: subtitles, main audio, commentary, then audio
/// description, each in record order.
///
/// The position of a fragment is its track id in the intermediate file.
pub fn plan_fragments(records: &[StreamRecord], work_dir: &Path) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    for kind in TrackKind::EMISSION_ORDER {
        for (index, record) in records.iter().enumerate() {
            if !record.keep() || record.kind() != kind {
                continue;
            }
            let stem = format!("{}_{}", record.slot, record.stream_order);
            fragments.push(Fragment {
                record: index,
                kind,
                slot: record.slot,
                stream_order: record.stream_order,
                extract_path: work_dir.join(format!("{}_tmp_extr.mkv", stem)),
                convert_path: work_dir.join(format!("{}_tmp.mkv", stem)),
                intermediate_id: fragments.len() as u32,
                stage: TrackStage::Pending,
            });
        }
    }
    fragments
}
