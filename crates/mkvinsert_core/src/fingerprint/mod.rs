//! Content fingerprints and duplicate collapse.
//!
//! Every stream is copied out bit-exact with ffmpeg and hashed with MD5
//! while the bytes stream in. Records of the same kind and language that
//! share a hash carry identical content, so only the first one is kept.

use std::collections::HashSet;
use std::path::Path;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::models::{group_records, Invocation, SourceSlot, StreamRecord, Tool};
use crate::runner::{RunResult, ToolRunner};

/// Invocation that writes one stream's packets to stdout.
pub fn hash_invocation(path: &Path, stream_order: u32) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-v", "error", "-i"])
        .arg(path.to_string_lossy())
        .args(["-map".to_string(), format!("0:{}", stream_order)])
        .args(["-c", "copy", "-f", "data", "-"])
}

/// MD5 of everything `invocation` writes to stdout, as lowercase hex.
/// Empty output yields an empty digest.
pub fn stdout_digest(runner: &dyn ToolRunner, invocation: &Invocation) -> RunResult<String> {
    let mut context = md5::Context::new();
    let mut total = 0usize;
    runner.stream_stdout(invocation, &mut |chunk: &[u8]| {
        total += chunk.len();
        context.consume(chunk);
    })?;
    if total == 0 {
        return Ok(String::new());
    }
    Ok(format!("{:x}", context.compute()))
}

/// MD5 of one stream's packet data.
pub fn hash_stream(runner: &dyn ToolRunner, path: &Path, stream_order: u32) -> RunResult<String> {
    stdout_digest(runner, &hash_invocation(path, stream_order))
}

/// Compute hashes for all records on `pool`.
///
/// Returns one hash per record, in record order. A failed hash is logged
/// and reported as empty, which never collapses.
pub fn compute_hashes<'a>(
    runner: &dyn ToolRunner,
    pool: &ThreadPool,
    records: &[StreamRecord],
    path_of: impl Fn(SourceSlot) -> &'a Path + Sync,
) -> Vec<String> {
    pool.install(|| {
        records
            .par_iter()
            .map(|record| {
                let path = path_of(record.slot);
                match hash_stream(runner, path, record.stream_order) {
                    Ok(hash) => hash,
                    Err(e) => {
                        tracing::warn!("Could not fingerprint {}: {}", record.label(), e);
                        String::new()
                    }
                }
            })
            .collect()
    })
}

/// Discard later records whose hash repeats within their kind and language.
///
/// Returns the number of records discarded. Running it again changes nothing.
pub fn collapse_duplicates(records: &mut [StreamRecord]) -> usize {
    let groups = group_records(records);
    let mut dropped = 0;

    for group in groups.values() {
        for (language, indices) in &group.languages {
            let mut seen: HashSet<String> = HashSet::new();
            for &i in indices {
                let record = &records[i];
                if !record.keep() || record.content_hash.is_empty() {
                    continue;
                }
                if seen.insert(record.content_hash.clone()) {
                    continue;
                }
                let reason = format!(
                    "identical content to an earlier {} {} track",
                    group.kind, language
                );
                if records[i].discard(reason) {
                    tracing::debug!("Fingerprint duplicate: {}", records[i].label());
                    dropped += 1;
                }
            }
        }
    }

    dropped
}
