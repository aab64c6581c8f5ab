//! Status reconciliation rules
//!
//! Pure functions implementing the lifecycle rules: what status a row gets
//! given its prior history, which prior records a new upload closes, and how
//! duplicate hashes within one upload collapse. The upload use case wires
//! these to the repository.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::vulnerability::entities::VulnerabilityRecord;
use crate::domain::vulnerability::value_objects::{NormalizedRow, VulnStatus};

/// Assign a lifecycle status given the most recent prior record sharing the
/// row's hash (from any earlier month).
///
/// - no prior record → `New`
/// - prior record closed → `Reopened`
/// - prior record still open → `Ongoing`
///
/// A never-closed record from an older month (possible when months are
/// uploaded out of order) also yields `Ongoing`: nothing ever closed it.
pub fn assign_status(prior: Option<&VulnerabilityRecord>) -> VulnStatus {
    match prior {
        None => VulnStatus::New,
        Some(record) if record.status == VulnStatus::Closed => VulnStatus::Reopened,
        Some(_) => VulnStatus::Ongoing,
    }
}

/// Compute the close set for an upload: prior-month open records whose hash
/// is absent from the current batch.
///
/// Records whose status was manually overridden are left alone; only an
/// explicit reset makes them eligible for automated closure again.
pub fn close_set(
    prev_open: &[VulnerabilityRecord],
    batch_hashes: &HashSet<String>,
) -> Vec<Uuid> {
    prev_open
        .iter()
        .filter(|record| {
            !batch_hashes.contains(&record.vuln_hash) && !record.status_manually_changed
        })
        .map(|record| record.id)
        .collect()
}

/// Collapse rows sharing an identity hash within one upload.
///
/// The last row in file order wins; the survivor keeps the first occurrence's
/// position. Returns the deduplicated rows and the number of rows dropped.
pub fn dedupe_last_wins(rows: Vec<NormalizedRow>) -> (Vec<NormalizedRow>, usize) {
    let mut kept: Vec<NormalizedRow> = Vec::with_capacity(rows.len());
    let mut index_by_hash: HashMap<String, usize> = HashMap::new();
    let mut duplicates = 0;

    for row in rows {
        let hash = row.vuln_hash();
        match index_by_hash.get(&hash) {
            Some(&idx) => {
                kept[idx] = row;
                duplicates += 1;
            }
            None => {
                index_by_hash.insert(hash, kept.len());
                kept.push(row);
            }
        }
    }

    (kept, duplicates)
}
