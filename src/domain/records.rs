/// Level-time leaderboard: append-only (time, level) records.
///
/// Ordering is owned here. `sort()` is a top-down merge sort that keeps the
/// left element on ties, so records with equal times keep insertion order.
/// `search()` is a binary search with a tolerance band instead of exact
/// equality:
///
/// ┌─────────────────────────────────┬──────────────┐
/// │ Probe                            │ Next         │
/// ├─────────────────────────────────┼──────────────┤
/// │ |probe.time − value| < 0.01      │ MATCH        │
/// │ probe.time < value               │ right half   │
/// │ otherwise                        │ left half    │
/// └─────────────────────────────────┴──────────────┘
///
/// When several records sit inside the band the probe path may land on any
/// of them (or skip some). A hit is walked back to the first record of its
/// contiguous run inside the band, so equal times report the earliest slot.
/// Callers get *a* match, not necessarily the nearest one.

/// Absolute tolerance for `search()`.
pub const SEARCH_TOLERANCE: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRecord {
    /// Seconds, rounded to two decimals on insertion.
    pub time: f64,
    /// 0-based level index.
    pub level: usize,
}

/// Successful `search()` probe: position in the sorted store + level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub index: usize,
    pub level: usize,
}

#[derive(Clone, Debug, Default)]
pub struct TimeRecordStore {
    records: Vec<TimeRecord>,
}

impl TimeRecordStore {
    pub fn new() -> Self {
        TimeRecordStore { records: Vec::new() }
    }

    /// Append a finished run. The time is rounded to 2 decimals.
    pub fn add_level_time(&mut self, time: f64, level: usize) {
        debug_assert!(time.is_finite(), "level time must be finite");
        self.records.push(TimeRecord {
            time: round2(time),
            level,
        });
    }

    /// Sort ascending by time (stable).
    pub fn sort(&mut self) {
        let records = std::mem::take(&mut self.records);
        self.records = merge_sort(records);
    }

    /// Sort, then binary-search for a record within `SEARCH_TOLERANCE`.
    pub fn search(&mut self, value: f64) -> Option<SearchHit> {
        self.sort();

        let mut left = 0usize;
        let mut right = self.records.len();
        // Half-open [left, right) so the bounds never underflow.
        while left < right {
            let mid = left + (right - left) / 2;
            let probe = self.records[mid];
            if within_tolerance(probe.time, value) {
                // Report the first record of the matching run.
                let mut index = mid;
                while index > 0 && within_tolerance(self.records[index - 1].time, value) {
                    index -= 1;
                }
                return Some(SearchHit { index, level: self.records[index].level });
            } else if probe.time < value {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        None
    }

    /// Sort, then return the lowest time.
    pub fn fastest(&mut self) -> Option<TimeRecord> {
        self.sort();
        self.records.first().copied()
    }

    /// Records in their current order (sorted after any sort/search/fastest).
    pub fn records(&self) -> &[TimeRecord] {
        &self.records
    }
}

// ── Merge sort ──

fn merge_sort(mut records: Vec<TimeRecord>) -> Vec<TimeRecord> {
    if records.len() <= 1 {
        return records;
    }
    let mid = records.len() / 2;
    let right = records.split_off(mid);
    let left = merge_sort(records);
    let right = merge_sort(right);
    merge(left, right)
}

fn merge(left: Vec<TimeRecord>, right: Vec<TimeRecord>) -> Vec<TimeRecord> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);

    while i < left.len() && j < right.len() {
        // `<=` keeps the left record first on ties: that is the stability.
        if left[i].time <= right[j].time {
            out.push(left[i]);
            i += 1;
        } else {
            out.push(right[j]);
            j += 1;
        }
    }

    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
    out
}

#[inline]
fn within_tolerance(time: f64, value: f64) -> bool {
    (time - value).abs() < SEARCH_TOLERANCE
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
