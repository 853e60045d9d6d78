//! Line-level diffing between two snapshots.
//!
//! The edit script comes from Myers' O(ND) algorithm run on the lines left
//! after trimming the common prefix and suffix. Scripts whose edit distance
//! exceeds [`MAX_EDIT_DISTANCE`] fall back to "replace the whole middle",
//! which is still a correct (if not minimal) script.

use crate::model::{DiffResult, Snapshot};
use crate::policy::SnapPolicyView;

/// Edit distance beyond which the search gives up on a minimal script.
pub const MAX_EDIT_DISTANCE: usize = 1_024;

/// One step of an edit script, holding 0-based line indices.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Edit {
    Equal { old: usize, new: usize },
    Delete { old: usize },
    Insert { new: usize },
}

impl Edit {
    fn is_change(&self) -> bool {
        !matches!(self, Edit::Equal { .. })
    }
}

/// Counts summarising an edit script.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LineStats {
    pub inserted: usize,
    pub deleted: usize,
    pub total: usize,
}

impl LineStats {
    pub fn changed(&self) -> usize {
        self.inserted + self.deleted
    }

    /// Changed lines relative to the longer of the two texts.
    pub fn ratio(&self) -> f64 {
        self.changed() as f64 / self.total.max(1) as f64
    }
}

pub fn diff_lines(old: &[&str], new: &[&str]) -> Vec<Edit> {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut edits = Vec::with_capacity(old.len().max(new.len()));
    for idx in 0..prefix {
        edits.push(Edit::Equal { old: idx, new: idx });
    }

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];
    match myers(old_mid, new_mid) {
        Some(middle) => edits.extend(middle.into_iter().map(|edit| shift(edit, prefix))),
        None => {
            edits.extend((0..old_mid.len()).map(|idx| Edit::Delete { old: prefix + idx }));
            edits.extend((0..new_mid.len()).map(|idx| Edit::Insert { new: prefix + idx }));
        }
    }

    let old_tail = old.len() - suffix;
    let new_tail = new.len() - suffix;
    for idx in 0..suffix {
        edits.push(Edit::Equal {
            old: old_tail + idx,
            new: new_tail + idx,
        });
    }
    edits
}

fn shift(edit: Edit, by: usize) -> Edit {
    match edit {
        Edit::Equal { old, new } => Edit::Equal {
            old: old + by,
            new: new + by,
        },
        Edit::Delete { old } => Edit::Delete { old: old + by },
        Edit::Insert { new } => Edit::Insert { new: new + by },
    }
}

/// Myers' shortest edit script. `None` when the distance exceeds the cap.
fn myers(a: &[&str], b: &[&str]) -> Option<Vec<Edit>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    if n == 0 && m == 0 {
        return Some(Vec::new());
    }
    let max = (n + m) as usize;
    let limit = max.min(MAX_EDIT_DISTANCE) as isize;
    let offset = max as isize + 1;
    let mut v = vec![0isize; 2 * max + 3];
    // trace[d] holds v[-d..=d] as it stood at the start of round d.
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let at = |k: isize| (k + offset) as usize;

    let mut found = false;
    'search: for d in 0..=limit {
        trace.push(v[at(-d)..=at(d)].to_vec());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
                v[at(k + 1)]
            } else {
                v[at(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[at(k)] = x;
            if x >= n && y >= m {
                found = true;
                break 'search;
            }
            k += 2;
        }
    }
    if !found {
        return None;
    }

    let mut edits = Vec::new();
    let (mut x, mut y) = (n, m);
    for d in (0..trace.len() as isize).rev() {
        if d == 0 {
            while x > 0 && y > 0 {
                x -= 1;
                y -= 1;
                edits.push(Edit::Equal {
                    old: x as usize,
                    new: y as usize,
                });
            }
            break;
        }
        let row = &trace[d as usize];
        let get = |k: isize| row[(k + d) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && get(k - 1) < get(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = get(prev_k);
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            edits.push(Edit::Equal {
                old: x as usize,
                new: y as usize,
            });
        }
        if x == prev_x {
            edits.push(Edit::Insert {
                new: prev_y as usize,
            });
        } else {
            edits.push(Edit::Delete {
                old: prev_x as usize,
            });
        }
        x = prev_x;
        y = prev_y;
    }
    edits.reverse();
    Some(edits)
}

pub fn line_stats(old: &[&str], new: &[&str], edits: &[Edit]) -> LineStats {
    let mut stats = LineStats {
        total: old.len().max(new.len()),
        ..LineStats::default()
    };
    for edit in edits {
        match edit {
            Edit::Insert { .. } => stats.inserted += 1,
            Edit::Delete { .. } => stats.deleted += 1,
            Edit::Equal { .. } => {}
        }
    }
    stats
}

/// Render `edits` as a unified patch with `context` lines around each hunk.
/// Returns an empty string when the script holds no changes.
pub fn unified_patch(old: &[&str], new: &[&str], edits: &[Edit], context: usize) -> String {
    let changes: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, edit)| edit.is_change())
        .map(|(idx, _)| idx)
        .collect();
    if changes.is_empty() {
        return String::new();
    }

    // Line cursors before each edit position.
    let mut cursors = Vec::with_capacity(edits.len() + 1);
    let (mut old_pos, mut new_pos) = (0usize, 0usize);
    for edit in edits {
        cursors.push((old_pos, new_pos));
        match edit {
            Edit::Equal { .. } => {
                old_pos += 1;
                new_pos += 1;
            }
            Edit::Delete { .. } => old_pos += 1,
            Edit::Insert { .. } => new_pos += 1,
        }
    }
    cursors.push((old_pos, new_pos));

    let mut out = String::from("--- previous\n+++ latest\n");
    let mut group_start = 0usize;
    while group_start < changes.len() {
        let mut group_end = group_start;
        while group_end + 1 < changes.len()
            && changes[group_end + 1] - changes[group_end] <= 2 * context + 1
        {
            group_end += 1;
        }
        let from = changes[group_start].saturating_sub(context);
        let to = (changes[group_end] + context + 1).min(edits.len());

        let (old_start, new_start) = cursors[from];
        let (old_end, new_end) = cursors[to];
        let old_count = old_end - old_start;
        let new_count = new_end - new_start;
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            hunk_start(old_start, old_count),
            old_count,
            hunk_start(new_start, new_count),
            new_count
        ));
        for edit in &edits[from..to] {
            match *edit {
                Edit::Equal { old: idx, .. } => push_line(&mut out, ' ', old[idx]),
                Edit::Delete { old: idx } => push_line(&mut out, '-', old[idx]),
                Edit::Insert { new: idx } => push_line(&mut out, '+', new[idx]),
            }
        }
        group_start = group_end + 1;
    }
    out
}

fn hunk_start(start: usize, count: usize) -> usize {
    if count == 0 {
        start
    } else {
        start + 1
    }
}

fn push_line(out: &mut String, marker: char, line: &str) {
    out.push(marker);
    out.push_str(line);
    out.push('\n');
}

/// Indices of chunks in `new` whose text differs from the chunk at the same
/// position in `old`.
pub fn changed_chunk_indices(old: &[String], new: &[String]) -> Vec<usize> {
    new.iter()
        .enumerate()
        .filter(|(idx, chunk)| old.get(*idx) != Some(*chunk))
        .map(|(idx, _)| idx)
        .collect()
}

/// Classify the change from `old` to `new`, two snapshots of the same tab.
pub fn compare_snapshots(old: &Snapshot, new: &Snapshot, policy: &SnapPolicyView) -> DiffResult {
    if old.url != new.url {
        return DiffResult::UrlChanged {
            previous_url: old.url.clone(),
            url: new.url.clone(),
        };
    }
    if old.hash == new.hash {
        return DiffResult::Unchanged;
    }

    let old_lines: Vec<&str> = old.text.lines().collect();
    let new_lines: Vec<&str> = new.text.lines().collect();
    let edits = diff_lines(&old_lines, &new_lines);
    let stats = line_stats(&old_lines, &new_lines, &edits);
    if stats.changed() == 0 {
        // Only line terminators differ; nothing the model could act on.
        return DiffResult::Unchanged;
    }

    let changed_chunks = changed_chunk_indices(&old.chunks, &new.chunks);
    if stats.ratio() <= policy.small_diff_threshold {
        DiffResult::SmallDiff {
            patch: unified_patch(&old_lines, &new_lines, &edits, policy.diff_context),
            changed_lines: stats.changed(),
            total_lines: stats.total,
            changed_chunks,
        }
    } else {
        DiffResult::LargeDiff {
            changed_lines: stats.changed(),
            total_lines: stats.total,
            changed_chunks,
        }
    }
}
