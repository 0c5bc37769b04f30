//! Pure unified-diff builder, used when the `git` binary is unavailable.
//!
//! Produces git-shaped patches (`diff --git` header, `@@` hunks, 3 context
//! lines) from two text buffers. Line matching is LCS-based with a size cap;
//! beyond the cap the changed middle collapses into one replace hunk.

const CONTEXT: usize = 3;
const LCS_CELL_CAP: usize = 4_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Edit {
    Keep,
    Del,
    Ins,
}

fn lcs_edits(a: &[&str], b: &[&str]) -> Vec<Edit> {
    let m = a.len();
    let n = b.len();
    let mut dp = vec![0u32; (m + 1) * (n + 1)];
    let idx = |i: usize, j: usize| i * (n + 1) + j;

    for i in 1..=m {
        for j in 1..=n {
            dp[idx(i, j)] = if a[i - 1] == b[j - 1] {
                dp[idx(i - 1, j - 1)] + 1
            } else {
                dp[idx(i - 1, j)].max(dp[idx(i, j - 1)])
            };
        }
    }

    let mut edits = Vec::with_capacity(m + n);
    let (mut i, mut j) = (m, n);
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            edits.push(Edit::Keep);
            i -= 1;
            j -= 1;
        } else if dp[idx(i - 1, j)] >= dp[idx(i, j - 1)] {
            edits.push(Edit::Del);
            i -= 1;
        } else {
            edits.push(Edit::Ins);
            j -= 1;
        }
    }
    while i > 0 {
        edits.push(Edit::Del);
        i -= 1;
    }
    while j > 0 {
        edits.push(Edit::Ins);
        j -= 1;
    }
    edits.reverse();
    edits
}

fn diff_edits(a: &[&str], b: &[&str]) -> Vec<Edit> {
    let mut pre = 0;
    while pre < a.len() && pre < b.len() && a[pre] == b[pre] {
        pre += 1;
    }
    let mut suf = 0;
    while suf < a.len() - pre && suf < b.len() - pre
        && a[a.len() - 1 - suf] == b[b.len() - 1 - suf]
    {
        suf += 1;
    }

    let am = &a[pre..a.len() - suf];
    let bm = &b[pre..b.len() - suf];

    let mut edits = vec![Edit::Keep; pre];
    if am.len().saturating_mul(bm.len()) <= LCS_CELL_CAP {
        edits.extend(lcs_edits(am, bm));
    } else {
        edits.extend(std::iter::repeat_n(Edit::Del, am.len()));
        edits.extend(std::iter::repeat_n(Edit::Ins, bm.len()));
    }
    edits.extend(std::iter::repeat_n(Edit::Keep, suf));
    edits
}

/// Builds a git-shaped unified diff from `from_text` to `to_text`, with
/// paths rewritten to `a/{rel}` and `b/{rel}`. Returns an empty string for
/// identical inputs.
pub fn build_unified_diff(from_text: &str, to_text: &str, rel: &str) -> String {
    let a: Vec<&str> = from_text.lines().collect();
    let b: Vec<&str> = to_text.lines().collect();
    let edits = diff_edits(&a, &b);

    let change_positions: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| **e != Edit::Keep)
        .map(|(i, _)| i)
        .collect();
    if change_positions.is_empty() {
        return String::new();
    }

    // Running old/new line offsets before each edit index.
    let mut old_before = Vec::with_capacity(edits.len() + 1);
    let mut new_before = Vec::with_capacity(edits.len() + 1);
    let (mut o, mut n) = (0usize, 0usize);
    for e in &edits {
        old_before.push(o);
        new_before.push(n);
        match e {
            Edit::Keep => {
                o += 1;
                n += 1;
            }
            Edit::Del => o += 1,
            Edit::Ins => n += 1,
        }
    }
    old_before.push(o);
    new_before.push(n);

    // Cluster changes into hunks separated by more than 2*CONTEXT kept lines.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut start = change_positions[0];
    let mut last = change_positions[0];
    for &pos in &change_positions[1..] {
        if pos - last > 2 * CONTEXT {
            groups.push((start, last));
            start = pos;
        }
        last = pos;
    }
    groups.push((start, last));

    let mut out = format!("diff --git a/{rel} b/{rel}\n--- a/{rel}\n+++ b/{rel}\n");
    for (first, last) in groups {
        let lo = first.saturating_sub(CONTEXT);
        let hi = (last + CONTEXT + 1).min(edits.len());

        let old_lines = old_before[hi] - old_before[lo];
        let new_lines = new_before[hi] - new_before[lo];
        let old_start = if old_lines == 0 { old_before[lo] } else { old_before[lo] + 1 };
        let new_start = if new_lines == 0 { new_before[lo] } else { new_before[lo] + 1 };

        out.push_str(&format!(
            "@@ -{old_start},{old_lines} +{new_start},{new_lines} @@\n"
        ));
        for i in lo..hi {
            let line = match edits[i] {
                Edit::Keep => format!(" {}\n", a[old_before[i]]),
                Edit::Del => format!("-{}\n", a[old_before[i]]),
                Edit::Ins => format!("+{}\n", b[new_before[i]]),
            };
            out.push_str(&line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_nothing() {
        assert_eq!(build_unified_diff("a\nb\n", "a\nb\n", "f.yml"), "");
    }

    #[test]
    fn single_change_with_context() {
        let from = "l1\nl2\nl3\nl4\nl5\nl6\nl7\n";
        let to = "l1\nl2\nl3\nl4x\nl5\nl6\nl7\n";
        let patch = build_unified_diff(from, to, "f.yml");
        assert!(patch.starts_with("diff --git a/f.yml b/f.yml\n"));
        assert!(patch.contains("@@ -1,7 +1,7 @@"));
        assert!(patch.contains("-l4\n"));
        assert!(patch.contains("+l4x\n"));
        assert!(patch.contains(" l3\n"));
    }

    #[test]
    fn distant_changes_split_into_hunks() {
        let from: String = (1..=30).map(|i| format!("line{i}\n")).collect();
        let to = from.replace("line2\n", "line2x\n").replace("line28\n", "line28x\n");
        let patch = build_unified_diff(&from, &to, "f.txt");
        let hunks = patch.matches("@@ -").count();
        assert_eq!(hunks, 2);
    }

    #[test]
    fn pure_insertion_uses_zero_length_old_range() {
        let patch = build_unified_diff("", "new line\n", "f.txt");
        assert!(patch.contains("@@ -0,0 +1,1 @@"));
        assert!(patch.contains("+new line\n"));
    }
}
