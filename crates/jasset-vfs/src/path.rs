//! VFS path conventions.
//!
//! Paths are forward-slash separated, carry no leading/trailing slash and
//! compare case-insensitively. Backslashes are folded on ingestion.

/// Replace every `\` with `/`.
pub fn fix_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Iterate the non-empty, non-`.` segments of a path, accepting either slash.
pub fn segments(path: &str) -> impl DoubleEndedIterator<Item = &str> {
    path.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
}

/// Canonical form used for hashing: fixed slashes, no empty or `.` segments.
///
/// Case is preserved; hashing and comparison fold it.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in segments(path) {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// True when any segment is `..`. Such paths never name an entry.
pub fn has_parent_segment(path: &str) -> bool {
    segments(path).any(|s| s == "..")
}

/// Case-insensitive comparison of two single path segments.
#[inline]
pub fn segments_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Case- and slash-insensitive path comparison.
pub fn paths_are_equal(a: &str, b: &str) -> bool {
    let mut a = segments(a);
    let mut b = segments(b);
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if segments_equal(x, y) => continue,
            _ => return false,
        }
    }
}

/// Split `path` into (parent, file name). The parent of a single segment is "".
pub fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(pos) => (&trimmed[..pos], &trimmed[pos + 1..]),
        None => ("", trimmed),
    }
}
