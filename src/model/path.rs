//! Path helpers for slash-separated repository paths.
//!
//! All functions are pure string manipulation; none of them consult a store.

/// Join a child name onto a parent path.
pub fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Resolve `raw` against `base` (an absolute node path).
///
/// Absolute input starts from the root, relative input from `base`. Either
/// way the input is applied segment by segment: `..` climbs one level (never
/// above the root), `.` and empty segments are skipped.
pub fn absolutize(base: &str, raw: &str) -> String {
    let mut segments: Vec<&str> = if raw.starts_with('/') {
        Vec::new()
    } else {
        base.split('/').filter(|s| !s.is_empty()).collect()
    };
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Split an item path at its last separator into `(parent path, name)`.
///
/// Returns `None` for relative paths, which have no addressable parent.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let last = path.rfind('/')?;
    let name = &path[last + 1..];
    if last == 0 {
        Some(("/", name))
    } else {
        Some((&path[..last], name))
    }
}

/// Last segment of a slash-separated name (the whole input if it has none).
pub fn file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Non-empty segments of a relative sub path; a leading slash is ignored.
pub fn segments(sub_path: &str) -> impl Iterator<Item = &str> {
    sub_path.split('/').filter(|s| !s.is_empty())
}
