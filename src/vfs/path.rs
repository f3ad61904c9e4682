//! Virtual path normalization
//!
//! Virtual paths are `/`-separated regardless of platform. Cleaning collapses
//! empty and `.` segments and applies `..` lexically, so a cleaned path can
//! never climb above the virtual root.

/// Split a virtual path into its cleaned segments
pub fn segments(path: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out
}

/// Clean a virtual path into its canonical `/a/b` form (`/` for the root)
pub fn clean(path: &str) -> String {
    let segs = segments(path);
    if segs.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segs.join("/"))
    }
}

/// Join a directory virtual path and a child name
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Last segment of a virtual path (empty for the root)
pub fn base(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean(""), "/");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("/docs/"), "/docs");
        assert_eq!(clean("docs//a/./b"), "/docs/a/b");
        assert_eq!(clean("/docs/a/../b"), "/docs/b");
    }

    #[test]
    fn test_clean_never_escapes_root() {
        assert_eq!(clean("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(clean("/docs/../../.."), "/");
    }

    #[test]
    fn test_join_and_base() {
        assert_eq!(join("/", "docs"), "/docs");
        assert_eq!(join("/docs", "a.txt"), "/docs/a.txt");
        assert_eq!(base("/docs/a.txt"), "a.txt");
        assert_eq!(base("/docs/"), "docs");
        assert_eq!(base("/"), "");
    }
}
