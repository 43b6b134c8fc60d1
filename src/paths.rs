//! Import path resolution.
//!
//! Import strings are `/`-separated regardless of platform; backslashes are
//! folded before normalization so Windows-style inputs behave.

/// True for paths that do not resolve relative to their importer: a leading
/// `/` or a `scheme:`/drive prefix.
pub fn is_absolute(path: &str) -> bool {
    if path.starts_with('/') {
        return true;
    }
    match path.split_once(':') {
        Some((prefix, _)) => {
            !prefix.is_empty() && prefix.chars().all(|c| c.is_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Collapse `.` and `..` segments and duplicate separators.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = is_absolute(&path);

    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." {
            match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                // Above an absolute root there is nothing to pop into.
                _ if absolute => {}
                _ => parts.push(segment),
            }
        } else {
            parts.push(segment);
        }
    }

    let joined = parts.join("/");
    if path.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Resolve `target` as imported from the file `origin`.
///
/// Absolute targets normalize in place; relative targets resolve against the
/// directory of `origin`. An empty origin (the initial load list) leaves the
/// target as-is after normalization.
pub fn resolve(origin: &str, target: &str) -> String {
    let target = normalize(target);
    if is_absolute(&target) {
        return target;
    }
    let dir = match origin.rfind('/') {
        Some(idx) => &origin[..idx],
        None => "",
    };
    if dir.is_empty() {
        return target;
    }
    normalize(&format!("{dir}/{target}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("/a/b.proto"));
        assert!(is_absolute("c:/a/b.proto"));
        assert!(!is_absolute("a/b.proto"));
        assert!(!is_absolute("./b.proto"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a//b/./c.proto"), "a/b/c.proto");
        assert_eq!(normalize("a/b/../c.proto"), "a/c.proto");
        assert_eq!(normalize("../c.proto"), "../c.proto");
        assert_eq!(normalize("/a/../../c.proto"), "/c.proto");
        assert_eq!(normalize("a\\b\\c.proto"), "a/b/c.proto");
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("dir/a.proto", "b.proto"), "dir/b.proto");
        assert_eq!(resolve("dir/sub/a.proto", "../b.proto"), "dir/b.proto");
        assert_eq!(resolve("dir/a.proto", "/abs/b.proto"), "/abs/b.proto");
        assert_eq!(resolve("", "b.proto"), "b.proto");
        assert_eq!(resolve("a.proto", "b.proto"), "b.proto");
        assert_eq!(
            resolve("x/a.proto", "google/protobuf/empty.proto"),
            "x/google/protobuf/empty.proto"
        );
    }
}
