//! Import path utilities.
//!
//! Import paths are slash-separated strings such as
//! `github.com/sdboyer/deptest/sub`. Prefix checks always respect path
//! segment boundaries, so `github.com/a/bc` is not under `github.com/a/b`.

/// Check if `path` equals `prefix` or lies below it
pub fn is_path_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Check if an import path names a standard-library package.
///
/// Standard-library paths have no dot in their first element (`fmt`,
/// `net/http`); every hosted project path does (`github.com/...`).
pub fn is_std_lib(import_path: &str) -> bool {
    let first = import_path.split('/').next().unwrap_or("");
    !first.is_empty() && !first.contains('.')
}

/// Path of `package` relative to `root`: `.` for the root package itself.
///
/// Returns `None` when the package does not belong to `root`.
pub fn relative_package(root: &str, package: &str) -> Option<String> {
    if !is_path_prefix(root, package) {
        return None;
    }
    let rest = package[root.len()..].trim_start_matches('/');
    if rest.is_empty() {
        Some(".".to_string())
    } else {
        Some(rest.to_string())
    }
}

/// Inverse of [`relative_package`]
pub fn join_package(root: &str, relative: &str) -> String {
    if relative == "." || relative.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), relative)
    }
}

/// Basic shape check for an import path: non-empty, no empty, `.` or `..`
/// segments, no whitespace, no leading or trailing slash
pub fn is_valid_import_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
        return false;
    }
    if path.chars().any(char::is_whitespace) {
        return false;
    }
    path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_prefix_respects_segments() {
        assert!(is_path_prefix("github.com/a/b", "github.com/a/b"));
        assert!(is_path_prefix("github.com/a/b", "github.com/a/b/c"));
        assert!(!is_path_prefix("github.com/a/b", "github.com/a/bc"));
        assert!(!is_path_prefix("github.com/a/b/c", "github.com/a/b"));
    }

    #[test]
    fn test_is_std_lib() {
        assert!(is_std_lib("fmt"));
        assert!(is_std_lib("net/http"));
        assert!(!is_std_lib("github.com/pkg/errors"));
        assert!(!is_std_lib("gopkg.in/yaml.v2"));
        assert!(!is_std_lib(""));
    }

    #[test]
    fn test_relative_package() {
        let root = "github.com/sdboyer/deptest";
        assert_eq!(relative_package(root, root).as_deref(), Some("."));
        assert_eq!(
            relative_package(root, "github.com/sdboyer/deptest/sub/pkg").as_deref(),
            Some("sub/pkg")
        );
        assert_eq!(relative_package(root, "github.com/sdboyer/deptestos"), None);
    }

    #[test]
    fn test_join_package() {
        let root = "github.com/sdboyer/deptest";
        assert_eq!(join_package(root, "."), root);
        assert_eq!(join_package(root, "sub"), "github.com/sdboyer/deptest/sub");
    }

    #[test]
    fn test_valid_import_path() {
        assert!(is_valid_import_path("github.com/pkg/errors"));
        assert!(!is_valid_import_path(""));
        assert!(!is_valid_import_path("/abs/path"));
        assert!(!is_valid_import_path("github.com//errors"));
        assert!(!is_valid_import_path("github.com/../errors"));
        assert!(!is_valid_import_path("github.com/pkg errors"));
    }
}
