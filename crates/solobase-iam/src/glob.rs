//! Minimal path-glob matcher for path policies.
//!
//! Supports a single wildcard segment marker, `*`, which matches exactly
//! one `/`-delimited path segment, and a trailing `**` which matches any
//! number of remaining segments. This covers the policy shapes Solobase
//! needs (`/api/buckets/*/objects/**`) without pulling in a full regex
//! engine for something this constrained.

/// Check whether `path` matches `pattern`.
#[must_use]
pub fn matches(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();

    match_segments(&pattern_segments, &path_segments)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match (pattern.first(), path.first()) {
        (None, None) => true,
        (Some(&"**"), _) => true,
        (Some(&"*"), Some(_)) => match_segments(&pattern[1..], &path[1..]),
        (Some(p), Some(s)) if *p == *s => match_segments(&pattern[1..], &path[1..]),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_match_exact_path() {
        assert!(matches("/api/buckets", "/api/buckets"));
    }

    #[test]
    fn test_should_match_single_segment_wildcard() {
        assert!(matches("/api/buckets/*", "/api/buckets/photos"));
        assert!(!matches("/api/buckets/*", "/api/buckets/photos/objects"));
    }

    #[test]
    fn test_should_match_trailing_double_wildcard() {
        assert!(matches("/api/buckets/**", "/api/buckets/photos/objects/cat.png"));
    }

    #[test]
    fn test_should_not_match_different_prefix() {
        assert!(!matches("/api/buckets/*", "/admin/buckets/photos"));
    }
}
