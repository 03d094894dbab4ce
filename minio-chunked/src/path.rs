//! Staging object naming.
//!
//! Chunk names are `"{digest}/{index}"` with the index left-padded to the
//! decimal width of `total_pieces`. For a fixed total every index has the same
//! width, so lexicographic order over chunk names equals numeric index order.

/// Number of decimal digits in `n`; `width(0) == 1`
pub fn width(n: u32) -> usize {
    if n == 0 {
        return 1;
    }
    let mut count = 0;
    let mut rest = n;
    while rest != 0 {
        rest /= 10;
        count += 1;
    }
    count
}

/// Prefix under which every chunk of `digest` lives
pub fn staging_prefix(digest: &str) -> String {
    format!("{}/", digest)
}

/// Name of chunk `index` of a `total`-piece upload keyed by `digest`
pub fn chunk_path(digest: &str, index: u32, total: u32) -> String {
    format!("{}/{:0>w$}", digest, index, w = width(total))
}

/// Decode the chunk index from a staged object name of `digest`.
///
/// The digest is opaque and may itself contain `/`, so only the tail after the
/// full `"{digest}/"` prefix is decoded.
pub fn chunk_index(digest: &str, name: &str) -> Option<u32> {
    let tail = name.strip_prefix(digest)?.strip_prefix('/')?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

/// Drop one leading `/` from a project path to get an object name
pub fn trim_head(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Append a trailing `/` so the store treats the name as a folder.
/// Empty input stays empty.
pub fn add_tail(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn width_counts_digits() {
        assert_eq!(width(0), 1);
        assert_eq!(width(9), 1);
        assert_eq!(width(10), 2);
        assert_eq!(width(100), 3);
        assert_eq!(width(u32::MAX), 10);
    }

    #[test]
    fn pads_to_width_of_total() {
        assert_eq!(chunk_path("d", 3, 10), "d/03");
        assert_eq!(chunk_path("d", 3, 100), "d/003");
        assert_eq!(chunk_path("d", 0, 1), "d/0");
        assert_eq!(chunk_path("d", 0, 10), "d/00");
        assert_eq!(chunk_path("d", 99, 100), "d/099");
    }

    #[test]
    fn decodes_index_after_digest_prefix() {
        assert_eq!(chunk_index("abc", "abc/007"), Some(7));
        assert_eq!(chunk_index("abc", "abc/0"), Some(0));
        assert_eq!(chunk_index("abc", "abc/"), None);
        assert_eq!(chunk_index("abc", "abc"), None);
        assert_eq!(chunk_index("abc", "abc/x1"), None);
        assert_eq!(chunk_index("abc", "abc/1/2"), None);
        assert_eq!(chunk_index("abc", "xyz/1"), None);
    }

    #[test]
    fn decodes_index_for_digest_containing_slash() {
        assert_eq!(chunk_index("user/abc", "user/abc/03"), Some(3));
        assert_eq!(chunk_index("user/abc", &chunk_path("user/abc", 7, 10)), Some(7));
        assert_eq!(chunk_index("user/abc", "user/abc"), None);
    }

    #[test]
    fn trim_head_and_add_tail_handle_edges() {
        assert_eq!(trim_head("/docs/a.txt"), "docs/a.txt");
        assert_eq!(trim_head("docs"), "docs");
        assert_eq!(trim_head(""), "");
        assert_eq!(trim_head("/"), "");
        assert_eq!(add_tail("docs"), "docs/");
        assert_eq!(add_tail("docs/"), "docs/");
        assert_eq!(add_tail(""), "");
    }

    proptest! {
        #[test]
        fn chunk_paths_sort_like_indices(total in 1u32..5000, a in any::<u32>(), b in any::<u32>()) {
            let (i, j) = ((a % total).min(b % total), (a % total).max(b % total));
            prop_assume!(i != j);
            prop_assert!(chunk_path("digest", i, total) < chunk_path("digest", j, total));
        }

        #[test]
        fn chunk_path_round_trips_index(total in 1u32..100_000, a in any::<u32>()) {
            let i = a % total;
            prop_assert_eq!(chunk_index("digest", &chunk_path("digest", i, total)), Some(i));
        }
    }
}
