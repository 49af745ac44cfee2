//! Path and content filters applied during indexing

use serde::{Deserialize, Serialize};

/// How many leading bytes are sniffed for the binary heuristic.
const BINARY_SNIFF_LEN: usize = 8192;

/// Which files the indexer considers part of the sync set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSet {
    /// Path prefixes to include; empty means everything.
    pub include_paths: Vec<String>,
    /// Path prefixes to exclude; wins over includes.
    pub exclude_paths: Vec<String>,
    /// Files larger than this are skipped.
    pub max_file_size: Option<u64>,
    /// Skip files that look like binary content.
    pub exclude_binary: bool,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            max_file_size: None,
            exclude_binary: false,
        }
    }
}

impl FilterSet {
    pub fn allows_path(&self, path: &str) -> bool {
        if self.exclude_paths.iter().any(|p| path.starts_with(p.as_str())) {
            return false;
        }
        if self.include_paths.is_empty() {
            return true;
        }
        self.include_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn allows_size(&self, size: u64) -> bool {
        match self.max_file_size {
            Some(max) => size <= max,
            None => true,
        }
    }

    /// NUL byte in the leading window means binary. Cheap and wrong for a
    /// handful of exotic text encodings, which is acceptable for a
    /// markdown-first workspace.
    pub fn allows_content(&self, data: &[u8]) -> bool {
        if !self.exclude_binary {
            return true;
        }
        let window = &data[..data.len().min(BINARY_SNIFF_LEN)];
        !window.contains(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_allows_everything() {
        let f = FilterSet::default();
        assert!(f.allows_path("/notes/a.md"));
        assert!(f.allows_size(u64::MAX));
        assert!(f.allows_content(&[0, 1, 2]));
    }

    #[test]
    fn excludes_win_over_includes() {
        let f = FilterSet {
            include_paths: vec!["/notes/".to_string()],
            exclude_paths: vec!["/notes/private/".to_string()],
            ..Default::default()
        };
        assert!(f.allows_path("/notes/a.md"));
        assert!(!f.allows_path("/notes/private/secret.md"));
        assert!(!f.allows_path("/attachments/img.png"));
    }

    #[test]
    fn size_cap_enforced() {
        let f = FilterSet {
            max_file_size: Some(1024),
            ..Default::default()
        };
        assert!(f.allows_size(1024));
        assert!(!f.allows_size(1025));
    }

    #[test]
    fn binary_sniffing() {
        let f = FilterSet {
            exclude_binary: true,
            ..Default::default()
        };
        assert!(f.allows_content(b"# plain markdown"));
        assert!(!f.allows_content(b"\x89PNG\r\n\x1a\n\x00\x00"));
    }
}
