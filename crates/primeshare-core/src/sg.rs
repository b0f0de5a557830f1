//! Scatter-list construction for page-backed buffers

use crate::{Error, Result};

/// Platform page size in bytes
pub const PAGE_SIZE: usize = 4096;

/// Address of one physical page of backing memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysPage(pub u64);

/// One contiguous segment of a scatter list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScatterSegment {
    pub page: PhysPage,
    pub length: usize,
    pub offset: usize,
}

/// Ordered description of a buffer's physical backing memory
///
/// Built once per page array; independent of any session or registry state.
#[derive(Debug)]
pub struct ScatterDescriptor {
    segments: Vec<ScatterSegment>,
}

impl ScatterDescriptor {
    /// Build a scatter descriptor from an ordered page sequence
    ///
    /// Produces one segment per page, in input order, each covering a full
    /// page at offset 0. Nothing is left allocated on failure.
    pub fn from_pages(pages: &[PhysPage]) -> Result<Self> {
        let mut segments = Vec::new();
        segments
            .try_reserve_exact(pages.len())
            .map_err(|e| Error::AllocationFailure(format!("scatter table: {}", e)))?;

        for &page in pages {
            segments.push(ScatterSegment {
                page,
                length: PAGE_SIZE,
                offset: 0,
            });
        }

        Ok(Self { segments })
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the descriptor has no segments
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total length in bytes covered by all segments
    pub fn total_len(&self) -> usize {
        self.segments.iter().map(|s| s.length).sum()
    }

    /// Iterate segments in order
    pub fn segments(&self) -> impl Iterator<Item = &ScatterSegment> {
        self.segments.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_segment_per_page() {
        let pages = [PhysPage(0x1000), PhysPage(0x7000), PhysPage(0x3000)];
        let sg = ScatterDescriptor::from_pages(&pages).unwrap();

        assert_eq!(sg.len(), 3);
        for (seg, page) in sg.segments().zip(pages.iter()) {
            assert_eq!(seg.page, *page);
            assert_eq!(seg.offset, 0);
            assert_eq!(seg.length, PAGE_SIZE);
        }
        assert_eq!(sg.total_len(), 3 * PAGE_SIZE);
    }

    #[test]
    fn test_empty_page_array() {
        let sg = ScatterDescriptor::from_pages(&[]).unwrap();
        assert!(sg.is_empty());
        assert_eq!(sg.total_len(), 0);
    }
}
