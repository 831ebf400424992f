//! `Span` — the total advertised capacity of one `(kind, page_size, numa
//! zone)` triple — and `Allocation`, a subset of a span committed to a
//! claim.

use thiserror::Error;

use crate::ident::ResourceIdent;

/// Error producing an [`Allocation`] from a [`Span`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpanError {
    #[error("requested amount {requested} exceeds span capacity {capacity}")]
    ExceedsCapacity { requested: u64, capacity: u64 },
    #[error("amount {amount} is not a multiple of the page size {page_size}")]
    NotPageAligned { amount: u64, page_size: u64 },
}

/// The total addressable capacity of one `(kind, page_size, numa_zone)`
/// triple on this node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    ident: ResourceIdent,
    amount_bytes: u64,
    numa_zone: u32,
}

impl Span {
    /// Builds a span, rejecting an amount that is not a multiple of the
    /// identity's page size.
    pub fn new(ident: ResourceIdent, amount_bytes: u64, numa_zone: u32) -> Result<Self, SpanError> {
        if amount_bytes % ident.page_size_bytes() != 0 {
            return Err(SpanError::NotPageAligned {
                amount: amount_bytes,
                page_size: ident.page_size_bytes(),
            });
        }
        Ok(Self { ident, amount_bytes, numa_zone })
    }

    pub fn ident(&self) -> ResourceIdent {
        self.ident
    }

    pub fn amount_bytes(&self) -> u64 {
        self.amount_bytes
    }

    pub fn numa_zone(&self) -> u32 {
        self.numa_zone
    }

    /// Carves out a strict subset of this span's capacity as an
    /// [`Allocation`]. `amount_bytes` must be a multiple of the page size
    /// and not exceed the span's capacity.
    pub fn make_allocation(&self, amount_bytes: u64) -> Result<Allocation, SpanError> {
        if amount_bytes % self.ident.page_size_bytes() != 0 {
            return Err(SpanError::NotPageAligned {
                amount: amount_bytes,
                page_size: self.ident.page_size_bytes(),
            });
        }
        if amount_bytes > self.amount_bytes {
            return Err(SpanError::ExceedsCapacity {
                requested: amount_bytes,
                capacity: self.amount_bytes,
            });
        }
        Ok(Allocation { ident: self.ident, amount_bytes, numa_zone: self.numa_zone })
    }
}

/// A strict subset of some [`Span`]'s capacity committed to a single claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allocation {
    ident: ResourceIdent,
    amount_bytes: u64,
    numa_zone: u32,
}

impl Allocation {
    pub fn ident(&self) -> ResourceIdent {
        self.ident
    }

    pub fn amount_bytes(&self) -> u64 {
        self.amount_bytes
    }

    pub fn numa_zone(&self) -> u32 {
        self.numa_zone
    }

    /// Number of whole pages this allocation covers.
    pub fn pages(&self) -> u64 {
        self.amount_bytes / self.ident.page_size_bytes()
    }

    /// `true` if this allocation attaches cleanly to `span`: same identity,
    /// same NUMA zone, and within the span's capacity.
    pub fn fits(&self, span: &Span) -> bool {
        self.ident == span.ident && self.numa_zone == span.numa_zone && self.amount_bytes <= span.amount_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{ResourceIdent, ResourceKind};

    fn hugepage_ident() -> ResourceIdent {
        ResourceIdent::new(ResourceKind::Hugepages, 2 * 1024 * 1024).unwrap()
    }

    #[test]
    fn allocation_math_matches_pages_times_page_size() {
        let span = Span::new(hugepage_ident(), 2 * 1024 * 1024 * 2048, 0).unwrap();
        let amount = 32 * 2 * 1024 * 1024;
        let alloc = span.make_allocation(amount).unwrap();
        assert_eq!(alloc.pages() * hugepage_ident().page_size_bytes(), amount);
    }

    #[test]
    fn allocation_fits_its_span() {
        let span = Span::new(hugepage_ident(), 2 * 1024 * 1024 * 2048, 0).unwrap();
        let alloc = span.make_allocation(2 * 1024 * 1024).unwrap();
        assert!(alloc.fits(&span));
    }

    #[test]
    fn rejects_oversized_allocation() {
        let span = Span::new(hugepage_ident(), 2 * 1024 * 1024, 0).unwrap();
        assert!(matches!(
            span.make_allocation(4 * 1024 * 1024),
            Err(SpanError::ExceedsCapacity { .. })
        ));
    }

    #[test]
    fn rejects_misaligned_allocation() {
        let span = Span::new(hugepage_ident(), 2 * 1024 * 1024 * 2048, 0).unwrap();
        assert!(matches!(span.make_allocation(3), Err(SpanError::NotPageAligned { .. })));
    }
}
