//! `ResourceKind` and `ResourceIdent` — the typed identity of one
//! `(kind, page_size)` resource family on this node.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::units::{format_binary_si, parse_binary_si, UnitError};

/// Tag for the two resource families this driver advertises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Memory,
    Hugepages,
}

impl ResourceKind {
    fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Memory => "memory",
            ResourceKind::Hugepages => "hugepages",
        }
    }
}

/// Error constructing or parsing a [`ResourceIdent`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentError {
    #[error("page size {0} is not a power of two")]
    PageSizeNotPowerOfTwo(u64),
    #[error("malformed resource full name: {0:?}")]
    MalformedFullName(String),
    #[error("unknown resource kind: {0:?}")]
    UnknownKind(String),
    #[error(transparent)]
    Unit(#[from] UnitError),
}

/// `(kind, page_size_bytes)` — the identity of one resource family on this
/// node. `page_size_bytes` is always normalised to a power of two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceIdent {
    kind: ResourceKind,
    page_size_bytes: u64,
}

impl ResourceIdent {
    /// Builds an identity, rejecting a page size that is not a power of two.
    pub fn new(kind: ResourceKind, page_size_bytes: u64) -> Result<Self, IdentError> {
        if page_size_bytes == 0 || !page_size_bytes.is_power_of_two() {
            return Err(IdentError::PageSizeNotPowerOfTwo(page_size_bytes));
        }
        Ok(Self { kind, page_size_bytes })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn page_size_bytes(&self) -> u64 {
        self.page_size_bytes
    }

    /// `true` for the HugeTLB family.
    pub fn needs_hugetlb(&self) -> bool {
        self.kind == ResourceKind::Hugepages
    }

    /// Canonical, lossy name. Ordinary memory drops its (implicit) base page
    /// size: `"memory"`. HugeTLB carries its page size: `"hugepages-2Mi"`.
    pub fn name(&self) -> String {
        match self.kind {
            ResourceKind::Memory => "memory".to_string(),
            ResourceKind::Hugepages => {
                format!("hugepages-{}", format_binary_si(self.page_size_bytes))
            }
        }
    }

    /// Lossless, round-trip-exact name: `"memory:4Ki"`, `"hugepages:2Mi"`.
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.kind.as_str(), format_binary_si(self.page_size_bytes))
    }
}

impl fmt::Display for ResourceIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

impl FromStr for ResourceIdent {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind_str, size_str) =
            s.split_once(':').ok_or_else(|| IdentError::MalformedFullName(s.to_string()))?;
        let kind = match kind_str {
            "memory" => ResourceKind::Memory,
            "hugepages" => ResourceKind::Hugepages,
            other => return Err(IdentError::UnknownKind(other.to_string())),
        };
        let page_size_bytes = parse_binary_si(size_str)?;
        ResourceIdent::new(kind, page_size_bytes)
    }
}

/// Parses a [`ResourceIdent`] from its [`ResourceIdent::full_name`] form.
pub fn resource_ident_from_name(full_name: &str) -> Result<ResourceIdent, IdentError> {
    full_name.parse()
}
