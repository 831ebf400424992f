//! Typed resource identity, span and allocation model shared by the
//! discovery, tracker, CDI and HugeTLB subsystems of the node memory/
//! HugeTLB driver.

#![forbid(unsafe_code)]

mod ident;
mod machine;
mod span;
pub mod units;

pub use ident::{resource_ident_from_name, IdentError, ResourceIdent, ResourceKind};
pub use machine::{MachineData, MemoryArea, Zone};
pub use span::{Allocation, Span, SpanError};
