//! The HugeTLB limit lattice and the arithmetic on rows of it.

use resource_model::units::kernel_hugepage_label;
use resource_model::{Allocation, MachineData};
use tracker::AllocationMap;

/// A limit lattice element. `Unset` is the additive identity — it encodes
/// "don't contribute a bound" — not a top element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitValue {
    Unset,
    Set(u64),
}

impl LimitValue {
    /// `Set(n) ⊕ Unset = Set(n)`, `Unset ⊕ Set(n) = Set(n)`,
    /// `Set(a) ⊕ Set(b) = Set(a + b)`, `Unset ⊕ Unset = Unset`.
    pub fn add(self, other: LimitValue) -> LimitValue {
        match (self, other) {
            (LimitValue::Unset, other) => other,
            (this, LimitValue::Unset) => this,
            (LimitValue::Set(a), LimitValue::Set(b)) => LimitValue::Set(a + b),
        }
    }
}

/// One HugeTLB page size's limit for one cgroup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limit {
    pub page_size_text: String,
    pub value: LimitValue,
}

/// Builds one row per HugeTLB page size the machine supports, defaulting to
/// `Set(0)` (the cgroup denies a page size unless an allocation grants it),
/// then raising each row an allocation names to that allocation's amount.
pub fn limits_from_allocations(machine: &MachineData, allocs: &AllocationMap) -> Vec<Limit> {
    let mut rows: Vec<Limit> = machine
        .huge_page_sizes
        .iter()
        .map(|&size| Limit { page_size_text: kernel_hugepage_label(size), value: LimitValue::Set(0) })
        .collect();

    for alloc in allocs.values() {
        if !alloc.ident().needs_hugetlb() {
            continue;
        }
        set_row(&mut rows, alloc);
    }
    rows
}

fn set_row(rows: &mut [Limit], alloc: &Allocation) {
    let label = kernel_hugepage_label(alloc.ident().page_size_bytes());
    if let Some(row) = rows.iter_mut().find(|r| r.page_size_text == label) {
        row.value = LimitValue::Set(alloc.amount_bytes());
    }
}

/// Outer-joins two limit lists on `page_size_text`: overlapping rows apply
/// [`LimitValue::add`]; non-overlapping rows pass through unchanged. Rows
/// from `a` come first in input order, then residual rows from `b`.
pub fn sum_limits(a: &[Limit], b: &[Limit]) -> Vec<Limit> {
    let mut result = Vec::with_capacity(a.len() + b.len());
    let mut consumed_from_b = vec![false; b.len()];

    for row_a in a {
        match b.iter().position(|row_b| row_b.page_size_text == row_a.page_size_text) {
            Some(idx) => {
                consumed_from_b[idx] = true;
                result.push(Limit {
                    page_size_text: row_a.page_size_text.clone(),
                    value: row_a.value.add(b[idx].value),
                });
            }
            None => result.push(row_a.clone()),
        }
    }
    for (row_b, consumed) in b.iter().zip(consumed_from_b) {
        if !consumed {
            result.push(row_b.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(n: u64) -> LimitValue {
        LimitValue::Set(n)
    }

    #[test]
    fn lattice_identity_and_commutativity() {
        assert_eq!(set(5).add(LimitValue::Unset), set(5));
        assert_eq!(LimitValue::Unset.add(set(5)), set(5));
        assert_eq!(LimitValue::Unset.add(LimitValue::Unset), LimitValue::Unset);
        assert_eq!(set(3).add(set(4)), set(4).add(set(3)));
    }

    #[test]
    fn lattice_associativity() {
        let a = set(1);
        let b = set(2);
        let c = LimitValue::Unset;
        assert_eq!(a.add(b).add(c), a.add(b.add(c)));
    }

    // Scenario C (spec §8).
    #[test]
    fn scenario_c_sum_limits() {
        let a = vec![
            Limit { page_size_text: "2MB".to_string(), value: set(4 * (1u64 << 21)) },
            Limit { page_size_text: "1GB".to_string(), value: set(2 * (1u64 << 30)) },
        ];
        let b = vec![
            Limit { page_size_text: "2MB".to_string(), value: set(1u64 << 21) },
            Limit { page_size_text: "1GB".to_string(), value: set(1u64 << 30) },
        ];
        let summed = sum_limits(&a, &b);
        assert_eq!(summed[0], Limit { page_size_text: "2MB".to_string(), value: set(5 * (1u64 << 21)) });
        assert_eq!(summed[1], Limit { page_size_text: "1GB".to_string(), value: set(3 * (1u64 << 30)) });
    }

    #[test]
    fn sum_limits_outer_join_partial_overlap() {
        let a = vec![Limit { page_size_text: "2MB".to_string(), value: set(1) }];
        let b = vec![
            Limit { page_size_text: "2MB".to_string(), value: set(2) },
            Limit { page_size_text: "1GB".to_string(), value: set(3) },
        ];
        let summed = sum_limits(&a, &b);
        assert_eq!(summed.len(), 2);
        assert_eq!(summed[0].value, set(3));
        assert_eq!(summed[1], Limit { page_size_text: "1GB".to_string(), value: set(3) });
    }

    #[test]
    fn sum_limits_disjoint_is_concatenation() {
        let a = vec![Limit { page_size_text: "2MB".to_string(), value: set(1) }];
        let b = vec![Limit { page_size_text: "1GB".to_string(), value: set(2) }];
        let summed = sum_limits(&a, &b);
        assert_eq!(summed, [a, b].concat());
    }
}
