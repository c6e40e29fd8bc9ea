//! Deterministic CIDR block allocation
//!
//! Pure address-space arithmetic for the machinepool-subnet controller:
//! find the first free block of a requested size inside a parent range,
//! and split an allocated block evenly across availability zones.
//!
//! Every function here is a pure function of its inputs. Identical
//! inputs always produce identical outputs, so a retried reconcile
//! attempt can never compute a different answer for the same cluster
//! state.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors that can occur during address-space allocation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// The request itself is malformed (bad prefix length, bad split factor)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No free block of the requested size remains in the parent range
    #[error("Address space exhausted: no free /{prefix_len} in {parent}")]
    SpaceExhausted {
        /// Parent range that was scanned
        parent: Ipv4Net,
        /// Requested block size
        prefix_len: u8,
    },
}

/// Returns true if the two networks share at least one address.
fn overlaps(a: Ipv4Net, b: Ipv4Net) -> bool {
    u32::from(a.network()) <= u32::from(b.broadcast())
        && u32::from(b.network()) <= u32::from(a.broadcast())
}

/// Find the first free block of size `prefix_len` inside `parent`.
///
/// Candidates are enumerated in strictly ascending order of base
/// address, aligned to the requested size. The first candidate that is
/// disjoint from every network in `used` wins.
///
/// # Errors
///
/// * [`AllocationError::InvalidRequest`] if `prefix_len` is larger than
///   32 or smaller than the parent's own prefix length (a block cannot
///   be bigger than the range it is carved from).
/// * [`AllocationError::SpaceExhausted`] if every candidate overlaps a
///   used network.
pub fn find_free(
    parent: Ipv4Net,
    prefix_len: u8,
    used: &[Ipv4Net],
) -> Result<Ipv4Net, AllocationError> {
    if prefix_len > 32 {
        return Err(AllocationError::InvalidRequest(format!(
            "prefix length /{prefix_len} is not a valid IPv4 prefix"
        )));
    }
    if prefix_len < parent.prefix_len() {
        return Err(AllocationError::InvalidRequest(format!(
            "cannot allocate a /{prefix_len} from the smaller parent {parent}"
        )));
    }

    // u64 cursor so the scan terminates cleanly at 255.255.255.255
    let block_size = 1u64 << (32 - prefix_len);
    let start = u64::from(u32::from(parent.network()));
    let end = u64::from(u32::from(parent.broadcast()));

    let mut base = start;
    while base <= end {
        let addr = Ipv4Addr::from(base as u32);
        let candidate = Ipv4Net::new(addr, prefix_len).map_err(|_| {
            AllocationError::InvalidRequest(format!("invalid prefix length /{prefix_len}"))
        })?;
        if !used.iter().any(|u| overlaps(candidate, *u)) {
            return Ok(candidate);
        }
        base += block_size;
    }

    Err(AllocationError::SpaceExhausted { parent, prefix_len })
}

/// Split `block` into `n` contiguous, aligned, equally sized subnets.
///
/// The result is ordered by base address and stable: index `i` always
/// maps to the same subnet for the same inputs, so zone `i` keeps the
/// same range across reconciles.
///
/// # Errors
///
/// [`AllocationError::InvalidRequest`] if `n` is zero, not a power of
/// two, or larger than the block can hold.
pub fn split(block: Ipv4Net, n: usize) -> Result<Vec<Ipv4Net>, AllocationError> {
    if n == 0 || !n.is_power_of_two() {
        return Err(AllocationError::InvalidRequest(format!(
            "cannot split {block} into {n} parts: count must be a power of two"
        )));
    }

    let extra_bits = n.trailing_zeros() as u8;
    let new_len = block.prefix_len() + extra_bits;
    if new_len > 32 {
        return Err(AllocationError::InvalidRequest(format!(
            "cannot split {block} into {n} parts: block is too small"
        )));
    }

    let subnets = block
        .subnets(new_len)
        .map_err(|_| {
            AllocationError::InvalidRequest(format!(
                "cannot split {block} into {n} parts: block is too small"
            ))
        })?
        .collect();

    Ok(subnets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn first_fit_skips_cluster_primary_range() {
        // 10.10.0.0/20 covers 10.10.0.0 - 10.10.15.255, so the first
        // free /24 is 10.10.16.0/24.
        let got = find_free(net("10.10.0.0/16"), 24, &[net("10.10.0.0/20")]).unwrap();
        assert_eq!(got, net("10.10.16.0/24"));
    }

    #[test]
    fn second_allocation_is_disjoint_from_first() {
        let used = vec![net("10.10.0.0/20"), net("10.10.16.0/24")];
        let got = find_free(net("10.10.0.0/16"), 24, &used).unwrap();
        assert_eq!(got, net("10.10.17.0/24"));
        assert!(!used.iter().any(|u| overlaps(got, *u)));
    }

    #[test]
    fn result_lies_inside_parent_with_exact_length() {
        let parent = net("10.10.0.0/16");
        let got = find_free(parent, 24, &[]).unwrap();
        assert_eq!(got.prefix_len(), 24);
        assert!(parent.contains(&got));
        assert_eq!(got, net("10.10.0.0/24"));
    }

    #[test]
    fn identical_inputs_yield_identical_results() {
        let parent = net("10.10.0.0/16");
        let used = vec![net("10.10.0.0/20"), net("10.10.32.0/24")];
        let a = find_free(parent, 24, &used).unwrap();
        let b = find_free(parent, 24, &used).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn freed_block_is_reused_by_first_fit() {
        // Delete the pool holding 10.10.16.0/24 and the next allocation
        // lands on it again.
        let used = vec![net("10.10.0.0/20"), net("10.10.17.0/24")];
        let got = find_free(net("10.10.0.0/16"), 24, &used).unwrap();
        assert_eq!(got, net("10.10.16.0/24"));
    }

    #[test]
    fn exhausted_parent_is_an_error() {
        let parent = net("10.10.0.0/24");
        let used = vec![net("10.10.0.0/25"), net("10.10.0.128/25")];
        let err = find_free(parent, 25, &used).unwrap_err();
        assert_eq!(
            err,
            AllocationError::SpaceExhausted {
                parent,
                prefix_len: 25
            }
        );
    }

    #[test]
    fn block_larger_than_parent_is_rejected() {
        let err = find_free(net("10.10.0.0/16"), 8, &[]).unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
    }

    #[test]
    fn non_aligned_used_entries_still_block_overlap() {
        // A used entry with host bits set masks down to its network.
        let used = vec![net("10.10.0.7/24")];
        let got = find_free(net("10.10.0.0/16"), 24, &used).unwrap();
        assert_eq!(got, net("10.10.1.0/24"));
    }

    #[test]
    fn split_into_four_covers_block_exactly() {
        let parts = split(net("10.10.16.0/24"), 4).unwrap();
        assert_eq!(
            parts,
            vec![
                net("10.10.16.0/26"),
                net("10.10.16.64/26"),
                net("10.10.16.128/26"),
                net("10.10.16.192/26"),
            ]
        );
        // Pairwise disjoint.
        for (i, a) in parts.iter().enumerate() {
            for b in parts.iter().skip(i + 1) {
                assert!(!overlaps(*a, *b));
            }
        }
    }

    #[test]
    fn split_into_one_returns_the_block() {
        let parts = split(net("10.10.16.0/24"), 1).unwrap();
        assert_eq!(parts, vec![net("10.10.16.0/24")]);
    }

    #[test]
    fn split_index_is_stable() {
        let a = split(net("10.10.16.0/24"), 2).unwrap();
        let b = split(net("10.10.16.0/24"), 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[1], net("10.10.16.128/25"));
    }

    #[test]
    fn split_rejects_non_power_of_two() {
        let err = split(net("10.10.16.0/24"), 3).unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
        let err = split(net("10.10.16.0/24"), 0).unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
    }

    #[test]
    fn split_rejects_count_exceeding_capacity() {
        // A /30 holds four addresses; 8 parts would need a /33.
        let err = split(net("10.10.16.0/30"), 8).unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
    }
}
