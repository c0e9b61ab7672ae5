//! Error and contract-violation types.
//!
//! Two failure categories exist:
//! - **Exhaustion** is expected and recoverable. The contract reports it as
//!   the [`Block::NULL`](crate::Block::NULL) sentinel; only the
//!   result-bearing [`try_allocate`](crate::Allocator::try_allocate) turns it
//!   into [`AllocError::Exhausted`].
//! - **Misuse** is a programmer error. Requests are screened by
//!   [`validate_request`]; deallocation-side breaches are described by
//!   [`Violation`]. Both halt through [`misuse`] when checks are enabled
//!   (see [`crate::config`]).

use std::fmt;

use thiserror::Error;

use crate::block::MAX_ALIGN;
use crate::config::misuse_checks_enabled;

/// Request or construction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("allocation size must be non-zero")]
    ZeroSize,
    #[error("alignment {0} is not a power of two")]
    InvalidAlignment(usize),
    #[error("alignment {align} exceeds the supported maximum of {max}")]
    AlignmentTooLarge { align: usize, max: usize },
    #[error("no region can satisfy {size} bytes at alignment {align}")]
    Exhausted { size: usize, align: usize },
    #[error("backing allocator could not supply a {capacity}-byte arena")]
    ArenaUnavailable { capacity: usize },
    #[error("capacity {capacity} cannot host a single block (must exceed {minimum})")]
    CapacityTooSmall { capacity: usize, minimum: usize },
}

/// Programmer-contract breach found by a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("block {addr:#x}+{size} is not owned by this allocator")]
    ForeignBlock { addr: usize, size: usize },
    #[error("block {addr:#x} is already free")]
    DoubleFree { addr: usize },
    #[error("out-of-order stack release: block ends at {block_end:#x}, top is {top:#x}")]
    OutOfOrderRelease { block_end: usize, top: usize },
    #[error("single-buffer region already has an outstanding allocation")]
    BufferBusy,
    #[error("free list is not address-ordered at offset {offset:#x}")]
    Unordered { offset: usize },
    #[error("free region at offset {offset:#x} overlaps its successor")]
    Overlap { offset: usize },
    #[error("free regions at offsets {left:#x} and {right:#x} are adjacent but not merged")]
    Unmerged { left: usize, right: usize },
    #[error("free region at offset {offset:#x} ({size} bytes) leaves the arena")]
    OutOfBounds { offset: usize, size: usize },
    #[error("free bytes {free} + live bytes {live} != capacity {capacity}")]
    Conservation {
        free: usize,
        live: usize,
        capacity: usize,
    },
}

/// Screen an allocation request.
///
/// Size must be non-zero; alignment must be a power of two no larger than
/// [`MAX_ALIGN`].
pub fn validate_request(size: usize, align: usize) -> Result<(), AllocError> {
    if size == 0 {
        return Err(AllocError::ZeroSize);
    }
    if !align.is_power_of_two() {
        return Err(AllocError::InvalidAlignment(align));
    }
    if align > MAX_ALIGN {
        return Err(AllocError::AlignmentTooLarge {
            align,
            max: MAX_ALIGN,
        });
    }
    Ok(())
}

/// Halt on a contract breach.
#[cold]
#[track_caller]
pub fn misuse(reason: impl fmt::Display) -> ! {
    panic!("brickalloc misuse: {reason}")
}

/// Admit a request, or reject it as misuse.
///
/// With checks enabled an invalid request halts. Without checks it is
/// refused with `false`, which callers turn into the failure sentinel, so
/// no allocator ever commits state for a malformed request.
#[inline]
#[track_caller]
pub(crate) fn admit(size: usize, align: usize) -> bool {
    match validate_request(size, align) {
        Ok(()) => true,
        Err(err) => {
            if misuse_checks_enabled() {
                misuse(err);
            }
            false
        }
    }
}

/// Halt with `violation` if checks are enabled and `holds` is false.
#[inline]
#[track_caller]
pub(crate) fn ensure(holds: bool, violation: impl FnOnce() -> Violation) {
    if !holds && misuse_checks_enabled() {
        misuse(violation());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_requests_pass() {
        assert_eq!(validate_request(1, 1), Ok(()));
        assert_eq!(validate_request(4096, MAX_ALIGN), Ok(()));
    }

    #[test]
    fn zero_size_rejected() {
        assert_eq!(validate_request(0, 8), Err(AllocError::ZeroSize));
    }

    #[test]
    fn zero_and_odd_alignment_rejected() {
        assert_eq!(validate_request(8, 0), Err(AllocError::InvalidAlignment(0)));
        assert_eq!(validate_request(8, 3), Err(AllocError::InvalidAlignment(3)));
    }

    #[test]
    fn oversized_alignment_rejected() {
        assert_eq!(
            validate_request(8, 2 * MAX_ALIGN),
            Err(AllocError::AlignmentTooLarge {
                align: 2 * MAX_ALIGN,
                max: MAX_ALIGN
            })
        );
    }

    #[test]
    fn messages_name_the_offending_values() {
        let msg = Violation::OutOfOrderRelease {
            block_end: 0x10,
            top: 0x20,
        }
        .to_string();
        assert!(msg.contains("0x10") && msg.contains("0x20"), "{msg}");

        let msg = AllocError::CapacityTooSmall {
            capacity: 8,
            minimum: 16,
        }
        .to_string();
        assert!(msg.contains('8') && msg.contains("16"), "{msg}");
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "brickalloc misuse")]
    fn admit_halts_on_zero_size_in_debug() {
        let _ = admit(0, 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "not owned")]
    fn ensure_halts_with_violation_message() {
        ensure(false, || Violation::ForeignBlock { addr: 0x40, size: 4 });
    }
}
