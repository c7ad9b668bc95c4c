//! Unique identifiers and the allocator that hands them out.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::UNIQUE_ID_PREFIX;

/// The widths of each hyphen-separated group in a rendered [`UniqueId`](UniqueId).
const GROUP_WIDTHS: [usize; 5] = [8, 4, 4, 4, 12];

/// Errors that can occur when parsing a [`UniqueId`](UniqueId) from a string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UniqueIdError {
    /// The string doesn't begin with `ID_`.
    #[error("unique ID should begin with ID_: {0}")]
    MissingPrefix(String),
    /// The part after the prefix isn't grouped as `8-4-4-4-12`.
    #[error("unique ID has inappropriate grouping: {0}")]
    BadGrouping(String),
    /// The part after the prefix contains a non-hexadecimal digit.
    #[error("unique ID contains a non-hex digit: {0}")]
    BadDigit(String),
}

/// A process-unique identifier for synthetic constructs and variables.
///
/// `UniqueId`s render in a GUID-like form, e.g.
/// `ID_00000000-0000-0000-0000-00000000002A`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UniqueId(u128);

impl UniqueId {
    /// Returns the raw numeric value of this ID.
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl From<u128> for UniqueId {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = format!("{:032X}", self.0);

        f.write_str(UNIQUE_ID_PREFIX)?;
        let mut start = 0;
        for (idx, width) in GROUP_WIDTHS.iter().enumerate() {
            if idx > 0 {
                f.write_str("-")?;
            }
            f.write_str(&hex[start..start + width])?;
            start += width;
        }

        Ok(())
    }
}

impl FromStr for UniqueId {
    type Err = UniqueIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = match s.get(..UNIQUE_ID_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(UNIQUE_ID_PREFIX) => {
                &s[UNIQUE_ID_PREFIX.len()..]
            }
            _ => return Err(UniqueIdError::MissingPrefix(s.into())),
        };

        let groups = body.split('-').collect::<Vec<_>>();
        if groups.len() != GROUP_WIDTHS.len()
            || groups
                .iter()
                .zip(GROUP_WIDTHS.iter())
                .any(|(group, width)| group.len() != *width)
        {
            return Err(UniqueIdError::BadGrouping(s.into()));
        }

        let digits = groups.concat();
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(UniqueIdError::BadDigit(s.into()));
        }

        // 32 hex digits always fit in a u128, so this can't overflow.
        u128::from_str_radix(&digits, 16)
            .map(Self)
            .map_err(|_| UniqueIdError::BadDigit(s.into()))
    }
}

/// A generator of fresh [`UniqueId`](UniqueId)s.
///
/// The counter is atomic, so a single allocator can be shared between
/// functions that are lowered on different threads.
#[derive(Debug)]
pub struct LabelAllocator {
    next: AtomicU64,
}

impl Default for LabelAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelAllocator {
    /// Create a new allocator, whose first ID will be `1`.
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a new allocator whose first ID will be `first`.
    ///
    /// This is mostly useful for producing deterministic IDs in tests.
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Returns the process-wide allocator.
    pub fn global() -> Arc<LabelAllocator> {
        static GLOBAL: OnceLock<Arc<LabelAllocator>> = OnceLock::new();

        Arc::clone(GLOBAL.get_or_init(|| Arc::new(LabelAllocator::new())))
    }

    /// Allocate a fresh ID. No two calls on the same allocator return the same ID.
    pub fn next_id(&self) -> UniqueId {
        UniqueId(self.next.fetch_add(1, Ordering::Relaxed).into())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_unique_id_display() {
        assert_eq!(
            UniqueId::from(0x2a).to_string(),
            "ID_00000000-0000-0000-0000-00000000002A"
        );
        assert_eq!(
            UniqueId::from(0x0123456789abcdef_fedcba9876543210).to_string(),
            "ID_01234567-89AB-CDEF-FEDC-BA9876543210"
        );
    }

    #[test]
    fn test_unique_id_parse() {
        let id = UniqueId::from(0xdeadbeef);
        assert_eq!(id.to_string().parse::<UniqueId>().unwrap(), id);

        // Both the prefix and the digits are case-insensitive.
        assert_eq!(
            "id_00000000-0000-0000-0000-0000deadbeef"
                .parse::<UniqueId>()
                .unwrap(),
            id
        );
    }

    #[test]
    fn test_unique_id_parse_invalid() {
        assert_eq!(
            "00000000-0000-0000-0000-000000000000".parse::<UniqueId>(),
            Err(UniqueIdError::MissingPrefix(
                "00000000-0000-0000-0000-000000000000".into()
            ))
        );
        assert!(matches!(
            "ID_0000-0000-0000-0000-000000000000".parse::<UniqueId>(),
            Err(UniqueIdError::BadGrouping(_))
        ));
        assert!(matches!(
            "ID_00000000-0000-0000-0000".parse::<UniqueId>(),
            Err(UniqueIdError::BadGrouping(_))
        ));
        assert!(matches!(
            "ID_0000000G-0000-0000-0000-000000000000".parse::<UniqueId>(),
            Err(UniqueIdError::BadDigit(_))
        ));
        assert!(matches!(
            "I".parse::<UniqueId>(),
            Err(UniqueIdError::MissingPrefix(_))
        ));
    }

    #[test]
    fn test_allocator_sequence() {
        let alloc = LabelAllocator::starting_at(100);
        assert_eq!(alloc.next_id(), UniqueId::from(100));
        assert_eq!(alloc.next_id(), UniqueId::from(101));
        assert_eq!(alloc.next_id().value(), 102);

        assert_eq!(LabelAllocator::new().next_id(), UniqueId::from(1));
    }

    #[test]
    fn test_allocator_shared_across_threads() {
        let alloc = Arc::new(LabelAllocator::new());

        let handles = (0..4)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                thread::spawn(move || (0..100).map(|_| alloc.next_id()).collect::<Vec<_>>())
            })
            .collect::<Vec<_>>();

        let mut ids = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
    }

    #[test]
    fn test_global_allocator_is_shared() {
        let a = LabelAllocator::global();
        let b = LabelAllocator::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert_ne!(a.next_id(), b.next_id());
    }
}
