//! Page numbering and page-size newtypes.

use std::num::NonZeroU32;

use raftlite_error::{RaftliteError, Result};

/// A 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageNumber(NonZeroU32);

impl PageNumber {
    /// Page 1, which always holds the 100-byte database header.
    pub const ONE: Self = Self(NonZeroU32::new(1).expect("1 is non-zero"));

    /// Construct from a raw page number; `0` is invalid (pages are 1-based).
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

/// The database page size: a power of two in `[512, 65536]`, fixed for the
/// lifetime of a database after the first write determines it.
///
/// Invariant P1: the on-disk header encodes `65536` as `1` (it does not fit
/// in the header's `u16` field), and every other non-power-of-two or
/// out-of-range value is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize(u32);

impl PageSize {
    pub const MIN: u32 = 512;
    pub const MAX: u32 = 65536;
    pub const DEFAULT: Self = Self(4096);

    /// Validate and construct from a plain page-size value (not the
    /// on-disk encoded form).
    #[must_use]
    pub fn new(bytes: u32) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&bytes) && bytes.is_power_of_two() {
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Decode the on-disk header encoding, where `1` means 65536 and
    /// anything else must equal the plain value.
    ///
    /// This is property P1 of the specification's testable properties.
    pub fn decode_header_field(encoded: u16) -> Result<Self> {
        let bytes = if encoded == 1 {
            Self::MAX
        } else {
            u32::from(encoded)
        };
        Self::new(bytes).ok_or_else(|| {
            RaftliteError::corrupt(format!("invalid page-size header field: {encoded}"))
        })
    }

    /// Encode for the on-disk header field (65536 becomes `1`).
    #[must_use]
    pub fn encode_header_field(self) -> u16 {
        if self.0 == Self::MAX {
            1
        } else {
            u16::try_from(self.0).expect("page size below 65536 fits u16 unless MAX")
        }
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub fn as_u64(self) -> u64 {
        u64::from(self.0)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An opaque, fixed-size page buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageData(Vec<u8>);

impl PageData {
    #[must_use]
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn zeroed(size: PageSize) -> Self {
        Self(vec![0_u8; size.as_usize()])
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for PageData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
