//! Splitting of unit relative requests into page sized transactions.
//!
//! A page program must never cross a page boundary: the chip wraps around
//! inside the page instead of moving on to the next one. Every multi-page
//! read and write of the drivers goes through [`PageSpans`], which walks a
//! request one page at a time.
//!
//! Requests addressed to a [`Unit`] are normalized first, permissively:
//! * a `length` of zero, or larger than the unit, means the whole unit,
//! * a request running past the end of the unit is truncated to fit in it,
//! * an `offset` at or past the end of the unit yields no span at all,
//! * the length never exceeds the caller's buffer.

use core::ops::Range;

use crate::address::{Address, Page, Unit, PAGE_SIZE};

/// One page level operation of a request
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpan {
    /// Absolute address of the first byte
    pub address: Address,
    /// Part of the caller's buffer consumed by this operation
    pub buf: Range<usize>,
}

impl PageSpan {
    /// Page the operation targets
    pub fn page(&self) -> Page {
        self.address.page()
    }

    /// Byte offset inside the page
    pub fn offset(&self) -> u32 {
        self.address.0 % PAGE_SIZE
    }

    /// Number of bytes covered, never more than `PAGE_SIZE - offset`
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Iterator over the page operations covering a request, in ascending
/// address order.
#[derive(Debug, Clone)]
pub struct PageSpans {
    address: u32,
    remaining: usize,
    position: usize,
}

impl PageSpans {
    /// Spans for `length` bytes at `offset` inside `unit`, for a buffer of
    /// `buf_len` bytes.
    ///
    /// A request whose offset lies outside of the unit yields no span. `None`
    /// when the unit or the end of the request lies past the 32 bit address space.
    pub fn new<U: Unit>(unit: U, offset: u32, length: u32, buf_len: usize) -> Option<Self> {
        let Some(length) = effective_length(U::SIZE, offset, length, buf_len) else {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "Offset {=u32} is outside of a {=u32} bytes unit, ignoring request",
                offset,
                U::SIZE
            );
            return Some(Self::empty());
        };

        let start = unit.address()?.0.checked_add(offset)?;
        Self::covering(Address(start), length)
    }

    /// Spans for `length` bytes starting at an absolute address, without any
    /// unit bound. `None` when the range runs past the 32 bit address space.
    pub fn covering(addr: Address, length: usize) -> Option<Self> {
        let length_u32 = u32::try_from(length).ok()?;
        addr.0.checked_add(length_u32)?;
        Some(Self {
            address: addr.0,
            remaining: length,
            position: 0,
        })
    }

    fn empty() -> Self {
        Self {
            address: 0,
            remaining: 0,
            position: 0,
        }
    }

    /// Bytes left to cover
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Iterator for PageSpans {
    type Item = PageSpan;

    fn next(&mut self) -> Option<PageSpan> {
        if self.remaining == 0 {
            return None;
        }

        let room = (PAGE_SIZE - self.address % PAGE_SIZE) as usize;
        let len = self.remaining.min(room);
        let span = PageSpan {
            address: Address(self.address),
            buf: self.position..self.position + len,
        };

        // Never overflows, the end of the range was checked on construction
        self.address += len as u32;
        self.position += len;
        self.remaining -= len;
        Some(span)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let head = (PAGE_SIZE - self.address % PAGE_SIZE) as usize;
        let count = if self.remaining == 0 {
            0
        } else if self.remaining <= head {
            1
        } else {
            1 + (self.remaining - head).div_ceil(PAGE_SIZE as usize)
        };
        (count, Some(count))
    }
}

impl ExactSizeIterator for PageSpans {}

impl core::iter::FusedIterator for PageSpans {}

/// Length actually transferred for a request, `None` when the offset lies
/// outside of the unit.
pub fn effective_length(unit_size: u32, offset: u32, length: u32, buf_len: usize) -> Option<usize> {
    if offset >= unit_size {
        return None;
    }

    let length = if length == 0 || length > unit_size {
        unit_size
    } else {
        length
    };
    let length = length.min(unit_size - offset);

    Some((length as usize).min(buf_len))
}
