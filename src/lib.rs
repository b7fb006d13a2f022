#![cfg_attr(not(test), no_std)]
//! This is a platform agnostic library for the Winbond W25Q serial NOR flash series using [embedded-hal](https://github.com/rust-embedded/embedded-hal).
//!
//! Multiple chips are supported:
//! * [W25Q16JV](https://www.winbond.com/hq/product/code-storage-flash-memory/serial-nor-flash/?partNo=W25Q16JV)
//! * [W25Q32JV](https://www.winbond.com/hq/product/code-storage-flash-memory/serial-nor-flash/?partNo=W25Q32JV)
//! * [W25Q64JV](https://www.winbond.com/hq/product/code-storage-flash-memory/serial-nor-flash/?partNo=W25Q64JV)
//! * [W25Q128JV](https://www.winbond.com/hq/product/code-storage-flash-memory/serial-nor-flash/?partNo=W25Q128JV)
//!
//! Both a [blocking](crate::blocking) and an [asynchronous](crate::asynchronous) driver are provided.
//! Besides plain byte addressed reads, the drivers read and write by page, sector and block number
//! with an offset and a length inside that unit. Those requests are split into page programs and
//! page reads by [`span::PageSpans`], so a single program never crosses a page boundary.
//!
//! The chip must be erased before being programmed, the drivers never erase on their own.

pub mod address;
pub mod asynchronous;
pub mod blocking;
mod command;
pub mod error;
pub mod register;
pub mod span;

use crate::error::Error;

pub use crate::address::{BLOCK32_SIZE, BLOCK_SIZE, PAGE_SIZE, SECTOR_SIZE};

/// How long the drivers wait for the chip to clear its busy flag
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyWait {
    /// Poll until the chip is ready, however long it takes
    #[default]
    Unbounded,

    /// Give up with [`Error::Timeout`] after this many status reads
    Polls(u32),
}

impl BusyWait {
    pub(crate) fn exhausted(&self, polls: u32) -> bool {
        match self {
            BusyWait::Unbounded => false,
            BusyWait::Polls(limit) => polls >= *limit,
        }
    }
}

pub(crate) fn check_erase<E>(capacity: usize, from: u32, to: u32) -> Result<(), Error<E>> {
    let capacity = capacity as u32;
    if from > to || to > capacity {
        return Err(Error::OutOfBounds);
    }
    if from % SECTOR_SIZE != 0 || to % SECTOR_SIZE != 0 {
        return Err(Error::NotAligned);
    }
    Ok(())
}

pub(crate) fn check_range<E>(capacity: usize, offset: u32, length: usize) -> Result<(), Error<E>> {
    let capacity = capacity as u32;
    let Ok(length) = u32::try_from(length) else {
        return Err(Error::OutOfBounds);
    };
    if length > capacity || offset > capacity - length {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}

/// Picks the largest erase starting at `from` that stays before `to`
pub(crate) fn next_erase(from: u32, to: u32) -> (address::EraseUnit, u32) {
    use crate::address::{Block, EraseUnit, Sector};

    if from % BLOCK_SIZE == 0 && to - from >= BLOCK_SIZE {
        (EraseUnit::Block(Block(from / BLOCK_SIZE)), BLOCK_SIZE)
    } else {
        (EraseUnit::Sector(Sector(from / SECTOR_SIZE)), SECTOR_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Block, EraseUnit, Sector};

    #[test]
    fn erase_ranges() {
        assert_eq!(check_erase::<()>(0x20_0000, 0, SECTOR_SIZE), Ok(()));
        assert_eq!(check_erase::<()>(0x20_0000, SECTOR_SIZE, 0), Err(Error::OutOfBounds));
        assert_eq!(check_erase::<()>(0x20_0000, 0, 0x20_1000), Err(Error::OutOfBounds));
        assert_eq!(check_erase::<()>(0x20_0000, 1, SECTOR_SIZE), Err(Error::NotAligned));
    }

    #[test]
    fn ranges_stay_on_the_chip() {
        assert_eq!(check_range::<()>(0x20_0000, 0x1F_FFFF, 1), Ok(()));
        assert_eq!(check_range::<()>(0x20_0000, 0x1F_FFFF, 2), Err(Error::OutOfBounds));
        assert_eq!(check_range::<()>(0x20_0000, 0x20_0000, 0), Ok(()));
        assert_eq!(check_range::<()>(0x20_0000, 0, 0x20_0001), Err(Error::OutOfBounds));
    }

    #[test]
    fn erase_prefers_blocks_when_aligned() {
        assert_eq!(
            next_erase(0, 2 * BLOCK_SIZE),
            (EraseUnit::Block(Block(0)), BLOCK_SIZE)
        );
        assert_eq!(
            next_erase(SECTOR_SIZE, 2 * BLOCK_SIZE),
            (EraseUnit::Sector(Sector(1)), SECTOR_SIZE)
        );
        assert_eq!(
            next_erase(BLOCK_SIZE, BLOCK_SIZE + SECTOR_SIZE),
            (EraseUnit::Sector(Sector(16)), SECTOR_SIZE)
        );
    }

    #[test]
    fn bounded_busy_wait() {
        assert!(!BusyWait::Unbounded.exhausted(u32::MAX));
        assert!(!BusyWait::Polls(3).exhausted(2));
        assert!(BusyWait::Polls(3).exhausted(3));
    }
}
