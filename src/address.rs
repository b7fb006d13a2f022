//! Device geometry and the conversions between pages, sectors and blocks.
//!
//! All sizes are powers of two and each one divides the next, so the
//! "downward" conversions (block to sector, sector to page) are exact while the
//! "upward" ones floor.

/// Smallest programmable unit, a page program never crosses it.
pub const PAGE_SIZE: u32 = 0x100;
/// Smallest erasable unit.
pub const SECTOR_SIZE: u32 = 0x1000;
/// Half block, erased with its own instruction.
pub const BLOCK32_SIZE: u32 = BLOCK_SIZE / 2;
/// 64kB block.
pub const BLOCK_SIZE: u32 = 0x010000;

/// A page id, containing 256 bytes
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Page(pub u32);

/// A sector id, containing 16 pages for a total of 4kB.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sector(pub u32);

/// A 32kB block id, containing 8 sectors
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block32(pub u32);

/// A 64kB block id, containing 16 sectors
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block(pub u32);

/// An absolute byte address on the memory chip
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address(pub u32);

const PAGES_PER_SECTOR: u32 = SECTOR_SIZE / PAGE_SIZE;
const PAGES_PER_BLOCK32: u32 = BLOCK32_SIZE / PAGE_SIZE;
const PAGES_PER_BLOCK: u32 = BLOCK_SIZE / PAGE_SIZE;
const SECTORS_PER_BLOCK32: u32 = BLOCK32_SIZE / SECTOR_SIZE;
const SECTORS_PER_BLOCK: u32 = BLOCK_SIZE / SECTOR_SIZE;

/// `id * factor`, `None` when the result does not fit in 32 bits
const fn scale(id: u32, factor: u32) -> Option<u32> {
    id.checked_mul(factor)
}

impl Page {
    pub const fn to_sector(self) -> Sector {
        Sector(self.0 / PAGES_PER_SECTOR)
    }

    pub const fn to_block(self) -> Block {
        Block(self.0 / PAGES_PER_BLOCK)
    }
}

impl Sector {
    /// First page of the sector, `None` past the 32 bit page space
    pub const fn to_page(self) -> Option<Page> {
        match scale(self.0, PAGES_PER_SECTOR) {
            Some(page) => Some(Page(page)),
            None => None,
        }
    }

    pub const fn to_block(self) -> Block {
        Block(self.0 / SECTORS_PER_BLOCK)
    }
}

impl Block32 {
    pub const fn to_page(self) -> Option<Page> {
        match scale(self.0, PAGES_PER_BLOCK32) {
            Some(page) => Some(Page(page)),
            None => None,
        }
    }

    pub const fn to_sector(self) -> Option<Sector> {
        match scale(self.0, SECTORS_PER_BLOCK32) {
            Some(sector) => Some(Sector(sector)),
            None => None,
        }
    }
}

impl Block {
    pub const fn to_page(self) -> Option<Page> {
        match scale(self.0, PAGES_PER_BLOCK) {
            Some(page) => Some(Page(page)),
            None => None,
        }
    }

    pub const fn to_sector(self) -> Option<Sector> {
        match scale(self.0, SECTORS_PER_BLOCK) {
            Some(sector) => Some(Sector(sector)),
            None => None,
        }
    }
}

/// The erase instruction chosen for a range
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EraseUnit {
    Sector(Sector),
    Block(Block),
}

/// A numbered region of the chip that a span request can be addressed to.
pub trait Unit: Copy {
    /// Size of the unit in bytes, a multiple of [`PAGE_SIZE`]
    const SIZE: u32;

    /// The page the unit starts on, `None` when it lies past the 32 bit page space
    fn first_page(self) -> Option<Page>;

    /// Address of the first byte of the unit, `None` when it does not fit in 32 bits
    fn address(self) -> Option<Address> {
        self.first_page().and_then(Address::from_page)
    }
}

impl Unit for Page {
    const SIZE: u32 = PAGE_SIZE;

    fn first_page(self) -> Option<Page> {
        Some(self)
    }
}

impl Unit for Sector {
    const SIZE: u32 = SECTOR_SIZE;

    fn first_page(self) -> Option<Page> {
        self.to_page()
    }
}

impl Unit for Block32 {
    const SIZE: u32 = BLOCK32_SIZE;

    fn first_page(self) -> Option<Page> {
        self.to_page()
    }
}

impl Unit for Block {
    const SIZE: u32 = BLOCK_SIZE;

    fn first_page(self) -> Option<Page> {
        self.to_page()
    }
}

impl Address {
    /// Represents a byte within a page. `None` when the address does not fit in 32 bits.
    pub const fn from_page_offset(page: Page, offset: u32) -> Option<Self> {
        match scale(page.0, PAGE_SIZE) {
            Some(base) => match base.checked_add(offset) {
                Some(addr) => Some(Address(addr)),
                None => None,
            },
            None => None,
        }
    }

    /// Represents a specific page in memory.
    pub const fn from_page(page: Page) -> Option<Self> {
        Self::from_page_offset(page, 0)
    }

    /// Represents a specific sector in memory.
    pub const fn from_sector(sector: Sector) -> Option<Self> {
        match scale(sector.0, SECTOR_SIZE) {
            Some(addr) => Some(Address(addr)),
            None => None,
        }
    }

    /// Represents a specific 32kB block in memory.
    pub const fn from_block32(block: Block32) -> Option<Self> {
        match scale(block.0, BLOCK32_SIZE) {
            Some(addr) => Some(Address(addr)),
            None => None,
        }
    }

    /// Represents a specific 64kB block in memory.
    pub const fn from_block(block: Block) -> Option<Self> {
        match scale(block.0, BLOCK_SIZE) {
            Some(addr) => Some(Address(addr)),
            None => None,
        }
    }

    /// The page containing this address
    pub const fn page(self) -> Page {
        Page(self.0 / PAGE_SIZE)
    }

    /// Big endian 24 bit representation, as sent after an opcode
    pub(crate) const fn to_be_bytes(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }
}

impl From<u32> for Page {
    fn from(page_id: u32) -> Page {
        Page(page_id)
    }
}

impl From<u32> for Sector {
    fn from(sector_id: u32) -> Sector {
        Sector(sector_id)
    }
}

impl From<u32> for Block32 {
    fn from(block_id: u32) -> Block32 {
        Block32(block_id)
    }
}

impl From<u32> for Block {
    fn from(block_id: u32) -> Block {
        Block(block_id)
    }
}

impl From<u32> for Address {
    fn from(addr: u32) -> Address {
        Address(addr)
    }
}

impl From<Address> for u32 {
    fn from(addr: Address) -> u32 {
        addr.0
    }
}
