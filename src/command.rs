/// Standard SPI instruction set of the W25Q family
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    WriteEnable = 0x06,
    WriteDisable = 0x04,

    ReadStatus1 = 0x05,
    ReadStatus2 = 0x35,
    ReadStatus3 = 0x15,

    ReadJedecId = 0x9F,
    ReadUniqueId = 0x4B,

    ReadF = 0x0B,
    ProgramPage = 0x02,

    SectorErase = 0x20,
    BlockErase32 = 0x52,
    BlockErase = 0xD8,
    ChipErase = 0xC7,

    PowerDown = 0xB9,
    ReleasePowerDown = 0xAB,
    EnableReset = 0x66,
    ResetDevice = 0x99,

    Dummy = 0x00,
}

impl Command {
    /// Opcode followed by a 24 bit big endian address
    pub(crate) fn with_address(self, addr: crate::address::Address) -> [u8; 4] {
        let [high, mid, low] = addr.to_be_bytes();
        [self as u8, high, mid, low]
    }
}
