use crate::{
    address::{Address, Block, Block32, EraseUnit, Page, Sector, Unit},
    command::Command,
    error::Error,
    register::*,
    span::PageSpans,
    BusyWait,
};
use embassy_futures::yield_now;
use embedded_hal::spi::Operation;
use embedded_hal_async::spi::SpiDevice;
use embedded_storage_async::nor_flash::{MultiwriteNorFlash, NorFlash, ReadNorFlash};

/// Type alias for the W25Q16JV, 2MB
pub type AsyncW25Q16JV<SPI> = AsyncW25Q<0x1FFFFF, SPI>;

/// Type alias for the W25Q32JV, 4MB
pub type AsyncW25Q32JV<SPI> = AsyncW25Q<0x3FFFFF, SPI>;

/// Type alias for the W25Q64JV, 8MB
pub type AsyncW25Q64JV<SPI> = AsyncW25Q<0x7FFFFF, SPI>;

/// Type alias for the W25Q128JV, 16MB
pub type AsyncW25Q128JV<SPI> = AsyncW25Q<0xFFFFFF, SPI>;

/// The generic async W25Q driver. It behaves like [`crate::blocking::W25Q`], but
/// yields to the executor between two polls of the busy bit.
pub struct AsyncW25Q<const SIZE: u32, SPI>
where
    SPI: SpiDevice,
{
    spi: SPI,
    busy_wait: BusyWait,
}

impl<const SIZE: u32, SPI, E> AsyncW25Q<SIZE, SPI>
where
    SPI: SpiDevice<Error = E>,
{
    pub const fn capacity() -> usize {
        SIZE as usize + 1
    }

    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            busy_wait: BusyWait::Unbounded,
        }
    }

    /// Bound the busy waits, by default the driver polls until the chip is ready
    pub fn with_busy_wait(mut self, busy_wait: BusyWait) -> Self {
        self.busy_wait = busy_wait;
        self
    }

    /// Releases the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }

    /// Poll the status register until the chip is ready, yielding to the executor between polls.
    /// Never returns while the chip stays busy unless a bound was set with [`Self::with_busy_wait`].
    pub async fn wait_while_busy(&mut self) -> Result<(), Error<E>> {
        let mut polls = 0u32;
        loop {
            match self.poll_busy().await {
                Ok(()) => return Ok(()),
                Err(Error::Busy) => polls = polls.saturating_add(1),
                Err(err) => return Err(err),
            }
            if self.busy_wait.exhausted(polls) {
                #[cfg(feature = "defmt")]
                defmt::warn!("Still busy after {=u32} polls", polls);
                return Err(Error::Timeout);
            }
            yield_now().await;
        }
    }

    pub fn verify_addr(addr: Address) -> Result<u32, Error<E>> {
        let val: u32 = addr.into();
        if val > SIZE {
            return Err(Error::OutOfBounds);
        }
        Ok(val)
    }

    async fn command_write(&mut self, bytes: &[u8]) -> Result<(), Error<E>> {
        self.spi.write(bytes).await.map_err(Error::Spi)
    }

    async fn command_transfer(&mut self, bytes: &mut [u8]) -> Result<(), Error<E>> {
        self.spi.transfer_in_place(bytes).await.map_err(Error::Spi)
    }

    async fn addr_command(&mut self, addr: Address, cmd: Command) -> Result<(), Error<E>> {
        Self::verify_addr(addr)?;
        self.command_write(&cmd.with_address(addr)).await
    }

    async fn write_read_base(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), Error<E>> {
        self.spi
            .transaction(&mut [Operation::Write(write), Operation::Read(read)])
            .await
            .map_err(Error::Spi)
    }

    async fn read_base_dummy(
        &mut self,
        addr: Address,
        cmd: Command,
        buff: &mut [u8],
    ) -> Result<(), Error<E>> {
        Self::verify_addr(addr)?;
        let [op, high, mid, low] = cmd.with_address(addr);
        let cmd: [u8; 5] = [op, high, mid, low, Command::Dummy as u8];

        let res = self.write_read_base(&cmd, buff).await;
        #[cfg(feature = "defmt")]
        if res.is_ok() {
            defmt::trace!("ReadF from {=u32}, {=usize}: {:?}", addr.0, buff.len(), buff);
        } else {
            defmt::error!("ERROR READ");
        }
        res
    }

    async fn write_base(
        &mut self,
        addr: Address,
        cmd: Command,
        buff: &[u8],
    ) -> Result<(), Error<E>> {
        let cmd = cmd.with_address(addr);
        self.spi
            .transaction(&mut [Operation::Write(&cmd), Operation::Write(buff)])
            .await
            .map_err(Error::Spi)
    }

    async fn prepare_write(&mut self) -> Result<(), Error<E>> {
        self.wait_while_busy().await?;
        self.write_enable().await
    }

    /// Programs `buff` at `addr`, the caller makes sure it stays in one page
    async fn program(&mut self, addr: Address, buff: &[u8]) -> Result<(), Error<E>> {
        Self::verify_addr(addr)?;
        #[cfg(feature = "defmt")]
        defmt::trace!("Write to {=u32} len {=usize}", addr.0, buff.len());
        self.prepare_write().await?;
        self.write_base(addr, Command::ProgramPage, buff).await?;
        self.wait_while_busy().await
    }

    async fn erase_base(&mut self, addr: Address, cmd: Command) -> Result<(), Error<E>> {
        Self::verify_addr(addr)?;
        #[cfg(feature = "defmt")]
        defmt::debug!("Erase {=u32} with {=u8:#x}", addr.0, cmd as u8);
        self.prepare_write().await?;
        self.addr_command(addr, cmd).await?;
        self.wait_while_busy().await
    }

    async fn write_unit<U: Unit>(
        &mut self,
        buff: &[u8],
        unit: U,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        let spans =
            PageSpans::new(unit, offset, length, buff.len()).ok_or(Error::OutOfBounds)?;
        let written = spans.remaining();
        for span in spans {
            self.program(span.address, &buff[span.buf]).await?;
        }
        Ok(written)
    }

    async fn read_unit<U: Unit>(
        &mut self,
        buff: &mut [u8],
        unit: U,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        let spans =
            PageSpans::new(unit, offset, length, buff.len()).ok_or(Error::OutOfBounds)?;
        let read = spans.remaining();
        for span in spans {
            self.read_base_dummy(span.address, Command::ReadF, &mut buff[span.buf])
                .await?;
        }
        Ok(read)
    }

    /// Read the JEDEC ID, and print it alongside the unique id and the chip geometry
    pub async fn init(&mut self) -> Result<DeviceInfo, Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::info!("W25Q initialization");
        let jedec_id = self.read_jedec_id().await?;
        let mut unique_id = [0; 8];
        self.read_unique_id(&mut unique_id).await?;
        Ok(DeviceInfo::new(jedec_id, unique_id, Self::capacity() as u32))
    }

    /// Read the manufacturer and device id
    pub async fn read_jedec_id(&mut self) -> Result<JedecId, Error<E>> {
        let mut command = [Command::ReadJedecId as u8, 0, 0, 0];
        self.command_transfer(&mut command).await?;
        Ok(JedecId::from([command[1], command[2], command[3]]))
    }

    /// Read the 64 bit unique id into `buff`, which must be exactly 8 bytes long
    pub async fn read_unique_id(&mut self, buff: &mut [u8]) -> Result<(), Error<E>> {
        if buff.len() != 8 {
            return Err(Error::Value);
        }
        let dummy = Command::Dummy as u8;
        let command = [Command::ReadUniqueId as u8, dummy, dummy, dummy, dummy];
        self.write_read_base(&command, buff).await
    }

    /// Read one byte at an address
    pub async fn read_byte(&mut self, addr: Address) -> Result<u8, Error<E>> {
        let mut buff = [0];
        self.read_base_dummy(addr, Command::ReadF, &mut buff).await?;
        Ok(buff[0])
    }

    /// Read `buff.len()` bytes from an address in a single transaction
    pub async fn read_bytes(&mut self, addr: Address, buff: &mut [u8]) -> Result<(), Error<E>> {
        crate::check_range(Self::capacity(), addr.0, buff.len())?;
        self.read_base_dummy(addr, Command::ReadF, buff).await
    }

    /// Read from a page, see [`PageSpans`] for how `offset` and `length` are handled.
    /// Returns the number of bytes read.
    pub async fn read_page(
        &mut self,
        buff: &mut [u8],
        page: Page,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        self.read_unit(buff, page, offset, length).await
    }

    /// Read from a 4kB sector, one page at a time. Returns the number of bytes read.
    pub async fn read_sector(
        &mut self,
        buff: &mut [u8],
        sector: Sector,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        self.read_unit(buff, sector, offset, length).await
    }

    /// Read from a 32kB block, one page at a time. Returns the number of bytes read.
    pub async fn read_block32(
        &mut self,
        buff: &mut [u8],
        block: Block32,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        self.read_unit(buff, block, offset, length).await
    }

    /// Read from a 64kB block, one page at a time. Returns the number of bytes read.
    pub async fn read_block(
        &mut self,
        buff: &mut [u8],
        block: Block,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        self.read_unit(buff, block, offset, length).await
    }

    /// Program one byte. The byte must have been erased before.
    pub async fn write_byte(&mut self, byte: u8, addr: Address) -> Result<(), Error<E>> {
        self.program(addr, &[byte]).await
    }

    /// Program part of a page, the write never wraps into the next page.
    /// Returns the number of bytes written.
    pub async fn write_page(
        &mut self,
        buff: &[u8],
        page: Page,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        self.write_unit(buff, page, offset, length).await
    }

    /// Program part of a 4kB sector with one page program per page.
    /// Returns the number of bytes written.
    pub async fn write_sector(
        &mut self,
        buff: &[u8],
        sector: Sector,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        self.write_unit(buff, sector, offset, length).await
    }

    /// Program part of a 32kB block with one page program per page.
    /// Returns the number of bytes written.
    pub async fn write_block32(
        &mut self,
        buff: &[u8],
        block: Block32,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        self.write_unit(buff, block, offset, length).await
    }

    /// Program part of a 64kB block with one page program per page.
    /// Returns the number of bytes written.
    pub async fn write_block(
        &mut self,
        buff: &[u8],
        block: Block,
        offset: u32,
        length: u32,
    ) -> Result<usize, Error<E>> {
        self.write_unit(buff, block, offset, length).await
    }

    /// Erase a 4kB sector
    pub async fn erase_sector(&mut self, sector: Sector) -> Result<(), Error<E>> {
        let addr = Address::from_sector(sector).ok_or(Error::OutOfBounds)?;
        self.erase_base(addr, Command::SectorErase).await
    }

    /// Erase a 32kB block
    pub async fn erase_block32(&mut self, block: Block32) -> Result<(), Error<E>> {
        let addr = Address::from_block32(block).ok_or(Error::OutOfBounds)?;
        self.erase_base(addr, Command::BlockErase32).await
    }

    /// Erase a 64kB block
    pub async fn erase_block(&mut self, block: Block) -> Result<(), Error<E>> {
        let addr = Address::from_block(block).ok_or(Error::OutOfBounds)?;
        self.erase_base(addr, Command::BlockErase).await
    }

    /// Erase the whole chip
    pub async fn erase_chip(&mut self) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("Erase chip");
        self.prepare_write().await?;
        self.command_write(&[Command::ChipErase as u8]).await?;
        self.wait_while_busy().await
    }

    /// Enable write operation, though you shouldn't need this function since it's already handled in the write/erase operations.
    pub async fn write_enable(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::WriteEnable as u8]).await
    }

    /// Disable write
    pub async fn write_disable(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::WriteDisable as u8]).await
    }

    /// Read the status register 1
    pub async fn read_status(&mut self) -> Result<StatusRegister1, Error<E>> {
        let mut command: [u8; 2] = [Command::ReadStatus1 as u8, 0];
        self.command_transfer(&mut command).await?;
        Ok(command[1].into())
    }

    /// Read the status register 2
    pub async fn read_status2(&mut self) -> Result<StatusRegister2, Error<E>> {
        let mut command: [u8; 2] = [Command::ReadStatus2 as u8, 0];
        self.command_transfer(&mut command).await?;
        Ok(command[1].into())
    }

    /// Read the status register 3
    pub async fn read_status3(&mut self) -> Result<StatusRegister3, Error<E>> {
        let mut command: [u8; 2] = [Command::ReadStatus3 as u8, 0];
        self.command_transfer(&mut command).await?;
        Ok(command[1].into())
    }

    /// Read the busy bit once, [`Error::Busy`] if the chip has an operation in progress
    pub async fn poll_busy(&mut self) -> Result<(), Error<E>> {
        if self.read_status().await?.busy {
            return Err(Error::Busy);
        }
        Ok(())
    }

    /// Deep power down the chip, only [`Self::release_power_down`] is accepted afterwards
    pub async fn power_down(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::PowerDown as u8]).await
    }

    /// Wake the chip from deep power down
    pub async fn release_power_down(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::ReleasePowerDown as u8]).await
    }

    /// Software reset of the chip, interrupts any operation in progress
    pub async fn reset(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::EnableReset as u8]).await?;
        self.command_write(&[Command::ResetDevice as u8]).await
    }
}

impl<const SIZE: u32, SPI: SpiDevice> embedded_storage_async::nor_flash::ErrorType
    for AsyncW25Q<SIZE, SPI>
{
    type Error = Error<SPI::Error>;
}

impl<const SIZE: u32, SPI: SpiDevice> ReadNorFlash for AsyncW25Q<SIZE, SPI> {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.read_bytes(Address(offset), bytes).await
    }

    fn capacity(&self) -> usize {
        Self::capacity()
    }
}

impl<const SIZE: u32, SPI: SpiDevice> NorFlash for AsyncW25Q<SIZE, SPI> {
    const WRITE_SIZE: usize = 1;

    const ERASE_SIZE: usize = crate::SECTOR_SIZE as usize;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        crate::check_erase(Self::capacity(), from, to)?;

        let mut idx = from;
        while idx < to {
            let (unit, size) = crate::next_erase(idx, to);
            #[cfg(feature = "defmt")]
            defmt::debug!("Erase {:?}", unit);
            match unit {
                EraseUnit::Block(block) => self.erase_block(block).await?,
                EraseUnit::Sector(sector) => self.erase_sector(sector).await?,
            }
            idx += size;
        }
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        crate::check_range(Self::capacity(), offset, bytes.len())?;
        let spans =
            PageSpans::covering(Address(offset), bytes.len()).ok_or(Error::OutOfBounds)?;
        for span in spans {
            self.program(span.address, &bytes[span.buf]).await?;
        }
        Ok(())
    }
}

impl<const SIZE: u32, SPI: SpiDevice> MultiwriteNorFlash for AsyncW25Q<SIZE, SPI> {}
