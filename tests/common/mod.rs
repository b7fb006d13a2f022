//! In-memory W25Q chip answering the standard SPI instruction set.
//!
//! The bus and the chip select pin share the chip: selecting starts a frame, every
//! exchanged byte is answered as the real chip would, and deselecting executes the
//! frame (program, erase, latch updates) and records it in the frame log.

#![allow(dead_code)]

use std::{cell::RefCell, convert::Infallible, rc::Rc};

use embedded_hal::{digital, spi};
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};

pub const CAPACITY: usize = 0x20_0000;
pub const JEDEC_ID: [u8; 3] = [0xEF, 0x40, 0x15];
pub const UNIQUE_ID: [u8; 8] = [0xD2, 0x65, 0x38, 0x41, 0x07, 0x5A, 0x2C, 0x19];

pub const PROGRAM: u8 = 0x02;
pub const WRITE_ENABLE: u8 = 0x06;
pub const READ_STATUS: u8 = 0x05;
pub const FAST_READ: u8 = 0x0B;
pub const SECTOR_ERASE: u8 = 0x20;
pub const BLOCK32_ERASE: u8 = 0x52;
pub const BLOCK_ERASE: u8 = 0xD8;
pub const CHIP_ERASE: u8 = 0xC7;

pub type SimDevice = ExclusiveDevice<SimBus, SimCs, NoDelay>;

/// One chip select cycle, as seen on MOSI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Vec<u8>,
}

impl Frame {
    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    pub fn address(&self) -> u32 {
        u32::from_be_bytes([0, self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[4..]
    }
}

pub struct Chip {
    pub memory: Vec<u8>,
    pub unique_id: [u8; 8],
    /// Busy status reads reported after each program or erase
    pub busy_polls: u32,
    /// Never leaves the busy state
    pub stuck: bool,
    pub write_enabled: bool,
    /// Commands other than a status read received while busy
    pub ignored_while_busy: usize,
    pub frames: Vec<Frame>,
    busy_remaining: u32,
    selected: bool,
    mosi: Vec<u8>,
}

impl Chip {
    pub fn new() -> Self {
        Self {
            memory: vec![0xFF; CAPACITY],
            unique_id: UNIQUE_ID,
            busy_polls: 2,
            stuck: false,
            write_enabled: false,
            ignored_while_busy: 0,
            frames: Vec::new(),
            busy_remaining: 0,
            selected: false,
            mosi: Vec::new(),
        }
    }

    /// Frames carrying the given opcode
    pub fn frames_with(&self, opcode: u8) -> Vec<&Frame> {
        self.frames.iter().filter(|f| f.opcode() == opcode).collect()
    }

    /// `(address, length)` of every page program
    pub fn programs(&self) -> Vec<(u32, usize)> {
        self.frames_with(PROGRAM)
            .iter()
            .map(|f| (f.address(), f.payload().len()))
            .collect()
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.frames.iter().map(Frame::opcode).collect()
    }

    pub fn clear_log(&mut self) {
        self.frames.clear();
    }

    fn busy(&self) -> bool {
        self.stuck || self.busy_remaining > 0
    }

    fn status(&mut self) -> u8 {
        let status = (self.busy() as u8) | ((self.write_enabled as u8) << 1);
        self.busy_remaining = self.busy_remaining.saturating_sub(1);
        status
    }

    fn select(&mut self) {
        self.selected = true;
        self.mosi.clear();
    }

    fn exchange(&mut self, out: u8) -> u8 {
        if !self.selected {
            return 0xFF;
        }
        self.mosi.push(out);
        let pos = self.mosi.len() - 1;
        match (self.mosi[0], pos) {
            (READ_STATUS, 1..=usize::MAX) => self.status(),
            (0x9F, 1..=3) => JEDEC_ID[pos - 1],
            (0x4B, 5..=12) => self.unique_id[pos - 5],
            (FAST_READ, 5..=usize::MAX) => {
                let addr = u32::from_be_bytes([0, self.mosi[1], self.mosi[2], self.mosi[3]]);
                self.memory[(addr as usize + pos - 5) % CAPACITY]
            }
            _ => 0xFF,
        }
    }

    fn deselect(&mut self) {
        if !self.selected {
            return;
        }
        self.selected = false;
        if self.mosi.is_empty() {
            return;
        }
        let frame = Frame {
            bytes: std::mem::take(&mut self.mosi),
        };

        if self.busy() && frame.opcode() != READ_STATUS {
            self.ignored_while_busy += 1;
        } else {
            self.execute(&frame);
        }
        self.frames.push(frame);
    }

    fn execute(&mut self, frame: &Frame) {
        match frame.opcode() {
            WRITE_ENABLE => self.write_enabled = true,
            0x04 => self.write_enabled = false,
            PROGRAM if self.write_enabled => {
                let addr = frame.address() as usize % CAPACITY;
                let base = addr & !0xFF;
                for (i, byte) in frame.payload().iter().enumerate() {
                    // The chip wraps around inside the page
                    let at = base + (addr + i) % 0x100;
                    self.memory[at] &= byte;
                }
                self.start_operation();
            }
            SECTOR_ERASE if self.write_enabled => self.erase(frame.address(), 0x1000),
            BLOCK32_ERASE if self.write_enabled => self.erase(frame.address(), 0x8000),
            BLOCK_ERASE if self.write_enabled => self.erase(frame.address(), 0x10000),
            CHIP_ERASE if self.write_enabled => self.erase(0, CAPACITY as u32),
            _ => {}
        }
    }

    fn erase(&mut self, addr: u32, size: u32) {
        let start = (addr & !(size - 1)) as usize % CAPACITY;
        self.memory[start..start + size as usize].fill(0xFF);
        self.start_operation();
    }

    fn start_operation(&mut self) {
        self.write_enabled = false;
        self.busy_remaining = self.busy_polls;
    }
}

pub type SharedChip = Rc<RefCell<Chip>>;

pub fn chip() -> SharedChip {
    Rc::new(RefCell::new(Chip::new()))
}

/// SPI device talking to `chip`
pub fn device(chip: &SharedChip) -> SimDevice {
    ExclusiveDevice::new_no_delay(SimBus(chip.clone()), SimCs(chip.clone())).unwrap()
}

/// The data lines of the chip
pub struct SimBus(SharedChip);

impl SimBus {
    fn exchange(&mut self, out: u8) -> u8 {
        self.0.borrow_mut().exchange(out)
    }

    fn read_words(&mut self, words: &mut [u8]) {
        for word in words.iter_mut() {
            *word = self.exchange(0x00);
        }
    }

    fn write_words(&mut self, words: &[u8]) {
        for word in words {
            self.exchange(*word);
        }
    }

    fn transfer_words(&mut self, read: &mut [u8], write: &[u8]) {
        for i in 0..read.len().max(write.len()) {
            let input = self.exchange(write.get(i).copied().unwrap_or(0x00));
            if let Some(word) = read.get_mut(i) {
                *word = input;
            }
        }
    }

    fn transfer_words_in_place(&mut self, words: &mut [u8]) {
        for word in words.iter_mut() {
            *word = self.exchange(*word);
        }
    }
}

impl spi::ErrorType for SimBus {
    type Error = Infallible;
}

impl spi::SpiBus for SimBus {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.read_words(words);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.write_words(words);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.transfer_words(read, write);
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.transfer_words_in_place(words);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_hal_async::spi::SpiBus for SimBus {
    async fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.read_words(words);
        Ok(())
    }

    async fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.write_words(words);
        Ok(())
    }

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.transfer_words(read, write);
        Ok(())
    }

    async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.transfer_words_in_place(words);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// The chip select line, active low
pub struct SimCs(SharedChip);

impl digital::ErrorType for SimCs {
    type Error = Infallible;
}

impl digital::OutputPin for SimCs {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().select();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().deselect();
        Ok(())
    }
}
