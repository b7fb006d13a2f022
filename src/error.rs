use core::fmt::Debug;

use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// All possible errors emitted by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<SpiError> {
    /// Internal Spi error
    Spi(SpiError),

    /// Invalid value passed
    Value,

    /// Address out of bound
    OutOfBounds,

    /// Address not aligned
    NotAligned,

    /// The chip has an operation in progress
    Busy,

    /// The chip was still busy after the configured number of status polls
    Timeout,
}

impl<E> From<NorFlashErrorKind> for Error<E> {
    fn from(e: NorFlashErrorKind) -> Self {
        match e {
            NorFlashErrorKind::NotAligned => Error::NotAligned,
            NorFlashErrorKind::OutOfBounds => Error::OutOfBounds,
            _ => Error::Value,
        }
    }
}

impl<SpiError> NorFlashError for Error<SpiError>
where
    SpiError: Debug,
{
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Error::NotAligned => NorFlashErrorKind::NotAligned,
            Error::Value | Error::Spi(_) | Error::Busy | Error::Timeout => NorFlashErrorKind::Other,
        }
    }
}
