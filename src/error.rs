// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by the AES engine driver.
///
/// Every error aborts the request it was raised in. The engine lock and all
/// DMA mappings are released before the error reaches the caller. Output
/// already written by completed bursts is left in place.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// Only 128-bit keys are supported. Nothing was written to the engine.
    InvalidKeyLength,
    /// Request length is not a multiple of the block size, or the source and
    /// destination lengths differ.
    InvalidLength,
    /// The session has no key installed.
    NoKey,
    /// The DMA mapper could not produce a bus address for a buffer.
    BufferMapping,
    /// The busy flag never cleared within the poll budget. The engine should
    /// be considered wedged and may need a reset.
    EngineTimeout,
    /// The engine finished a burst with its error bit set.
    EngineFault,
    /// The engine lock was requested while already held by this context.
    EngineBusy,
    /// The known-answer test produced the wrong output.
    SelfTestFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidKeyLength => "key must be 16 bytes (AES-128)",
            Error::InvalidLength => "length must be a multiple of 16 bytes",
            Error::NoKey => "no key installed",
            Error::BufferMapping => "could not map buffer for DMA",
            Error::EngineTimeout => "AES engine timed out",
            Error::EngineFault => "AES engine reported an error",
            Error::EngineBusy => "AES engine is already locked",
            Error::SelfTestFailed => "AES engine self-test failed",
        };
        f.write_str(msg)
    }
}
