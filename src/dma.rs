// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DMA staging for buffers processed by the AES engine.

use crate::error::{Error, Result};

/// Bus address alignment the engine is designed to be fed with.
pub const DMA_ALIGN: usize = 512;

/// Memory buffer aligned to [`DMA_ALIGN`], for data the engine reads or writes.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
#[repr(align(512))]
pub struct Buffer<const N: usize>(pub [u8; N]);

impl<const N: usize> Default for Buffer<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DmaDirection {
    /// The engine only reads the buffer.
    ToDevice,
    /// The engine only writes the buffer.
    FromDevice,
    /// The engine reads and overwrites the buffer (in-place operation).
    Bidirectional,
}

/// Translates CPU buffers into bus addresses the engine can use.
///
/// Every successful `map` is matched by exactly one `unmap` with the same
/// length and direction, whether the operation succeeded or not.
pub trait DmaMapper {
    /// Makes `len` bytes at `ptr` visible to the engine and returns their bus
    /// address. For [`DmaDirection::FromDevice`] and
    /// [`DmaDirection::Bidirectional`] the pointer comes from a unique borrow
    /// and the engine may write through it.
    ///
    /// `len` is a whole number of blocks but `ptr` has no alignment beyond
    /// that of `u8`, except for the driver's own bounce block, which is a
    /// [`Buffer`]. On platforms where the engine needs bus addresses aligned
    /// to [`DMA_ALIGN`], the mapper stages unaligned buffers in aligned memory
    /// and copies results back to `ptr` when they are unmapped.
    fn map(&self, ptr: *const u8, len: usize, direction: DmaDirection) -> Result<u32>;

    fn unmap(&self, bus_addr: u32, len: usize, direction: DmaDirection);
}

/// Mapper for cache-coherent systems where the engine sees CPU addresses
/// unchanged.
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityMapper;

impl DmaMapper for IdentityMapper {
    fn map(&self, ptr: *const u8, len: usize, _direction: DmaDirection) -> Result<u32> {
        let start = ptr as usize as u64;
        match start.checked_add(len as u64) {
            Some(end) if end <= 1 << 32 => {}
            _ => return Err(Error::BufferMapping),
        }
        Ok(start as u32)
    }

    fn unmap(&self, _bus_addr: u32, _len: usize, _direction: DmaDirection) {}
}

/// A live mapping, released when dropped.
pub(crate) struct Mapping<'m, M: DmaMapper> {
    mapper: &'m M,
    bus_addr: u32,
    len: usize,
    direction: DmaDirection,
}

impl<'m, M: DmaMapper> Mapping<'m, M> {
    pub(crate) fn new(
        mapper: &'m M,
        ptr: *const u8,
        len: usize,
        direction: DmaDirection,
    ) -> Result<Self> {
        let bus_addr = mapper.map(ptr, len, direction).map_err(|err| {
            log::warn!("failed to map {} bytes for {:?}", len, direction);
            err
        })?;

        Ok(Self {
            mapper,
            bus_addr,
            len,
            direction,
        })
    }

    pub(crate) fn bus_addr(&self) -> u32 {
        self.bus_addr
    }
}

impl<M: DmaMapper> Drop for Mapping<'_, M> {
    fn drop(&mut self) {
        self.mapper.unmap(self.bus_addr, self.len, self.direction);
    }
}
