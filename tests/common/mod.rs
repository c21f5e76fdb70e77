// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Software model of the Latte AES engine and its DMA bus.

#![allow(dead_code)]

use {
    aes::{
        cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit},
        Aes128,
    },
    latte_aes::{
        dma::{DmaDirection, DmaMapper},
        regs::{Control, RegisterWindow, CTRL_OFFSET, DEST_OFFSET, IV_OFFSET, KEY_OFFSET, SRC_OFFSET},
        Engine, Error, Result,
    },
    std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

const BUS_BASE: u32 = 0x1000_0000;
const BUS_GAP: u32 = 0x1000;

#[derive(Debug)]
struct Region {
    bus_addr: u32,
    ptr: usize,
    len: usize,
    direction: DmaDirection,
}

/// DMA bus shared by the mapper and the engine model.
#[derive(Debug, Default)]
pub struct Bus {
    regions: Mutex<Vec<Region>>,
    maps: AtomicUsize,
    unmaps: AtomicUsize,
    pub fail_maps: AtomicBool,
}

impl Bus {
    pub fn live(&self) -> usize {
        self.regions.lock().unwrap().len()
    }

    pub fn maps(&self) -> usize {
        self.maps.load(Ordering::SeqCst)
    }

    pub fn unmaps(&self) -> usize {
        self.unmaps.load(Ordering::SeqCst)
    }

    /// CPU pointer behind `len` bytes at `bus_addr`.
    fn resolve(&self, bus_addr: u32, len: usize, write: bool) -> *mut u8 {
        let regions = self.regions.lock().unwrap();
        let region = regions
            .iter()
            .find(|r| {
                bus_addr >= r.bus_addr && (bus_addr - r.bus_addr) as usize + len <= r.len
            })
            .unwrap_or_else(|| panic!("engine accessed unmapped bus address {bus_addr:#x}"));

        let allowed = match region.direction {
            DmaDirection::ToDevice => !write,
            DmaDirection::FromDevice => write,
            DmaDirection::Bidirectional => true,
        };
        assert!(allowed, "engine access against mapping direction at {bus_addr:#x}");

        (region.ptr + (bus_addr - region.bus_addr) as usize) as *mut u8
    }
}

pub struct SimMapper(pub Arc<Bus>);

impl DmaMapper for SimMapper {
    fn map(&self, ptr: *const u8, len: usize, direction: DmaDirection) -> Result<u32> {
        if self.0.fail_maps.load(Ordering::SeqCst) {
            return Err(Error::BufferMapping);
        }

        let mut regions = self.0.regions.lock().unwrap();
        let mut bus_addr = BUS_BASE;
        for region in regions.iter() {
            bus_addr = bus_addr.max(region.bus_addr + region.len as u32 + BUS_GAP);
        }
        regions.push(Region {
            bus_addr,
            ptr: ptr as usize,
            len,
            direction,
        });
        self.0.maps.fetch_add(1, Ordering::SeqCst);
        Ok(bus_addr)
    }

    fn unmap(&self, bus_addr: u32, len: usize, direction: DmaDirection) {
        let mut regions = self.0.regions.lock().unwrap();
        let index = regions
            .iter()
            .position(|r| r.bus_addr == bus_addr)
            .expect("unmap of an address that is not mapped");
        let region = regions.remove(index);
        assert_eq!(region.len, len);
        assert_eq!(region.direction, direction);
        self.0.unmaps.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counters and fault injection for the engine model.
#[derive(Debug, Default)]
pub struct Stats {
    pub wedged: AtomicBool,
    pub ctrl_reads: AtomicUsize,
    pub starts: AtomicUsize,
    pub key_loads: AtomicUsize,
    pub iv_loads: AtomicUsize,
}

impl Stats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Register-level model of the engine. A burst runs to completion inside the
/// control write unless the engine is wedged.
pub struct SimEngine {
    bus: Arc<Bus>,
    stats: Arc<Stats>,
    ctrl: u32,
    src: u32,
    dst: u32,
    key: [u32; 4],
    key_fill: usize,
    iv: [u32; 4],
    iv_fill: usize,
    chain: [u8; 16],
}

impl SimEngine {
    pub fn new(bus: Arc<Bus>, stats: Arc<Stats>) -> Self {
        Self {
            bus,
            stats,
            ctrl: 0,
            src: 0,
            dst: 0,
            key: [0; 4],
            key_fill: 0,
            iv: [0; 4],
            iv_fill: 0,
            chain: [0; 16],
        }
    }

    fn words_to_bytes(words: &[u32; 4]) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        bytes
    }

    fn execute(&mut self) {
        let blocks = (self.ctrl & Control::BLOCK.bits()) as usize + 1;
        let decrypt = self.ctrl & Control::DEC.bits() != 0;
        if self.ctrl & Control::IV.bits() == 0 {
            self.chain = Self::words_to_bytes(&self.iv);
        }

        let cipher = Aes128::new(GenericArray::from_slice(&Self::words_to_bytes(&self.key)));
        let len = blocks * 16;
        let src = self.bus.resolve(self.src, len, false);
        let dst = self.bus.resolve(self.dst, len, true);

        for i in 0..blocks {
            let mut block = [0u8; 16];
            unsafe { core::ptr::copy(src.add(i * 16), block.as_mut_ptr(), 16) };

            if decrypt {
                let input = block;
                cipher.decrypt_block(GenericArray::from_mut_slice(&mut block));
                xor(&mut block, &self.chain);
                self.chain = input;
            } else {
                xor(&mut block, &self.chain);
                cipher.encrypt_block(GenericArray::from_mut_slice(&mut block));
                self.chain = block;
            }

            unsafe { core::ptr::copy(block.as_ptr(), dst.add(i * 16), 16) };
        }
    }
}

impl RegisterWindow for SimEngine {
    fn read(&mut self, offset: usize) -> u32 {
        assert_eq!(offset, CTRL_OFFSET, "only the control register is readable");
        self.stats.ctrl_reads.fetch_add(1, Ordering::SeqCst);
        self.ctrl
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            CTRL_OFFSET => {
                if value & Control::EXEC.bits() == 0 {
                    self.ctrl = value;
                    return;
                }

                assert_eq!(
                    self.ctrl & Control::EXEC.bits(),
                    0,
                    "burst started while the engine is busy"
                );
                self.ctrl = value;
                self.stats.starts.fetch_add(1, Ordering::SeqCst);
                if !self.stats.wedged.load(Ordering::SeqCst) {
                    self.execute();
                    self.ctrl &= !Control::EXEC.bits();
                }
            }
            SRC_OFFSET => self.src = value,
            DEST_OFFSET => self.dst = value,
            KEY_OFFSET => {
                self.key[self.key_fill] = value;
                self.key_fill = (self.key_fill + 1) % 4;
                if self.key_fill == 0 {
                    self.stats.key_loads.fetch_add(1, Ordering::SeqCst);
                }
            }
            IV_OFFSET => {
                self.iv[self.iv_fill] = value;
                self.iv_fill = (self.iv_fill + 1) % 4;
                if self.iv_fill == 0 {
                    self.stats.iv_loads.fetch_add(1, Ordering::SeqCst);
                }
            }
            _ => panic!("write to unknown register {offset:#x}"),
        }
    }
}

fn xor(block: &mut [u8; 16], other: &[u8; 16]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}

pub struct Sim {
    pub engine: Engine<SimEngine, SimMapper>,
    pub bus: Arc<Bus>,
    pub stats: Arc<Stats>,
}

pub fn sim() -> Sim {
    let bus = Arc::new(Bus::default());
    let stats = Arc::new(Stats::default());
    let engine = Engine::new(
        SimEngine::new(bus.clone(), stats.clone()),
        SimMapper(bus.clone()),
    );
    Sim { engine, bus, stats }
}

/// Deterministic test data.
pub fn pattern(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

pub fn reference_encrypt(key: &[u8; 16], iv: &[u8; 16], data: &[u8]) -> Vec<u8> {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut chain = *iv;
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(16) {
        let mut block: [u8; 16] = chunk.try_into().unwrap();
        xor(&mut block, &chain);
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut block));
        chain = block;
        out.extend_from_slice(&block);
    }
    out
}

pub fn reference_decrypt(key: &[u8; 16], iv: &[u8; 16], data: &[u8]) -> Vec<u8> {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut chain = *iv;
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(16) {
        let input: [u8; 16] = chunk.try_into().unwrap();
        let mut block = input;
        cipher.decrypt_block(GenericArray::from_mut_slice(&mut block));
        xor(&mut block, &chain);
        chain = input;
        out.extend_from_slice(&block);
    }
    out
}
