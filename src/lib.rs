// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driver for the Latte AES engine, a DMA block engine that runs AES-128-CBC
//! over up to 4096 blocks per start.
//!
//! ```no_run
//! use latte_aes::{dma::IdentityMapper, regs::Mmio, Engine, Iv, Session};
//!
//! let engine = Engine::new(unsafe { Mmio::new() }, IdentityMapper);
//! engine.self_test().unwrap();
//!
//! let mut session = Session::bind(&engine);
//! session.install_key(&[0u8; 16]).unwrap();
//!
//! let mut buf = [0u8; 64];
//! let next_iv = session.encrypt_in_place(&mut buf, &Iv::default()).unwrap();
//! # let _ = next_iv;
//! ```

#![cfg_attr(not(test), no_std)]

pub mod burst;
pub mod cbc;
pub mod dma;
pub mod engine;
pub mod error;
pub mod logging;
pub mod regs;
mod selftest;
pub mod session;

pub use {
    cbc::{Direction, Iv, Key, Span},
    engine::Engine,
    error::{Error, Result},
    session::Session,
};
