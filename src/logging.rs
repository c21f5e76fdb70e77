// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `log` backend writing to any `core::fmt::Write` sink, typically a UART.

use core::{cell::RefCell, fmt::Write};

pub struct WriterLogger<W> {
    writer: critical_section::Mutex<RefCell<W>>,
    level: log::LevelFilter,
}

impl<W> WriterLogger<W> {
    pub const fn new(writer: W, level: log::LevelFilter) -> Self {
        Self {
            writer: critical_section::Mutex::new(RefCell::new(writer)),
            level,
        }
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner().into_inner()
    }
}

impl<W: Send + Write> log::Log for WriterLogger<W> {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        critical_section::with(|cs| {
            // A record logged from inside the sink is dropped.
            let Ok(mut writer) = self.writer.borrow(cs).try_borrow_mut() else {
                return;
            };
            writeln!(
                writer,
                "{} [{}] {}",
                record.level(),
                record.module_path().unwrap_or("latte_aes"),
                record.args()
            )
            .ok();
        })
    }

    fn flush(&self) {}
}

pub fn init_logging<W: Send + Write>(logger: &'static WriterLogger<W>) {
    log::set_max_level(logger.level);
    log::set_logger(logger).ok();
}
