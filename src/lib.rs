// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2022-2025 1BitSquared <info@1bitsquared.com>
// SPDX-FileContributor: Written by Mikaela Szekely <mikaela.szekely@qyriad.me>
// SPDX-FileContributor: Written by Piotr Esden-Tempski <piotr@esden.net>
// SPDX-FileContributor: Modified by Rachel Mant <git@dragonmux.network>
//! Firmware image loading: format detection, section assembly and random-access reads for
//! Intel HEX, Motorola S-record, ELF32/64, raw binary, live-target memory and builder images.

pub mod builder;
pub mod crc32;
pub mod decode;
pub mod detect;
pub mod elf;
pub mod error;
pub mod host;
pub mod ihex;
pub mod image;
pub mod io;
pub mod memory;
pub mod section;
pub mod srecord;
pub mod symbol;
pub mod target;

pub use crc32::calculate_checksum;
pub use detect::ImageType;
pub use error::{Error, ErrorKind, Result};
pub use host::{HostControl, NullHost};
pub use image::Image;
pub use section::{Section, SectionBacking};
pub use symbol::Symbol;
pub use target::{TargetError, TargetMemory};
