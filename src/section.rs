// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! The [Section] type and its backing storage.

use std::ops::Range;
use std::sync::Arc;

/// How a section's bytes are actually stored. This replaces the original's `void *private`,
/// which pointed at a realloc-able text-format buffer, the in-memory program header, or a
/// builder-owned heap block depending on the image type.
#[derive(Debug, Clone)]
pub enum SectionBacking
{
	/// IHEX/S-record sections: a byte range into an `Arc`-shared decode arena. Sharing the
	/// arena (instead of pointing straight into a `Vec` that might reallocate) is what lets
	/// several sections coexist safely while still being cheap to clone.
	Text(Arc<[u8]>, Range<usize>),

	/// ELF sections: the index of the owning program header in `ElfImage::segments`.
	Elf(usize),

	/// Builder sections: an owned, independently-grown buffer.
	Owned(Vec<u8>),

	/// Binary/Memory sections: nothing to store here, the backing file or live target is read
	/// directly at read time.
	None,
}

/// One contiguous, independently-addressed span of a loaded image.
#[derive(Debug, Clone)]
pub struct Section
{
	/// Address of byte 0 of this section, after any relocation has been applied.
	pub base_address: u32,

	/// Length of the section in bytes.
	pub size: u32,

	/// Opaque flags: ELF `p_flags` for ELF sections, caller-supplied for builder sections, `0`
	/// otherwise.
	pub flags: u64,

	pub(crate) backing: SectionBacking,
}

impl Section
{
	pub fn base_address(&self) -> u32
	{
		self.base_address
	}

	pub fn size(&self) -> u32
	{
		self.size
	}

	pub fn flags(&self) -> u64
	{
		self.flags
	}
}
