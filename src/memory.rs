// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Live-target memory reads through a single aligned page cache.

use crate::error::{ErrorKind, Result};
use crate::target::TargetMemory;

/// Size, in bytes, of the single aligned cache line kept for target reads.
pub const IMAGE_MEMORY_CACHE_SIZE: u32 = 512;

/// The `mem` image backend: every read is satisfied from one cached, `IMAGE_MEMORY_CACHE_SIZE`
/// aligned window, refilled from `target` whenever the requested address falls outside it.
#[derive(Debug, Default)]
pub struct MemoryImage
{
	cache: Option<(u32, Vec<u8>)>,
}

impl MemoryImage
{
	pub fn new() -> Self
	{
		Self { cache: None }
	}

	pub fn read(&mut self, target: &mut dyn TargetMemory, address: u32, size: u32) -> Result<Vec<u8>>
	{
		let mut out = Vec::with_capacity(size as usize);
		let mut addr = address;

		while (out.len() as u32) < size {
			let cache_address = addr & !(IMAGE_MEMORY_CACHE_SIZE - 1);
			let stale = match &self.cache {
				Some((base, _)) => addr < *base || addr >= base + IMAGE_MEMORY_CACHE_SIZE,
				None => true,
			};

			if stale {
				let data = target
					.read(cache_address, IMAGE_MEMORY_CACHE_SIZE)
					.map_err(|e| ErrorKind::TemporarilyUnavailable.error_from(e))?;
				self.cache = Some((cache_address, data));
			}

			let (base, data) = self.cache.as_ref().expect("cache just filled");
			let available = (base + IMAGE_MEMORY_CACHE_SIZE) - addr;
			let take = available.min(size - out.len() as u32);
			let start = (addr - base) as usize;
			out.extend_from_slice(&data[start..start + take as usize]);
			addr += take;
		}

		Ok(out)
	}
}
