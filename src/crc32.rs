// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! GDB-compatible CRC-32, chunked so a [HostControl] can cooperatively interrupt it.

use std::sync::OnceLock;

use log::debug;

use crate::error::{ErrorKind, Result};
use crate::host::HostControl;

const POLYNOMIAL: u32 = 0x04c1_1db7;
const CHUNK_SIZE: usize = 32_768;

static TABLE: OnceLock<[u32; 256]> = OnceLock::new();

fn table() -> &'static [u32; 256]
{
	TABLE.get_or_init(|| {
		let mut table = [0u32; 256];
		for (i, entry) in table.iter_mut().enumerate() {
			let mut c = (i as u32) << 24;
			for _ in 0..8 {
				c = if c & 0x8000_0000 != 0 { (c << 1) ^ POLYNOMIAL } else { c << 1 };
			}
			*entry = c;
		}
		table
	})
}

/// Compute the GDB-style CRC-32 of `data`, calling back into `host` between chunks so long
/// computations stay cancellable and don't starve the host's event loop.
pub fn calculate_checksum(data: &[u8], host: &mut dyn HostControl) -> Result<u32>
{
	debug!("Calculating checksum");

	let table = table();
	let mut crc = 0xffff_ffffu32;

	for chunk in data.chunks(CHUNK_SIZE) {
		for &byte in chunk {
			crc = (crc << 8) ^ table[((crc >> 24) ^ byte as u32) as usize & 0xff];
		}

		host.keep_alive();
		if host.is_shutdown_pending() {
			return Err(ErrorKind::Interrupted.error());
		}
	}

	debug!("Calculating checksum done; checksum=0x{crc:08x}");
	Ok(crc)
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::host::NullHost;

	#[test]
	fn gdb_reference_vector()
	{
		let mut host = NullHost;
		let crc = calculate_checksum(b"123456789", &mut host).unwrap();
		assert_eq!(crc, 0x0376_e6e7);
	}

	#[test]
	fn empty_input()
	{
		let mut host = NullHost;
		let crc = calculate_checksum(&[], &mut host).unwrap();
		assert_eq!(crc, 0xffff_ffff);
	}

	struct ShutdownNow;
	impl HostControl for ShutdownNow
	{
		fn keep_alive(&mut self) {}

		fn is_shutdown_pending(&mut self) -> bool
		{
			true
		}
	}

	#[test]
	fn interrupted_mid_computation()
	{
		let data = vec![0u8; CHUNK_SIZE * 2];
		let mut host = ShutdownNow;
		let result = calculate_checksum(&data, &mut host);
		assert!(matches!(result, Err(e) if matches!(e.kind, ErrorKind::Interrupted)));
	}
}
