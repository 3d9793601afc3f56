// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Motorola S-record parsing: text records in, an ordered [Section] list out.
//!
//! Unlike IHEX there's no rolling 16-bit window to wrap, so any address discontinuity between
//! consecutive data records splits the section.

use std::sync::Arc;

use log::debug;

use crate::decode::{hex_byte, hex_bytes, hex_u32};
use crate::error::{ErrorKind, Result};
use crate::io::ByteSource;
use crate::ihex::IMAGE_MAX_SECTIONS;
use crate::section::{Section, SectionBacking};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind
{
	Header,
	Data16,
	Data24,
	Data32,
	Count,
	Terminator32,
	Terminator24,
	Terminator16,
}

impl RecordKind
{
	/// Map the record type digit (`S<digit>`) to its kind and address width in hex digits.
	fn from_digit(digit: u8) -> Result<(Self, usize)>
	{
		match digit {
			b'0' => Ok((Self::Header, 4)),
			b'1' => Ok((Self::Data16, 4)),
			b'2' => Ok((Self::Data24, 6)),
			b'3' => Ok((Self::Data32, 8)),
			b'5' | b'6' => Ok((Self::Count, 4)),
			b'7' => Ok((Self::Terminator32, 8)),
			b'8' => Ok((Self::Terminator24, 6)),
			b'9' => Ok((Self::Terminator16, 4)),
			other => Err(ErrorKind::FormatError(format!("unhandled S-record type: S{}", other as char)).error()),
		}
	}
}

struct OpenSection
{
	base_address: u32,
	start: usize,
	len: usize,
}

/// Parses an entire S-record stream and returns its sections in record order.
pub fn parse(source: &mut dyn ByteSource) -> Result<Vec<Section>>
{
	let mut arena = Vec::new();
	let mut finished: Vec<OpenSection> = Vec::new();
	let mut current: Option<OpenSection> = None;
	let mut next_address: Option<u32> = None;
	let mut saw_terminator = false;

	loop {
		let Some(line) = source.read_line()? else { break };
		let trimmed = line.trim();
		if trimmed.is_empty() {
			continue;
		}

		let bytes = trimmed.as_bytes();
		if bytes.first() != Some(&b'S') {
			return Err(ErrorKind::FormatError("S-record missing leading 'S'".into()).error());
		}
		let (kind, addr_digits) = RecordKind::from_digit(*bytes.get(1).unwrap_or(&0))?;

		let count = hex_byte(bytes, 2)? as usize;
		let mut checksum = count as u32;
		let mut offset = 4;

		let address = hex_u32(bytes, offset, addr_digits)?;
		for i in 0..addr_digits / 2 {
			checksum += hex_byte(bytes, offset + i * 2)? as u32;
		}
		offset += addr_digits;

		let data_len = count - addr_digits / 2 - 1;

		match kind {
			RecordKind::Header => {
				let data = hex_bytes(bytes, offset, data_len)?;
				for &b in &data {
					checksum += b as u32;
				}
				offset += data_len * 2;
				debug!("S-record header: {}", String::from_utf8_lossy(&data));
			},
			RecordKind::Count => {
				// record count, not address data; nothing to store, only the checksum matters.
				let data = hex_bytes(bytes, offset, data_len)?;
				for &b in &data {
					checksum += b as u32;
				}
				offset += data_len * 2;
			},
			RecordKind::Data16 | RecordKind::Data24 | RecordKind::Data32 => {
				if next_address != Some(address) {
					if let Some(open) = current.take() {
						finish_section(&mut finished, open)?;
					}
					current = Some(OpenSection { base_address: address, start: arena.len(), len: 0 });
				}

				let data = hex_bytes(bytes, offset, data_len)?;
				for &b in &data {
					checksum += b as u32;
				}
				offset += data_len * 2;

				let open = current.get_or_insert(OpenSection { base_address: address, start: arena.len(), len: 0 });
				arena.extend_from_slice(&data);
				open.len += data.len();
				next_address = Some(address + data.len() as u32);
			},
			RecordKind::Terminator16 | RecordKind::Terminator24 | RecordKind::Terminator32 => {
				if let Some(open) = current.take() {
					finish_section(&mut finished, open)?;
				}
				saw_terminator = true;
			},
		}

		let record_checksum = hex_byte(bytes, offset)?;
		let expected = !(checksum as u8);
		if record_checksum != expected {
			return Err(ErrorKind::ChecksumError.error());
		}
	}

	if !saw_terminator {
		return Err(ErrorKind::FormatError("premature end of S-record file, no terminator record found".into()).error());
	}

	let arena: Arc<[u8]> = arena.into();
	let sections = finished
		.into_iter()
		.map(|open| Section {
			base_address: open.base_address,
			size: open.len as u32,
			flags: 0,
			backing: SectionBacking::Text(arena.clone(), open.start..open.start + open.len),
		})
		.collect();
	Ok(sections)
}

fn finish_section(finished: &mut Vec<OpenSection>, section: OpenSection) -> Result<()>
{
	if finished.len() >= IMAGE_MAX_SECTIONS {
		return Err(ErrorKind::FormatError("too many sections found in S-record file".into()).error());
	}
	finished.push(section);
	Ok(())
}

#[cfg(test)]
mod tests
{
	use std::io::Cursor;

	use super::*;

	fn source(text: &str) -> Cursor<Vec<u8>>
	{
		Cursor::new(text.as_bytes().to_vec())
	}

	#[test]
	fn single_data_record_32bit_address()
	{
		let text = "S30A0000000048656C6C6F01\nS70500000000FA\n";
		let sections = parse(&mut source(text)).unwrap();
		assert_eq!(sections.len(), 1);
		assert_eq!(sections[0].base_address, 0);
		assert_eq!(sections[0].size, 5);
		let SectionBacking::Text(arena, range) = &sections[0].backing else { panic!("wrong backing") };
		assert_eq!(&arena[range.clone()], b"Hello");
	}

	#[test]
	fn header_and_16bit_data_and_terminator()
	{
		let text = "S00600004844521B\nS1051000AABB85\nS9030000FC\n";
		let sections = parse(&mut source(text)).unwrap();
		assert_eq!(sections.len(), 1);
		assert_eq!(sections[0].base_address, 0x1000);
		let SectionBacking::Text(arena, range) = &sections[0].backing else { panic!() };
		assert_eq!(&arena[range.clone()], &[0xAA, 0xBB]);
	}

	#[test]
	fn discontinuous_24bit_address_splits_sections()
	{
		let text = "S2060010001122B6\nS30A0000000048656C6C6F01\nS804000000FB\n";
		let sections = parse(&mut source(text)).unwrap();
		assert_eq!(sections.len(), 2);
		assert_eq!(sections[0].base_address, 0x001000);
		assert_eq!(sections[1].base_address, 0);
	}

	#[test]
	fn bad_checksum_is_rejected()
	{
		let text = "S30A0000000048656C6C6F00\nS70500000000FA\n";
		let err = parse(&mut source(text)).unwrap_err();
		assert!(matches!(err.kind, ErrorKind::ChecksumError));
	}

	#[test]
	fn missing_terminator_is_format_error()
	{
		let text = "S30A0000000048656C6C6F01\n";
		let err = parse(&mut source(text)).unwrap_err();
		assert!(matches!(err.kind, ErrorKind::FormatError(_)));
	}
}
