// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Intel HEX parsing: text records in, an ordered [Section] list and an optional entry address
//! out.

use std::sync::Arc;

use log::{debug, warn};

use crate::decode::{hex_byte, hex_bytes, hex_u16, hex_u32};
use crate::error::{ErrorKind, Result};
use crate::io::ByteSource;
use crate::section::{Section, SectionBacking};

/// Hard cap on the number of sections a text-format image may produce, matching the original
/// `IMAGE_MAX_SECTIONS`.
pub const IMAGE_MAX_SECTIONS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordType
{
	Data,
	EndOfFile,
	ExtendedSegmentAddress,
	StartSegmentAddress,
	ExtendedLinearAddress,
	StartLinearAddress,
}

impl RecordType
{
	fn from_u8(value: u8) -> Result<Self>
	{
		match value {
			0 => Ok(Self::Data),
			1 => Ok(Self::EndOfFile),
			2 => Ok(Self::ExtendedSegmentAddress),
			3 => Ok(Self::StartSegmentAddress),
			4 => Ok(Self::ExtendedLinearAddress),
			5 => Ok(Self::StartLinearAddress),
			other => Err(ErrorKind::FormatError(format!("unhandled IHEX record type: {other}")).error()),
		}
	}
}

/// A section still being accumulated: base address plus the byte range it owns in the shared
/// decode arena.
struct OpenSection
{
	base_address: u32,
	start: usize,
	len: usize,
}

/// Parses an entire IHEX stream and returns its sections (in record order) plus any entry
/// address set by a Start Linear Address record.
pub fn parse(source: &mut dyn ByteSource) -> Result<(Vec<Section>, Option<u32>)>
{
	let mut arena = Vec::new();
	let mut finished: Vec<OpenSection> = Vec::new();
	let mut current: Option<OpenSection> = None;
	let mut full_address: u32 = 0;
	let mut start_address = None;
	let mut end_rec = false;

	loop {
		let Some(line) = source.read_line()? else { break };
		let trimmed = line.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}

		if end_rec {
			warn!("continuing after end-of-file record: {}", preview(trimmed));
			end_rec = false;
			full_address = 0;
			if let Some(open) = current.take() {
				finish_section(&mut finished, open)?;
			}
		}

		let bytes = trimmed.as_bytes();
		if bytes.first() != Some(&b':') {
			return Err(ErrorKind::FormatError("IHEX record missing leading ':'".into()).error());
		}

		let count = hex_byte(bytes, 1)? as usize;
		let address = hex_u16(bytes, 3)?;
		let record_type = RecordType::from_u8(hex_byte(bytes, 7)?)?;
		let mut checksum = count as u32 + (address >> 8) as u32 + (address & 0xff) as u32 + hex_byte(bytes, 7)? as u32;
		let mut offset = 9;

		match record_type {
			RecordType::Data => {
				if (full_address & 0xffff) != address as u32 {
					split_section(&mut finished, &mut current)?;
					full_address = (full_address & 0xffff_0000) | address as u32;
					current = Some(OpenSection { base_address: full_address, start: arena.len(), len: 0 });
				}
				let data = hex_bytes(bytes, offset, count)?;
				for &b in &data {
					checksum += b as u32;
				}
				offset += count * 2;

				let open = current.get_or_insert(OpenSection { base_address: full_address, start: arena.len(), len: 0 });
				arena.extend_from_slice(&data);
				open.len += data.len();
				full_address += data.len() as u32;
			},
			RecordType::EndOfFile => {
				if let Some(open) = current.take() {
					finish_section(&mut finished, open)?;
				}
				end_rec = true;
			},
			RecordType::ExtendedSegmentAddress => {
				let upper = hex_u16(bytes, offset)?;
				checksum += (upper >> 8) as u32 + (upper & 0xff) as u32;
				offset += 4;
				if (full_address >> 4) != upper as u32 {
					split_section(&mut finished, &mut current)?;
					full_address = (full_address & 0xffff) | ((upper as u32) << 4);
					current = Some(OpenSection { base_address: full_address, start: arena.len(), len: 0 });
				}
			},
			RecordType::StartSegmentAddress => {
				// consumed for its checksum contribution only, never written to a section.
				let dummy = hex_bytes(bytes, offset, count)?;
				for &b in &dummy {
					checksum += b as u32;
				}
				offset += count * 2;
			},
			RecordType::ExtendedLinearAddress => {
				let upper = hex_u16(bytes, offset)?;
				checksum += (upper >> 8) as u32 + (upper & 0xff) as u32;
				offset += 4;
				if (full_address >> 16) != upper as u32 {
					split_section(&mut finished, &mut current)?;
					full_address = (full_address & 0xffff) | ((upper as u32) << 16);
					current = Some(OpenSection { base_address: full_address, start: arena.len(), len: 0 });
				}
			},
			RecordType::StartLinearAddress => {
				let value = hex_u32(bytes, offset, 8)?;
				checksum += (value >> 24) & 0xff;
				checksum += (value >> 16) & 0xff;
				checksum += (value >> 8) & 0xff;
				checksum += value & 0xff;
				offset += 8;
				// Preserved exactly as the original behaves: the already-decoded value is
				// reinterpreted through a big-endian lens on top of its native layout.
				start_address = Some(u32::from_be_bytes(value.to_ne_bytes()));
			},
		}

		let record_checksum = hex_byte(bytes, offset)?;
		let expected = (!(checksum as u8)).wrapping_add(1);
		if record_checksum != expected {
			return Err(ErrorKind::ChecksumError.error());
		}
	}

	if !end_rec {
		return Err(
			ErrorKind::FormatError("premature end of IHEX file, no matching end-of-file record found".into()).error(),
		);
	}

	debug!("Recovered {} sections from data stream", finished.len());

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

	Ok((sections, start_address))
}

/// Closes out the section under construction, if any, before the caller re-bases to a new
/// address. A section that never received any data (e.g. a lone Start Segment Address record)
/// is dropped rather than kept as an empty entry.
fn split_section(finished: &mut Vec<OpenSection>, current: &mut Option<OpenSection>) -> Result<()>
{
	if let Some(open) = current.take().filter(|open| open.len != 0) {
		finish_section(finished, open)?;
	}
	Ok(())
}

fn finish_section(finished: &mut Vec<OpenSection>, section: OpenSection) -> Result<()>
{
	if finished.len() >= IMAGE_MAX_SECTIONS {
		return Err(ErrorKind::FormatError("too many sections found in IHEX file".into()).error());
	}
	finished.push(section);
	Ok(())
}

fn preview(line: &str) -> &str
{
	&line[..line.len().min(40)]
}
