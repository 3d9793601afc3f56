// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Format autodetection from magic bytes, and the type-hint string table.

use log::debug;

use crate::error::{ErrorKind, Result};
use crate::io::ByteSource;

/// Which container format an image's bytes belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType
{
	Binary,
	Ihex,
	SRecord,
	Elf,
	Memory,
	Builder,
}

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

fn is_hex_digit(b: u8) -> bool
{
	b.is_ascii_hexdigit()
}

/// Resolve the image type, given an optional textual hint. If no hint is given, the backing
/// source is sniffed by its leading bytes.
pub fn identify_image_type(hint: Option<&str>, source: &mut dyn ByteSource) -> Result<ImageType>
{
	match hint {
		Some(hint) => match hint {
			"bin" => Ok(ImageType::Binary),
			"ihex" => Ok(ImageType::Ihex),
			"elf" => Ok(ImageType::Elf),
			"mem" => Ok(ImageType::Memory),
			"s19" => Ok(ImageType::SRecord),
			"build" => Ok(ImageType::Builder),
			other => Err(ErrorKind::UnknownType(other.to_string()).error()),
		},
		None => autodetect_image_type(source),
	}
}

/// Sniff the first 9 bytes of `source` and classify the container format.
fn autodetect_image_type(source: &mut dyn ByteSource) -> Result<ImageType> {
	source.seek(0)?;
	let mut buffer = [0u8; 9];
	let mut read_total = 0;
	while read_total < buffer.len() {
		let n = source.read(&mut buffer[read_total..])?;
		if n == 0 {
			break;
		}
		read_total += n;
	}

	if read_total != buffer.len() {
		debug!("Less than 9 bytes in the image file found.");
		debug!("BIN image detected.");
		return Ok(ImageType::Binary);
	}

	if buffer[0..4] == ELF_MAGIC {
		debug!("ELF image detected.");
		Ok(ImageType::Elf)
	} else if buffer[0] == b':'
		&& buffer[1..7].iter().all(|&b| is_hex_digit(b))
		&& buffer[7] == b'0'
		&& (b'0'..=b'5').contains(&buffer[8])
	{
		debug!("IHEX image detected.");
		Ok(ImageType::Ihex)
	} else if buffer[0] == b'S' && buffer[1..4].iter().all(|&b| is_hex_digit(b)) && (b'0'..=b'8').contains(&buffer[1])
	{
		debug!("S19 image detected.");
		Ok(ImageType::SRecord)
	} else {
		debug!("BIN image detected.");
		Ok(ImageType::Binary)
	}
}

#[cfg(test)]
mod tests
{
	use std::io::Cursor;

	use super::*;

	fn cursor(bytes: &[u8]) -> Cursor<Vec<u8>>
	{
		Cursor::new(bytes.to_vec())
	}

	#[test]
	fn hint_wins_over_content()
	{
		let mut src = cursor(b"\x7fELF....."); // would sniff as ELF
		let ty = identify_image_type(Some("bin"), &mut src).unwrap();
		assert_eq!(ty, ImageType::Binary);
	}

	#[test]
	fn unknown_hint_errors()
	{
		let mut src = cursor(b"whatever!");
		let err = identify_image_type(Some("wat"), &mut src).unwrap_err();
		assert!(matches!(err.kind, ErrorKind::UnknownType(ref s) if s == "wat"));
	}

	#[test]
	fn sniff_elf()
	{
		let mut src = cursor(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0, 0]);
		assert_eq!(identify_image_type(None, &mut src).unwrap(), ImageType::Elf);
	}

	#[test]
	fn sniff_ihex()
	{
		let mut src = cursor(b":020000040800F2");
		assert_eq!(identify_image_type(None, &mut src).unwrap(), ImageType::Ihex);
	}

	#[test]
	fn sniff_srecord()
	{
		let mut src = cursor(b"S3070000000048656C");
		assert_eq!(identify_image_type(None, &mut src).unwrap(), ImageType::SRecord);
	}

	#[test]
	fn short_file_is_binary()
	{
		let mut src = cursor(b":0200");
		assert_eq!(identify_image_type(None, &mut src).unwrap(), ImageType::Binary);
	}

	#[test]
	fn fallback_is_binary()
	{
		let mut src = cursor(&[0u8; 16]);
		assert_eq!(identify_image_type(None, &mut src).unwrap(), ImageType::Binary);
	}
}
