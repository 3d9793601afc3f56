// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>

use std::io::Cursor;

use fwimage::error::ErrorKind;
use fwimage::host::NullHost;
use fwimage::{calculate_checksum, Image};

fn open(hint: &str, bytes: &[u8]) -> Image
{
	Image::open(Some(hint), Box::new(Cursor::new(bytes.to_vec())), None).unwrap()
}

#[test]
fn ihex_round_trip_and_checksum()
{
	let mut image = open("ihex", b":0400000000003800C4\n:00000001FF\n");
	let data = image.read_section(0, 0, image.sections()[0].size()).unwrap();
	assert_eq!(data, vec![0x00, 0x00, 0x38, 0x00]);

	let crc = calculate_checksum(&data, &mut NullHost).unwrap();
	assert_eq!(crc, calculate_checksum(&[0x00, 0x00, 0x38, 0x00], &mut NullHost).unwrap());
}

#[test]
fn relocated_binary_image_shifts_its_section()
{
	let image = Image::open(Some("bin"), Box::new(Cursor::new(vec![1, 2, 3])), Some(0x0800_0000)).unwrap();
	assert_eq!(image.sections()[0].base_address(), 0x0800_0000);
}

#[test]
fn srecord_round_trip()
{
	let mut image = open("s19", b"S30A0000000048656C6C6F01\nS70500000000FA\n");
	assert_eq!(image.sections().len(), 1);
	let data = image.read_section(0, 0, 5).unwrap();
	assert_eq!(&data, b"Hello");
}

#[test]
fn autodetected_elf_magic_with_no_program_headers_is_format_error()
{
	let mut bytes = vec![0x7f, b'E', b'L', b'F'];
	bytes.extend_from_slice(&[0u8; 48]);
	let err = Image::open(None, Box::new(Cursor::new(bytes)), None).unwrap_err();
	assert!(matches!(err.kind, ErrorKind::FormatError(_)));
}

#[test]
fn builder_image_reports_no_start_address()
{
	let mut image = Image::builder();
	image.add_section(0, 0, b"abc").unwrap();
	assert_eq!(image.start_address(), None);
	assert_eq!(image.read_section(0, 1, 2).unwrap(), b"bc");
}

#[test]
fn unknown_hint_is_rejected_before_touching_the_source()
{
	let err = Image::open(Some("exe"), Box::new(Cursor::new(Vec::new())), None).unwrap_err();
	assert!(matches!(err.kind, ErrorKind::UnknownType(ref s) if s == "exe"));
}
