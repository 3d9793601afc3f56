// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Dumps the sections of a firmware image: `dump --type ihex firmware.hex`.

use std::fs::File;
use std::process::ExitCode;

use clap::Parser;
use fwimage::host::NullHost;
use fwimage::{calculate_checksum, Image};

#[derive(Parser)]
struct Args
{
	/// Force a format instead of autodetecting from the file's leading bytes.
	#[arg(long = "type", value_name = "bin|ihex|s19|elf")]
	image_type: Option<String>,

	/// Relocate every section by this many bytes, e.g. `0x08000000`.
	#[arg(long = "base-address", value_name = "ADDR", value_parser = parse_base_address)]
	base_address: Option<u32>,

	file: String,
}

fn parse_base_address(s: &str) -> Result<u32, String>
{
	let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
	u32::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

fn main() -> ExitCode
{
	env_logger::init();
	let args = Args::parse();

	let file = match File::open(&args.file) {
		Ok(file) => file,
		Err(e) => {
			eprintln!("error: could not open {}: {e}", args.file);
			return ExitCode::FAILURE;
		},
	};

	let mut image = match Image::open(args.image_type.as_deref(), Box::new(file), args.base_address) {
		Ok(image) => image,
		Err(e) => {
			eprintln!("error: {e}");
			return ExitCode::FAILURE;
		},
	};

	if let Some(entry) = image.start_address() {
		println!("entry point: {entry:#010x}");
	}

	for (index, section) in image.sections().to_vec().iter().enumerate() {
		let data = match image.read_section(index, 0, section.size()) {
			Ok(data) => data,
			Err(e) => {
				eprintln!("error: could not read section {index}: {e}");
				return ExitCode::FAILURE;
			},
		};
		let crc = calculate_checksum(&data, &mut NullHost).unwrap_or(0);
		println!(
			"section {index}: base={:#010x} size={:#x} flags={:#x} crc32={crc:#010x}",
			section.base_address(),
			section.size(),
			section.flags(),
		);
	}

	ExitCode::SUCCESS
}
