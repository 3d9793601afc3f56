// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! [Image]: the public entry point tying format detection, parsing and section reads together.

use log::debug;

use crate::builder::Builder;
use crate::detect::{self, ImageType};
use crate::elf::{self, ElfImage};
use crate::error::{ErrorKind, Result};
use crate::ihex;
use crate::io::ByteSource;
use crate::memory::MemoryImage;
use crate::section::{Section, SectionBacking};
use crate::srecord;
use crate::symbol::Symbol;
use crate::target::TargetMemory;

/// Which backend is serving [Image]'s sections. Replaces the original's `void *type_private`:
/// each variant carries exactly the state that backend needs to answer a later `read_section`.
enum ImageKind
{
	Binary { source: Box<dyn ByteSource> },
	Ihex,
	SRecord,
	Elf { source: Box<dyn ByteSource>, elf: ElfImage },
	Memory { target: Box<dyn TargetMemory>, cache: MemoryImage },
	Builder(Builder),
}

/// A loaded firmware image: an ordered list of [Section]s, an optional entry address, and
/// whatever backend state is needed to serve `read_section` against them.
pub struct Image
{
	kind: ImageKind,
	sections: Vec<Section>,
	start_address: Option<u32>,
}

impl std::fmt::Debug for Image
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		f.debug_struct("Image")
			.field("sections", &self.sections)
			.field("start_address", &self.start_address)
			.finish_non_exhaustive()
	}
}

impl Image
{
	/// Open a file- or buffer-backed image. `hint` picks the format explicitly (`bin`, `ihex`,
	/// `elf`, `s19`); `None` autodetects it from `source`'s leading bytes. `base_address`, if
	/// given, is folded into every resulting section's base address before this returns — there
	/// is no lingering "pending relocation" state to apply later. Use [`Image::open_memory`] or
	/// [`Image::builder`] for the `mem`/`build` backends, which don't read from a [ByteSource] at
	/// all.
	pub fn open(hint: Option<&str>, mut source: Box<dyn ByteSource>, base_address: Option<u32>) -> Result<Self>
	{
		let image_type = detect::identify_image_type(hint, source.as_mut())?;
		debug!("opening image as {image_type:?}");

		let mut image = match image_type {
			ImageType::Binary => {
				let size = source.size()?;
				let sections = vec![Section { base_address: 0, size: size as u32, flags: 0, backing: SectionBacking::None }];
				Self { kind: ImageKind::Binary { source }, sections, start_address: None }
			},
			ImageType::Ihex => {
				let (sections, start_address) = ihex::parse(source.as_mut())?;
				Self { kind: ImageKind::Ihex, sections, start_address }
			},
			ImageType::SRecord => {
				let sections = srecord::parse(source.as_mut())?;
				Self { kind: ImageKind::SRecord, sections, start_address: None }
			},
			ImageType::Elf => {
				let (elf, sections) = elf::read_headers(source.as_mut())?;
				let start_address = Some(elf.entry());
				Self { kind: ImageKind::Elf { source, elf }, sections, start_address }
			},
			ImageType::Memory | ImageType::Builder => {
				return Err(ErrorKind::FormatError(
					"mem and build images are not opened from a byte source, use Image::open_memory or Image::builder".into(),
				)
				.error());
			},
		};

		if let Some(relocation) = base_address {
			for section in &mut image.sections {
				section.base_address = section.base_address.wrapping_add(relocation);
			}
		}

		Ok(image)
	}

	/// Open a live-target memory image backed by `target`. The section list is a single
	/// unbounded span starting at address 0, matching the original's placeholder
	/// `0xffffffff`-sized section.
	pub fn open_memory(target: Box<dyn TargetMemory>) -> Self
	{
		let sections = vec![Section { base_address: 0, size: u32::MAX, flags: 0, backing: SectionBacking::None }];
		Self { kind: ImageKind::Memory { target, cache: MemoryImage::new() }, sections, start_address: None }
	}

	/// Start an empty image to be filled in with [`Image::add_section`].
	pub fn builder() -> Self
	{
		Self { kind: ImageKind::Builder(Builder::new()), sections: Vec::new(), start_address: None }
	}

	pub fn sections(&self) -> &[Section]
	{
		&self.sections
	}

	pub fn start_address(&self) -> Option<u32>
	{
		self.start_address
	}

	/// Append (or extend) a section. Only valid on an image created with [`Image::builder`].
	pub fn add_section(&mut self, base_address: u32, flags: u64, data: &[u8]) -> Result<()>
	{
		match &mut self.kind {
			ImageKind::Builder(builder) => {
				builder.add_section(base_address, flags, data);
				self.sections = builder.sections().to_vec();
				Ok(())
			},
			_ => Err(ErrorKind::SyntaxError("add_section is only supported on builder images".into()).error()),
		}
	}

	/// Read `size` bytes at `offset` within section `index`. Never reads past the end of the
	/// section: `offset + size` beyond `section.size` is a [`ErrorKind::SyntaxError`].
	pub fn read_section(&mut self, index: usize, offset: u32, size: u32) -> Result<Vec<u8>>
	{
		let section = self
			.sections
			.get(index)
			.ok_or_else(|| ErrorKind::SyntaxError(format!("no such section: {index}")).error())?
			.clone();

		if offset as u64 + size as u64 > section.size as u64 {
			return Err(ErrorKind::SyntaxError(format!(
				"read past end of section: {offset:#x} + {size:#x} > {:#x}",
				section.size
			))
			.error());
		}

		match &section.backing {
			SectionBacking::Text(arena, range) => {
				let start = range.start + offset as usize;
				Ok(arena[start..start + size as usize].to_vec())
			},
			SectionBacking::Owned(buffer) => Ok(buffer[offset as usize..offset as usize + size as usize].to_vec()),
			SectionBacking::Elf(segment_index) => match &mut self.kind {
				ImageKind::Elf { source, elf } => elf::read_segment(source.as_mut(), elf, *segment_index, offset, size),
				_ => unreachable!("Elf-backed section outside an ImageKind::Elf image"),
			},
			SectionBacking::None => match &mut self.kind {
				ImageKind::Binary { source } => {
					source.seek(offset as u64)?;
					let mut buffer = vec![0u8; size as usize];
					let read = source.read(&mut buffer)?;
					buffer.truncate(read);
					Ok(buffer)
				},
				ImageKind::Memory { target, cache } => cache.read(target.as_mut(), section.base_address + offset, size),
				_ => unreachable!("None-backed section outside an ImageKind::Binary or ImageKind::Memory image"),
			},
		}
	}

	/// Resolve `names` to addresses. Only supported on ELF32 images.
	pub fn resolve_symbols(&mut self, names: &[&str]) -> Result<Vec<Symbol>>
	{
		match &mut self.kind {
			ImageKind::Elf { source, elf } => elf::resolve_symbols(source.as_mut(), elf, names),
			_ => Err(ErrorKind::FormatError("symbol resolution is supported for ELF images only".into()).error()),
		}
	}
}
