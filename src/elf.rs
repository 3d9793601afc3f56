// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! ELF32/ELF64 program header parsing, segment reads, and ELF-32 symbol resolution.

use log::{debug, error};

use crate::decode::Endian;
use crate::error::{ErrorKind, Result};
use crate::io::ByteSource;
use crate::section::{Section, SectionBacking};
use crate::symbol::Symbol;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

const PT_LOAD: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const STN_UNDEF: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class
{
	Elf32,
	Elf64,
}

/// One loadable program header, with enough of its layout retained to satisfy later
/// `read_section` calls without re-parsing the header table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Segment
{
	file_offset: u64,
	file_size: u32,
}

/// Parsed ELF program-header metadata, kept around by [`crate::image::Image`] so that
/// `read_section` can seek straight to a segment's file-backed bytes.
#[derive(Debug)]
pub struct ElfImage
{
	class: Class,
	endian: Endian,
	segments: Vec<Segment>,
	entry: u32,
}

impl ElfImage
{
	pub(crate) fn entry(&self) -> u32
	{
		self.entry
	}

	pub(crate) fn is_64_bit(&self) -> bool
	{
		self.class == Class::Elf64
	}
}

fn read_exact(source: &mut dyn ByteSource, buf: &mut [u8]) -> Result<()>
{
	let mut total = 0;
	while total < buf.len() {
		let n = source.read(&mut buf[total..])?;
		if n == 0 {
			return Err(ErrorKind::FormatError("truncated ELF file".into()).error());
		}
		total += n;
	}
	Ok(())
}

fn field_u16(endian: Endian, buf: &[u8], offset: usize) -> Result<u16>
{
	endian.read_u16(buf, offset).ok_or_else(|| ErrorKind::FormatError("truncated ELF header".into()).error())
}

fn field_u32(endian: Endian, buf: &[u8], offset: usize) -> Result<u32>
{
	endian.read_u32(buf, offset).ok_or_else(|| ErrorKind::FormatError("truncated ELF header".into()).error())
}

fn field_u64(endian: Endian, buf: &[u8], offset: usize) -> Result<u64>
{
	endian.read_u64(buf, offset).ok_or_else(|| ErrorKind::FormatError("truncated ELF header".into()).error())
}

/// Parse the ELF header and program header table, returning the loadable segments as
/// [Section]s (in program-header order) and the kept-around header metadata.
pub fn read_headers(source: &mut dyn ByteSource) -> Result<(ElfImage, Vec<Section>)>
{
	source.seek(0)?;
	let mut e_ident = [0u8; 16];
	read_exact(source, &mut e_ident)?;

	if e_ident[0..4] != ELF_MAGIC {
		return Err(ErrorKind::FormatError("invalid ELF file, bad magic number".into()).error());
	}

	let endian = match e_ident[EI_DATA] {
		ELFDATA2LSB => Endian::Little,
		ELFDATA2MSB => Endian::Big,
		_ => return Err(ErrorKind::FormatError("invalid ELF file, unknown endianness setting".into()).error()),
	};

	let class = match e_ident[EI_CLASS] {
		ELFCLASS32 => {
			debug!("ELF32 image detected.");
			Class::Elf32
		},
		ELFCLASS64 => {
			debug!("ELF64 image detected.");
			Class::Elf64
		},
		_ => return Err(ErrorKind::FormatError("invalid ELF file, only 32/64 bit ELF files are supported".into()).error()),
	};

	source.seek(0)?;
	match class {
		Class::Elf32 => read_headers_32(source, endian),
		Class::Elf64 => read_headers_64(source, endian),
	}
}

struct RawSegment
{
	p_type: u32,
	p_offset: u64,
	p_vaddr: u64,
	p_paddr: u64,
	p_filesz: u64,
	p_memsz: u64,
	p_flags: u32,
}

/// On-disk size of an `Elf32_Phdr`/`Elf64_Phdr`. Hardcoded rather than trusting the file's
/// declared `e_phentsize`: every real ELF producer emits exactly this, and a corrupt image
/// claiming a shorter entry size must not be allowed to shrink the read stride underneath us.
const ELF32_PHDR_SIZE: usize = 32;
const ELF64_PHDR_SIZE: usize = 56;

fn read_headers_32(source: &mut dyn ByteSource, endian: Endian) -> Result<(ElfImage, Vec<Section>)>
{
	let mut header = [0u8; 52];
	read_exact(source, &mut header)?;

	let e_entry = field_u32(endian, &header, 24)?;
	let e_phoff = field_u32(endian, &header, 28)?;
	let e_phnum = field_u16(endian, &header, 44)? as usize;

	if e_phnum == 0 {
		return Err(ErrorKind::FormatError("invalid ELF file, no program headers".into()).error());
	}

	source.seek(e_phoff as u64)?;
	let mut raw = vec![0u8; ELF32_PHDR_SIZE * e_phnum];
	read_exact(source, &mut raw)?;

	let mut headers = Vec::with_capacity(e_phnum);
	for i in 0..e_phnum {
		let entry = &raw[i * ELF32_PHDR_SIZE..][..ELF32_PHDR_SIZE];
		headers.push(RawSegment {
			p_type: field_u32(endian, entry, 0)?,
			p_offset: field_u32(endian, entry, 4)? as u64,
			p_vaddr: field_u32(endian, entry, 8)? as u64,
			p_paddr: field_u32(endian, entry, 12)? as u64,
			p_filesz: field_u32(endian, entry, 16)? as u64,
			p_memsz: field_u32(endian, entry, 20)? as u64,
			p_flags: field_u32(endian, entry, 24)?,
		});
	}

	build_image(Class::Elf32, endian, e_entry, headers)
}

fn read_headers_64(source: &mut dyn ByteSource, endian: Endian) -> Result<(ElfImage, Vec<Section>)>
{
	let mut header = [0u8; 64];
	read_exact(source, &mut header)?;

	let e_entry = field_u64(endian, &header, 24)?;
	let e_phoff = field_u64(endian, &header, 32)?;
	let e_phnum = field_u16(endian, &header, 56)? as usize;

	if e_phnum == 0 {
		return Err(ErrorKind::FormatError("invalid ELF file, no program headers".into()).error());
	}

	source.seek(e_phoff)?;
	let mut raw = vec![0u8; ELF64_PHDR_SIZE * e_phnum];
	read_exact(source, &mut raw)?;

	let mut headers = Vec::with_capacity(e_phnum);
	for i in 0..e_phnum {
		let entry = &raw[i * ELF64_PHDR_SIZE..][..ELF64_PHDR_SIZE];
		headers.push(RawSegment {
			p_type: field_u32(endian, entry, 0)?,
			p_offset: field_u64(endian, entry, 8)?,
			p_vaddr: field_u64(endian, entry, 16)?,
			p_paddr: field_u64(endian, entry, 24)?,
			p_filesz: field_u64(endian, entry, 32)?,
			p_memsz: field_u64(endian, entry, 40)?,
			p_flags: field_u32(endian, entry, 4)?,
		});
	}

	// e_entry truncated to u32 to match this crate's address width; large 64-bit entry points
	// aren't representable by `Section::base_address` either.
	build_image(Class::Elf64, endian, e_entry as u32, headers)
}

fn build_image(class: Class, endian: Endian, entry: u32, headers: Vec<RawSegment>) -> Result<(ElfImage, Vec<Section>)>
{
	let loadable: Vec<&RawSegment> = headers.iter().filter(|h| h.p_type == PT_LOAD && h.p_filesz != 0).collect();
	if loadable.is_empty() {
		return Err(ErrorKind::FormatError("invalid ELF file, no loadable segments".into()).error());
	}

	// If every program header's p_paddr is zero and more than one PT_LOAD segment has a
	// nonzero p_memsz, prefer p_vaddr: some linkers zero-initialize p_paddr entirely, and BFD
	// uses the same workaround when deriving load addresses.
	let mut nload = 0;
	let mut all_paddr_zero = true;
	for header in &headers {
		if header.p_paddr != 0 {
			all_paddr_zero = false;
			break;
		}
		if header.p_type == PT_LOAD && header.p_memsz != 0 {
			nload += 1;
		}
	}
	let load_to_vaddr = all_paddr_zero && nload > 1;

	let mut segments = Vec::with_capacity(loadable.len());
	let mut sections = Vec::with_capacity(loadable.len());
	for header in loadable {
		let base_address = if load_to_vaddr { header.p_vaddr } else { header.p_paddr } as u32;
		segments.push(Segment { file_offset: header.p_offset, file_size: header.p_filesz as u32 });
		sections.push(Section {
			base_address,
			size: header.p_filesz as u32,
			flags: header.p_flags as u64,
			backing: SectionBacking::Elf(segments.len() - 1),
		});
	}

	Ok((ElfImage { class, endian, segments, entry }, sections))
}

/// Read `len` bytes at `offset` within the segment the section's [SectionBacking::Elf] index
/// names. Mirrors the original: only the initialized, file-backed portion of a segment is ever
/// read, the uninitialized BSS tail is not represented here at all.
pub fn read_segment(source: &mut dyn ByteSource, elf: &ElfImage, segment_index: usize, offset: u32, len: u32) -> Result<Vec<u8>>
{
	let segment = elf.segments[segment_index];
	let read_size = len.min(segment.file_size.saturating_sub(offset));
	let mut buffer = vec![0u8; read_size as usize];
	if read_size > 0 {
		source.seek(segment.file_offset + offset as u64)?;
		read_exact(source, &mut buffer)?;
	}
	Ok(buffer)
}

struct SectionHeader
{
	sh_name: u32,
	sh_type: u32,
	sh_offset: u64,
	sh_size: u64,
	sh_link: u32,
	sh_addr: u64,
}

/// On-disk size of an `Elf32_Shdr`, hardcoded for the same reason as `ELF32_PHDR_SIZE` above.
const ELF32_SHDR_SIZE: usize = 40;

fn read_section_headers(source: &mut dyn ByteSource, elf: &ElfImage) -> Result<Vec<SectionHeader>>
{
	if elf.is_64_bit() {
		return Err(ErrorKind::FormatError("symbol resolution is supported for ELF32 images only".into()).error());
	}

	source.seek(0)?;
	let mut header = [0u8; 52];
	read_exact(source, &mut header)?;
	let e_shoff = field_u32(elf.endian, &header, 32)?;
	let e_shnum = field_u16(elf.endian, &header, 48)? as usize;

	source.seek(e_shoff as u64)?;
	let mut raw = vec![0u8; ELF32_SHDR_SIZE * e_shnum];
	read_exact(source, &mut raw)?;

	let mut headers = Vec::with_capacity(e_shnum);
	for i in 0..e_shnum {
		let entry = &raw[i * ELF32_SHDR_SIZE..][..ELF32_SHDR_SIZE];
		headers.push(SectionHeader {
			sh_name: field_u32(elf.endian, entry, 0)?,
			sh_type: field_u32(elf.endian, entry, 4)?,
			sh_addr: field_u32(elf.endian, entry, 12)? as u64,
			sh_offset: field_u32(elf.endian, entry, 16)? as u64,
			sh_size: field_u32(elf.endian, entry, 20)? as u64,
			sh_link: field_u32(elf.endian, entry, 24)?,
		});
	}
	Ok(headers)
}

fn read_at(source: &mut dyn ByteSource, offset: u64, size: u64) -> Result<Vec<u8>>
{
	source.seek(offset)?;
	let mut buf = vec![0u8; size as usize];
	read_exact(source, &mut buf)?;
	Ok(buf)
}

fn c_str_at(table: &[u8], offset: u32) -> &str
{
	let offset = offset as usize;
	if offset >= table.len() {
		return "";
	}
	let end = table[offset..].iter().position(|&b| b == 0).map(|p| offset + p).unwrap_or(table.len());
	std::str::from_utf8(&table[offset..end]).unwrap_or("")
}

/// Resolve `wanted` names to addresses: first by matching them against section names (required
/// by CMSIS flash algorithms, which expose their entry points as section names), then by
/// matching them against the `SHT_SYMTAB` symbol table, with a symbol match overriding a
/// section-name match. Only supported for ELF32 images.
pub fn resolve_symbols(source: &mut dyn ByteSource, elf: &ElfImage, wanted: &[&str]) -> Result<Vec<Symbol>>
{
	let headers = read_section_headers(source, elf)?;
	let mut resolved: Vec<Symbol> = wanted.iter().map(|&name| Symbol { name: name.to_string(), offset: None }).collect();

	let shstrndx_table = {
		source.seek(0)?;
		let mut header = [0u8; 52];
		read_exact(source, &mut header)?;
		let e_shstrndx = field_u16(elf.endian, &header, 50)? as usize;
		let str_hdr = headers.get(e_shstrndx).ok_or_else(|| ErrorKind::FormatError("invalid ELF section string table index".into()).error())?;
		read_at(source, str_hdr.sh_offset, str_hdr.sh_size)?
	};

	for header in &headers {
		let name = c_str_at(&shstrndx_table, header.sh_name);
		for symbol in resolved.iter_mut() {
			if symbol.name == name {
				symbol.offset = Some(header.sh_addr as u32);
			}
		}
	}

	let Some(symtab) = headers.iter().find(|h| h.sh_type == SHT_SYMTAB) else {
		error!("Symbol Table not found in elf object, symbols stripped???");
		return Err(ErrorKind::FormatError("no symbol table present in ELF image".into()).error());
	};

	let strtab = headers
		.get(symtab.sh_link as usize)
		.ok_or_else(|| ErrorKind::FormatError("invalid ELF symbol string table index".into()).error())?;
	let sym_bytes = read_at(source, symtab.sh_offset, symtab.sh_size)?;
	let strtab_bytes = read_at(source, strtab.sh_offset, strtab.sh_size)?;

	const SYM_ENTRY_SIZE: usize = 16;
	for entry in sym_bytes.chunks_exact(SYM_ENTRY_SIZE) {
		let st_name = field_u32(elf.endian, entry, 0)?;
		let st_value = field_u32(elf.endian, entry, 4)?;
		let st_shndx = field_u16(elf.endian, entry, 14)? as u32;
		if st_shndx == STN_UNDEF {
			continue;
		}
		let name = c_str_at(&strtab_bytes, st_name);
		for symbol in resolved.iter_mut() {
			if symbol.name == name {
				symbol.offset = Some(st_value);
			}
		}
	}

	Ok(resolved)
}

#[cfg(test)]
mod tests
{
	use std::io::Cursor;

	use super::*;

	fn push_ehdr32(buf: &mut Vec<u8>, e_entry: u32, e_phoff: u32, e_phnum: u16, e_shoff: u32, e_shnum: u16, e_shstrndx: u16)
	{
		buf.extend_from_slice(&ELF_MAGIC);
		buf.push(ELFCLASS32);
		buf.push(ELFDATA2LSB);
		buf.push(1); // EI_VERSION
		buf.extend_from_slice(&[0u8; 9]); // EI_OSABI, EI_ABIVERSION, padding
		buf.extend_from_slice(&2u16.to_le_bytes()); // e_type
		buf.extend_from_slice(&40u16.to_le_bytes()); // e_machine
		buf.extend_from_slice(&1u32.to_le_bytes()); // e_version
		buf.extend_from_slice(&e_entry.to_le_bytes());
		buf.extend_from_slice(&e_phoff.to_le_bytes());
		buf.extend_from_slice(&e_shoff.to_le_bytes());
		buf.extend_from_slice(&0u32.to_le_bytes()); // e_flags
		buf.extend_from_slice(&52u16.to_le_bytes()); // e_ehsize
		buf.extend_from_slice(&32u16.to_le_bytes()); // e_phentsize
		buf.extend_from_slice(&e_phnum.to_le_bytes());
		buf.extend_from_slice(&40u16.to_le_bytes()); // e_shentsize
		buf.extend_from_slice(&e_shnum.to_le_bytes());
		buf.extend_from_slice(&e_shstrndx.to_le_bytes());
	}

	fn push_phdr32(buf: &mut Vec<u8>, p_type: u32, p_offset: u32, p_vaddr: u32, p_paddr: u32, p_filesz: u32, p_memsz: u32, p_flags: u32)
	{
		buf.extend_from_slice(&p_type.to_le_bytes());
		buf.extend_from_slice(&p_offset.to_le_bytes());
		buf.extend_from_slice(&p_vaddr.to_le_bytes());
		buf.extend_from_slice(&p_paddr.to_le_bytes());
		buf.extend_from_slice(&p_filesz.to_le_bytes());
		buf.extend_from_slice(&p_memsz.to_le_bytes());
		buf.extend_from_slice(&p_flags.to_le_bytes());
		buf.extend_from_slice(&4u32.to_le_bytes()); // p_align
	}

	#[test]
	fn rejects_bad_magic()
	{
		let mut src = Cursor::new(vec![0u8; 64]);
		let err = read_headers(&mut src).unwrap_err();
		assert!(matches!(err.kind, ErrorKind::FormatError(_)));
	}

	#[test]
	fn two_segments_use_physical_address_when_set()
	{
		let mut buf = Vec::new();
		push_ehdr32(&mut buf, 0x1000, 52, 2, 0, 0, 0);
		push_phdr32(&mut buf, PT_LOAD, 116, 0x2000_0000, 0x0800_0000, 4, 4, 5);
		push_phdr32(&mut buf, PT_LOAD, 120, 0x2000_1000, 0x0800_1000, 4, 4, 5);
		buf.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
		buf.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);

		let mut src = Cursor::new(buf);
		let (_, sections) = read_headers(&mut src).unwrap();
		assert_eq!(sections.len(), 2);
		assert_eq!(sections[0].base_address, 0x0800_0000);
		assert_eq!(sections[1].base_address, 0x0800_1000);
	}

	#[test]
	fn zero_paddr_with_multiple_loads_falls_back_to_vaddr()
	{
		let mut buf = Vec::new();
		push_ehdr32(&mut buf, 0, 52, 2, 0, 0, 0);
		push_phdr32(&mut buf, PT_LOAD, 116, 0x2000_0000, 0, 4, 4, 5);
		push_phdr32(&mut buf, PT_LOAD, 120, 0x2000_1000, 0, 4, 4, 5);
		buf.extend_from_slice(&[0u8; 8]);

		let mut src = Cursor::new(buf);
		let (_, sections) = read_headers(&mut src).unwrap();
		assert_eq!(sections[0].base_address, 0x2000_0000);
		assert_eq!(sections[1].base_address, 0x2000_1000);
	}

	#[test]
	fn no_loadable_segments_is_format_error()
	{
		let mut buf = Vec::new();
		push_ehdr32(&mut buf, 0, 52, 1, 0, 0, 0);
		push_phdr32(&mut buf, 2 /* not PT_LOAD */, 84, 0, 0, 0, 0, 0);

		let mut src = Cursor::new(buf);
		let err = read_headers(&mut src).unwrap_err();
		assert!(matches!(err.kind, ErrorKind::FormatError(_)));
	}

	#[test]
	fn undersized_declared_phentsize_does_not_panic()
	{
		// A corrupt e_phentsize must not be able to shrink the read stride: the fixed, correct
		// 32-byte stride is always used regardless of what the file claims here.
		let mut buf = Vec::new();
		push_ehdr32(&mut buf, 0x1000, 52, 2, 0, 0, 0);
		let phentsize_offset = 42;
		push_phdr32(&mut buf, PT_LOAD, 116, 0x2000_0000, 0x0800_0000, 4, 4, 5);
		push_phdr32(&mut buf, PT_LOAD, 148, 0x2000_1000, 0x0800_1000, 4, 4, 5);
		buf[phentsize_offset..phentsize_offset + 2].copy_from_slice(&4u16.to_le_bytes());

		let mut src = Cursor::new(buf);
		let (_, sections) = read_headers(&mut src).unwrap();
		assert_eq!(sections.len(), 2);
		assert_eq!(sections[1].base_address, 0x0800_1000);
	}

	#[test]
	fn read_segment_reads_file_backed_bytes()
	{
		let mut buf = Vec::new();
		push_ehdr32(&mut buf, 0, 52, 1, 0, 0, 0);
		push_phdr32(&mut buf, PT_LOAD, 84, 0x0800_0000, 0x0800_0000, 4, 4, 5);
		buf.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

		let mut src = Cursor::new(buf);
		let (elf, sections) = read_headers(&mut src).unwrap();
		let SectionBacking::Elf(idx) = sections[0].backing else { panic!() };
		let data = read_segment(&mut src, &elf, idx, 0, 4).unwrap();
		assert_eq!(data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
	}
}
