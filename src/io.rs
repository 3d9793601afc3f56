// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! The file-I/O collaborator contract.
//!
//! Sequential byte access (open/seek/tell/size/EOF/line-read) is drawn out as its own boundary,
//! the [ByteSource] trait, with a `std::fs::File`-backed implementation for production use and an
//! in-memory `Cursor<Vec<u8>>` implementation used by this crate's own tests.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::Result;

/// A sequential, seekable source of bytes, with a line reader for the text formats.
pub trait ByteSource
{
	/// Seek to an absolute byte offset from the start of the source.
	fn seek(&mut self, offset: u64) -> Result<()>;

	/// The current read position.
	fn tell(&mut self) -> Result<u64>;

	/// The total size of the source, in bytes.
	fn size(&mut self) -> Result<u64>;

	/// Read exactly `buf.len()` bytes, or as many as remain if the source is shorter.
	/// Returns the number of bytes actually read.
	fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

	/// Read one line of text (without the trailing `\r`/`\n`), or `None` at end of file.
	fn read_line(&mut self) -> Result<Option<String>>;

	/// Whether the source is positioned at end of file.
	fn is_eof(&mut self) -> Result<bool>;
}

impl ByteSource for File
{
	fn seek(&mut self, offset: u64) -> Result<()>
	{
		Seek::seek(self, SeekFrom::Start(offset))?;
		Ok(())
	}

	fn tell(&mut self) -> Result<u64>
	{
		Ok(Seek::seek(self, SeekFrom::Current(0))?)
	}

	fn size(&mut self) -> Result<u64>
	{
		Ok(self.metadata()?.len())
	}

	fn read(&mut self, buf: &mut [u8]) -> Result<usize>
	{
		Ok(Read::read(self, buf)?)
	}

	fn read_line(&mut self) -> Result<Option<String>>
	{
		read_line_from(self)
	}

	fn is_eof(&mut self) -> Result<bool>
	{
		let pos = ByteSource::tell(self)?;
		let len = ByteSource::size(self)?;
		Ok(pos >= len)
	}
}

impl ByteSource for Cursor<Vec<u8>>
{
	fn seek(&mut self, offset: u64) -> Result<()>
	{
		Seek::seek(self, SeekFrom::Start(offset))?;
		Ok(())
	}

	fn tell(&mut self) -> Result<u64>
	{
		Ok(self.position())
	}

	fn size(&mut self) -> Result<u64>
	{
		Ok(self.get_ref().len() as u64)
	}

	fn read(&mut self, buf: &mut [u8]) -> Result<usize>
	{
		Ok(Read::read(self, buf)?)
	}

	fn read_line(&mut self) -> Result<Option<String>>
	{
		read_line_from(self)
	}

	fn is_eof(&mut self) -> Result<bool>
	{
		Ok(self.position() >= self.get_ref().len() as u64)
	}
}

/// Shared line-reader: reads bytes one at a time until `\n` (or EOF), trims the trailing
/// `\r`/`\n`, and returns `None` once nothing more can be read. Mirrors the original's
/// `fileio_fgets` loop closely enough to preserve its comment/blank-line skipping behaviour in
/// the callers, while not hard-capping the line length at 1023 the way the C buffer did.
fn read_line_from<R: Read>(reader: &mut R) -> Result<Option<String>>
{
	let mut line = Vec::new();
	let mut byte = [0u8; 1];
	let mut read_anything = false;

	loop {
		let n = reader.read(&mut byte)?;
		if n == 0 {
			break;
		}
		read_anything = true;
		if byte[0] == b'\n' {
			break;
		}
		line.push(byte[0]);
	}

	if !read_anything {
		return Ok(None);
	}

	if line.last() == Some(&b'\r') {
		line.pop();
	}

	Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn cursor_reads_lines()
	{
		let mut src = Cursor::new(b"first\nsecond\r\nthird".to_vec());
		assert_eq!(src.read_line().unwrap().as_deref(), Some("first"));
		assert_eq!(src.read_line().unwrap().as_deref(), Some("second"));
		assert_eq!(src.read_line().unwrap().as_deref(), Some("third"));
		assert_eq!(src.read_line().unwrap(), None);
	}

	#[test]
	fn cursor_reports_eof()
	{
		let mut src = Cursor::new(b"ab".to_vec());
		assert!(!src.is_eof().unwrap());
		let mut buf = [0u8; 2];
		ByteSource::read(&mut src, &mut buf).unwrap();
		assert!(src.is_eof().unwrap());
	}
}
