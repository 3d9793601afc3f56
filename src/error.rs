// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! Module for error handling code.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

use thiserror::Error;

/// More convenient alias for `Box<dyn StdError + Send + Sync>`, used as the boxed source on
/// [Error].
type BoxedError = Box<dyn StdError + Send + Sync>;

/// Kinds of errors for [Error]. Use [ErrorKind::error] and [ErrorKind::error_from] to generate
/// the [Error] value for this ErrorKind.
#[derive(Debug)]
pub enum ErrorKind
{
	/// The caller supplied a type hint that isn't one of `bin`, `ihex`, `elf`, `mem`, `s19` or
	/// `build`.
	UnknownType(/** the bad hint */ String),

	/// The image's container format is structurally invalid: an unrecognised record type, a
	/// missing end-of-file record, zero loadable ELF segments, too many sections, or a bad ELF
	/// magic/class/endianness.
	FormatError(/** what was wrong */ String),

	/// An IHEX or S-record checksum did not match the record's declared checksum.
	ChecksumError,

	/// Opening, seeking, or reading the backing file failed.
	FileIo(/** path, if known */ Option<String>),

	/// A read against a [`TargetMemory`](crate::target::TargetMemory) collaborator failed.
	TemporarilyUnavailable,

	/// The caller asked for something the image can't satisfy: an out-of-range
	/// `read_section`, or `add_section` against a non-builder image.
	SyntaxError(/** what was wrong */ String),

	/// A checksum computation observed a shutdown request partway through.
	Interrupted,

	/// Unhandled external error.
	External(ErrorSource),
}

impl ErrorKind
{
	/// Creates a new [Error] from this error kind.
	///
	/// Enables convenient code like:
	/// ```
	/// # use fwimage::error::ErrorKind;
	/// return Err(ErrorKind::ChecksumError.error());
	/// # fn return_something() -> Result<(), fwimage::error::Error> { unreachable!() }
	/// ```
	#[inline(always)]
	pub fn error(self) -> Error
	{
		Error::new(self, None)
	}

	/// Creates a new [Error] from this error kind, with the passed error as the source.
	#[inline(always)]
	pub fn error_from<E: StdError + Send + Sync + 'static>(self, source: E) -> Error
	{
		Error::new(self, Some(Box::new(source)))
	}
}

/// Constructs an [Error] for this [ErrorKind].
impl From<ErrorKind> for Error
{
	fn from(other: ErrorKind) -> Self
	{
		other.error()
	}
}

impl Display for ErrorKind
{
	fn fmt(&self, f: &mut Formatter) -> std::fmt::Result
	{
		use ErrorKind::*;
		match self {
			UnknownType(hint) => write!(
				f,
				"unknown image type '{hint}', use one of: bin, ihex, elf, mem, s19, build"
			)?,
			FormatError(why) => write!(f, "image format error: {why}")?,
			ChecksumError => write!(f, "incorrect record checksum found in image file")?,
			FileIo(None) => write!(f, "failed to read image file")?,
			FileIo(Some(path)) => write!(f, "failed to read image file {path}")?,
			TemporarilyUnavailable => write!(f, "target memory temporarily unavailable")?,
			SyntaxError(why) => write!(f, "{why}")?,
			Interrupted => write!(f, "checksum computation interrupted by shutdown request")?,
			External(source) => {
				use ErrorSource::*;
				match source {
					StdIo(e) => write!(f, "unhandled std::io::Error: {e}")?,
				};
			},
		};

		Ok(())
	}
}

#[derive(Debug)]
/// Error type for firmware image operations. Easily constructed from [ErrorKind].
pub struct Error
{
	pub kind: ErrorKind,
	pub source: Option<BoxedError>,

	/// A string for additional context about what was being attempted when this error occurred.
	///
	/// Example: "opening IHEX image".
	pub context: Option<String>,
}

impl Error
{
	#[inline(always)]
	pub fn new(kind: ErrorKind, source: Option<BoxedError>) -> Self
	{
		Self { kind, source, context: None }
	}

	/// Add additional context about what was being attempted when this error occurred.
	#[allow(dead_code)]
	pub fn with_ctx(mut self, ctx: &str) -> Self
	{
		self.context = Some(ctx.to_string());
		self
	}
}

impl Display for Error
{
	fn fmt(&self, f: &mut Formatter) -> std::fmt::Result
	{
		if let Some(ctx) = &self.context {
			write!(f, "(while {}): {}", ctx, self.kind)?;
		} else {
			write!(f, "{}", self.kind)?;
		}

		if let Some(source) = &self.source {
			write!(f, "\nCaused by: {source}")?;
		}

		Ok(())
	}
}

impl StdError for Error
{
	fn source(&self) -> Option<&(dyn StdError + 'static)>
	{
		self.source.as_deref().map(|e| e as &dyn StdError)
	}
}

impl From<std::io::Error> for Error
{
	fn from(other: std::io::Error) -> Self
	{
		ErrorKind::FileIo(None).error_from(other)
	}
}

/// Sources of external error in this library.
#[derive(Debug, Error)]
pub enum ErrorSource
{
	#[error(transparent)]
	StdIo(#[from] std::io::Error),
}

/// Extension trait to enable getting the error kind from a `Result<T, Error>` with one method.
pub trait ResErrorKind<T>
{
	type Kind;
	fn err_kind(&self) -> std::result::Result<&T, &Self::Kind>;
}

impl<T> ResErrorKind<T> for std::result::Result<T, Error>
{
	type Kind = ErrorKind;

	fn err_kind(&self) -> std::result::Result<&T, &Self::Kind>
	{
		self.as_ref().map_err(|e| &e.kind)
	}
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! log_and_return
{
	($err:expr) => {
		let err = $err;
		log::error!("{}", err);
		return Err(err);
	}
}
