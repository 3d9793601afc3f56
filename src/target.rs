// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! The live-target memory collaborator contract consumed by the memory-backed image.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

/// A read failed against the live target. Carried separately from [`crate::error::Error`]
/// because implementors of [TargetMemory] live outside this crate and shouldn't need to depend
/// on its error type to report failure.
#[derive(Debug)]
pub struct TargetError(pub Box<dyn StdError + Send + Sync>);

impl Display for TargetError
{
	fn fmt(&self, f: &mut Formatter) -> std::fmt::Result
	{
		write!(f, "target read failed: {}", self.0)
	}
}

impl StdError for TargetError
{
	fn source(&self) -> Option<&(dyn StdError + 'static)>
	{
		Some(self.0.as_ref())
	}
}

/// A live debug target that can satisfy memory reads. The image's `mem` backend is a thin
/// virtual address space layered over this.
pub trait TargetMemory
{
	/// Read `len` bytes starting at `address`. Implementations decide what "unavailable" means
	/// for their target (halted core, bus fault, disconnected probe, ...); any such failure is
	/// surfaced as [ErrorKind::TemporarilyUnavailable](crate::error::ErrorKind::TemporarilyUnavailable).
	fn read(&mut self, address: u32, len: u32) -> Result<Vec<u8>, TargetError>;
}
