// SPDX-License-Identifier: MIT OR Apache-2.0
// SPDX-FileCopyrightText: 2025 1BitSquared <info@1bitsquared.com>
//! The cooperative-shutdown collaborator contract consumed by the CRC-32 loop.

/// A host control surface: a liveness ping for long-running loops, and a cooperative shutdown
/// flag. This is the trait boundary for what the original calls `keep_alive()` and
/// `openocd_is_shutdown_pending()`.
pub trait HostControl
{
	/// Ping the host's event pump to signal this thread is still making progress.
	fn keep_alive(&mut self);

	/// Whether the host has asked long-running operations to wind down.
	fn is_shutdown_pending(&mut self) -> bool;
}

/// A [HostControl] that never asks for shutdown and does nothing on `keep_alive`. The default
/// for callers that don't need cancellation (tests, one-shot tools).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl HostControl for NullHost
{
	fn keep_alive(&mut self) {}

	fn is_shutdown_pending(&mut self) -> bool
	{
		false
	}
}
