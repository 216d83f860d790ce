//! Provides the host implementation for the running operating system.
//!
//! Raw device access, mount handling and the boot-sector sniff are
//! inherently OS-specific. This module uses conditional compilation
//! (`#[cfg]`) to expose the implementation for the target OS. Every
//! implementation provides the same traits from [`crate::host`], so the
//! pipeline never sees which one it got.
//!
//! Only Linux is supported today.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use self::linux::*;
