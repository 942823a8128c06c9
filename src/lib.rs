//! Quad-Lane Ethernet MAC Driver Core
//!
//! A `no_std`, `no_alloc` driver core for a four-lane multi-gigabit
//! Ethernet MAC/PHY/DMA subsystem, covering the pieces that are the
//! same on every board: descriptor ring bookkeeping, the transmit
//! scatter-gather path with checksum offload, receive reassembly over
//! a buffer pool, and the link bring-up state machine with its
//! link-down interrupt plumbing.
//!
//! # Architecture
//!
//! Hardware access goes through traits the platform implements:
//!
//! 1. **DMA seams** ([`dma`]): [`DmaTxChannel`], [`DmaRxChannel`],
//!    [`BufferPool`], and the upstream [`PacketSink`]
//! 2. **Link seams** ([`link`]): [`LinkHardware`] for MAC, retimer and
//!    transceiver access, [`LinkIrqRegs`] for the link-down latch
//! 3. **Facade** ([`iface`]): [`EthInterface`] sequences bring-up,
//!    datapath service, and teardown over those seams
//!
//! Silicon differences between the two chip revisions are captured
//! once in [`RevData`]; nothing else matches on the revision.
//!
//! # Concurrency model
//!
//! Ring indices are atomics advanced by compare-and-swap so a poller
//! and a completion interrupt can share a ring without locking. Link
//! reconfiguration requests from interrupt context only set flags on a
//! [`LinkFlags`]; the heavy lifting runs later from task context via
//! [`LinkSupervisor::run`]. The link-down interrupt mask is guarded by
//! a `critical_section::Mutex`.
//!
//! # Example
//!
//! ```ignore
//! use quadmac::{EthInterface, LaneConfig, LinkFlags, RevData, RetimerParams, Speed};
//!
//! static LINK_FLAGS: LinkFlags = LinkFlags::new();
//!
//! let cfg = LaneConfig::new(0).with_speed(Speed::Gbps100);
//! let mut ifc: EthInterface<BufHandle, 64, 64> =
//!     EthInterface::new(cfg, RevData::v2(), RetimerParams::identity())?;
//!
//! ifc.open(&mut rx_chan, &mut pool, &LINK_FLAGS);
//! loop {
//!     ifc.service_link(&LINK_FLAGS, &mut hw, &mut sink, &mut delay);
//!     ifc.poll_rx(&mut rx_chan, &mut pool, &mut sink);
//!     ifc.reclaim_tx(&mut tx_chan, &mut pool, &mut sink);
//! }
//! ```
//!
//! # Features
//!
//! - `defmt`: structured logging for link and datapath events

#![no_std]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::module_name_repetitions
)]

#[cfg(test)]
extern crate std;

// =============================================================================
// Modules
// =============================================================================

pub mod checksum;
pub mod config;
pub mod constants;
pub mod dma;
pub mod error;
pub mod hdr;
pub mod iface;
pub mod link;
pub mod rev;
pub mod ring;
pub mod rx;
pub mod stats;
pub mod tx;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{Duplex, LaneConfig, RetimerParams, Speed};
pub use dma::{BufferPool, DmaAddr, DmaRxChannel, DmaTxChannel, PacketSink, RxFrame, SgEntry};
pub use error::{ConfigError, DmaError, Error, LinkError, Result};
pub use iface::EthInterface;
pub use link::{
    LinkDownIrq, LinkFlags, LinkHardware, LinkIrqRegs, LinkOutcome, LinkSupervisor, PollVerdict,
};
pub use rev::{ChipRev, RevData};
pub use rx::RxQueue;
pub use stats::RingStats;
pub use tx::{TxChecksum, TxPacket, TxQueue, TxStatus};
