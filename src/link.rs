//! Link bring-up, monitoring, and the link-down interrupt.
//!
//! Link configuration runs as a deferred job: datapath and interrupt
//! contexts only raise a request flag, and the owner of the interface
//! drives [`LinkSupervisor::run`] from task context. The request flag
//! carries a sticky SerDes-restart bit so that a restart asked for
//! while a plain reconfiguration is queued is never lost.
//!
//! [`LinkFlags`] is all atomics and lives outside the supervisor,
//! typically in a `static`, so the interrupt handler can hold a shared
//! reference while the supervisor runs.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;

use crate::config::{Duplex, LaneConfig, RetimerParams, Speed};
use crate::constants::{
    LANE_NB, LINK_RETRY_DELAY_MS, LINK_UP_POLL_STEP_US, LINK_UP_POLL_WINDOW_US,
    POST_LINK_UP_DELAY_MS,
};
use crate::dma::PacketSink;
use crate::error::{LinkError, LinkResult};
use crate::rev::{ChipRev, RevData};

// =============================================================================
// Request flags
// =============================================================================

/// Shared request state between requesters and the configuration job.
#[derive(Debug, Default)]
pub struct LinkFlags {
    running: AtomicBool,
    pending: AtomicBool,
    restart_serdes: AtomicBool,
}

impl LinkFlags {
    /// Idle flags.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            restart_serdes: AtomicBool::new(false),
        }
    }

    /// Ask for a (re)configuration. The restart bit only upgrades,
    /// never downgrades: a pending restart survives later plain
    /// requests. Returns `true` when the caller should schedule the
    /// configuration job.
    pub fn request(&self, restart_serdes: bool) -> bool {
        if restart_serdes {
            self.restart_serdes.store(true, Ordering::Release);
        }
        if self.running.load(Ordering::Acquire) {
            return false;
        }
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// A request is queued but not yet running.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// The configuration job is executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// SerDes restart requested for the next configuration attempt.
    pub fn restart_requested(&self) -> bool {
        self.restart_serdes.load(Ordering::Acquire)
    }

    /// Stop a running job at its next retry boundary.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::Release);
        self.pending.store(false, Ordering::Release);
    }

    fn begin_run(&self) {
        self.running.store(true, Ordering::Release);
        self.pending.store(false, Ordering::Release);
    }

    fn finish_run(&self) {
        self.restart_serdes.store(false, Ordering::Release);
        self.running.store(false, Ordering::Release);
    }

    fn set_restart(&self) {
        self.restart_serdes.store(true, Ordering::Release);
    }
}

// =============================================================================
// Hardware seam
// =============================================================================

/// Hardware operations the link job needs. MAC access is mandatory;
/// retimer and transceiver hooks default to "not fitted".
pub trait LinkHardware {
    /// A cable is plugged in. Boards without a managed transceiver
    /// report `true`.
    fn transceiver_connected(&self) -> bool {
        true
    }

    /// Program speed, run autonegotiation or link training, bring the
    /// MAC up. `restart_serdes` forces a SerDes restart first.
    fn mac_setup_link(&mut self, cfg: &LaneConfig, restart_serdes: bool) -> LinkResult<()>;

    /// MAC reports link up for the lanes of `cfg`.
    fn mac_link_up(&mut self, cfg: &LaneConfig) -> bool;

    /// Apply per-speed egress settings. Second-revision hardware only.
    fn tx_speed_settings(&mut self, cfg: &LaneConfig) {
        let _ = cfg;
    }

    /// An external retimer sits on the lanes.
    fn retimer_present(&self) -> bool {
        false
    }

    /// Enable the retimer transmit path on `channel`.
    fn retimer_tx_enable(&mut self, channel: u8) {
        let _ = channel;
    }

    /// Disable the retimer transmit path on `channel`.
    fn retimer_tx_disable(&mut self, channel: u8) {
        let _ = channel;
    }

    /// Retimer clock-data recovery locked on `channel`.
    fn retimer_cdr_locked(&mut self, channel: u8) -> bool {
        let _ = channel;
        true
    }

    /// Drain and reset the transmit rings. Called with the carrier
    /// about to go down.
    fn quiesce_tx(&mut self);

    /// Restart transmit queues after the link came up.
    fn start_tx(&mut self);

    /// Arm the link-down interrupt for the given lanes.
    fn enable_link_down_irq(&mut self, lane_mask: u32) {
        let _ = lane_mask;
    }

    /// Disarm the link-down interrupt for the given lanes.
    fn disable_link_down_irq(&mut self, lane_mask: u32) {
        let _ = lane_mask;
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Result of one run of the configuration job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkOutcome {
    /// Link is up, carrier on
    Up,
    /// No cable; the transceiver connect event will retrigger
    NoTransceiver,
    /// Cancelled from another context
    Cancelled,
    /// Aborted on a non-retryable error
    Failed(LinkError),
}

/// What the caller should do after a monitoring step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollVerdict {
    /// Link still healthy; poll again after the monitoring interval
    Rearm,
    /// Link lost; a reconfiguration was requested
    Reconfigure,
}

/// Owner of the link state machine for one interface.
#[derive(Debug)]
pub struct LinkSupervisor {
    /// Active lane configuration
    pub cfg: LaneConfig,
    rev: RevData,
    rtm: RetimerParams,
    carrier: bool,
    poll_en: bool,
    poll_due_ms: Option<u32>,
}

impl LinkSupervisor {
    /// Supervisor for `cfg` on the given silicon.
    #[must_use]
    pub const fn new(cfg: LaneConfig, rev: RevData, rtm: RetimerParams) -> Self {
        Self {
            cfg,
            rev,
            rtm,
            carrier: false,
            poll_en: true,
            poll_due_ms: None,
        }
    }

    /// Carrier currently reported up.
    #[must_use]
    pub const fn carrier(&self) -> bool {
        self.carrier
    }

    /// Enable or disable periodic link monitoring.
    pub fn set_poll_enabled(&mut self, en: bool) {
        self.poll_en = en;
        if !en {
            self.poll_due_ms = None;
        }
    }

    /// Delay in milliseconds after which the caller should invoke
    /// [`poll_link`](Self::poll_link), if monitoring is armed. Reading
    /// consumes the request.
    pub fn take_poll_delay(&mut self) -> Option<u32> {
        self.poll_due_ms.take()
    }

    /// Execute one configuration job. Retries transient failures with
    /// a delay in between until cancelled through `flags`;
    /// non-retryable configuration errors abort immediately.
    pub fn run<H, S, D>(
        &mut self,
        flags: &LinkFlags,
        hw: &mut H,
        sink: &mut S,
        delay: &mut D,
    ) -> LinkOutcome
    where
        H: LinkHardware,
        S: PacketSink,
        D: DelayNs,
    {
        flags.begin_run();

        if !hw.transceiver_connected() {
            #[cfg(feature = "defmt")]
            defmt::info!("link[{}]: no cable, waiting for transceiver", self.cfg.lane);
            flags.finish_run();
            return LinkOutcome::NoTransceiver;
        }

        // Carrier must be off while the lanes retrain.
        if self.carrier {
            hw.quiesce_tx();
            if hw.retimer_present() {
                for lane in usize::from(self.cfg.lane)..LANE_NB {
                    hw.retimer_tx_disable(self.rtm.tx_channels[lane]);
                }
            }
            self.set_carrier(false, sink);
        }

        let outcome = loop {
            if !flags.is_running() {
                break LinkOutcome::Cancelled;
            }
            match self.configure(flags, hw, sink, delay) {
                Ok(()) => break LinkOutcome::Up,
                Err(LinkError::Unsupported) => {
                    #[cfg(feature = "defmt")]
                    defmt::error!("link[{}]: configuration unsupported", self.cfg.lane);
                    break LinkOutcome::Failed(LinkError::Unsupported);
                }
                Err(_e) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("link[{}]: bring-up failed: {}, retrying", self.cfg.lane, _e);
                    delay.delay_ms(LINK_RETRY_DELAY_MS);
                    if !self.rev.rx_adaptation {
                        // Without RX adaptation the lanes must retrain
                        // from a clean SerDes state.
                        flags.set_restart();
                    }
                }
            }
        };

        flags.finish_run();
        outcome
    }

    fn configure<H, S, D>(
        &mut self,
        flags: &LinkFlags,
        hw: &mut H,
        sink: &mut S,
        delay: &mut D,
    ) -> LinkResult<()>
    where
        H: LinkHardware,
        S: PacketSink,
        D: DelayNs,
    {
        if !self.rev.rx_adaptation {
            self.cfg.autoneg = false;
        }
        if self.rev.forced_single_mode {
            self.cfg.autoneg = false;
            self.cfg.speed = Speed::Gbps1;
            self.cfg.duplex = Duplex::Full;
        }

        if self.cfg.speed == Speed::Unknown {
            // An unconfigured interface on lane 0 owns all four lanes;
            // on any other lane only single-lane speeds fit.
            self.cfg.speed = if self.cfg.lane == 0 {
                Speed::Gbps100
            } else {
                Speed::Gbps25
            };
        }
        if self.cfg.duplex == Duplex::Unknown {
            self.cfg.duplex = Duplex::Full;
        }

        if hw.retimer_present() {
            let first = usize::from(self.cfg.lane);
            for lane in first..first + usize::from(self.cfg.nb_lanes()) {
                hw.retimer_tx_enable(self.rtm.tx_channels[lane]);
            }
        }

        if self.cfg.autoneg && self.cfg.crossed_lanes {
            return Err(LinkError::Unsupported);
        }

        hw.mac_setup_link(&self.cfg, flags.restart_requested())?;

        if self.rev.revision == ChipRev::V2 {
            hw.tx_speed_settings(&self.cfg);
        }

        // Watch the link over a short window to avoid a false up.
        let mut waited = 0u32;
        while !hw.mac_link_up(&self.cfg) {
            if waited >= LINK_UP_POLL_WINDOW_US {
                return Err(LinkError::NoLink);
            }
            delay.delay_us(LINK_UP_POLL_STEP_US);
            waited += LINK_UP_POLL_STEP_US;
        }

        hw.start_tx();
        self.set_carrier(true, sink);

        if self.poll_en {
            self.poll_due_ms = Some(POST_LINK_UP_DELAY_MS);
        }
        if self.rev.link_down_irq {
            hw.enable_link_down_irq(self.cfg.lane_mask());
        }
        Ok(())
    }

    /// One monitoring step. On a healthy link the caller re-arms the
    /// poll; otherwise a reconfiguration request has been raised on
    /// `flags`.
    pub fn poll_link<H: LinkHardware>(&mut self, flags: &LinkFlags, hw: &mut H) -> PollVerdict {
        if self.carrier
            && hw.mac_link_up(&self.cfg)
            && (!hw.retimer_present() || self.cdr_locked(hw))
        {
            if self.poll_en {
                self.poll_due_ms = Some(LINK_RETRY_DELAY_MS);
            }
            return PollVerdict::Rearm;
        }
        #[cfg(feature = "defmt")]
        defmt::warn!(
            "link[{}]: monitor found the link unhealthy, reconfiguring",
            self.cfg.lane
        );
        flags.request(false);
        PollVerdict::Reconfigure
    }

    fn cdr_locked<H: LinkHardware>(&self, hw: &mut H) -> bool {
        let first = usize::from(self.cfg.lane);
        for lane in first..first + usize::from(self.cfg.nb_lanes()) {
            if !hw.retimer_cdr_locked(self.rtm.rx_channels[lane]) {
                return false;
            }
        }
        true
    }

    /// Take the interface down: disarm interrupts, cancel monitoring
    /// and any running job, quiesce transmit, drop carrier.
    pub fn down<H, S>(&mut self, flags: &LinkFlags, hw: &mut H, sink: &mut S)
    where
        H: LinkHardware,
        S: PacketSink,
    {
        if self.rev.link_down_irq {
            hw.disable_link_down_irq(self.cfg.lane_mask());
        }
        self.poll_due_ms = None;
        flags.cancel();

        hw.quiesce_tx();
        if hw.retimer_present() {
            for lane in usize::from(self.cfg.lane)..LANE_NB {
                hw.retimer_tx_disable(self.rtm.tx_channels[lane]);
            }
        }
        self.set_carrier(false, sink);
    }

    fn set_carrier<S: PacketSink>(&mut self, up: bool, sink: &mut S) {
        if self.carrier == up {
            return;
        }
        self.carrier = up;
        #[cfg(feature = "defmt")]
        if up {
            defmt::info!("link[{}]: up, {} Mb/s", self.cfg.lane, self.cfg.speed.mbps());
        } else {
            defmt::info!("link[{}]: down", self.cfg.lane);
        }
        sink.carrier_changed(up);
    }
}

// =============================================================================
// Link-down interrupt
// =============================================================================

/// Latched-interrupt register access for the link-down lines.
pub trait LinkIrqRegs {
    /// Read and clear the latched lane bits.
    fn latched(&mut self) -> u32;

    /// Currently enabled lane bits.
    fn enabled(&self) -> u32;

    /// Disable the given lane bits.
    fn disable(&mut self, mask: u32);

    /// Enable the given lane bits.
    fn enable(&mut self, mask: u32);
}

/// Shared link-down interrupt register block. Register access is
/// serialized against task context through a critical section.
pub struct LinkDownIrq<R: LinkIrqRegs> {
    regs: Mutex<RefCell<R>>,
}

impl<R: LinkIrqRegs> LinkDownIrq<R> {
    /// Wrap the register block.
    pub const fn new(regs: R) -> Self {
        Self {
            regs: Mutex::new(RefCell::new(regs)),
        }
    }

    /// Arm the lanes in `mask`.
    pub fn arm(&self, mask: u32) {
        critical_section::with(|cs| self.regs.borrow_ref_mut(cs).enable(mask));
    }

    /// Disarm the lanes in `mask`.
    pub fn disarm(&self, mask: u32) {
        critical_section::with(|cs| self.regs.borrow_ref_mut(cs).disable(mask));
    }

    /// Interrupt service routine. Reads the latched lanes, keeps only
    /// the enabled ones, disables everything raised, and flags a
    /// reconfiguration on every interface whose lanes fired. A SerDes
    /// restart is not requested: with autonegotiation it happens in
    /// the negotiation procedure, without it the speed is unchanged.
    ///
    /// Returns the lane bits acted on.
    pub fn handle_irq(&self, interfaces: &[(u32, &LinkFlags)]) -> u32 {
        critical_section::with(|cs| {
            let mut regs = self.regs.borrow_ref_mut(cs);
            let raised = regs.latched() & regs.enabled();
            if raised == 0 {
                return 0;
            }
            regs.disable(raised);
            for &(mask, flags) in interfaces {
                if mask & raised != 0 {
                    regs.disable(mask);
                    flags.request(false);
                }
            }
            raised
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
