//! Step-pulse outputs on RP2040 PWM slices.
//!
//! Each channel is one PWM slice running a fixed-frequency square wave; one period is one step
//! pulse. All slices raise the same `PWM_IRQ_WRAP` interrupt, which is why the sequencer has to
//! tell the active channel's wraps from everyone else's.
//! - Clock-independent: computes the divider from clk_sys so one tick ≈ 1 µs
//! - Arming clears a stale wrap flag so the first counted pulse is a whole one

use defmt::info;
use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::pac;
use embassy_rp::pwm::{Config, Pwm};

use crate::channel_sequencer::{ChannelId, PulseOutput};
use crate::shared_sequencer::SharedSequencer;

struct StepSlice {
    pwm: Pwm<'static>,
    slice: usize,
}

/// The step outputs of all channels. Slices are attached at runtime with [`PwmPulses::attach`],
/// so the whole sequencer can live in a `static` the interrupt handler can reach.
pub struct PwmPulses<const N: usize> {
    frequency_hz: u32,
    config: Option<Config>,
    slices: [Option<StepSlice>; N],
}

impl<const N: usize> PwmPulses<N> {
    #[must_use]
    pub const fn new(frequency_hz: u32) -> Self {
        Self {
            frequency_hz,
            config: None,
            slices: [const { None }; N],
        }
    }

    /// Drive `channel` from `pwm`, which must be PWM slice number `slice`.
    /// e.g.: `attach(ChannelId::new(0), Pwm::new_output_a(p.PWM_SLICE1, p.PIN_2, Config::default()), 1)`
    pub fn attach(&mut self, channel: ChannelId, mut pwm: Pwm<'static>, slice: usize) {
        let config = self
            .config
            .get_or_insert_with(|| step_config(self.frequency_hz))
            .clone();
        let mut stopped = config;
        stopped.enable = false;
        pwm.set_config(&stopped);
        pwm.clear_wrapped();
        set_wrap_interrupt(slice, false);

        if let Some(entry) = self.slices.get_mut(channel.index()) {
            *entry = Some(StepSlice { pwm, slice });
        }
    }

    /// Consume the wrap flag of `channel`'s slice.
    fn take_wrap(&mut self, channel: ChannelId) -> bool {
        let Some(Some(step)) = self.slices.get_mut(channel.index()) else {
            return false;
        };
        if step.pwm.wrapped() {
            step.pwm.clear_wrapped();
            true
        } else {
            false
        }
    }

    fn set_running(&mut self, channel: ChannelId, running: bool) {
        let Some(mut config) = self.config.clone() else {
            return;
        };
        let Some(Some(step)) = self.slices.get_mut(channel.index()) else {
            return;
        };
        config.enable = running;
        if running {
            step.pwm.set_counter(0);
            step.pwm.clear_wrapped();
        }
        set_wrap_interrupt(step.slice, running);
        step.pwm.set_config(&config);
        if !running {
            step.pwm.clear_wrapped();
        }
    }
}

impl<const N: usize> PulseOutput for PwmPulses<N> {
    fn arm(&mut self, channel: ChannelId) {
        self.set_running(channel, true);
    }

    fn disarm(&mut self, channel: ChannelId) {
        self.set_running(channel, false);
    }
}

/// Body of the `PWM_IRQ_WRAP` handler: count one pulse per wrapped slice.
pub fn on_wrap_interrupt<const N: usize>(sequencer: &SharedSequencer<PwmPulses<N>, N>) {
    sequencer.with(|sequencer| {
        for channel in ChannelId::all::<N>() {
            if sequencer.output_mut().take_wrap(channel) {
                sequencer.on_pulse_complete(channel);
            }
        }
    });
}

fn set_wrap_interrupt(slice: usize, enabled: bool) {
    pac::PWM.inte().modify(|w| w.set_ch(slice, enabled));
}

/// 50 % duty square wave at `frequency_hz`, output disabled.
#[expect(
    clippy::cast_possible_truncation,
    reason = "values are clamped before narrowing"
)]
fn step_config(frequency_hz: u32) -> Config {
    let clk = u64::from(clk_sys_freq());
    // Aim for tick ≈ 1 µs: divider = clk_sys / 1_000_000
    let div_int = (clk / 1_000_000).clamp(1, 255) as u8;
    let period_ticks = 1_000_000_u64
        .checked_div(u64::from(frequency_hz))
        .unwrap_or(65_536)
        .clamp(2, 65_536);
    let top = period_ticks.saturating_sub(1) as u16;
    let half = (period_ticks / 2) as u16;

    let mut config = Config::default();
    config.top = top;
    config.phase_correct = false;
    config.divider = div_int.into();
    config.compare_a = half;
    config.compare_b = half;
    config.enable = false;

    info!(
        "step pwm clk={}Hz div={} top={} ({}Hz)",
        clk, div_int, top, frequency_hz
    );
    config
}
