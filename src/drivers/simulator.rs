use std::f64::consts::TAU;
use std::io;
use std::time::{Duration, Instant};
use rand::{rngs::StdRng, Rng, SeedableRng};
use crate::drivers::line::INIT_COMPLETE;
use crate::drivers::source::{LineSource, PortOpener};
use crate::drivers::AcquisitionError;
/// Longest a single read blocks while the simulated self-test runs.
const BOOT_POLL: Duration = Duration::from_millis(10);
const NOISE_CODES: i64 = 6;
/// Speaks the device's wire protocol without hardware: a silent self-test,
/// `INIT_COMPLETE`, then round-robin `t,ch,code` lines at the sample rate.
///
/// Each channel is pressed and released on its own slow cycle; the unloaded
/// half of the cycle reads as 0 like a real FSR.
pub struct SimulatedDevice {
    rng: StdRng,
    num_channels: usize,
    period: Duration,
    boot_delay: Duration,
    opened: Instant,
    booted: bool,
    paced: bool,
    channel: usize,
    t_ms: i64,
}
impl SimulatedDevice {
    pub fn new(num_channels: usize, sample_rate_hz: u32, boot_delay: Duration) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            num_channels: num_channels.max(1),
            period: Duration::from_secs_f64(1.0 / f64::from(sample_rate_hz.max(1))),
            boot_delay,
            opened: Instant::now(),
            booted: false,
            paced: true,
            channel: 0,
            t_ms: 0,
        }
    }
    /// Reproducible noise.
    #[cfg(test)]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
    /// Emits lines as fast as they are read instead of in real time.
    #[cfg(test)]
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }
    fn next_code(&mut self) -> i64 {
        let cycle_ms = 4000.0 + 1500.0 * self.channel as f64;
        let phase = TAU * (self.t_ms as f64 / cycle_ms) + self.channel as f64;
        let load = phase.sin().max(0.0);
        let noise = self.rng.gen_range(-NOISE_CODES..=NOISE_CODES);
        if load == 0.0 {
            return 0;
        }
        ((load * 900.0) as i64 + noise).clamp(0, 1023)
    }
}
impl LineSource for SimulatedDevice {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if !self.booted {
            let elapsed = self.opened.elapsed();
            if elapsed < self.boot_delay {
                if self.paced {
                    std::thread::sleep(BOOT_POLL.min(self.boot_delay - elapsed));
                }
                return Ok(None);
            }
            self.booted = true;
            return Ok(Some(format!("{INIT_COMPLETE}\r\n").into_bytes()));
        }
        let code = self.next_code();
        let line = format!("{},{},{}\r\n", self.t_ms, self.channel, code);
        self.channel += 1;
        if self.channel == self.num_channels {
            self.channel = 0;
            self.t_ms += self.period.as_millis().max(1) as i64;
            if self.paced {
                std::thread::sleep(self.period);
            }
        }
        Ok(Some(line.into_bytes()))
    }
}
/// Hands out a fresh [`SimulatedDevice`] on every open.
pub struct SimulatedOpener {
    num_channels: usize,
    sample_rate_hz: u32,
    boot_delay: Duration,
}
impl SimulatedOpener {
    pub fn new(num_channels: usize, sample_rate_hz: u32, boot_delay: Duration) -> Self {
        Self {
            num_channels,
            sample_rate_hz,
            boot_delay,
        }
    }
}
impl PortOpener for SimulatedOpener {
    fn port_name(&self) -> &str {
        "SIM"
    }
    fn open(&mut self) -> Result<Box<dyn LineSource + Send>, AcquisitionError> {
        Ok(Box::new(SimulatedDevice::new(
            self.num_channels,
            self.sample_rate_hz,
            self.boot_delay,
        )))
    }
}
