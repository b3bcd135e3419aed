//! Touch strip frame simulator
//!
//! Emits six-channel sensor frames on stdout in the board's wire format so
//! the whole pipeline can run without hardware. Each gesture is a highpass
//! spike on press, a steady contact at the zone's position, and a negative
//! spike on lift; holds stay down past the hold window.
//!
//! # Usage
//! ```bash
//! touch-sim --gestures 20 --seed 7 | touchstrip --stdin
//! touch-sim --script tap-left,hold-right,tap-center --fast > capture.txt
//! ```

use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::io::{self, Write};
use std::str::FromStr;
use std::time::Duration;

use touchstrip::types::Zone;

// ============================================================================
// Sensor Constants
// ============================================================================

/// Untouched electrode reading (raw counts)
const BASELINE_COUNTS: f64 = 500.0;
/// Highpass sum of a clean press edge; lift is the negative
const EDGE_AMPLITUDE: f64 = 0.8;
/// Position channel of a finger resting in each zone, `ln(A) - ln(B)`
const LEFT_POSITION: f64 = 0.05;
const CENTER_POSITION: f64 = -0.15;
const RIGHT_POSITION: f64 = -0.35;
/// Jitter of the resting position
const POSITION_NOISE: f64 = 0.01;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "touch-sim")]
#[command(about = "Synthetic touch strip frames for touchstrip testing")]
#[command(version)]
struct Args {
    /// Frames per second
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u32).range(1..=2000))]
    rate_hz: u32,

    /// Number of random gestures (ignored with --script)
    #[arg(long, default_value = "10")]
    gestures: u32,

    /// Fixed gesture sequence, e.g. tap-left,hold-right,tap-center
    #[arg(long, value_delimiter = ',')]
    script: Vec<GestureSpec>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Standard deviation of highpass noise
    #[arg(long, default_value = "0.05")]
    noise: f64,

    /// Write frames as fast as possible instead of at --rate-hz
    #[arg(long)]
    fast: bool,

    /// Suppress the gesture log on stderr
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Gesture Script
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Tap,
    Hold,
}

#[derive(Debug, Clone, Copy)]
struct GestureSpec {
    kind: Kind,
    zone: Zone,
}

impl FromStr for GestureSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, zone) = s
            .split_once('-')
            .ok_or_else(|| format!("expected KIND-ZONE (e.g. tap-left), got '{s}'"))?;
        let kind = match kind {
            "tap" => Kind::Tap,
            "hold" => Kind::Hold,
            other => return Err(format!("unknown gesture kind '{other}'")),
        };
        let zone = Zone::ALL
            .into_iter()
            .find(|z| z.as_str() == zone)
            .ok_or_else(|| format!("unknown zone '{zone}'"))?;
        Ok(Self { kind, zone })
    }
}

fn zone_position(zone: Zone) -> f64 {
    match zone {
        Zone::Left => LEFT_POSITION,
        Zone::Center => CENTER_POSITION,
        Zone::Right => RIGHT_POSITION,
    }
}

// ============================================================================
// Frame Generator
// ============================================================================

struct FrameGenerator<W: Write> {
    rng: StdRng,
    out: W,
    highpass_noise: Normal<f64>,
    position_noise: Normal<f64>,
    interval: Duration,
    pace: bool,
    frames: u64,
}

impl<W: Write> FrameGenerator<W> {
    fn new(out: W, args: &Args) -> Result<Self, Box<dyn std::error::Error>> {
        let rng = match args.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            out,
            highpass_noise: Normal::new(0.0, args.noise)?,
            position_noise: Normal::new(0.0, POSITION_NOISE)?,
            interval: Duration::from_secs_f64(1.0 / f64::from(args.rate_hz)),
            pace: !args.fast,
            frames: 0,
        })
    }

    fn frames_for(&self, duration: Duration) -> u64 {
        ((duration.as_secs_f64() / self.interval.as_secs_f64()).ceil() as u64).max(1)
    }

    /// One frame with the given highpass sum and position.
    fn emit(&mut self, highpass_sum: f64, position: f64) -> io::Result<()> {
        let half = highpass_sum / 2.0;
        let hp_a = half + self.highpass_noise.sample(&mut self.rng);
        let hp_b = half + self.highpass_noise.sample(&mut self.rng);
        let electrode_b = BASELINE_COUNTS;
        let electrode_a = electrode_b * position.exp();
        let pressure = (electrode_a + electrode_b) / 2.0;

        writeln!(
            self.out,
            "{electrode_a:.3} {electrode_b:.3} {hp_a:.4} {hp_b:.4} {position:.4} {pressure:.3}"
        )?;
        self.out.flush()?;
        self.frames += 1;

        if self.pace {
            std::thread::sleep(self.interval);
        }
        Ok(())
    }

    fn idle(&mut self, duration: Duration) -> io::Result<()> {
        for _ in 0..self.frames_for(duration) {
            let position = self.position_noise.sample(&mut self.rng);
            self.emit(0.0, position)?;
        }
        Ok(())
    }

    fn gesture(&mut self, spec: GestureSpec) -> io::Result<Duration> {
        let contact = match spec.kind {
            Kind::Tap => Duration::from_millis(self.rng.gen_range(150..400)),
            Kind::Hold => Duration::from_millis(self.rng.gen_range(2500..3500)),
        };
        let base = zone_position(spec.zone);

        let press_position = base + self.position_noise.sample(&mut self.rng);
        self.emit(EDGE_AMPLITUDE, press_position)?;
        for _ in 0..self.frames_for(contact) {
            let position = base + self.position_noise.sample(&mut self.rng);
            self.emit(0.0, position)?;
        }
        let lift_position = base + self.position_noise.sample(&mut self.rng);
        self.emit(-EDGE_AMPLITUDE, lift_position)?;
        Ok(contact)
    }

    fn random_spec(&mut self) -> GestureSpec {
        let kind = if self.rng.gen_bool(0.3) { Kind::Hold } else { Kind::Tap };
        let zone = Zone::ALL[self.rng.gen_range(0..Zone::ALL.len())];
        GestureSpec { kind, zone }
    }
}

fn log_gesture(index: usize, spec: GestureSpec, contact: Duration, quiet: bool) {
    if !quiet {
        eprintln!(
            "[touch-sim] #{:<3} {:?}({}) contact {} ms",
            index + 1,
            spec.kind,
            spec.zone,
            contact.as_millis()
        );
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let stdout = io::stdout();
    let mut sim = FrameGenerator::new(stdout.lock(), &args)?;

    let specs: Vec<GestureSpec> = if args.script.is_empty() {
        (0..args.gestures).map(|_| sim.random_spec()).collect()
    } else {
        args.script.clone()
    };

    let result = (|| -> io::Result<()> {
        sim.idle(Duration::from_millis(500))?;
        for (i, spec) in specs.iter().enumerate() {
            let contact = sim.gesture(*spec)?;
            log_gesture(i, *spec, contact, args.quiet);
            let gap = Duration::from_millis(sim.rng.gen_range(500..1500));
            sim.idle(gap)?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {}
        // Downstream reader exited; nothing left to do
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Err(e) => return Err(e.into()),
    }

    if !args.quiet {
        eprintln!("[touch-sim] {} gestures, {} frames", specs.len(), sim.frames);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use touchstrip::gesture::{ClassifierParams, GestureClassifier};
    use touchstrip::types::GestureEvent;

    fn fast_args(seed: u64) -> Args {
        Args::parse_from(["touch-sim", "--fast", "--quiet", "--seed", &seed.to_string()])
    }

    /// Replays generated frames through the classifier on a synthetic clock.
    fn classify(frames: &str, rate_hz: u32) -> Vec<GestureEvent> {
        let mut classifier = GestureClassifier::new(ClassifierParams::default());
        let start = std::time::Instant::now();
        let step = Duration::from_secs_f64(1.0 / f64::from(rate_hz));
        frames
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                let sample = touchstrip::parse_frame(line).unwrap();
                classifier.process(&sample, start + step * i as u32)
            })
            .collect()
    }

    #[test]
    fn test_script_parsing() {
        let spec: GestureSpec = "hold-center".parse().unwrap();
        assert_eq!(spec.kind, Kind::Hold);
        assert_eq!(spec.zone, Zone::Center);
        assert!("tap".parse::<GestureSpec>().is_err());
        assert!("swipe-left".parse::<GestureSpec>().is_err());
        assert!("tap-middle".parse::<GestureSpec>().is_err());
    }

    #[test]
    fn test_generated_frames_classify_as_scripted() {
        let args = fast_args(42);
        let mut sim = FrameGenerator::new(Vec::new(), &args).unwrap();
        sim.idle(Duration::from_millis(200)).unwrap();
        for spec in ["tap-left", "hold-right", "tap-center"] {
            sim.gesture(spec.parse().unwrap()).unwrap();
            sim.idle(Duration::from_millis(300)).unwrap();
        }

        let frames = String::from_utf8(sim.out).unwrap();
        assert_eq!(
            classify(&frames, args.rate_hz),
            vec![
                GestureEvent::Tap(Zone::Left),
                GestureEvent::Release,
                GestureEvent::Tap(Zone::Right),
                GestureEvent::Hold(Zone::Right),
                GestureEvent::Tap(Zone::Center),
                GestureEvent::Release,
            ]
        );
    }
}
