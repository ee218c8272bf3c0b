//! Minimal driving loop: run a sinus-rhythm patient for thirty seconds,
//! switch to ventricular fibrillation, deliver a shock and print every
//! derived vital as it arrives.
//!
//! ```sh
//! cargo run --example basic_monitor
//! ```

use vitalsim_core::sim::TICK_SECONDS;
use vitalsim_core::{
    MeasurementChannel, MonitorSim, Pathology, SimConfig, SimError, VitalsObserver,
};

struct ConsoleVitals;

impl VitalsObserver for ConsoleVitals {
    fn on_measurement(&mut self, channel: MeasurementChannel, value: i32) {
        println!("  [{:>5}] {}", channel.label(), value);
    }
}

fn main() -> Result<(), SimError> {
    let config = SimConfig::from_pathology(&Pathology::SinusRhythm);
    let mut sim = MonitorSim::with_seed(config, 42)?;
    sim.add_observer(Box::new(ConsoleVitals));

    println!("-- sinus rhythm, 30 s --");
    run_seconds(&mut sim, 30.0)?;

    println!("-- ventricular fibrillation, 20 s --");
    let mut vfib = SimConfig::from_pathology(&Pathology::VentricularFibrillation);
    vfib.touch();
    sim.apply_config(vfib, true);
    run_seconds(&mut sim, 20.0)?;

    println!("-- shock, then back to sinus --");
    sim.request_shock();
    let mut sinus = SimConfig::from_pathology(&Pathology::SinusRhythm);
    sinus.touch();
    sim.apply_config(sinus, true);
    run_seconds(&mut sim, 10.0)?;

    Ok(())
}

fn run_seconds(sim: &mut MonitorSim, seconds: f64) -> Result<(), SimError> {
    let ticks = (seconds / TICK_SECONDS) as usize;
    for n in 0..ticks {
        let sample = sim.tick(TICK_SECONDS)?;
        // Print one waveform line per second.
        if n % 50 == 0 {
            println!(
                "t={:>5.1}s  ecg {:+.3} mV  pleth {:6.1}  co2 {:5.1} mmHg",
                n as f64 * TICK_SECONDS,
                sample.ecg,
                sample.pleth,
                sample.capno
            );
        }
    }
    Ok(())
}
