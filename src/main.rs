mod audio_device;
mod audio_io;
mod dsp;
mod midi;
mod params;
mod settings;
mod wah;

use crate::params::WahParams;
use anyhow::Result;
use cpal::traits::HostTrait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    if let Some(flag) = args.next() {
        match flag.as_str() {
            "--list-devices" => return list_devices(),
            "--list-midi" => return list_midi_ports(),
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                print_usage();
                return Err(anyhow::anyhow!("Unknown argument: {}", other));
            }
        }
    }

    let app_settings = settings::load_settings();
    let host = audio_device::resolve_host(app_settings.host_name.as_deref());
    println!("Using audio host: {}", host.id().name());

    let params = WahParams::default();

    // Keep the connection alive for the lifetime of the process; dropping it
    // closes the port.
    let _midi_connection = match find_midi_port(app_settings.midi_port_name.as_deref())? {
        Some((name, port)) => Some(midi::connect_midi(port, name, params.clone())?),
        None => {
            log::warn!("No MIDI input port available; running without live control.");
            None
        }
    };

    let xrun_count = Arc::new(AtomicUsize::new(0));
    let (_input_stream, _output_stream, sample_rate, buffer_size) =
        audio_io::init_and_run_streams(
            &host,
            app_settings.input_device.clone(),
            app_settings.output_device.clone(),
            app_settings.sample_rate,
            app_settings.buffer_size,
            app_settings.input_latency_compensation_ms,
            params,
            xrun_count.clone(),
        )?;

    settings::save_settings(&app_settings);
    log::info!(
        "autowah running at {} Hz (block size {}). Press Ctrl+C to stop.",
        sample_rate,
        buffer_size
    );

    let mut reported_xruns = 0;
    loop {
        thread::sleep(Duration::from_secs(5));
        let xruns = xrun_count.load(Ordering::Relaxed);
        if xruns > reported_xruns {
            log::warn!("{} stream errors since startup", xruns);
            reported_xruns = xruns;
        }
    }
}

fn find_midi_port(
    configured: Option<&str>,
) -> Result<Option<(String, midir::MidiInputPort)>> {
    Ok(select_midi_port(midi::get_midi_ports()?, configured))
}

/// Picks the configured port if present, otherwise falls back to the first
/// available one.
fn select_midi_port<P>(ports: Vec<(String, P)>, configured: Option<&str>) -> Option<(String, P)> {
    if let Some(wanted) = configured {
        if let Some(pos) = ports.iter().position(|(name, _)| name == wanted) {
            return ports.into_iter().nth(pos);
        }
        if let Some((fallback, _)) = ports.first() {
            log::warn!(
                "Configured MIDI port '{}' not found, using '{}' instead.",
                wanted,
                fallback
            );
        }
    }
    ports.into_iter().next()
}

fn list_devices() -> Result<()> {
    for host_id in cpal::available_hosts() {
        println!("Host: {}", host_id.name());
        for (name, _) in audio_device::get_input_devices(host_id)? {
            println!("  in:  {}", name);
        }
        for (name, _) in audio_device::get_output_devices(host_id)? {
            println!("  out: {}", name);
        }
    }
    Ok(())
}

fn list_midi_ports() -> Result<()> {
    let ports = midi::get_midi_ports()?;
    if ports.is_empty() {
        println!("No MIDI input ports found.");
    }
    for (name, _) in ports {
        println!("midi in: {}", name);
    }
    Ok(())
}

fn print_usage() {
    println!("autowah - envelope-triggered wah filter with MIDI control");
    println!();
    println!("Usage: autowah [--list-devices | --list-midi]");
    println!();
    println!("Device, MIDI port and stream options are read from autowah.json");
    println!("next to the executable.");
}
