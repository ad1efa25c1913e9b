// src/midi.rs

//! MIDI input: port enumeration, connection, and the control-change dispatch
//! table that drives the parameter store.
//!
//! The midir callback runs on its own thread. It only writes atomic
//! parameters; the render thread picks the changes up at its next block
//! boundary. Unrecognized controllers are logged and dropped, never fatal.

use crate::dsp::FilterMode;
use crate::params::{
    WahParams, MAX_BIAS, MAX_DECAY, MAX_RESONANCE, MIN_BIAS, MIN_DECAY, MIN_RESONANCE,
};
use anyhow::Result;
use log::{info, warn};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};

const APP_NAME: &str = "autowah";

// Controller assignments, matching the hardware controller layout.
pub const CC_FILTER_MODE: u8 = 20;
pub const CC_SENSITIVITY: u8 = 21;
pub const CC_BIAS: u8 = 22;
pub const CC_RESONANCE: u8 = 23;
pub const CC_DECAY: u8 = 24;
pub const CC_VOLUME: u8 = 25;

pub fn get_midi_ports() -> Result<Vec<(String, MidiInputPort)>> {
    let midi_in = MidiInput::new(APP_NAME)?;
    let ports = midi_in.ports();
    let mut result = Vec::with_capacity(ports.len());
    for port in ports.iter() {
        let name = midi_in.port_name(port)?;
        result.push((name, port.clone()));
    }
    Ok(result)
}

/// Opens a connection to the given port and routes control-change messages
/// into the parameter store. The returned connection must be kept alive for
/// the lifetime of the effect.
pub fn connect_midi(
    port: MidiInputPort,
    port_name: String,
    params: WahParams,
) -> Result<MidiInputConnection<()>> {
    let mut midi_in = MidiInput::new(APP_NAME)?;
    midi_in.ignore(Ignore::None);

    let in_port_name = midi_in.port_name(&port)?;
    println!("Opening MIDI connection to: {}", in_port_name);

    let conn = midi_in
        .connect(
            &port,
            &format!("autowah-midi-in-{}", port_name),
            move |_stamp, message, _| {
                if message.len() < 3 {
                    return;
                }
                let status = message[0] & 0xF0;
                // Control change only; channel is ignored, all messages are
                // treated uniformly.
                if status == 0xB0 {
                    handle_control_change(&params, message[1], message[2]);
                }
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("Failed to connect to MIDI port: {}", e))?;

    println!("Connection open to {}.", port_name);
    Ok(conn)
}

/// Applies one decoded control-change event to the parameter store.
pub fn handle_control_change(params: &WahParams, cc: u8, value: u8) {
    let norm = value as f32 / 127.0;
    match cc {
        CC_FILTER_MODE => {
            // Quantize the 0..1 range into the three filter buckets.
            params.set_mode(FilterMode::from((norm * 2.0 + 0.5) as u32));
        }
        CC_SENSITIVITY => params.set_sensitivity(norm),
        CC_BIAS => params.set_bias(MIN_BIAS + norm * (MAX_BIAS - MIN_BIAS)),
        CC_RESONANCE => {
            params.set_resonance(MIN_RESONANCE + norm * (MAX_RESONANCE - MIN_RESONANCE))
        }
        CC_DECAY => params.set_decay(MIN_DECAY + norm * (MAX_DECAY - MIN_DECAY)),
        CC_VOLUME => params.set_volume(norm),
        other => {
            warn!("received unexpected MIDI CC {} (value {})", other, value);
            return;
        }
    }
    info!(
        "vol: {:.2} filter_mode: {:?} sensitivity: {:.3} bias: {:.1} resonance: {:.2} decay: {:.2}",
        params.volume(),
        params.mode(),
        params.sensitivity(),
        params.bias(),
        params.resonance(),
        params.decay(),
    );
}
