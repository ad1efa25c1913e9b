use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct AppSettings {
    pub host_name: Option<String>,
    pub midi_port_name: Option<String>,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub sample_rate: Option<u32>,
    pub buffer_size: Option<u32>,
    pub input_latency_compensation_ms: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host_name: None,
            midi_port_name: None,
            input_device: None,
            output_device: None,
            sample_rate: None,
            buffer_size: None,
            input_latency_compensation_ms: 5.0, // Default to 5ms safety buffer
        }
    }
}

fn settings_path() -> Option<PathBuf> {
    match env::current_exe() {
        Ok(exe_path) => exe_path.parent().map(|dir| dir.join("autowah.json")),
        Err(_) => {
            eprintln!("Could not determine application directory.");
            None
        }
    }
}

pub fn save_settings(settings: &AppSettings) {
    if let Some(path) = settings_path() {
        match serde_json::to_string_pretty(settings) {
            Ok(json_string) => {
                if let Err(e) = fs::write(&path, json_string) {
                    eprintln!("Failed to write settings to {}: {}", path.display(), e);
                }
            }
            Err(e) => {
                eprintln!("Failed to serialize settings: {}", e);
            }
        }
    }
}

pub fn load_settings() -> AppSettings {
    if let Some(path) = settings_path() {
        if path.exists() {
            return match fs::read_to_string(&path) {
                Ok(json_string) => match serde_json::from_str(&json_string) {
                    Ok(settings) => settings,
                    Err(e) => {
                        eprintln!("Failed to parse settings file, using defaults. Error: {}", e);
                        AppSettings::default()
                    }
                },
                Err(e) => {
                    eprintln!("Failed to read settings file, using defaults. Error: {}", e);
                    AppSettings::default()
                }
            };
        }
    }
    AppSettings::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_device_selection_open() {
        let settings = AppSettings::default();
        assert!(settings.host_name.is_none());
        assert!(settings.midi_port_name.is_none());
        assert!(settings.sample_rate.is_none());
        assert!((settings.input_latency_compensation_ms - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_settings_files_fill_in_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{ "midi_port_name": "hw:1,0,0" }"#).unwrap();
        assert_eq!(settings.midi_port_name.as_deref(), Some("hw:1,0,0"));
        assert!(settings.input_device.is_none());
        assert!((settings.input_latency_compensation_ms - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn settings_round_trip_through_json() {
        let mut settings = AppSettings::default();
        settings.output_device = Some("Speakers".to_string());
        settings.sample_rate = Some(48000);
        let json = serde_json::to_string_pretty(&settings).unwrap();
        let back: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.output_device.as_deref(), Some("Speakers"));
        assert_eq!(back.sample_rate, Some(48000));
    }
}
