// src/audio_io.rs

use crate::params::WahParams;
use crate::wah::WahEngine;
use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, FromSample, Host, Sample, SampleFormat, Stream, StreamConfig};
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Capacity of the input-to-output transfer queue, in samples.
const RING_BUFFER_CAPACITY: usize = 1 << 15;

pub fn init_and_run_streams(
    host: &Host,
    input_device_name: Option<String>,
    output_device_name: Option<String>,
    requested_sample_rate: Option<u32>,
    requested_buffer_size: Option<u32>,
    input_latency_ms: f32,
    params: WahParams,
    xrun_count: Arc<AtomicUsize>,
) -> Result<(Stream, Stream, u32, u32)> {
    let input_device = if let Some(name) = &input_device_name {
        host.input_devices()?
            .find(|d| d.name().ok().as_ref() == Some(name))
            .ok_or_else(|| anyhow::anyhow!("Input device not found: {}", name))?
    } else {
        host.default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No default input device"))?
    };
    let output_device = if let Some(name) = &output_device_name {
        host.output_devices()?
            .find(|d| d.name().ok().as_ref() == Some(name))
            .ok_or_else(|| anyhow::anyhow!("Output device not found: {}", name))?
    } else {
        host.default_output_device()
            .ok_or_else(|| anyhow::anyhow!("No default output device"))?
    };
    println!("Using input device: {}", input_device.name()?);
    println!("Using output device: {}", output_device.name()?);

    let default_input_config = input_device.default_input_config()?;
    let default_output_config = output_device.default_output_config()?;

    let sample_format = default_output_config.sample_format();

    let mut final_input_config: StreamConfig = default_input_config.into();
    if let Some(sr) = requested_sample_rate {
        final_input_config.sample_rate = cpal::SampleRate(sr);
    }
    if let Some(bs) = requested_buffer_size {
        final_input_config.buffer_size = BufferSize::Fixed(bs);
    }

    let mut final_output_config: StreamConfig = default_output_config.into();
    if let Some(sr) = requested_sample_rate {
        final_output_config.sample_rate = cpal::SampleRate(sr);
    }
    if let Some(bs) = requested_buffer_size {
        final_output_config.buffer_size = BufferSize::Fixed(bs);
    }

    // The sample rate is discovered here, once; the engine is built for it
    // and it never changes for the life of the streams.
    let sample_rate = final_output_config.sample_rate.0;
    let engine = WahEngine::new(sample_rate as f32, params);

    let (producer, consumer) = HeapRb::<f32>::new(RING_BUFFER_CAPACITY).split();
    let latency_samples = (input_latency_ms / 1000.0 * sample_rate as f32).round() as usize;

    fn run<T>(
        input_device: &Device,
        input_config: &StreamConfig,
        output_device: &Device,
        output_config: &StreamConfig,
        producer: HeapProducer<f32>,
        consumer: HeapConsumer<f32>,
        engine: WahEngine,
        latency_samples: usize,
        xrun_count: Arc<AtomicUsize>,
    ) -> Result<(Stream, Stream)>
    where
        T: Sample + cpal::SizedSample + FromSample<f32>,
        f32: FromSample<T>,
    {
        let input_stream =
            build_input_stream::<T>(input_device, input_config, producer, xrun_count.clone())?;
        let output_stream = build_output_stream::<T>(
            output_device,
            output_config,
            consumer,
            engine,
            latency_samples,
            xrun_count,
        )?;
        input_stream.play()?;
        output_stream.play()?;
        Ok((input_stream, output_stream))
    }

    let (input_stream, output_stream) = match sample_format {
        SampleFormat::F32 => run::<f32>(
            &input_device,
            &final_input_config,
            &output_device,
            &final_output_config,
            producer,
            consumer,
            engine,
            latency_samples,
            xrun_count,
        )?,
        SampleFormat::I16 => run::<i16>(
            &input_device,
            &final_input_config,
            &output_device,
            &final_output_config,
            producer,
            consumer,
            engine,
            latency_samples,
            xrun_count,
        )?,
        SampleFormat::U16 => run::<u16>(
            &input_device,
            &final_input_config,
            &output_device,
            &final_output_config,
            producer,
            consumer,
            engine,
            latency_samples,
            xrun_count,
        )?,
        format => return Err(anyhow::anyhow!("Unsupported sample format {}", format)),
    };

    let active_bs = match final_output_config.buffer_size {
        BufferSize::Fixed(size) => size,
        BufferSize::Default => 512, // A reasonable assumption if default
    };

    println!(
        "Successfully started streams with Sample Rate: {} Hz, Buffer Size: {} Samples",
        sample_rate, active_bs
    );

    Ok((input_stream, output_stream, sample_rate, active_bs))
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: HeapProducer<f32>,
    xrun_count: Arc<AtomicUsize>,
) -> Result<Stream>
where
    T: Sample + cpal::SizedSample,
    f32: FromSample<T>,
{
    let err_fn = {
        let xrun_count_clone = xrun_count.clone();
        move |err| {
            log::error!("an error occurred on input stream: {}", err);
            xrun_count_clone.fetch_add(1, Ordering::Relaxed);
        }
    };
    let channels = config.channels as usize;

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels) {
                // Mono downmix by summation, not averaging: the gate
                // threshold is tuned against the summed amplitude.
                let mono_sample = frame.iter().map(|s| f32::from_sample(*s)).sum::<f32>();
                if producer.push(mono_sample).is_err() {
                    // buffer full, drop sample
                }
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: HeapConsumer<f32>,
    mut engine: WahEngine,
    latency_samples: usize,
    xrun_count: Arc<AtomicUsize>,
) -> Result<Stream>
where
    T: Sample + cpal::SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let err_fn = {
        let xrun_count_clone = xrun_count.clone();
        move |err| {
            log::error!("an error occurred on output stream: {}", err);
            xrun_count_clone.fetch_add(1, Ordering::Relaxed);
        }
    };
    let mut mono_buffer: Vec<f32> = vec![];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let num_samples = data.len() / channels;
            mono_buffer.resize(num_samples, 0.0);

            // If the queue has grown past the latency safety buffer, drain
            // the excess so input-to-output delay stays bounded.
            if consumer.len() > latency_samples + num_samples {
                consumer.skip(consumer.len() - latency_samples - num_samples);
            }

            let samples_read = consumer.pop_slice(&mut mono_buffer);
            if samples_read < num_samples {
                mono_buffer[samples_read..].iter_mut().for_each(|s| *s = 0.0);
            }

            engine.process_block(&mut mono_buffer);

            for (i, frame) in data.chunks_mut(channels).enumerate() {
                let sample_value = mono_buffer.get(i).copied().unwrap_or(0.0);
                for sample in frame.iter_mut() {
                    *sample = T::from_sample(sample_value);
                }
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}
