//! Transcribe a 16 kHz WAV file with a NeMo CTC model
//!
//! Usage: cargo run --release --example transcribe_wav -- <config.toml> <audio_file.wav>

use anyhow::{bail, Context, Result};
use nemo_ctc_stt::{AudioBuffer, CtcRecognizer, SttConfig};
use std::env;
use tracing::{info, Level};

/// Read a WAV file as mono f32, averaging channels
fn load_wav(path: &str) -> Result<AudioBuffer> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("Failed to open {}", path))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok(AudioBuffer::new(mono, spec.sample_rate))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("Usage: {} <config.toml> <audio_file.wav>", args[0]);
    }

    let config = SttConfig::load(&args[1])?;
    let audio = load_wav(&args[2])?;
    if audio.sample_rate() != config.features.sample_rate {
        bail!(
            "{} is {} Hz; resample to {} Hz first",
            args[2],
            audio.sample_rate(),
            config.features.sample_rate
        );
    }
    info!(
        "Transcribing {} ({:.2}s)",
        args[2],
        audio.duration_secs()
    );

    let mut recognizer = CtcRecognizer::from_config(&config)?;
    let result = recognizer.recognize(&audio)?;

    info!(
        "{} feature frames, {} encoder frames, {} tokens, avg confidence {:.3}",
        result.feature_frames,
        result.encoded_frames,
        result.token_ids.len(),
        result.avg_confidence
    );
    if result.out_of_range > 0 {
        info!("{} token ids were outside the vocabulary", result.out_of_range);
    }
    info!("Processing time: {:.2}ms", result.processing_time_ms);
    println!("{}", result.text);

    Ok(())
}
