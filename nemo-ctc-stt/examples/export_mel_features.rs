//! Export log-mel features from a WAV file for comparison with NeMo
//!
//! Writes frame-major features (one frame per row) to CSV. With a third
//! argument, per-band statistics of the un-normalized log-mel are written as a
//! global normalization stats JSON.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example export_mel_features -- <audio.wav> <out.csv> [stats.json]
//! ```

use anyhow::{bail, Context, Result};
use nemo_ctc_features::{AudioBuffer, FeatureConfig, FeatureExtractor, NormalizationStats};
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{info, Level};

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("Usage: {} <audio.wav> <out.csv> [stats.json]", args[0]);
    }
    let (audio_file, output_csv) = (&args[1], &args[2]);

    let mut reader = hound::WavReader::open(audio_file)
        .with_context(|| format!("Failed to open {}", audio_file))?;
    let spec = reader.spec();
    if spec.channels != 1
        || spec.sample_format != hound::SampleFormat::Int
        || spec.bits_per_sample != 16
    {
        bail!("Expected 16-bit mono PCM, got {:?}", spec);
    }
    let pcm: Vec<i16> = reader.samples::<i16>().collect::<std::result::Result<_, _>>()?;
    let audio = AudioBuffer::from_i16(&pcm, spec.sample_rate);
    info!("Loaded {} samples ({:.2}s)", audio.len(), audio.duration_secs());

    let config = FeatureConfig {
        dither: 0.0,
        ..Default::default()
    };
    let mut extractor = FeatureExtractor::new(config)?;

    let log_mel = extractor.log_mel(audio.samples())?;
    let features = extractor.extract(&audio)?;
    info!(
        "Extracted features: {} bands x {} frames",
        features.n_mels(),
        features.frame_count()
    );

    let mut out = BufWriter::new(File::create(output_csv)?);
    for frame in features.to_frame_major().rows() {
        let line: Vec<String> = frame.iter().map(|v| format!("{:.6}", v)).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    out.flush()?;
    info!("Wrote {}", output_csv);

    if let Some(stats_path) = args.get(3) {
        let stats = NormalizationStats::from_frames(&log_mel)?;
        stats.save(stats_path)?;
        info!(
            "Wrote stats over {} frames to {}",
            stats.frame_count(),
            stats_path
        );
    }

    Ok(())
}
