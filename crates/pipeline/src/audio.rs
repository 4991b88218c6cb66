use std::io::{Cursor, Read, Write};
use std::process::{Command, Stdio};

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::AudioBuffer;

/// Decodes an uploaded audio file into mono PCM at the pipeline's sample rate.
///
/// WAV input (16-bit int or 32-bit float, any rate, any channel count) is
/// decoded in-process. Anything else is handed to ffmpeg, which decodes to
/// raw f32le through a scoped temp file. Fails with `UnsupportedFormat` when
/// neither path can make sense of the bytes and `EmptyAudio` when decoding
/// yields zero samples.
pub fn decode_audio(bytes: &[u8], config: &PipelineConfig) -> Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyAudio);
    }

    let buffer = if bytes.starts_with(b"RIFF") {
        decode_wav(bytes, config.target_sample_rate)?
    } else {
        decode_via_ffmpeg(bytes, config)?
    };

    if buffer.is_empty() {
        return Err(PipelineError::EmptyAudio);
    }

    debug!(
        samples = buffer.samples.len(),
        duration_ms = buffer.duration_ms(),
        "Audio decoded"
    );
    Ok(buffer)
}

/// Decodes WAV bytes and resamples to `target_rate` mono.
fn decode_wav(bytes: &[u8], target_rate: u32) -> Result<AudioBuffer> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::UnsupportedFormat(format!("WAV decode: {e}")))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(PipelineError::UnsupportedFormat(
            "WAV declares zero channels".to_string(),
        ));
    }
    let sample_rate = spec.sample_rate;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.unwrap_or(0) as f32 / max_val)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.unwrap_or(0.0))
            .collect(),
    };

    let mono = downmix(samples, channels);

    if sample_rate != target_rate && !mono.is_empty() {
        let resampled = resample(&mono, sample_rate, target_rate)
            .map_err(|e| PipelineError::UnsupportedFormat(format!("resample: {e}")))?;
        Ok(AudioBuffer {
            samples: resampled,
            sample_rate: target_rate,
        })
    } else {
        Ok(AudioBuffer {
            samples: mono,
            sample_rate: target_rate,
        })
    }
}

fn downmix(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    }
}

/// Decodes an arbitrary container by shelling out to ffmpeg.
///
/// The input goes through a named temp file (ffmpeg needs a seekable input
/// for many containers); the file is removed when the handle drops, on every
/// exit path.
fn decode_via_ffmpeg(bytes: &[u8], config: &PipelineConfig) -> Result<AudioBuffer> {
    let ffmpeg = config.ffmpeg_path.as_deref().unwrap_or("ffmpeg");

    let mut input = tempfile::NamedTempFile::new()
        .map_err(|e| PipelineError::UnsupportedFormat(format!("temp file: {e}")))?;
    input
        .write_all(bytes)
        .map_err(|e| PipelineError::UnsupportedFormat(format!("temp file write: {e}")))?;

    let mut child = Command::new(ffmpeg)
        .arg("-i")
        .arg(input.path())
        .arg("-f")
        .arg("f32le")
        .arg("-acodec")
        .arg("pcm_f32le")
        .arg("-ar")
        .arg(config.target_sample_rate.to_string())
        .arg("-ac")
        .arg("1")
        .arg("-")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            warn!("ffmpeg not runnable: {e}");
            PipelineError::UnsupportedFormat(format!("ffmpeg unavailable: {e}"))
        })?;

    let mut raw = Vec::new();
    if let Some(stdout) = child.stdout.as_mut() {
        stdout
            .read_to_end(&mut raw)
            .map_err(|e| PipelineError::UnsupportedFormat(format!("ffmpeg read: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| PipelineError::UnsupportedFormat(format!("ffmpeg wait: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr.lines().last().unwrap_or("unknown error");
        return Err(PipelineError::UnsupportedFormat(format!(
            "ffmpeg decode failed: {tail}"
        )));
    }

    let samples: Vec<f32> = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(AudioBuffer {
        samples,
        sample_rate: config.target_sample_rate,
    })
}

/// Resamples mono audio between rates using sinc interpolation.
fn resample(audio: &[f32], src_rate: u32, dst_rate: u32) -> anyhow::Result<Vec<f32>> {
    let ratio = dst_rate as f64 / src_rate as f64;
    let chunk_size = 1024;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| anyhow::anyhow!("Failed to create resampler: {e}"))?;

    let mut output = Vec::with_capacity((audio.len() as f64 * ratio) as usize + 1024);

    for chunk in audio.chunks(chunk_size) {
        // The fixed-input resampler wants full chunks; zero-pad the tail.
        let input = if chunk.len() < chunk_size {
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            padded
        } else {
            chunk.to_vec()
        };

        let mut channels = resampler
            .process(&[input], None)
            .map_err(|e| anyhow::anyhow!("Resample error: {e}"))?;
        if let Some(channel) = channels.pop() {
            output.extend(channel);
        }
    }

    // Trim zero-padding artifacts
    let expected_len = (audio.len() as f64 * ratio) as usize;
    output.truncate(expected_len);

    Ok(output)
}

/// Encodes a sample slice as 16-bit WAV bytes (for snippets and remote ASR).
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * 32767.0) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
