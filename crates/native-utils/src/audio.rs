use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::io::Cursor;

/// Sample rate the transcription service is fed with.
pub const TRANSCRIPTION_SAMPLE_RATE: u32 = 16_000;

const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits samples into fixed-size chunks, zero-padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Creates a new ring buffer on the heap for shared audio data.
pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Averages interleaved frames down to one channel.
pub fn to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / c.len() as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

/// Root-mean-square level of a block of samples; `0.0` for an empty block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let power = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    power.sqrt()
}

/// Converts a mono recording from `from_rate` to `to_rate`.
///
/// The output is trimmed to the expected length, so the zero padding of the
/// last chunk does not show up as trailing silence.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> anyhow::Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = create_resampler(from_rate as f64, to_rate as f64, RESAMPLE_CHUNK_SIZE)?;
    let chunk_size = resampler.input_frames_next();

    let mut out = Vec::with_capacity(samples.len() * to_rate as usize / from_rate as usize + 1);
    for chunk in split_for_chunks(samples, chunk_size) {
        let resamples = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(resamples) = resamples.first() {
            out.extend_from_slice(resamples);
        }
    }

    let expected = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    out.truncate(expected);
    Ok(out)
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Encodes mono samples as a 16-bit PCM WAV file held in memory.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in convert_f32_to_i16(samples) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_pads_last_chunk() {
        let chunks = split_for_chunks(&[1.0, 2.0, 3.0], 2);
        assert_eq!(chunks, vec![vec![1.0, 2.0], vec![3.0, 0.0]]);
    }

    #[test]
    fn stereo_frames_are_averaged() {
        assert_eq!(to_mono(&[0.5, -0.5, 1.0, 0.0], 2), vec![0.0, 0.5]);
        assert_eq!(to_mono(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert!((rms(&[-0.5, 0.5]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn i16_conversion_clamps() {
        assert_eq!(convert_f32_to_i16(&[0.0, 2.0, -2.0]), vec![0, i16::MAX, i16::MIN]);
    }

    #[test]
    fn resampling_halves_length() -> anyhow::Result<()> {
        let input: Vec<f32> = (0..32_000).map(|i| (i as f32 / 40.0).sin() * 0.3).collect();
        let output = resample(&input, 32_000, TRANSCRIPTION_SAMPLE_RATE)?;
        assert_eq!(output.len(), 16_000);
        Ok(())
    }

    #[test]
    fn same_rate_is_passthrough() -> anyhow::Result<()> {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000)?, input);
        Ok(())
    }

    #[test]
    fn wav_is_readable_back() -> anyhow::Result<()> {
        let bytes = encode_wav(&[0.0, 0.5, -0.5], TRANSCRIPTION_SAMPLE_RATE)?;
        assert_eq!(&bytes[..4], b"RIFF");

        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, TRANSCRIPTION_SAMPLE_RATE);
        let samples: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
        assert_eq!(samples, convert_f32_to_i16(&[0.0, 0.5, -0.5]));
        Ok(())
    }
}
