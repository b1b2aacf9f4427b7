//! Synthetic media for the simulated devices.

use video_capture_core::models::media::{AudioBlock, Dimensions, PixelBuffer, PixelFormat};

/// BGRA gradient that shifts with every frame, so consecutive frames differ.
pub fn synthetic_video_frame(frame_number: u64, dimensions: Dimensions) -> PixelBuffer {
    let width = dimensions.width as usize;
    let height = dimensions.height as usize;
    let mut data = vec![0u8; width * height * 4];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) * 4;
            data[idx] = base.wrapping_add(((x + y) % 256) as u8); // B
            data[idx + 1] = base.wrapping_add((y % 256) as u8); // G
            data[idx + 2] = base.wrapping_add((x % 256) as u8); // R
            data[idx + 3] = 255;
        }
    }

    PixelBuffer::packed(dimensions, PixelFormat::Bgra32, data)
}

/// A 440 Hz sine block as interleaved 16-bit little-endian PCM.
pub fn synthetic_audio_block(block_number: u64, sample_rate: u32, channels: u16, frame_count: u32) -> AudioBlock {
    let frequency = 440.0;
    let channels = channels.max(1);
    let mut data = Vec::with_capacity(frame_count as usize * channels as usize * 2);

    for i in 0..frame_count as u64 {
        let t = (block_number * frame_count as u64 + i) as f64 / sample_rate.max(1) as f64;
        let value = ((2.0 * std::f64::consts::PI * frequency * t).sin() * 0.3 * i16::MAX as f64) as i16;
        for _ in 0..channels {
            data.extend_from_slice(&value.to_le_bytes());
        }
    }

    AudioBlock {
        sample_rate,
        channels,
        frame_count,
        data,
    }
}
