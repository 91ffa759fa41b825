use crate::error::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};
use std::path::Path;
use tokio::io::AsyncWriteExt;

pub const PCM_FORMAT: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;
pub const CHANNELS: u16 = 2;
pub const HEADER_SIZE: usize = 44;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// The layout rpitx expects in IQ mode.
    pub fn stereo(sample_rate: u32) -> Self {
        Self {
            channels: CHANNELS,
            sample_rate,
            bits_per_sample: BITS_PER_SAMPLE,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Most frames a canonical header can describe; the RIFF size field
    /// counts 36 header bytes on top of the data.
    pub fn max_frames(&self) -> u64 {
        (u32::MAX as u64 - 36) / self.block_align().max(1) as u64
    }
}

/// Write a canonical 44-byte-header RIFF/WAVE file.
///
/// `samples` is a single channel; each sample is repeated across every
/// channel of `spec`, so the file holds `samples.len()` frames.
pub fn write_wav<W: Write>(writer: &mut W, spec: &WavSpec, samples: &[i16]) -> io::Result<()> {
    if spec.bits_per_sample != BITS_PER_SAMPLE || spec.channels == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "unsupported WAV layout: {} channels, {} bits",
                spec.channels, spec.bits_per_sample
            ),
        ));
    }

    let data_len = (samples.len() as u64) * spec.block_align() as u64;
    let data_len = u32::try_from(data_len)
        .ok()
        .filter(|len| len.checked_add(36).is_some())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "WAV data too large"))?;

    writer.write_all(b"RIFF")?;
    writer.write_u32::<LittleEndian>(36 + data_len)?;
    writer.write_all(b"WAVE")?;

    writer.write_all(b"fmt ")?;
    writer.write_u32::<LittleEndian>(16)?;
    writer.write_u16::<LittleEndian>(PCM_FORMAT)?;
    writer.write_u16::<LittleEndian>(spec.channels)?;
    writer.write_u32::<LittleEndian>(spec.sample_rate)?;
    writer.write_u32::<LittleEndian>(spec.byte_rate())?;
    writer.write_u16::<LittleEndian>(spec.block_align())?;
    writer.write_u16::<LittleEndian>(spec.bits_per_sample)?;

    writer.write_all(b"data")?;
    writer.write_u32::<LittleEndian>(data_len)?;
    for &sample in samples {
        for _ in 0..spec.channels {
            writer.write_i16::<LittleEndian>(sample)?;
        }
    }

    Ok(())
}

pub fn encode_wav(spec: &WavSpec, samples: &[i16]) -> io::Result<Vec<u8>> {
    let mut data =
        Vec::with_capacity(HEADER_SIZE + samples.len() * spec.block_align() as usize);
    write_wav(&mut data, spec, samples)?;
    Ok(data)
}

/// Encode and write `samples` to `path`, replacing any previous file, and
/// wait until the data has reached the disk.
pub async fn write_wav_file(path: &Path, spec: &WavSpec, samples: &[i16]) -> Result<()> {
    let data = encode_wav(spec, samples)?;
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(&data).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let data = encode_wav(&WavSpec::stereo(44000), &[1, -2, 3]).unwrap();
        assert_eq!(data.len(), HEADER_SIZE + 3 * 4);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..16], b"WAVEfmt ");
        assert_eq!(&data[36..40], b"data");

        let mut cursor = Cursor::new(&data[4..8]);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 36 + 12);

        let mut cursor = Cursor::new(&data[20..36]);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), PCM_FORMAT);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), 2);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 44000);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 176000);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), 4);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), 16);
    }

    #[test]
    fn test_channels_are_duplicated() {
        let data = encode_wav(&WavSpec::stereo(8000), &[i16::MAX, -7]).unwrap();
        let mut cursor = Cursor::new(&data[HEADER_SIZE..]);
        let mut frames = Vec::new();
        while let Ok(left) = cursor.read_i16::<LittleEndian>() {
            let right = cursor.read_i16::<LittleEndian>().unwrap();
            frames.push((left, right));
        }
        assert_eq!(frames, vec![(i16::MAX, i16::MAX), (-7, -7)]);
    }

    #[test]
    fn test_max_frames() {
        let stereo = WavSpec::stereo(44000);
        assert_eq!(stereo.max_frames(), 1_073_741_814);
        assert!(stereo.max_frames() * stereo.block_align() as u64 + 36 <= u32::MAX as u64);

        let mono = WavSpec {
            channels: 1,
            ..stereo
        };
        assert_eq!(mono.max_frames(), 2 * stereo.max_frames() + 1);
    }

    #[test]
    fn test_rejects_unsupported_layout() {
        let spec = WavSpec {
            bits_per_sample: 24,
            ..WavSpec::stereo(44000)
        };
        assert!(encode_wav(&spec, &[0]).is_err());
    }
}
