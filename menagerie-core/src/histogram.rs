//! Four-channel color histograms and their binary storage format.
//!
//! A histogram holds 32 normalized bins for each of alpha, red, green and
//! blue. Each channel is stored as 32 big-endian `f64` values (256 bytes).

use std::path::Path;

use image::GenericImageView;
use thiserror::Error;

/// Number of bins per channel.
pub const BIN_SIZE: usize = 32;

/// Number of channels, in storage order alpha, red, green, blue.
pub const NUM_CHANNELS: usize = 4;

/// Encoded length of one channel in bytes.
pub const CHANNEL_BYTES: usize = BIN_SIZE * 8;

/// Total per-bin color spread below which an image counts as black and white.
pub const BLACK_AND_WHITE_CONFIDENCE: f64 = 0.25;

/// A single channel's bins.
pub type Channel = [f64; BIN_SIZE];

#[derive(Debug, Error)]
pub enum HistogramError {
    /// Stored channel was not exactly [`CHANNEL_BYTES`] long
    #[error("Mismatched channel length: expected {expected} bytes, got {actual}")]
    ChannelLength { expected: usize, actual: usize },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Image has no pixels to count
    #[error("Image is empty")]
    EmptyImage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub alpha: Channel,
    pub red: Channel,
    pub green: Channel,
    pub blue: Channel,
}

impl Histogram {
    pub fn new(alpha: Channel, red: Channel, green: Channel, blue: Channel) -> Self {
        Self {
            alpha,
            red,
            green,
            blue,
        }
    }

    /// Build a histogram from raw channel blobs as stored in the database.
    pub fn decode(a: &[u8], r: &[u8], g: &[u8], b: &[u8]) -> Result<Self, HistogramError> {
        Ok(Self {
            alpha: decode_channel(a)?,
            red: decode_channel(r)?,
            green: decode_channel(g)?,
            blue: decode_channel(b)?,
        })
    }

    /// Encoded channels in storage order.
    pub fn encode(&self) -> [Vec<u8>; NUM_CHANNELS] {
        [
            encode_channel(&self.alpha),
            encode_channel(&self.red),
            encode_channel(&self.green),
            encode_channel(&self.blue),
        ]
    }

    /// Count pixels of an image file into normalized bins.
    pub fn from_file(path: &Path) -> Result<Self, HistogramError> {
        let img = image::open(path)?;
        Self::from_image(&img)
    }

    pub fn from_image(img: &image::DynamicImage) -> Result<Self, HistogramError> {
        let (width, height) = img.dimensions();
        let pixel_count = u64::from(width) * u64::from(height);
        if pixel_count == 0 {
            return Err(HistogramError::EmptyImage);
        }

        let mut hist = Self::new([0.0; BIN_SIZE], [0.0; BIN_SIZE], [0.0; BIN_SIZE], [0.0; BIN_SIZE]);
        let width_per_bin = 256 / BIN_SIZE;
        for pixel in img.to_rgba8().pixels() {
            let [r, g, b, a] = pixel.0;
            hist.alpha[a as usize / width_per_bin] += 1.0;
            hist.red[r as usize / width_per_bin] += 1.0;
            hist.green[g as usize / width_per_bin] += 1.0;
            hist.blue[b as usize / width_per_bin] += 1.0;
        }

        let total = pixel_count as f64;
        for channel in [
            &mut hist.alpha,
            &mut hist.red,
            &mut hist.green,
            &mut hist.blue,
        ] {
            for bin in channel.iter_mut() {
                *bin /= total;
            }
        }

        Ok(hist)
    }

    /// Whether the color channels diverge enough to call the image colorful.
    pub fn is_colorful(&self) -> bool {
        let spread: f64 = (0..BIN_SIZE)
            .map(|i| {
                let max = self.red[i].max(self.green[i]).max(self.blue[i]);
                let min = self.red[i].min(self.green[i]).min(self.blue[i]);
                max - min
            })
            .sum();
        spread > BLACK_AND_WHITE_CONFIDENCE
    }

    /// Similarity in [0, 1], where 1 means identical distributions.
    ///
    /// Black and white images get a square-rooted error so that small
    /// differences weigh more.
    pub fn similarity_to(&self, other: &Histogram) -> f64 {
        let diff = |a: &Channel, b: &Channel| -> f64 {
            a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
        };
        let mut error = (diff(&self.alpha, &other.alpha)
            + diff(&self.red, &other.red)
            + diff(&self.green, &other.green)
            + diff(&self.blue, &other.blue))
            / 8.0;

        if !self.is_colorful() || !other.is_colorful() {
            error = error.sqrt();
        }

        1.0 - error
    }
}

/// Encode one channel as 32 big-endian doubles.
pub fn encode_channel(channel: &Channel) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(CHANNEL_BYTES);
    for value in channel {
        bytes.extend_from_slice(&value.to_be_bytes());
    }
    bytes
}

/// Decode one channel, rejecting blobs of the wrong length.
pub fn decode_channel(bytes: &[u8]) -> Result<Channel, HistogramError> {
    if bytes.len() != CHANNEL_BYTES {
        return Err(HistogramError::ChannelLength {
            expected: CHANNEL_BYTES,
            actual: bytes.len(),
        });
    }

    let mut channel = [0.0; BIN_SIZE];
    for (bin, chunk) in channel.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        *bin = f64::from_be_bytes(raw);
    }
    Ok(channel)
}

#[cfg(test)]
#[path = "tests/histogram_tests.rs"]
mod tests;
