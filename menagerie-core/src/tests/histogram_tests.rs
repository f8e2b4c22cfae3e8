use super::*;

fn ramp(offset: f64) -> Channel {
    let mut channel = [0.0; BIN_SIZE];
    for (i, bin) in channel.iter_mut().enumerate() {
        *bin = (i as f64 + offset) / 1000.0;
    }
    channel
}

#[test]
fn channel_round_trip_is_bit_identical() {
    let channel = [
        0.0,
        -0.0,
        1.0 / 3.0,
        f64::MIN_POSITIVE,
        f64::EPSILON,
        0.999_999_999_999,
        1e-300,
        0.5,
        0.25,
        0.125,
        0.1,
        0.2,
        0.3,
        0.4,
        0.6,
        0.7,
        0.8,
        0.9,
        1.0,
        2.0 / 7.0,
        3.0 / 11.0,
        5.0 / 13.0,
        0.031_25,
        0.062_5,
        0.000_1,
        0.001,
        0.01,
        0.015_625,
        0.007_812_5,
        0.003_906_25,
        0.001_953_125,
        0.000_976_562_5,
    ];
    let decoded = decode_channel(&encode_channel(&channel)).unwrap();
    for (a, b) in channel.iter().zip(decoded.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn channel_is_256_big_endian_bytes() {
    let mut channel = [0.0; BIN_SIZE];
    channel[0] = 1.0;
    let bytes = encode_channel(&channel);
    assert_eq!(bytes.len(), CHANNEL_BYTES);
    assert_eq!(&bytes[..8], &1.0f64.to_be_bytes());
}

#[test]
fn wrong_channel_length_is_rejected() {
    let err = decode_channel(&[0u8; 255]).unwrap_err();
    assert!(matches!(
        err,
        HistogramError::ChannelLength {
            expected: 256,
            actual: 255
        }
    ));
    assert!(decode_channel(&[]).is_err());
    assert!(decode_channel(&[0u8; 264]).is_err());
}

#[test]
fn decode_restores_all_channels_in_order() {
    let hist = Histogram::new(ramp(0.0), ramp(1.0), ramp(2.0), ramp(3.0));
    let [a, r, g, b] = hist.encode();
    let decoded = Histogram::decode(&a, &r, &g, &b).unwrap();
    assert_eq!(decoded, hist);
}

#[test]
fn identical_histograms_are_fully_similar() {
    let hist = Histogram::new(ramp(0.0), ramp(5.0), ramp(0.0), ramp(9.0));
    assert_eq!(hist.similarity_to(&hist), 1.0);
}

#[test]
fn image_histogram_is_normalized() {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_fn(4, 4, |x, _| {
        if x < 2 {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 255, 255])
        }
    }));
    let hist = Histogram::from_image(&img).unwrap();
    for channel in [&hist.alpha, &hist.red, &hist.green, &hist.blue] {
        let sum: f64 = channel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
    assert_eq!(hist.alpha[BIN_SIZE - 1], 1.0);
    assert_eq!(hist.red[BIN_SIZE - 1], 0.5);
    assert_eq!(hist.red[0], 0.5);
    assert!(hist.is_colorful());
}

#[test]
fn grey_images_are_not_colorful() {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        3,
        3,
        image::Rgba([128, 128, 128, 255]),
    ));
    let hist = Histogram::from_image(&img).unwrap();
    assert!(!hist.is_colorful());
}
