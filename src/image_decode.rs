use bytes::Bytes;
use ppe_detector::DecodedImage;

/// Decodes JPEG/PNG bytes (auto-detected by signature, matching the
/// original's `cv2.imdecode` behaviour) into an interleaved BGR8 buffer —
/// OpenCV's native channel order, which the synthetic and real detectors
/// alike expect.
pub fn decode_to_bgr(bytes: &[u8]) -> Result<DecodedImage, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut data = rgb.into_raw();
    for pixel in data.chunks_exact_mut(3) {
        pixel.swap(0, 2);
    }
    Ok(DecodedImage {
        width,
        height,
        data: Bytes::from(data),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_1x1_png(rgb: [u8; 3]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut img = image::RgbImage::new(1, 1);
            img.put_pixel(0, 0, image::Rgb(rgb));
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
                .unwrap();
        }
        buf
    }

    #[test]
    fn swaps_red_and_blue_channels() {
        let png = encode_1x1_png([10, 20, 30]);
        let decoded = decode_to_bgr(&png).expect("valid png");
        assert_eq!(decoded.width, 1);
        assert_eq!(decoded.height, 1);
        assert_eq!(&decoded.data[..], &[30, 20, 10]);
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(decode_to_bgr(b"not an image").is_err());
    }
}
