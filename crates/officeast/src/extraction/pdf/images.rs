//! Raster data of image XObjects.

use lopdf::{Dictionary, Document, Object, Stream};
use std::io::Cursor;

use super::resolve;

/// Encoded image bytes and the file extension matching them.
#[derive(Debug)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Extension the image will be written with, judged from its declared filter alone.
pub fn extension_for(stream: &Stream) -> &'static str {
    if filters(&stream.dict).iter().any(|f| f == b"DCTDecode") {
        "jpg"
    } else {
        "png"
    }
}

/// JPEG streams are passed through; other 8-bit Gray/RGB/CMYK samples are re-encoded as PNG.
///
/// Returns `None` for encodings that cannot be turned into a standalone raster
/// (JPEG 2000, CCITT, JBIG2, indexed or sub-byte samples).
pub fn encode(doc: &Document, stream: &Stream, depth: usize) -> Option<EncodedImage> {
    let filters = filters(&stream.dict);
    if filters.iter().any(|f| f == b"DCTDecode") {
        if filters.len() != 1 {
            tracing::debug!("skipping chained JPEG filter");
            return None;
        }
        return Some(EncodedImage {
            bytes: stream.content.clone(),
            extension: "jpg",
        });
    }
    if filters
        .iter()
        .any(|f| matches!(f.as_slice(), b"JPXDecode" | b"CCITTFaxDecode" | b"JBIG2Decode"))
    {
        return None;
    }

    let int = |key: &[u8]| stream.dict.get(key).ok().and_then(|v| v.as_i64().ok());
    let width = u32::try_from(int(b"Width")?).ok()?;
    let height = u32::try_from(int(b"Height")?).ok()?;
    if int(b"BitsPerComponent").unwrap_or(8) != 8 {
        return None;
    }
    let components = color_components(doc, stream.dict.get(b"ColorSpace").ok()?, depth)?;

    let samples = super::stream_data(stream);
    let pixels = width as usize * height as usize;
    if samples.len() < pixels * components {
        tracing::debug!(width, height, len = samples.len(), "image data shorter than declared size");
        return None;
    }
    let samples = &samples[..pixels * components];

    let image = match components {
        1 => image::DynamicImage::ImageLuma8(image::GrayImage::from_raw(width, height, samples.to_vec())?),
        3 => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(width, height, samples.to_vec())?),
        4 => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(width, height, cmyk_to_rgb(samples))?),
        _ => return None,
    };

    let mut out = Cursor::new(Vec::new());
    if let Err(err) = image.write_to(&mut out, image::ImageFormat::Png) {
        tracing::debug!(error = %err, "failed to encode PDF image as PNG");
        return None;
    }
    Some(EncodedImage {
        bytes: out.into_inner(),
        extension: "png",
    })
}

fn color_components(doc: &Document, space: &Object, depth: usize) -> Option<usize> {
    match resolve(doc, space, depth)? {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(items) => match items.first().and_then(|f| f.as_name().ok())? {
            b"ICCBased" => {
                let profile = resolve(doc, items.get(1)?, depth)?.as_stream().ok()?;
                profile
                    .dict
                    .get(b"N")
                    .ok()
                    .and_then(|n| n.as_i64().ok())
                    .and_then(|n| usize::try_from(n).ok())
            }
            b"CalGray" => Some(1),
            b"CalRGB" => Some(3),
            _ => None,
        },
        _ => None,
    }
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u16::from(px[3]);
            px[..3].iter().map(move |c| ((255 - u16::from(*c)) * k / 255) as u8)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn image_stream(extra: Dictionary, data: Vec<u8>) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 1,
            "BitsPerComponent" => 8,
        };
        for (key, value) in extra.iter() {
            dict.set(key.clone(), value.clone());
        }
        Stream::new(dict, data)
    }

    #[test]
    fn test_jpeg_passthrough() {
        let doc = Document::with_version("1.5");
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00];
        let stream = image_stream(dictionary! { "Filter" => "DCTDecode", "ColorSpace" => "DeviceRGB" }, jpeg.clone());
        let encoded = encode(&doc, &stream, 4).unwrap();
        assert_eq!(encoded.extension, "jpg");
        assert_eq!(encoded.bytes, jpeg);
        assert_eq!(extension_for(&stream), "jpg");
    }

    #[test]
    fn test_raw_samples_become_png() {
        let doc = Document::with_version("1.5");
        let stream = image_stream(dictionary! { "ColorSpace" => "DeviceGray" }, vec![0, 255]);
        let encoded = encode(&doc, &stream, 4).unwrap();
        assert_eq!(encoded.extension, "png");
        assert!(encoded.bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_short_or_unsupported_data_is_skipped() {
        let doc = Document::with_version("1.5");
        let short = image_stream(dictionary! { "ColorSpace" => "DeviceRGB" }, vec![0, 0, 0]);
        assert!(encode(&doc, &short, 4).is_none());
        let jpx = image_stream(dictionary! { "Filter" => "JPXDecode" }, vec![0; 8]);
        assert!(encode(&doc, &jpx, 4).is_none());
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0, 255, 0, 0, 0]), vec![255, 255, 255, 0, 255, 255]);
    }
}
