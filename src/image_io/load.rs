use std::io::Cursor;

use image::{
    DynamicImage, GenericImageView, GrayAlphaImage, GrayImage, ImageError, ImageFormat,
    ImageReader, Limits, RgbImage, RgbaImage, error::DecodingError,
};
use jpeg_decoder::PixelFormat;

use crate::{
    error::DecodeError,
    util::{DecodedImage, TargetSize},
};

type CodecError = Box<dyn std::error::Error + Send + Sync>;

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
    Ok(ImageReader::new(Cursor::new(bytes)).with_guessed_format()?)
}

fn codec_error(format: ImageFormat, error: impl Into<CodecError>) -> DecodeError {
    DecodeError::InvalidFormat(ImageError::Decoding(DecodingError::new(
        format.into(),
        error,
    )))
}

/// Largest power of two that keeps both halved sides above the target.
///
/// Mirrors the classic `inSampleSize` search: start at 1 and keep doubling while
/// `(height / 2) / factor > target.height` and `(width / 2) / factor > target.width`.
/// Never upsamples, so images at or below the target decode with a factor of 1.
pub fn sample_factor(native_width: u32, native_height: u32, target: TargetSize) -> u32 {
    let half_width = native_width / 2;
    let half_height = native_height / 2;

    let mut factor = 1;
    while half_height / factor > target.height() && half_width / factor > target.width() {
        factor *= 2;
    }
    factor
}

/// Reads only the header.
pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    Ok(reader(bytes)?.into_dimensions()?)
}

/// Decodes `bytes`, reduced by the sample factor for `target`.
///
/// With a factor above 1 the full resolution buffer is never built for PNG
/// (rows are averaged while they stream in) or JPEG (DCT scaling). Other formats
/// decode at native size first and are then shrunk.
pub fn decode(bytes: &[u8], target: Option<TargetSize>) -> Result<DecodedImage, DecodeError> {
    let format = reader(bytes)?.format();
    let (width, height) = read_dimensions(bytes)?;
    let factor = target.map_or(1, |target| sample_factor(width, height, target));

    let image = if factor > 1 {
        let output = ((width / factor).max(1), (height / factor).max(1));
        decode_sampled(bytes, format, (width, height), factor, output)?
    } else {
        reader(bytes)?.decode()?
    };

    log::debug!(
        "Decoded {width}x{height} image with sample factor {factor} into {}x{}",
        image.width(),
        image.height()
    );

    Ok(DecodedImage::new(image, (width, height), factor))
}

fn decode_sampled(
    bytes: &[u8],
    format: Option<ImageFormat>,
    native: (u32, u32),
    factor: u32,
    (width, height): (u32, u32),
) -> Result<DynamicImage, DecodeError> {
    let sampled = match format {
        Some(ImageFormat::Png) => png_rows(bytes, factor)?,
        Some(ImageFormat::Jpeg) => jpeg_scaled(bytes, (width, height))?,
        _ => None,
    };

    let image = match sampled {
        Some(image) => image,
        None => decode_native(bytes, native)?,
    };

    if image.dimensions() == (width, height) {
        Ok(image)
    } else {
        Ok(image.thumbnail_exact(width, height))
    }
}

/// Full decode with an allocation limit large enough for the native buffer.
fn decode_native(
    bytes: &[u8],
    (width, height): (u32, u32),
) -> Result<DynamicImage, DecodeError> {
    let mut reader = reader(bytes)?;
    let mut limits = Limits::default();
    // widest pixel type is Rgba32F
    let needed = u64::from(width) * u64::from(height) * 16;
    limits.max_alloc = limits.max_alloc.map(|max| max.max(needed));
    reader.limits(limits);
    Ok(reader.decode()?)
}

/// Box-averages `factor` x `factor` blocks while the rows stream in. Interlaced
/// images are left to the generic path.
fn png_rows(bytes: &[u8], factor: u32) -> Result<Option<DynamicImage>, DecodeError> {
    let png_error = |error: png::DecodingError| codec_error(ImageFormat::Png, error);

    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(png_error)?;
    if reader.info().interlaced {
        return Ok(None);
    }

    let (color_type, _) = reader.output_color_type();
    let channels = color_type.samples();
    let (width, height) = reader.info().size();
    let factor = factor as usize;
    let out_width = width as usize / factor;
    let out_height = height as usize / factor;
    let area = (factor * factor) as u64;

    let mut sums = vec![0u64; out_width * channels];
    let mut pixels = Vec::with_capacity(out_width * out_height * channels);
    for y in 0..out_height * factor {
        let row = reader
            .next_row()
            .map_err(png_error)?
            .ok_or_else(|| codec_error(ImageFormat::Png, "image data ended early"))?;

        let blocks = row.data().chunks_exact(channels * factor);
        for (sum, block) in sums.chunks_exact_mut(channels).zip(blocks) {
            for source in block.chunks_exact(channels) {
                for (total, value) in sum.iter_mut().zip(source) {
                    *total += u64::from(*value);
                }
            }
        }

        if (y + 1) % factor == 0 {
            pixels.extend(sums.iter().map(|total| (total / area) as u8));
            sums.fill(0);
        }
    }

    let (width, height) = (out_width as u32, out_height as u32);
    Ok(match channels {
        1 => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        2 => GrayAlphaImage::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8),
        3 => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8),
        _ => None,
    })
}

/// Lets the JPEG decoder skip DCT coefficients, landing at 1/2, 1/4 or 1/8 scale
/// at or above the requested size.
fn jpeg_scaled(
    bytes: &[u8],
    (width, height): (u32, u32),
) -> Result<Option<DynamicImage>, DecodeError> {
    let jpeg_error = |error: jpeg_decoder::Error| codec_error(ImageFormat::Jpeg, error);

    let (Ok(width), Ok(height)) = (u16::try_from(width), u16::try_from(height)) else {
        return Ok(None);
    };

    let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(bytes));
    decoder.read_info().map_err(jpeg_error)?;
    let Some(info) = decoder.info() else {
        return Ok(None);
    };
    if !matches!(info.pixel_format, PixelFormat::L8 | PixelFormat::RGB24) {
        return Ok(None);
    }

    let (width, height) = decoder.scale(width, height).map_err(jpeg_error)?;
    let pixels = decoder.decode().map_err(jpeg_error)?;

    let (width, height) = (u32::from(width), u32::from(height));
    Ok(match info.pixel_format {
        PixelFormat::L8 => {
            GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        _ => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
    })
}
