use image::{DynamicImage, RgbaImage};

/// A decoded, possibly downsampled, RGBA pixel buffer.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub image: RgbaImage,
    pub native_size: (u32, u32),
    pub sample_factor: u32,
}

impl DecodedImage {
    pub fn new(image: DynamicImage, native_size: (u32, u32), sample_factor: u32) -> Self {
        Self {
            image: image.into_rgba8(),
            native_size,
            sample_factor,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.image
    }

    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }
}

/// Viewport budget for decoding. Both sides are non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetSize {
    width: u32,
    height: u32,
}

impl TargetSize {
    /// A zero on either side means "unset", i.e. decode at native resolution.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputType {
    #[default]
    Mono,
    StereoOverUnder,
}

impl InputType {
    /// Unknown names fall back to mono.
    pub fn from_name(name: &str) -> Self {
        match name {
            "mono" => Self::Mono,
            "stereo" => Self::StereoOverUnder,
            other => {
                log::warn!("Unknown input type {other:?}, using mono");
                Self::Mono
            }
        }
    }
}

/// Layout hints handed to the rendering widget together with a buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisplayOptions {
    pub input_type: InputType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_target_is_unset() {
        assert_eq!(TargetSize::new(0, 512), None);
        assert_eq!(TargetSize::new(1024, 0), None);
        let target = TargetSize::new(1024, 512).unwrap();
        assert_eq!((target.width(), target.height()), (1024, 512));
    }

    #[test]
    fn input_type_names() {
        assert_eq!(InputType::from_name("mono"), InputType::Mono);
        assert_eq!(InputType::from_name("stereo"), InputType::StereoOverUnder);
        assert_eq!(InputType::from_name("side-by-side"), InputType::Mono);
    }

    #[test]
    fn decoded_image_is_rgba() {
        let image = DynamicImage::new_rgb8(4, 2);
        let decoded = DecodedImage::new(image, (8, 4), 2);
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.byte_len(), 4 * 2 * 4);
        assert_eq!(decoded.sample_factor, 2);
    }
}
