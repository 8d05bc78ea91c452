// Raster image: (height, width, channels) sample array + source encoding tag

use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

use crate::error::Pdf2ImgError;
use crate::segment::regions::Region;

/// 8-bit sample array of shape `(height, width, channels)` in row-major,
/// channel-interleaved order, tagged with the encoding it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    height: usize,
    width: usize,
    channels: usize,
    samples: Vec<u8>,
    encoding: String,
}

impl RasterImage {
    /// Build a raster from an explicit shape.
    ///
    /// Fails with `ShapeError` unless `shape` has exactly three non-zero
    /// dimensions and `samples` holds `height * width * channels` values.
    pub fn from_shape(
        shape: &[usize],
        samples: Vec<u8>,
        encoding: impl Into<String>,
    ) -> crate::error::Result<Self> {
        let [height, width, channels] = shape else {
            return Err(Pdf2ImgError::shape(format!(
                "expected a 3-dimensional array, got {} dimension(s)",
                shape.len()
            )));
        };
        let (height, width, channels) = (*height, *width, *channels);

        if height == 0 || width == 0 || channels == 0 {
            return Err(Pdf2ImgError::shape(format!(
                "empty raster: {height}x{width}x{channels}"
            )));
        }

        let expected = height
            .checked_mul(width)
            .and_then(|hw| hw.checked_mul(channels))
            .ok_or_else(|| {
                Pdf2ImgError::shape(format!(
                    "overflow computing sample count for {height}x{width}x{channels}"
                ))
            })?;

        if samples.len() != expected {
            return Err(Pdf2ImgError::shape(format!(
                "sample count mismatch: expected {}, got {}",
                expected,
                samples.len()
            )));
        }

        Ok(Self {
            height,
            width,
            channels,
            samples,
            encoding: encoding.into(),
        })
    }

    /// Convert a decoded image into a raster, keeping its channel layout.
    ///
    /// Gray, gray+alpha, RGB and RGBA stay 1, 2, 3 and 4 channels; 16-bit and
    /// float variants are narrowed to 8 bits per sample, so `std_threshold`
    /// is always on the 0-255 scale.
    pub fn from_dynamic(
        img: &DynamicImage,
        encoding: impl Into<String>,
    ) -> crate::error::Result<Self> {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let (channels, samples) = match img {
            DynamicImage::ImageLuma8(gray) => (1, gray.as_raw().clone()),
            DynamicImage::ImageLuma16(_) => (1, img.to_luma8().into_raw()),
            DynamicImage::ImageLumaA8(gray) => (2, gray.as_raw().clone()),
            DynamicImage::ImageLumaA16(_) => (2, img.to_luma_alpha8().into_raw()),
            DynamicImage::ImageRgb8(rgb) => (3, rgb.as_raw().clone()),
            DynamicImage::ImageRgba8(rgba) => (4, rgba.as_raw().clone()),
            other if other.color().has_alpha() => (4, other.to_rgba8().into_raw()),
            other => (3, other.to_rgb8().into_raw()),
        };
        Self::from_shape(&[height, width, channels], samples, encoding)
    }

    /// Decode encoded image bytes (any container the `image` crate can guess).
    pub fn decode(bytes: &[u8], encoding: impl Into<String>) -> crate::error::Result<Self> {
        let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Pdf2ImgError::decode(format!("cannot guess image format: {e}")))?;
        let img = reader.decode()?;
        Self::from_dynamic(&img, encoding)
    }

    /// Open and decode a standalone raster file.
    pub fn open(path: &std::path::Path, encoding: impl Into<String>) -> crate::error::Result<Self> {
        let img = image::open(path)
            .map_err(|e| Pdf2ImgError::decode(format!("{}: {e}", path.display())))?;
        Self::from_dynamic(&img, encoding)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `(height, width, channels)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Sample at row `r`, column `c`, channel `ch`.
    #[inline]
    pub fn sample(&self, r: usize, c: usize, ch: usize) -> u8 {
        self.samples[(r * self.width + c) * self.channels + ch]
    }

    /// Copy out the half-open rectangle described by `region`.
    pub fn crop(&self, region: &Region) -> crate::error::Result<Self> {
        if region.row_start >= region.row_end
            || region.col_start >= region.col_end
            || region.row_end > self.height
            || region.col_end > self.width
        {
            return Err(Pdf2ImgError::shape(format!(
                "region {region} does not fit a {}x{} raster",
                self.height, self.width
            )));
        }

        let row_len = self.width * self.channels;
        let mut samples = Vec::with_capacity(region.height() * region.width() * self.channels);
        for r in region.row_start..region.row_end {
            let begin = r * row_len + region.col_start * self.channels;
            let end = r * row_len + region.col_end * self.channels;
            samples.extend_from_slice(&self.samples[begin..end]);
        }

        Self::from_shape(
            &[region.height(), region.width(), self.channels],
            samples,
            self.encoding.clone(),
        )
    }

    /// Rebuild an `image` buffer with the matching color type.
    pub fn to_dynamic(&self) -> crate::error::Result<DynamicImage> {
        let (w, h) = (self.width as u32, self.height as u32);
        let data = self.samples.clone();
        let img = match self.channels {
            1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            2 => GrayAlphaImage::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
            n => {
                return Err(Pdf2ImgError::shape(format!(
                    "cannot build an image with {n} channels"
                )));
            }
        };
        img.ok_or_else(|| Pdf2ImgError::shape("sample buffer does not match image dimensions"))
    }
}
