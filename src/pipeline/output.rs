// Output files: atomic write (temporary sibling + rename)

use std::ffi::OsString;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};

use crate::error::Pdf2ImgError;
use crate::segment::raster::RasterImage;

/// Write `bytes` to `path`, replacing any existing file.
///
/// Data goes to `<path>.part` first and is renamed into place, so `path`
/// either keeps its old content or holds the complete new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> crate::error::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| Pdf2ImgError::write(format!("{}: {e}", parent.display())))?;
    }

    let tmp = part_path(path);
    if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(Pdf2ImgError::write(format!("{}: {e}", path.display())));
    }
    Ok(())
}

/// Encode `raster` in the format named by the extension of `path` and write it.
pub fn save_raster(raster: &RasterImage, path: &Path) -> crate::error::Result<()> {
    let format = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .and_then(ImageFormat::from_extension)
        .ok_or_else(|| {
            Pdf2ImgError::write(format!("{}: unsupported output format", path.display()))
        })?;

    let img = raster.to_dynamic()?;
    // JPEG carries no alpha channel
    let img = if format == ImageFormat::Jpeg && img.color().has_alpha() {
        if img.color().has_color() {
            DynamicImage::ImageRgb8(img.to_rgb8())
        } else {
            DynamicImage::ImageLuma8(img.to_luma8())
        }
    } else {
        img
    };

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format)
        .map_err(|e| Pdf2ImgError::write(format!("{}: {e}", path.display())))?;
    write_atomic(path, &buf.into_inner())
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!part_path(&path).exists());
    }

    #[test]
    fn test_write_atomic_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.bin");
        write_atomic(&path, b"x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_save_raster_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let raster = RasterImage::from_shape(&[1, 1, 1], vec![0], "jb2").unwrap();
        let err = save_raster(&raster, &dir.path().join("x.jb2")).unwrap_err();
        assert!(matches!(err, Pdf2ImgError::WriteError(_)));
    }

    #[test]
    fn test_save_raster_drops_alpha_for_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let raster = RasterImage::from_shape(&[2, 2, 4], vec![128; 16], "jpeg").unwrap();
        let path = dir.path().join("x.jpeg");
        save_raster(&raster, &path).unwrap();
        let back = image::open(&path).unwrap();
        assert_eq!((back.width(), back.height()), (2, 2));
    }
}
