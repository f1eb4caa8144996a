//! Upload decoding and artifact writing
//!
//! Uploads arrive as named byte buffers. This service turns them into
//! `SourceImage`s and writes artifacts back out, keeping filesystem access
//! out of the editing logic.

use crate::{
    error::{PhotoEditError, Result},
    types::{Artifact, SourceImage},
};
use image::{GrayImage, ImageFormat};
use std::path::Path;

/// Upload extensions accepted by both upload slots
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Check if a file path has a supported upload extension
    ///
    /// # Examples
    /// ```rust
    /// use magic_photo::services::ImageIOService;
    ///
    /// assert!(ImageIOService::is_supported_format("cat.JPG"));
    /// assert!(!ImageIOService::is_supported_format("cat.webp"));
    /// ```
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    }

    /// Decode an uploaded byte buffer
    ///
    /// The file name is checked against the accepted extensions when it has
    /// one; the content itself must sniff as PNG or JPEG either way.
    ///
    /// # Errors
    /// - `UnsupportedFormat` for other extensions or other content types
    /// - `Decode` for empty or corrupt data
    pub fn decode_upload(bytes: &[u8], file_name: &str) -> Result<SourceImage> {
        let has_extension = Path::new(file_name).extension().is_some();
        if has_extension && !Self::is_supported_format(file_name) {
            return Err(PhotoEditError::unsupported_format(format!(
                "{file_name} (accepted: png, jpg, jpeg)"
            )));
        }

        if bytes.is_empty() {
            return Err(PhotoEditError::decode(format!("{file_name} is empty")));
        }

        let format = image::guess_format(bytes).map_err(|e| {
            PhotoEditError::decode(format!("Cannot recognize image data in {file_name}: {e}"))
        })?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            return Err(PhotoEditError::unsupported_format(format!(
                "{file_name} contains {format:?} data (accepted: png, jpg, jpeg)"
            )));
        }

        let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            PhotoEditError::decode(format!("Failed to decode {file_name}: {e}"))
        })?;

        if image.width() == 0 || image.height() == 0 {
            return Err(PhotoEditError::decode(format!("{file_name} has zero area")));
        }

        log::debug!(
            "Decoded {file_name}: {}x{} {:?} ({} bytes)",
            image.width(),
            image.height(),
            format,
            bytes.len()
        );

        Ok(SourceImage::new(
            image,
            file_name.to_string(),
            bytes.len(),
            format,
        ))
    }

    /// Read and decode an upload from disk
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Same decode errors as [`Self::decode_upload`]
    pub fn load_upload<P: AsRef<Path>>(path: P) -> Result<SourceImage> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| PhotoEditError::file_io_error("read image file", path, &e))?;
        Self::decode_upload(&bytes, &Self::upload_name(path))
    }

    /// Read and decode an upload from disk without blocking the runtime
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Same decode errors as [`Self::decode_upload`]
    pub async fn load_upload_async<P: AsRef<Path>>(path: P) -> Result<SourceImage> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PhotoEditError::file_io_error("read image file", path, &e))?;
        Self::decode_upload(&bytes, &Self::upload_name(path))
    }

    /// Read an upload from any async reader
    ///
    /// # Errors
    /// - Reading the stream fails
    /// - Same decode errors as [`Self::decode_upload`]
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(
        mut reader: R,
        file_name: &str,
    ) -> Result<SourceImage> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Self::decode_upload(&buffer, file_name)
    }

    /// Load a grayscale mask image from disk (any non-zero pixel is marked)
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Data is not PNG or JPEG
    pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<GrayImage> {
        Ok(Self::load_upload(path)?.image.to_luma8())
    }

    /// Write an artifact, creating parent directories as needed
    ///
    /// # Errors
    /// - Directory creation or file write fails
    pub fn write_artifact<P: AsRef<Path>>(artifact: &Artifact, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PhotoEditError::file_io_error("create output directory", parent, &e))?;
        }
        artifact.save(path)
    }

    /// Async variant of [`Self::write_artifact`]
    ///
    /// # Errors
    /// - Directory creation or file write fails
    pub async fn write_artifact_async<P: AsRef<Path>>(artifact: &Artifact, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PhotoEditError::file_io_error("create output directory", parent, &e))?;
        }
        tokio::fs::write(path, &artifact.bytes)
            .await
            .map_err(|e| PhotoEditError::file_io_error("write artifact", path, &e))
    }

    fn upload_name(path: &Path) -> String {
        path.file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([10, 200, 30])));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_is_supported_format() {
        assert!(ImageIOService::is_supported_format("test.jpg"));
        assert!(ImageIOService::is_supported_format("test.jpeg"));
        assert!(ImageIOService::is_supported_format("test.PNG"));

        assert!(!ImageIOService::is_supported_format("test.bmp"));
        assert!(!ImageIOService::is_supported_format("test.txt"));
        assert!(!ImageIOService::is_supported_format("test"));
    }

    #[test]
    fn test_decode_png_and_jpeg() {
        let png = ImageIOService::decode_upload(&encoded(ImageFormat::Png), "a.png").unwrap();
        assert_eq!(png.dimensions(), (8, 6));
        assert_eq!(png.format, ImageFormat::Png);

        let jpeg = ImageIOService::decode_upload(&encoded(ImageFormat::Jpeg), "a.jpeg").unwrap();
        assert_eq!(jpeg.dimensions(), (8, 6));
        assert_eq!(jpeg.format, ImageFormat::Jpeg);
        assert_eq!(jpeg.file_name, "a.jpeg");
    }

    #[test]
    fn test_content_is_sniffed_regardless_of_extension() {
        // PNG bytes uploaded under a .jpg name still decode
        let source = ImageIOService::decode_upload(&encoded(ImageFormat::Png), "photo.jpg").unwrap();
        assert_eq!(source.format, ImageFormat::Png);
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let err = ImageIOService::decode_upload(&encoded(ImageFormat::Png), "photo.gif").unwrap_err();
        assert!(matches!(err, PhotoEditError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_rejects_garbage_and_empty() {
        let err = ImageIOService::decode_upload(b"definitely not an image", "x.png").unwrap_err();
        assert!(matches!(err, PhotoEditError::Decode(_)));

        let err = ImageIOService::decode_upload(&[], "x.png").unwrap_err();
        assert!(matches!(err, PhotoEditError::Decode(_)));
    }

    #[test]
    fn test_rejects_truncated_png() {
        let bytes = encoded(ImageFormat::Png);
        let err = ImageIOService::decode_upload(&bytes[..bytes.len() / 2], "cut.png").unwrap_err();
        assert!(matches!(err, PhotoEditError::Decode(_)));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let err = ImageIOService::load_upload("/nonexistent/photo.png").unwrap_err();
        assert!(err.to_string().contains("read image file"));
    }

    #[test]
    fn test_write_artifact_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("no_bg.png");
        let artifact = Artifact::new(encoded(ImageFormat::Png), "no_bg.png", "image/png");

        ImageIOService::write_artifact(&artifact, &path).unwrap();

        let loaded = ImageIOService::load_upload(&path).unwrap();
        assert_eq!(loaded.dimensions(), (8, 6));
        assert_eq!(loaded.file_name, "no_bg.png");
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("erased_photo.jpg");
        let artifact = Artifact::new(encoded(ImageFormat::Jpeg), "erased_photo.jpg", "image/jpeg");

        ImageIOService::write_artifact_async(&artifact, &path).await.unwrap();
        let loaded = ImageIOService::load_upload_async(&path).await.unwrap();
        assert_eq!(loaded.dimensions(), (8, 6));
        assert_eq!(loaded.byte_size, artifact.len());
    }

    #[tokio::test]
    async fn test_load_from_reader() {
        let bytes = encoded(ImageFormat::Png);
        let source = ImageIOService::load_from_reader(Cursor::new(bytes), "stream.png")
            .await
            .unwrap();
        assert_eq!(source.dimensions(), (8, 6));
    }
}
