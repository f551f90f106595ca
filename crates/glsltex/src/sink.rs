use image::{imageops, RgbaImage};
use tracing::{debug, trace};

use crate::error::ImageError;
use crate::host::ImageStore;

/// Publishes rendered frames into the host image named after the shader.
#[derive(Debug, Clone)]
pub struct TextureSink {
    key: String,
}

/// Image name derived from a shader source id: the last path segment up to
/// its first `.`. Falls back to the whole id when that would be empty.
pub fn image_key(source_id: &str) -> String {
    let file_name = source_id
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(source_id);
    match file_name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => source_id.to_string(),
    }
}

impl TextureSink {
    pub fn for_source(source_id: &str) -> Self {
        Self {
            key: image_key(source_id),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Writes one frame of tightly packed RGBA8 `pixels` (rows top-to-bottom)
    /// as normalized floats with rows bottom-to-top.
    pub fn publish<I: ImageStore>(
        &self,
        images: &mut I,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<(), ImageError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ImageError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }

        if !images.exists(&self.key) {
            debug!(image = %self.key, width, height, "creating output image");
            images.create(&self.key, width, height)?;
        }
        images.resize(&self.key, width, height)?;

        let actual = pixels.len();
        let mut frame = RgbaImage::from_raw(width, height, pixels)
            .ok_or(ImageError::BufferSize { expected, actual })?;
        imageops::flip_vertical_in_place(&mut frame);
        let normalized: Vec<f32> = frame
            .into_raw()
            .into_iter()
            .map(|byte| f32::from(byte) / 255.0)
            .collect();

        images.write_pixels(&self.key, &normalized)?;
        trace!(image = %self.key, width, height, "published frame");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::fake_pixel;
    use crate::images::MemoryImageStore;

    fn top_down_frame(width: u32, height: u32) -> Vec<u8> {
        (0..height)
            .flat_map(|row| (0..width).flat_map(move |x| fake_pixel(x, row)))
            .collect()
    }

    #[test]
    fn key_is_file_stem_before_first_dot() {
        assert_eq!(image_key("missing.frag"), "missing");
        assert_eq!(image_key("shaders/wave.v2.frag"), "wave");
        assert_eq!(image_key("plain"), "plain");
        assert_eq!(image_key(".hidden"), ".hidden");
    }

    #[test]
    fn first_publish_creates_image() {
        let mut images = MemoryImageStore::new();
        let sink = TextureSink::for_source("missing.frag");

        sink.publish(&mut images, 3, 2, top_down_frame(3, 2)).unwrap();

        let image = images.get("missing").unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixels.len(), 3 * 2 * 4);
    }

    #[test]
    fn bottom_row_of_store_is_last_readback_row() {
        let mut images = MemoryImageStore::new();
        let sink = TextureSink::for_source("grid.frag");

        sink.publish(&mut images, 2, 3, top_down_frame(2, 3)).unwrap();

        let image = images.get("grid").unwrap();
        // readback row 2 is the bottom of the picture
        let bottom = image.pixel(1, 0).unwrap();
        assert_eq!(bottom, [2.0 / 255.0, 1.0 / 255.0, 7.0 / 255.0, 1.0]);
        let top = image.pixel(0, 2).unwrap();
        assert_eq!(top, [0.0, 0.0, 7.0 / 255.0, 1.0]);
    }

    #[test]
    fn follows_session_size_changes() {
        let mut images = MemoryImageStore::new();
        let sink = TextureSink::for_source("size.frag");
        sink.publish(&mut images, 256, 256, vec![0; 256 * 256 * 4])
            .unwrap();

        sink.publish(&mut images, 128, 128, vec![255; 128 * 128 * 4])
            .unwrap();

        let image = images.get("size").unwrap();
        assert_eq!((image.width, image.height), (128, 128));
        assert!(image.pixels.iter().all(|value| *value == 1.0));
    }

    #[test]
    fn rejects_short_frames() {
        let mut images = MemoryImageStore::new();
        let sink = TextureSink::for_source("short.frag");
        let err = sink.publish(&mut images, 2, 2, vec![0; 8]).unwrap_err();
        assert!(matches!(err, ImageError::BufferSize { expected: 16, actual: 8 }));
        assert!(!images.exists("short"));
    }
}
