use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgba32FImage, RgbaImage};
use tracing::debug;

use crate::error::ImageError;
use crate::host::ImageStore;

/// A published texture: normalized RGBA floats, rows bottom-to-top.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

impl StoredImage {
    fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0.0; pixel_len(width, height)],
        }
    }

    /// RGBA value at `(x, y)` with `y = 0` on the bottom row.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize * self.width as usize) + x as usize) * 4;
        let px = &self.pixels[offset..offset + 4];
        Some([px[0], px[1], px[2], px[3]])
    }
}

fn pixel_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

fn check_dimensions(width: u32, height: u32) -> Result<(), ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Image store keeping every texture in memory.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: BTreeMap<String, StoredImage>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&StoredImage> {
        self.images.get(id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }
}

impl ImageStore for MemoryImageStore {
    fn exists(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    fn create(&mut self, id: &str, width: u32, height: u32) -> Result<(), ImageError> {
        check_dimensions(width, height)?;
        self.images
            .insert(id.to_string(), StoredImage::blank(width, height));
        Ok(())
    }

    fn resize(&mut self, id: &str, width: u32, height: u32) -> Result<(), ImageError> {
        check_dimensions(width, height)?;
        let image = self
            .images
            .get_mut(id)
            .ok_or_else(|| ImageError::Missing(id.to_string()))?;
        if image.width == width && image.height == height {
            return Ok(());
        }

        // Scale the current contents like a host image resize would.
        let scaled = Rgba32FImage::from_raw(image.width, image.height, image.pixels.clone())
            .map(|source| imageops::resize(&source, width, height, FilterType::Triangle))
            .map(|scaled| scaled.into_raw())
            .unwrap_or_else(|| vec![0.0; pixel_len(width, height)]);
        debug!(id, from_width = image.width, from_height = image.height, width, height, "resized image");
        image.width = width;
        image.height = height;
        image.pixels = scaled;
        Ok(())
    }

    fn write_pixels(&mut self, id: &str, pixels: &[f32]) -> Result<(), ImageError> {
        let image = self
            .images
            .get_mut(id)
            .ok_or_else(|| ImageError::Missing(id.to_string()))?;
        let expected = pixel_len(image.width, image.height);
        if pixels.len() != expected {
            return Err(ImageError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        image.pixels.copy_from_slice(pixels);
        Ok(())
    }
}

/// In-memory store that also exports every written image as
/// `<output_dir>/<id>.png`, so other programs can pick the textures up.
#[derive(Debug)]
pub struct PngImageStore {
    images: MemoryImageStore,
    output_dir: PathBuf,
}

impl PngImageStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            images: MemoryImageStore::new(),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn png_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!("{id}.png"))
    }

    pub fn get(&self, id: &str) -> Option<&StoredImage> {
        self.images.get(id)
    }

    fn export(&self, id: &str) -> Result<(), ImageError> {
        let image = self
            .images
            .get(id)
            .ok_or_else(|| ImageError::Missing(id.to_string()))?;
        fs::create_dir_all(&self.output_dir).map_err(|source| ImageError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let bytes = image
            .pixels
            .iter()
            .map(|value| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        let expected = pixel_len(image.width, image.height);
        let mut png = RgbaImage::from_raw(image.width, image.height, bytes).ok_or(
            ImageError::BufferSize {
                expected,
                actual: image.pixels.len(),
            },
        )?;
        // PNG rows run top-to-bottom.
        imageops::flip_vertical_in_place(&mut png);

        let path = self.png_path(id);
        png.save(&path)
            .map_err(|source| ImageError::Export { path, source })
    }
}

impl ImageStore for PngImageStore {
    fn exists(&self, id: &str) -> bool {
        self.images.exists(id)
    }

    fn create(&mut self, id: &str, width: u32, height: u32) -> Result<(), ImageError> {
        self.images.create(id, width, height)
    }

    fn resize(&mut self, id: &str, width: u32, height: u32) -> Result<(), ImageError> {
        self.images.resize(id, width, height)
    }

    fn write_pixels(&mut self, id: &str, pixels: &[f32]) -> Result<(), ImageError> {
        self.images.write_pixels(id, pixels)?;
        self.export(id)
    }
}
