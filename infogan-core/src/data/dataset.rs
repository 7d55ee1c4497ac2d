//! Indexed image datasets.

use crate::config::ImageShape;
use crate::error::{InfoGanError, Result};
use image::GenericImageView;
use image::imageops::FilterType;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An indexed collection of images with optional generating factors.
///
/// Implementations must be `Send + Sync`; sequences share them behind an `Arc`.
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shape(&self) -> ImageShape;

    /// Generating factors of sample `index`, normalised to `[0, 1]`. Empty when unknown.
    fn factors(&self, index: usize) -> &[f32];

    /// Channels-first pixels of sample `index`, in `[0, 1]`, `shape().product()` long.
    fn load(&self, index: usize) -> Result<Vec<f32>>;

    fn name(&self) -> &str {
        "dataset"
    }
}

/// Dataset held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    shape: ImageShape,
    images: Vec<Vec<f32>>,
    factors: Vec<Vec<f32>>,
}

impl InMemoryDataset {
    pub fn new(shape: ImageShape) -> Self {
        Self {
            shape,
            images: Vec::new(),
            factors: Vec::new(),
        }
    }

    pub fn push(&mut self, image: Vec<f32>, factors: Vec<f32>) -> Result<()> {
        if image.len() != self.shape.product() {
            return Err(InfoGanError::dataset(format!(
                "image has {} values, shape {} needs {}",
                image.len(),
                self.shape,
                self.shape.product()
            )));
        }
        self.images.push(image);
        self.factors.push(factors);
        Ok(())
    }

    /// `n` constant images where image `i` is filled with `i as f32`, factors `[i / n]`.
    pub fn indexed(shape: ImageShape, n: usize) -> Self {
        let mut dataset = Self::new(shape);
        for i in 0..n {
            dataset.images.push(vec![i as f32; shape.product()]);
            dataset.factors.push(vec![i as f32 / n.max(1) as f32]);
        }
        dataset
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.images.len()
    }

    fn shape(&self) -> ImageShape {
        self.shape
    }

    fn factors(&self, index: usize) -> &[f32] {
        &self.factors[index]
    }

    fn load(&self, index: usize) -> Result<Vec<f32>> {
        self.images
            .get(index)
            .cloned()
            .ok_or_else(|| InfoGanError::dataset(format!("sample {index} out of range")))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[derive(Deserialize)]
struct Manifest {
    samples: Vec<ManifestEntry>,
}

#[derive(Deserialize)]
struct ManifestEntry {
    file: String,
    #[serde(default)]
    factors: Vec<f32>,
}

#[derive(Debug, Clone)]
struct ImageEntry {
    path: PathBuf,
    factors: Vec<f32>,
}

/// Images in a directory, decoded on demand.
///
/// When `manifest.json` exists it lists the files (relative to the directory) and their
/// generating factors. Otherwise every file with the configured extension is used in
/// file-name order and no factors are known.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    shape: ImageShape,
    entries: Vec<ImageEntry>,
}

impl ImageFolder {
    pub const MANIFEST: &'static str = "manifest.json";

    pub fn open(root: &Path, shape: ImageShape, file_ext: &str) -> Result<Self> {
        if !matches!(shape.channels, 1 | 3 | 4) {
            return Err(InfoGanError::dataset(format!(
                "cannot decode images into {} channels (supported: 1, 3, 4)",
                shape.channels
            )));
        }

        let manifest_path = root.join(Self::MANIFEST);
        let entries = if manifest_path.exists() {
            let raw = std::fs::read(&manifest_path)?;
            let manifest: Manifest = serde_json::from_slice(&raw)?;
            manifest
                .samples
                .into_iter()
                .map(|entry| ImageEntry {
                    path: root.join(entry.file),
                    factors: entry.factors,
                })
                .collect()
        } else {
            Self::scan(root, file_ext)?
        };

        if entries.is_empty() {
            return Err(InfoGanError::dataset(format!(
                "no '{file_ext}' images found in {}",
                root.display()
            )));
        }
        info!(
            root = %root.display(),
            samples = entries.len(),
            shape = %shape,
            "Opened image folder"
        );
        Ok(Self {
            root: root.to_path_buf(),
            shape,
            entries,
        })
    }

    fn scan(root: &Path, file_ext: &str) -> Result<Vec<ImageEntry>> {
        let wanted = file_ext.trim_start_matches('.').to_ascii_lowercase();
        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| InfoGanError::dataset(e.to_string()))?;
            let matches = entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(&wanted));
            if matches {
                entries.push(ImageEntry {
                    path: entry.into_path(),
                    factors: Vec::new(),
                });
            }
        }
        debug!(root = %root.display(), found = entries.len(), "Scanned image folder");
        Ok(entries)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Dataset for ImageFolder {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn shape(&self) -> ImageShape {
        self.shape
    }

    fn factors(&self, index: usize) -> &[f32] {
        &self.entries[index].factors
    }

    fn load(&self, index: usize) -> Result<Vec<f32>> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| InfoGanError::dataset(format!("sample {index} out of range")))?;
        let mut img = image::open(&entry.path).map_err(|source| InfoGanError::Image {
            path: entry.path.clone(),
            source,
        })?;

        let (w, h) = (self.shape.width as u32, self.shape.height as u32);
        if img.dimensions() != (w, h) {
            img = img.resize_exact(w, h, FilterType::Triangle);
        }
        let raw = match self.shape.channels {
            1 => img.to_luma8().into_raw(),
            3 => img.to_rgb8().into_raw(),
            _ => img.to_rgba8().into_raw(),
        };
        Ok(hwc_to_chw(&raw, self.shape))
    }

    fn name(&self) -> &str {
        "image-folder"
    }
}

/// Interleaved 8-bit pixels to planar floats in `[0, 1]`.
fn hwc_to_chw(raw: &[u8], shape: ImageShape) -> Vec<f32> {
    let [c, h, w] = shape.dims();
    let mut out = vec![0.0f32; c * h * w];
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                out[ch * h * w + y * w + x] = f32::from(raw[(y * w + x) * c + ch]) / 255.0;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(path: &Path, w: u32, h: u32, rgb: [u8; 3]) {
        image::RgbImage::from_pixel(w, h, image::Rgb(rgb))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_in_memory_rejects_wrong_length() {
        let mut ds = InMemoryDataset::new(ImageShape::new(1, 2, 2));
        assert!(ds.push(vec![0.0; 4], vec![]).is_ok());
        assert!(ds.push(vec![0.0; 3], vec![]).is_err());
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_indexed_dataset() {
        let ds = InMemoryDataset::indexed(ImageShape::new(1, 1, 2), 4);
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.load(3).unwrap(), vec![3.0, 3.0]);
        assert_eq!(ds.factors(2), &[0.5]);
        assert!(ds.load(4).is_err());
    }

    #[test]
    fn test_hwc_to_chw() {
        // 1x2 image, 3 channels: pixel0 = (255, 0, 0), pixel1 = (0, 255, 0)
        let raw = [255, 0, 0, 0, 255, 0];
        let chw = hwc_to_chw(&raw, ImageShape::new(3, 1, 2));
        assert_eq!(chw, vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_image_folder_scans_by_extension() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("b.png"), 4, 4, [0, 0, 255]);
        write_png(&dir.path().join("a.png"), 4, 4, [255, 0, 0]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let ds = ImageFolder::open(dir.path(), ImageShape::new(3, 2, 2), "png").unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.factors(0).is_empty());

        // a.png sorts first: red plane is all ones after resizing to 2x2.
        let first = ds.load(0).unwrap();
        assert_eq!(first.len(), 12);
        assert!(first[..4].iter().all(|v| (*v - 1.0).abs() < 1e-6));
        assert!(first[8..].iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_image_folder_reads_manifest() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("x.png"), 2, 2, [10, 10, 10]);
        write_png(&dir.path().join("y.png"), 2, 2, [20, 20, 20]);
        std::fs::write(
            dir.path().join(ImageFolder::MANIFEST),
            concat!(
                r#"{"samples":[{"file":"y.png","factors":[0.9,0.1]},"#,
                r#"{"file":"x.png","factors":[0.2,0.3]}]}"#,
            ),
        )
        .unwrap();

        let ds = ImageFolder::open(dir.path(), ImageShape::new(1, 2, 2), ".jpeg").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.factors(0), &[0.9, 0.1]);
        let gray = ds.load(0).unwrap();
        assert_eq!(gray.len(), 4);
        assert!((gray[0] - 20.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_image_folder_empty_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(ImageFolder::open(dir.path(), ImageShape::new(3, 2, 2), ".jpeg").is_err());
    }

    #[test]
    fn test_image_folder_missing_file_is_image_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(ImageFolder::MANIFEST),
            r#"{"samples":[{"file":"gone.png"}]}"#,
        )
        .unwrap();
        let ds = ImageFolder::open(dir.path(), ImageShape::new(3, 2, 2), ".png").unwrap();
        assert!(matches!(ds.load(0), Err(InfoGanError::Image { .. })));
    }
}
