#![allow(dead_code)]

use anyhow::{anyhow, Result};
use assert_fs::prelude::*;
use assert_fs::TempDir;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array1;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use shoplens::{CatalogItem, Detection, Detector, ImageEncoder};

/// Embeds an image as its mean RGB colour, scaled to 0..1.
pub struct MeanColorEncoder {
    pub model: &'static str,
    pub calls: AtomicUsize,
}

impl MeanColorEncoder {
    pub fn new() -> Self {
        Self::named("mean-rgb")
    }

    pub fn named(model: &'static str) -> Self {
        Self { model, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageEncoder for MeanColorEncoder {
    fn model_id(&self) -> &str {
        self.model
    }

    fn encode(&self, image: &DynamicImage) -> Result<Array1<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rgb = image.to_rgb8();
        let (w, h) = image.dimensions();
        let n = (w * h) as f32;
        let mut sum = [0.0f32; 3];
        for pixel in rgb.pixels() {
            for c in 0..3 {
                sum[c] += pixel[c] as f32 / 255.0;
            }
        }
        Ok(Array1::from(sum.iter().map(|s| s / n).collect::<Vec<_>>()))
    }
}

/// Always returns the same detections.
pub struct FixedDetector(pub Vec<Detection>);

impl Detector for FixedDetector {
    fn detect(&self, _image_path: &Path) -> Result<Vec<Detection>> {
        Ok(self.0.clone())
    }
}

/// Always fails.
pub struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, image_path: &Path) -> Result<Vec<Detection>> {
        Err(anyhow!("cannot decode {}", image_path.display()))
    }
}

pub fn detection(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
    Detection { x1, y1, x2, y2, score: 0.9, class_id: 0 }
}

/// (name, colour) for the standard test catalog, in manifest order.
pub const PRODUCTS: &[(&str, [u8; 3])] = &[
    ("Red", [255, 0, 0]),
    ("Blue", [0, 0, 255]),
    ("Green", [0, 255, 0]),
    ("Yellow", [255, 255, 0]),
    ("Cyan", [0, 255, 255]),
    ("Magenta", [255, 0, 255]),
];

pub fn catalog_item(name: &str) -> CatalogItem {
    let slug = name.to_lowercase();
    CatalogItem {
        id: slug.clone(),
        product_name: name.to_string(),
        product_url: format!("https://shop.example/p/{}", slug),
        image_url: format!("https://cdn.example/{}.png", slug),
        image_filename: format!("{}.png", slug),
    }
}

/// Writes solid-colour reference images and a manifest for `products`.
pub fn write_dataset(dir: &TempDir, products: &[(&str, [u8; 3])]) {
    dir.child("images").create_dir_all().unwrap();

    let items: Vec<CatalogItem> = products
        .iter()
        .map(|(name, colour)| {
            let item = catalog_item(name);
            RgbImage::from_pixel(8, 8, Rgb(*colour))
                .save(dir.child("images").child(&item.image_filename).path())
                .unwrap();
            item
        })
        .collect();

    dir.child("metadata.json")
        .write_str(&serde_json::to_string_pretty(&items).unwrap())
        .unwrap();
}

/// A 100x100 blue image with a red 20x20 square in the top-left corner.
pub fn write_query_image(path: &Path) {
    let img = RgbImage::from_fn(100, 100, |x, y| {
        if x < 20 && y < 20 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    });
    img.save(path).unwrap();
}
