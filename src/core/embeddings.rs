use anyhow::Result;
use image::{imageops::FilterType, DynamicImage};
use ndarray::Array1;

/// Side length of the square CLIP input.
pub const CLIP_INPUT_SIZE: u32 = 224;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Turns an image into a fixed-length embedding vector.
///
/// Implementations must be safe to share between threads; the catalog cache
/// and every query go through the same instance.
pub trait ImageEncoder: Send + Sync {
    /// Identifier of the underlying model, recorded in the feature cache.
    fn model_id(&self) -> &str;

    /// Computes an embedding for an image.
    fn encode(&self, image: &DynamicImage) -> Result<Array1<f32>>;
}

/// CLIP preprocessing: bicubic resize-to-fill with a center crop, then
/// per-channel normalization. Returns CHW data.
pub fn clip_preprocess(img: &DynamicImage) -> Vec<f32> {
    let size = CLIP_INPUT_SIZE;
    let rgb_img = img
        .resize_to_fill(size, size, FilterType::CatmullRom)
        .to_rgb8();

    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; plane * 3];

    for (x, y, pixel) in rgb_img.enumerate_pixels() {
        let offset = (y * size + x) as usize;
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            data[c * plane + offset] = (value - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }

    data
}

#[cfg(feature = "embeddings")]
pub use self::torch::ClipEncoder;

#[cfg(feature = "embeddings")]
mod torch {
    use super::{clip_preprocess, ImageEncoder, CLIP_INPUT_SIZE};
    use anyhow::{anyhow, Context, Result};
    use image::DynamicImage;
    use ndarray::Array1;
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    /// CLIP visual tower exported to TorchScript.
    pub struct ClipEncoder {
        module: Mutex<CModule>,
        device: Device,
        model_id: String,
    }

    impl std::fmt::Debug for ClipEncoder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ClipEncoder")
                .field("device", &self.device)
                .field("model_id", &self.model_id)
                .finish()
        }
    }

    impl ClipEncoder {
        /// Loads the TorchScript module, on CUDA when available.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            let device = Device::cuda_if_available();
            let mut module = CModule::load_on_device(path, device)
                .with_context(|| format!("loading CLIP encoder from {}", path.display()))?;
            module.set_eval();

            let model_id = path
                .file_stem()
                .and_then(|n| n.to_str())
                .map(String::from)
                .unwrap_or_else(|| "clip".to_string());

            log::info!("Loaded CLIP encoder {} on {:?}", model_id, device);
            Ok(Self {
                module: Mutex::new(module),
                device,
                model_id,
            })
        }
    }

    impl ImageEncoder for ClipEncoder {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn encode(&self, img: &DynamicImage) -> Result<Array1<f32>> {
            let size = CLIP_INPUT_SIZE as i64;
            let data = clip_preprocess(img);

            // [1, 3, 224, 224]
            let input = Tensor::of_slice(&data)
                .reshape(&[1, 3, size, size])
                .to_kind(Kind::Float)
                .to_device(self.device);

            let module = self
                .module
                .lock()
                .map_err(|_| anyhow!("CLIP encoder lock poisoned"))?;
            let output = tch::no_grad(|| module.forward_ts(&[input]))?;

            let flat = output
                .to_device(Device::Cpu)
                .to_kind(Kind::Float)
                .reshape(&[-1]);
            let embedding = Vec::<f32>::try_from(flat)?;

            Ok(Array1::from(embedding))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_clip_preprocess_shape_and_normalization() {
        let width = 40;
        let height = 20;
        let imgbuf = RgbImage::from_pixel(width, height, image::Rgb([0, 0, 0]));
        let img = DynamicImage::ImageRgb8(imgbuf);

        let data = clip_preprocess(&img);
        let plane = (CLIP_INPUT_SIZE * CLIP_INPUT_SIZE) as usize;
        assert_eq!(data.len(), plane * 3);

        // Black survives resizing, so each plane is constant
        let red = -CLIP_MEAN[0] / CLIP_STD[0];
        let green = -CLIP_MEAN[1] / CLIP_STD[1];
        assert!((data[0] - red).abs() < 1e-4);
        assert!((data[plane - 1] - red).abs() < 1e-4);
        assert!((data[plane] - green).abs() < 1e-4);
    }
}
