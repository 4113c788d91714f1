use anyhow::{bail, Result};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::detection::Detection;

/// Finds objects in an image on disk.
pub trait Detector: Send + Sync {
    /// Runs detection, returning boxes in source image pixel coordinates.
    ///
    /// An empty vector means nothing was found. Errors are reserved for the
    /// detector itself failing (unreadable image, inference crash).
    fn detect(&self, image_path: &Path) -> Result<Vec<Detection>>;
}

/// Tuning for YOLO-style detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Square network input size, 640 for YOLOv8 exports.
    pub input_size: u32,
    /// Minimum class confidence, 0..1.
    pub conf_threshold: f32,
    /// Overlap above which a weaker same-class box is suppressed, 0..1.
    pub iou_threshold: f32,
    /// Upper bound on returned detections.
    pub max_detections: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// Decodes a YOLOv8 head output of shape `[4 + classes, candidates]`.
///
/// Rows 0..4 hold `cx, cy, w, h` in network input pixels; the rest hold
/// per-class scores. Coordinates are rescaled by `(scale_x, scale_y)` into
/// source image pixels.
pub fn decode_yolo_output(
    output: ArrayView2<'_, f32>,
    conf_threshold: f32,
    scale_x: f32,
    scale_y: f32,
) -> Result<Vec<Detection>> {
    if output.nrows() < 5 {
        bail!(
            "unexpected detector output: {} rows, need at least 5",
            output.nrows()
        );
    }

    let mut detections = Vec::new();
    for candidate in output.columns() {
        let Some((class_id, &score)) = candidate
            .iter()
            .skip(4)
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        if score <= conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (candidate[0], candidate[1], candidate[2], candidate[3]);
        detections.push(Detection {
            x1: (cx - w / 2.0) * scale_x,
            y1: (cy - h / 2.0) * scale_y,
            x2: (cx + w / 2.0) * scale_x,
            y2: (cy + h / 2.0) * scale_y,
            score,
            class_id,
        });
    }

    Ok(detections)
}

/// Greedy per-class non-maximum suppression, highest score first.
pub fn non_max_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::new();
    for det in detections {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && k.iou(&det) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

#[cfg(feature = "embeddings")]
pub use self::torch::TorchScriptDetector;

#[cfg(feature = "embeddings")]
mod torch {
    use super::{decode_yolo_output, non_max_suppression, Detector, DetectorParams};
    use crate::models::detection::Detection;
    use anyhow::{anyhow, bail, Context, Result};
    use image::imageops::FilterType;
    use ndarray::Array2;
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    /// YOLOv8 detector exported to TorchScript.
    pub struct TorchScriptDetector {
        module: Mutex<CModule>,
        device: Device,
        params: DetectorParams,
    }

    impl std::fmt::Debug for TorchScriptDetector {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TorchScriptDetector")
                .field("device", &self.device)
                .field("params", &self.params)
                .finish()
        }
    }

    impl TorchScriptDetector {
        /// Loads the TorchScript module, on CUDA when available.
        pub fn load<P: AsRef<Path>>(path: P, params: DetectorParams) -> Result<Self> {
            let path = path.as_ref();
            let device = Device::cuda_if_available();
            let mut module = CModule::load_on_device(path, device)
                .with_context(|| format!("loading detector from {}", path.display()))?;
            module.set_eval();

            log::info!("Loaded detector {} on {:?}", path.display(), device);
            Ok(Self {
                module: Mutex::new(module),
                device,
                params,
            })
        }
    }

    impl Detector for TorchScriptDetector {
        fn detect(&self, image_path: &Path) -> Result<Vec<Detection>> {
            let rgb = image::open(image_path)
                .with_context(|| format!("opening {}", image_path.display()))?
                .to_rgb8();

            let size = self.params.input_size;
            let resized = image::imageops::resize(&rgb, size, size, FilterType::Triangle);

            let plane = (size * size) as usize;
            let mut data = vec![0.0f32; plane * 3];
            for (x, y, pixel) in resized.enumerate_pixels() {
                let offset = (y * size + x) as usize;
                data[offset] = pixel[0] as f32 / 255.0;
                data[plane + offset] = pixel[1] as f32 / 255.0;
                data[2 * plane + offset] = pixel[2] as f32 / 255.0;
            }

            let input = Tensor::of_slice(&data)
                .reshape(&[1, 3, size as i64, size as i64])
                .to_kind(Kind::Float)
                .to_device(self.device);

            let output = {
                let module = self
                    .module
                    .lock()
                    .map_err(|_| anyhow!("detector lock poisoned"))?;
                tch::no_grad(|| module.forward_ts(&[input]))?
            };

            // [1, 4 + classes, candidates]
            let dims = output.size();
            if dims.len() != 3 || dims[0] != 1 {
                bail!("unexpected detector output shape {:?}", dims);
            }
            let (rows, cols) = (dims[1] as usize, dims[2] as usize);
            let flat = output
                .to_device(Device::Cpu)
                .to_kind(Kind::Float)
                .reshape(&[-1]);
            let values = Vec::<f32>::try_from(flat)?;
            let head = Array2::from_shape_vec((rows, cols), values)?;

            let scale_x = rgb.width() as f32 / size as f32;
            let scale_y = rgb.height() as f32 / size as f32;
            let candidates =
                decode_yolo_output(head.view(), self.params.conf_threshold, scale_x, scale_y)?;

            let detections = non_max_suppression(
                candidates,
                self.params.iou_threshold,
                self.params.max_detections,
            );
            log::debug!(
                "Detected {} objects in {}",
                detections.len(),
                image_path.display()
            );
            Ok(detections)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn det(x1: f32, score: f32, class_id: usize) -> Detection {
        Detection { x1, y1: 0.0, x2: x1 + 10.0, y2: 10.0, score, class_id }
    }

    #[test]
    fn test_decode_rescales_and_filters() {
        // Two candidates, two classes
        let head = Array2::from_shape_vec(
            (6, 2),
            vec![
                50.0, 10.0, // cx
                40.0, 10.0, // cy
                20.0, 4.0, // w
                10.0, 4.0, // h
                0.1, 0.05, // class 0
                0.8, 0.10, // class 1
            ],
        )
        .unwrap();

        let dets = decode_yolo_output(head.view(), 0.25, 2.0, 0.5).unwrap();
        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_eq!(d.class_id, 1);
        assert!((d.score - 0.8).abs() < 1e-6);
        assert_eq!((d.x1, d.x2), (80.0, 120.0));
        assert_eq!((d.y1, d.y2), (17.5, 22.5));
    }

    #[test]
    fn test_decode_rejects_short_head() {
        let head = Array2::<f32>::zeros((4, 3));
        assert!(decode_yolo_output(head.view(), 0.25, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_nms_suppresses_same_class_overlap() {
        let dets = vec![det(0.0, 0.6, 0), det(1.0, 0.9, 0), det(50.0, 0.5, 0)];
        let kept = non_max_suppression(dets, 0.45, 10);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].x1, 1.0);
        assert_eq!(kept[1].x1, 50.0);
    }

    #[test]
    fn test_nms_keeps_other_classes_and_caps() {
        let dets = vec![det(0.0, 0.9, 0), det(0.0, 0.8, 1), det(30.0, 0.7, 2)];
        assert_eq!(non_max_suppression(dets.clone(), 0.45, 10).len(), 3);
        assert_eq!(non_max_suppression(dets, 0.45, 2).len(), 2);
    }
}
