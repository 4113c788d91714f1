use image::{DynamicImage, GenericImageView};

use crate::models::detection::{Detection, DetectionBox};

/// Keeps the boxes containing `(x, y)`, smallest area first.
///
/// Boxes of equal area keep their detection order.
pub fn select_regions(boxes: &[DetectionBox], x: i32, y: i32) -> Vec<DetectionBox> {
    let mut selected: Vec<DetectionBox> = boxes
        .iter()
        .filter(|b| b.contains(x, y))
        .copied()
        .collect();
    selected.sort_by_key(DetectionBox::area);
    selected
}

/// Converts raw detections to integer boxes, dropping degenerate ones.
pub fn boxes_from_detections(detections: &[Detection]) -> Vec<DetectionBox> {
    detections
        .iter()
        .filter_map(|det| {
            let b = DetectionBox::from_detection(det);
            if b.is_none() {
                log::debug!("Dropping degenerate detection {:?}", det);
            }
            b
        })
        .collect()
}

/// Crops `region` out of `image`, clamped to the image bounds.
///
/// Returns `None` when nothing of the region lies inside the image.
pub fn crop_region(image: &DynamicImage, region: &DetectionBox) -> Option<DynamicImage> {
    let (width, height) = image.dimensions();
    let x1 = region.x1.clamp(0, width as i32) as u32;
    let y1 = region.y1.clamp(0, height as i32) as u32;
    let x2 = region.x2.clamp(0, width as i32) as u32;
    let y2 = region.y2.clamp(0, height as i32) as u32;

    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(image.crop_imm(x1, y1, x2 - x1, y2 - y1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn b(x1: i32, y1: i32, x2: i32, y2: i32) -> DetectionBox {
        DetectionBox::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn test_select_filters_by_point() {
        let boxes = [b(0, 0, 10, 10)];
        assert_eq!(select_regions(&boxes, 5, 5), vec![b(0, 0, 10, 10)]);
        assert!(select_regions(&boxes, 11, 5).is_empty());
        assert!(select_regions(&boxes, 5, -1).is_empty());
    }

    #[test]
    fn test_select_sorts_by_area() {
        let boxes = [b(0, 0, 10, 10), b(0, 0, 5, 5)];
        assert_eq!(
            select_regions(&boxes, 2, 2),
            vec![b(0, 0, 5, 5), b(0, 0, 10, 10)]
        );
    }

    #[test]
    fn test_select_equal_area_keeps_detection_order() {
        let boxes = [b(0, 0, 4, 2), b(0, 0, 2, 4), b(0, 0, 1, 1)];
        assert_eq!(
            select_regions(&boxes, 1, 1),
            vec![b(0, 0, 1, 1), b(0, 0, 4, 2), b(0, 0, 2, 4)]
        );
    }

    #[test]
    fn test_select_sorts_boxes_spanning_i32_range() {
        let boxes = [b(i32::MIN, 0, i32::MAX, 10), b(0, 0, 5, 5)];
        assert_eq!(
            select_regions(&boxes, 1, 1),
            vec![b(0, 0, 5, 5), b(i32::MIN, 0, i32::MAX, 10)]
        );
    }

    #[test]
    fn test_boxes_from_detections_drops_degenerate() {
        let dets = vec![
            Detection { x1: 0.0, y1: 0.0, x2: 10.5, y2: 10.5, score: 0.9, class_id: 0 },
            Detection { x1: 3.1, y1: 0.0, x2: 3.8, y2: 10.0, score: 0.8, class_id: 0 },
        ];
        assert_eq!(boxes_from_detections(&dets), vec![b(0, 0, 10, 10)]);
    }

    #[test]
    fn test_crop_region_clamps() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(20, 10));

        let crop = crop_region(&img, &b(5, 2, 15, 8)).unwrap();
        assert_eq!(crop.dimensions(), (10, 6));

        let crop = crop_region(&img, &b(-5, -5, 30, 30)).unwrap();
        assert_eq!(crop.dimensions(), (20, 10));

        assert!(crop_region(&img, &b(25, 0, 30, 5)).is_none());
    }
}
