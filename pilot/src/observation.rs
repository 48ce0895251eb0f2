//! Screen capture and UI tree normalization

use crate::config::ObservationConfig;
use crate::platforms::AutomationSurface;
use crate::{EncodedImage, Observation, PilotError, ScreenshotResult, UIElement, UINode};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageBuffer, ImageEncoder, Rgba};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Builds a fresh [`Observation`] from the surface on every call.
#[derive(Clone)]
pub struct ObservationBuilder {
    surface: Arc<dyn AutomationSurface>,
    config: ObservationConfig,
}

impl ObservationBuilder {
    pub fn new(surface: Arc<dyn AutomationSurface>, config: ObservationConfig) -> Self {
        Self { surface, config }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn capture(&self) -> Result<Observation, PilotError> {
        let screenshot = self.surface.capture_screen().await.map_err(|e| match e {
            PilotError::CaptureFailed(_) => e,
            other => PilotError::CaptureFailed(other.to_string()),
        })?;

        let elements = self
            .surface
            .interactive_tree()
            .map(|root| flatten_interactive(&root))
            .unwrap_or_default();

        let image = encode_for_oracle(&screenshot, &self.config)?;
        debug!(
            "Captured {}x{} screen, sending {}x{} ({} bytes), {} interactive elements",
            screenshot.width,
            screenshot.height,
            image.width,
            image.height,
            image.data.len(),
            elements.len()
        );

        Ok(Observation {
            image,
            elements,
            screen_width: screenshot.width,
            screen_height: screenshot.height,
        })
    }
}

/// Target size after fitting the long edge into `max_dimension`. Never upscales.
pub fn downscaled_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    (new_width, new_height)
}

/// Flatten the clickable nodes of a hierarchy in depth-first pre-order.
///
/// Non-interactive nodes are skipped but their subtrees are still visited.
pub fn flatten_interactive(root: &UINode) -> Vec<UIElement> {
    let mut elements = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.clickable {
            elements.push(UIElement::from(node));
        }
        // reversed so the first child is popped first
        stack.extend(node.children.iter().rev());
    }
    elements
}

/// Downscale (Lanczos3) and JPEG-encode a raw RGBA capture.
pub fn encode_for_oracle(
    screenshot: &ScreenshotResult,
    config: &ObservationConfig,
) -> Result<EncodedImage, PilotError> {
    let img = ImageBuffer::<Rgba<u8>, _>::from_raw(
        screenshot.width,
        screenshot.height,
        screenshot.image_data.clone(),
    )
    .ok_or_else(|| {
        PilotError::ImageEncoding(format!(
            "buffer of {} bytes does not hold a {}x{} RGBA image",
            screenshot.image_data.len(),
            screenshot.width,
            screenshot.height
        ))
    })?;

    let (width, height) = downscaled_size(
        screenshot.width,
        screenshot.height,
        config.max_image_dimension,
    );
    let img = if (width, height) != (screenshot.width, screenshot.height) {
        image::imageops::resize(&img, width, height, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG carries no alpha channel
    let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
    let mut jpeg_data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut jpeg_data), config.jpeg_quality);
    encoder
        .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| PilotError::ImageEncoding(format!("Failed to encode JPEG: {e}")))?;

    Ok(EncodedImage {
        mime_type: "image/jpeg".to_string(),
        data: jpeg_data,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bounds;

    fn node(text: &str, clickable: bool, children: Vec<UINode>) -> UINode {
        UINode {
            text: text.to_string(),
            clickable,
            children,
            ..Default::default()
        }
    }

    #[test]
    fn test_downscale_wide_image() {
        let (w, h) = downscaled_size(2000, 1000, 1024);
        assert!(w <= 1024);
        assert_eq!(w, 1024);
        let ratio = w as f64 / h as f64;
        assert!((ratio - 2.0).abs() < 0.01, "aspect ratio drifted: {ratio}");
    }

    #[test]
    fn test_downscale_tall_phone_capture() {
        assert_eq!(downscaled_size(1080, 2400, 1024), (461, 1024));
    }

    #[test]
    fn test_small_image_passes_through() {
        assert_eq!(downscaled_size(500, 500, 1024), (500, 500));
        assert_eq!(downscaled_size(1024, 1024, 1024), (1024, 1024));
    }

    #[test]
    fn test_flatten_is_preorder_and_skips_containers() {
        let tree = node(
            "root",
            false,
            vec![
                node(
                    "list",
                    true,
                    vec![node("row-1", true, vec![]), node("row-2", true, vec![])],
                ),
                node("frame", false, vec![node("button", true, vec![])]),
                node("label", false, vec![]),
            ],
        );
        let texts: Vec<String> = flatten_interactive(&tree)
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(texts, vec!["list", "row-1", "row-2", "button"]);
    }

    #[test]
    fn test_flatten_keeps_element_fields() {
        let tree = UINode {
            text: "Settings".into(),
            accessible_label: "Open settings".into(),
            bounds: Bounds::new(100, 200, 300, 260),
            kind: Some("android.widget.Button".into()),
            clickable: true,
            ..Default::default()
        };
        let elements = flatten_interactive(&tree);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].bounds, Bounds::new(100, 200, 300, 260));
        assert_eq!(elements[0].accessible_label, "Open settings");
        assert_eq!(elements[0].kind.as_deref(), Some("android.widget.Button"));
    }

    #[test]
    fn test_encode_downscales_and_produces_jpeg() {
        let screenshot = ScreenshotResult {
            image_data: vec![200; 2000 * 1000 * 4],
            width: 2000,
            height: 1000,
        };
        let image = encode_for_oracle(&screenshot, &ObservationConfig::default()).unwrap();
        assert_eq!((image.width, image.height), (1024, 512));
        assert_eq!(image.mime_type, "image/jpeg");
        // JPEG SOI marker
        assert_eq!(&image.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        let screenshot = ScreenshotResult {
            image_data: vec![0; 10],
            width: 20,
            height: 20,
        };
        let err = encode_for_oracle(&screenshot, &ObservationConfig::default()).unwrap_err();
        assert!(matches!(err, PilotError::ImageEncoding(_)));
    }
}
