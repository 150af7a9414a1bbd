//! Coordinate transformation between display, canvas, ratio and PDF spaces
//!
//! - Display: CSS pixels of the preview element, content letterboxed with "contain"
//! - Canvas: pixel buffer the page was rasterized into (fixed target width)
//! - Ratio: [0, 1] relative to the rendered MediaBox, top-left origin (persisted)
//! - PDF: points, bottom-left origin, y increasing upward

use crate::preset::{RatioPoint, RatioRect};
use serde::{Deserialize, Serialize};

/// Width/height pair in any pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Where letterboxed content actually lands inside its container
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayFit {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle in canvas pixels, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle in PDF points, bottom-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PdfRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from a PDF box array `[llx lly urx ury]`, tolerating swapped corners
    pub fn from_box_array(values: [f64; 4]) -> Self {
        let [x1, y1, x2, y2] = values;
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    /// PDF box array `[llx lly urx ury]`
    pub fn to_box_array(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Rectangle as percentages of a CropBox (display only, never persisted)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Fit content of `content` size inside `container` preserving aspect ratio
pub fn contain_fit(container: Size, content: Size) -> DisplayFit {
    if container.is_empty() || content.is_empty() {
        return DisplayFit {
            offset_x: 0.0,
            offset_y: 0.0,
            width: container.width.max(0.0),
            height: container.height.max(0.0),
        };
    }

    let scale = (container.width / content.width).min(container.height / content.height);
    let width = content.width * scale;
    let height = content.height * scale;

    DisplayFit {
        offset_x: (container.width - width) / 2.0,
        offset_y: (container.height - height) / 2.0,
        width,
        height,
    }
}

/// Canvas buffer size for a page rasterized at `target_width` pixels wide
pub fn render_size(page_width: f64, page_height: f64, target_width: u32) -> (u32, u32) {
    if page_width <= 0.0 || page_height <= 0.0 {
        return (target_width, target_width);
    }
    let scale = target_width as f64 / page_width;
    let height = (page_height * scale).round().max(1.0);
    (target_width, height as u32)
}

/// Convert a pointer position on the display to ratio space
///
/// `overlay_offset` is the letterbox offset of the rendered page inside its
/// container. Results are clamped to [0, 1].
pub fn display_to_ratio(
    pointer: (f64, f64),
    display_size: Size,
    overlay_offset: (f64, f64),
    canvas_size: Size,
) -> RatioPoint {
    if display_size.is_empty() || canvas_size.is_empty() {
        return RatioPoint::new(0.0, 0.0);
    }

    let local_x = pointer.0 - overlay_offset.0;
    let local_y = pointer.1 - overlay_offset.1;

    let canvas_x = local_x * (canvas_size.width / display_size.width);
    let canvas_y = local_y * (canvas_size.height / display_size.height);

    RatioPoint::new(
        (canvas_x / canvas_size.width).clamp(0.0, 1.0),
        (canvas_y / canvas_size.height).clamp(0.0, 1.0),
    )
}

pub fn ratio_to_canvas_pixels(rect: &RatioRect, canvas_size: Size) -> PixelRect {
    PixelRect {
        x: rect.x * canvas_size.width,
        y: rect.y * canvas_size.height,
        width: rect.width * canvas_size.width,
        height: rect.height * canvas_size.height,
    }
}

/// Convert a pixel extent on the canvas to a ratio extent
pub fn pixels_to_ratio_size(px: f64, canvas_size: Size) -> (f64, f64) {
    if canvas_size.is_empty() {
        return (0.0, 0.0);
    }
    (px / canvas_size.width, px / canvas_size.height)
}

/// Convert a ratio rectangle to PDF points for a page of the given size
///
/// The vertical axis is flipped. Position is clamped to the page, then size is
/// clamped so the rectangle stays on the page, with a floor of 1 point.
pub fn ratio_to_pdf_points(rect: &RatioRect, page_width: f64, page_height: f64) -> PdfRect {
    let pdf_x = rect.x * page_width;
    let pdf_y = page_height - rect.y * page_height - rect.height * page_height;
    let pdf_width = rect.width * page_width;
    let pdf_height = rect.height * page_height;

    let x = pdf_x.clamp(0.0, page_width.max(0.0));
    let y = pdf_y.clamp(0.0, page_height.max(0.0));
    let width = pdf_width.min(page_width - x).max(1.0);
    let height = pdf_height.min(page_height - y).max(1.0);

    PdfRect {
        x,
        y,
        width,
        height,
    }
}

/// Map a rectangle drawn on a page shown with its `/Rotate` applied back into
/// the unrotated page's ratio space. Rotation is clockwise, as viewers show it.
pub fn unrotate_ratio_rect(rect: &RatioRect, rotation: i32) -> RatioRect {
    let RatioRect {
        x,
        y,
        width,
        height,
    } = *rect;
    match rotation.rem_euclid(360) {
        90 => RatioRect::new(y, 1.0 - x - width, height, width),
        180 => RatioRect::new(1.0 - x - width, 1.0 - y - height, width, height),
        270 => RatioRect::new(1.0 - y - height, x, height, width),
        _ => *rect,
    }
}

/// Inverse of [`ratio_to_pdf_points`] for rectangles that were not clamped
pub fn pdf_points_to_ratio(rect: &PdfRect, page_width: f64, page_height: f64) -> RatioRect {
    if page_width <= 0.0 || page_height <= 0.0 {
        return RatioRect::new(0.0, 0.0, 0.0, 0.0);
    }
    RatioRect {
        x: rect.x / page_width,
        y: (page_height - rect.y - rect.height) / page_height,
        width: rect.width / page_width,
        height: rect.height / page_height,
    }
}

/// Express a PDF rectangle as percentages of a CropBox, clamped to [0, 100]
pub fn pdf_points_to_crop_box_percent(rect: &PdfRect, crop_box: &PdfRect) -> PercentRect {
    let pct = |value: f64, extent: f64| {
        if extent > 0.0 {
            (value / extent * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    };

    PercentRect {
        x: pct(rect.x - crop_box.x, crop_box.width),
        y: pct(rect.y - crop_box.y, crop_box.height),
        width: pct(rect.width, crop_box.width),
        height: pct(rect.height, crop_box.height),
    }
}

/// "x%, y%, w%, h%" with two decimals, for copying into other tools
pub fn format_percent_rect(rect: &PercentRect) -> String {
    format!(
        "{:.2}%, {:.2}%, {:.2}%, {:.2}%",
        rect.x, rect.y, rect.width, rect.height
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_letter_page_crop_box() {
        let rect = RatioRect::new(0.1, 0.1, 0.5, 0.5);
        let pdf = ratio_to_pdf_points(&rect, 612.0, 792.0);
        assert_close(pdf.x, 61.2);
        assert_close(pdf.y, 316.8);
        assert_close(pdf.width, 306.0);
        assert_close(pdf.height, 396.0);
    }

    #[test]
    fn test_y_axis_flip() {
        // Top strip in ratio space is the top strip in PDF space
        let rect = RatioRect::new(0.0, 0.0, 1.0, 0.25);
        let pdf = ratio_to_pdf_points(&rect, 600.0, 800.0);
        assert_close(pdf.y, 600.0);
        assert_close(pdf.height, 200.0);
    }

    #[test]
    fn test_clamps_width_to_page() {
        let rect = RatioRect::new(0.8, 0.0, 0.5, 0.5);
        let pdf = ratio_to_pdf_points(&rect, 100.0, 100.0);
        assert_close(pdf.x, 80.0);
        assert_close(pdf.width, 20.0);
    }

    #[test]
    fn test_minimum_one_point() {
        let rect = RatioRect::new(0.5, 0.5, 0.0001, 0.0001);
        let pdf = ratio_to_pdf_points(&rect, 100.0, 100.0);
        assert_close(pdf.width, 1.0);
        assert_close(pdf.height, 1.0);
    }

    #[test]
    fn test_unrotate_quarter_turns() {
        let rect = RatioRect::new(0.1, 0.2, 0.3, 0.4);

        assert_eq!(unrotate_ratio_rect(&rect, 0), rect);
        // Shown 90 degrees clockwise, the left edge of the view is the page bottom
        let page = unrotate_ratio_rect(&rect, 90);
        assert_close(page.x, 0.2);
        assert_close(page.y, 0.6);
        assert_close(page.width, 0.4);
        assert_close(page.height, 0.3);

        let page = unrotate_ratio_rect(&rect, 180);
        assert_close(page.x, 0.6);
        assert_close(page.y, 0.4);

        let page = unrotate_ratio_rect(&rect, -90);
        assert_close(page.x, 0.4);
        assert_close(page.y, 0.1);
        assert_close(page.width, 0.4);
        assert_close(page.height, 0.3);
    }

    #[test]
    fn test_contain_fit_letterboxes_wide_container() {
        let fit = contain_fit(Size::new(1000.0, 500.0), Size::new(612.0, 792.0));
        assert_close(fit.height, 500.0);
        assert_close(fit.width, 612.0 * 500.0 / 792.0);
        assert_close(fit.offset_y, 0.0);
        assert_close(fit.offset_x, (1000.0 - fit.width) / 2.0);
    }

    #[test]
    fn test_contain_fit_letterboxes_tall_container() {
        let fit = contain_fit(Size::new(300.0, 900.0), Size::new(600.0, 600.0));
        assert_close(fit.width, 300.0);
        assert_close(fit.height, 300.0);
        assert_close(fit.offset_y, 300.0);
    }

    #[test]
    fn test_render_size_preserves_aspect() {
        assert_eq!(render_size(612.0, 792.0, 900), (900, 1165));
        assert_eq!(render_size(792.0, 612.0, 900), (900, 695));
    }

    #[test]
    fn test_display_to_ratio_subtracts_offset() {
        let display = Size::new(450.0, 582.5);
        let canvas = Size::new(900.0, 1165.0);
        let point = display_to_ratio((50.0 + 225.0, 10.0), display, (50.0, 10.0), canvas);
        assert_close(point.x, 0.5);
        assert_close(point.y, 0.0);
    }

    #[test]
    fn test_display_to_ratio_clamps() {
        let size = Size::new(100.0, 100.0);
        let point = display_to_ratio((-20.0, 250.0), size, (0.0, 0.0), size);
        assert_eq!(point, RatioPoint::new(0.0, 1.0));
    }

    #[test]
    fn test_display_to_ratio_zero_display() {
        let point = display_to_ratio(
            (10.0, 10.0),
            Size::new(0.0, 0.0),
            (0.0, 0.0),
            Size::new(900.0, 1165.0),
        );
        assert_eq!(point, RatioPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_ratio_to_canvas_pixels() {
        let rect = RatioRect::new(0.1, 0.2, 0.5, 0.25);
        let px = ratio_to_canvas_pixels(&rect, Size::new(900.0, 1200.0));
        assert_close(px.x, 90.0);
        assert_close(px.y, 240.0);
        assert_close(px.width, 450.0);
        assert_close(px.height, 300.0);
    }

    #[test]
    fn test_crop_box_percent_with_offset_origin() {
        let crop_box = PdfRect::new(50.0, 50.0, 500.0, 700.0);
        let rect = PdfRect::new(100.0, 120.0, 250.0, 350.0);
        let pct = pdf_points_to_crop_box_percent(&rect, &crop_box);
        assert_close(pct.x, 10.0);
        assert_close(pct.y, 10.0);
        assert_close(pct.width, 50.0);
        assert_close(pct.height, 50.0);
    }

    #[test]
    fn test_crop_box_percent_clamps() {
        let crop_box = PdfRect::new(100.0, 100.0, 100.0, 100.0);
        let rect = PdfRect::new(0.0, 0.0, 500.0, 50.0);
        let pct = pdf_points_to_crop_box_percent(&rect, &crop_box);
        assert_eq!(pct.x, 0.0);
        assert_eq!(pct.width, 100.0);
        assert_close(pct.height, 50.0);
    }

    #[test]
    fn test_format_percent_rect() {
        let pct = PercentRect {
            x: 10.0,
            y: 12.346,
            width: 50.0,
            height: 33.333,
        };
        assert_eq!(format_percent_rect(&pct), "10.00%, 12.35%, 50.00%, 33.33%");
    }

    #[test]
    fn test_box_array_normalizes_swapped_corners() {
        let rect = PdfRect::from_box_array([612.0, 792.0, 0.0, 0.0]);
        assert_eq!(rect, PdfRect::new(0.0, 0.0, 612.0, 792.0));
        assert_eq!(rect.to_box_array(), [0.0, 0.0, 612.0, 792.0]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    // Page sizes in points (business card up to A0)
    fn page_dimension() -> impl Strategy<Value = f64> {
        100.0f64..3400.0
    }

    fn valid_rect() -> impl Strategy<Value = RatioRect> {
        (0.0f64..0.98, 0.0f64..0.98)
            .prop_flat_map(|(x, y)| (Just(x), Just(y), 0.01f64..=(1.0 - x), 0.01f64..=(1.0 - y)))
            .prop_map(|(x, y, w, h)| RatioRect::new(x, y, w, h))
    }

    proptest! {
        /// Property: ratio -> PDF -> ratio recovers the rectangle
        #[test]
        fn roundtrip_ratio_to_pdf_to_ratio(
            rect in valid_rect(),
            page_w in page_dimension(),
            page_h in page_dimension(),
        ) {
            let pdf = ratio_to_pdf_points(&rect, page_w, page_h);
            let back = pdf_points_to_ratio(&pdf, page_w, page_h);

            let tolerance = 1e-9;
            prop_assert!((back.x - rect.x).abs() < tolerance, "x: {} -> {}", rect.x, back.x);
            prop_assert!((back.y - rect.y).abs() < tolerance, "y: {} -> {}", rect.y, back.y);
            prop_assert!((back.width - rect.width).abs() < tolerance, "w: {} -> {}", rect.width, back.width);
            prop_assert!((back.height - rect.height).abs() < tolerance, "h: {} -> {}", rect.height, back.height);
        }

        /// Property: rotating back out of any quarter turn keeps a valid rectangle
        #[test]
        fn unrotated_rect_stays_valid(rect in valid_rect(), turns in 0i32..4) {
            let page = unrotate_ratio_rect(&rect, turns * 90);
            prop_assert!((page.width * page.height - rect.width * rect.height).abs() < 1e-12);
            prop_assert!(page.x >= -1e-9 && page.y >= -1e-9);
            prop_assert!(page.x + page.width <= 1.0 + 1e-9);
            prop_assert!(page.y + page.height <= 1.0 + 1e-9);
        }

        /// Property: converted rectangles never leave the page
        #[test]
        fn pdf_rect_stays_on_page(
            x in 0.0f64..=1.0,
            y in 0.0f64..=1.0,
            w in 0.0f64..=1.0,
            h in 0.0f64..=1.0,
            page_w in page_dimension(),
            page_h in page_dimension(),
        ) {
            let pdf = ratio_to_pdf_points(&RatioRect::new(x, y, w, h), page_w, page_h);
            prop_assert!(pdf.x >= 0.0 && pdf.x <= page_w);
            prop_assert!(pdf.y >= 0.0 && pdf.y <= page_h);
            prop_assert!(pdf.width >= 1.0);
            prop_assert!(pdf.height >= 1.0);
            // Only the 1pt floor may push past the edge
            prop_assert!(pdf.x + pdf.width <= page_w + 1.0);
            prop_assert!(pdf.y + pdf.height <= page_h + 1.0);
        }

        /// Property: display coordinates always land inside [0, 1]
        #[test]
        fn display_to_ratio_is_clamped(
            px in -500.0f64..2500.0,
            py in -500.0f64..2500.0,
            display_w in 10.0f64..2000.0,
            display_h in 10.0f64..2000.0,
            offset_x in 0.0f64..200.0,
            offset_y in 0.0f64..200.0,
        ) {
            let canvas = Size::new(900.0, 1165.0);
            let point = display_to_ratio(
                (px, py),
                Size::new(display_w, display_h),
                (offset_x, offset_y),
                canvas,
            );
            prop_assert!((0.0..=1.0).contains(&point.x));
            prop_assert!((0.0..=1.0).contains(&point.y));
        }

        /// Property: the ratio of a point is independent of the canvas resolution
        #[test]
        fn display_to_ratio_independent_of_canvas(
            x_pct in 0.0f64..=1.0,
            y_pct in 0.0f64..=1.0,
            display_w in 10.0f64..2000.0,
            display_h in 10.0f64..2000.0,
            scale in 0.5f64..4.0,
        ) {
            let display = Size::new(display_w, display_h);
            let pointer = (x_pct * display_w, y_pct * display_h);

            let small = display_to_ratio(pointer, display, (0.0, 0.0), Size::new(900.0, 1165.0));
            let large = display_to_ratio(
                pointer,
                display,
                (0.0, 0.0),
                Size::new(900.0 * scale, 1165.0 * scale),
            );

            prop_assert!((small.x - large.x).abs() < 1e-9);
            prop_assert!((small.y - large.y).abs() < 1e-9);
            prop_assert!((small.x - x_pct).abs() < 1e-9);
        }

        /// Property: contain fit never overflows the container and keeps aspect
        #[test]
        fn contain_fit_within_container(
            container_w in 1.0f64..3000.0,
            container_h in 1.0f64..3000.0,
            content_w in 1.0f64..3000.0,
            content_h in 1.0f64..3000.0,
        ) {
            let fit = contain_fit(Size::new(container_w, container_h), Size::new(content_w, content_h));
            prop_assert!(fit.width <= container_w + 1e-6);
            prop_assert!(fit.height <= container_h + 1e-6);
            prop_assert!(fit.offset_x >= -1e-6 && fit.offset_y >= -1e-6);
            let aspect = content_w / content_h;
            prop_assert!((fit.width / fit.height - aspect).abs() / aspect < 1e-6);
        }
    }
}
