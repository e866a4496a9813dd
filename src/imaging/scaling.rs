//! Scaling strategies applied before an image is split into tiles.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::error::{MapError, Result};

const FILTER: FilterType = FilterType::Triangle;

/// How a source image is fitted into the target tile area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalingType {
    /// Keep the source size.
    None,
    /// Fit inside the area, keeping the aspect ratio; borders are transparent.
    #[default]
    Contained,
    /// Cover the whole area, keeping the aspect ratio; overflow is cropped.
    Covered,
    /// Stretch to the exact area.
    Stretched,
}

impl ScalingType {
    /// Resize `image` for a `width` × `height` pixel area.
    pub fn resize(&self, image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
        if image.width() == 0 || image.height() == 0 || width == 0 || height == 0 {
            return image.clone();
        }

        match self {
            ScalingType::None => image.clone(),
            ScalingType::Stretched => imageops::resize(image, width, height, FILTER),
            ScalingType::Covered => DynamicImage::ImageRgba8(image.clone())
                .resize_to_fill(width, height, FILTER)
                .to_rgba8(),
            ScalingType::Contained => {
                let scaled = DynamicImage::ImageRgba8(image.clone())
                    .resize(width, height, FILTER)
                    .to_rgba8();
                center_on_canvas(&scaled, width, height)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalingType::None => "none",
            ScalingType::Contained => "contained",
            ScalingType::Covered => "covered",
            ScalingType::Stretched => "stretched",
        }
    }
}

impl fmt::Display for ScalingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ScalingType {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ScalingType::None),
            "contained" | "contain" => Ok(ScalingType::Contained),
            "covered" | "cover" => Ok(ScalingType::Covered),
            "stretched" | "stretch" => Ok(ScalingType::Stretched),
            _ => Err(MapError::Parse {
                message: format!("Unknown scaling type '{}'", s),
                help: Some("Use one of: none, contained, covered, stretched".to_string()),
            }),
        }
    }
}

/// Place `image` in the middle of a transparent `width` × `height` canvas.
///
/// Parts of the image outside the canvas are cut off.
pub fn center_on_canvas(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let x = (width as i64 - image.width() as i64) / 2;
    let y = (height as i64 - image.height() as i64) / 2;
    imageops::overlay(&mut canvas, image, x, y);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]))
    }

    #[test]
    fn test_none_keeps_size() {
        let img = opaque(300, 50);
        let out = ScalingType::None.resize(&img, 128, 128);
        assert_eq!(out.dimensions(), (300, 50));
    }

    #[test]
    fn test_stretched_exact_size() {
        let out = ScalingType::Stretched.resize(&opaque(300, 50), 256, 128);
        assert_eq!(out.dimensions(), (256, 128));
        assert_eq!(out.get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn test_covered_fills_area() {
        let out = ScalingType::Covered.resize(&opaque(300, 50), 128, 128);
        assert_eq!(out.dimensions(), (128, 128));
        // No transparent border: every corner is covered.
        assert_eq!(out.get_pixel(0, 0).0[3], 255);
        assert_eq!(out.get_pixel(127, 127).0[3], 255);
    }

    #[test]
    fn test_contained_letterboxes() {
        let out = ScalingType::Contained.resize(&opaque(256, 64), 128, 128);
        assert_eq!(out.dimensions(), (128, 128));
        // 256x64 fits as 128x32, centred vertically.
        assert_eq!(out.get_pixel(64, 0).0[3], 0);
        assert_eq!(out.get_pixel(64, 64).0[3], 255);
        assert_eq!(out.get_pixel(64, 127).0[3], 0);
    }

    #[test]
    fn test_parse_scaling_type() {
        assert_eq!("cover".parse::<ScalingType>().unwrap(), ScalingType::Covered);
        assert_eq!("Stretched".parse::<ScalingType>().unwrap(), ScalingType::Stretched);
        assert_eq!("none".parse::<ScalingType>().unwrap(), ScalingType::None);
        assert!("zoom".parse::<ScalingType>().is_err());
    }

    #[test]
    fn test_center_on_canvas_crops_overflow() {
        let out = center_on_canvas(&opaque(200, 10), 100, 100);
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(out.get_pixel(0, 50).0[3], 255);
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
    }
}
