//! Color-space conversion.
//!
//! Each [`ColorSpace`] maps an RGB image to a displayable composite plus three
//! labelled single-channel planes. CIE spaces go through `palette` (sRGB,
//! D65 white point); the video spaces use their published matrices directly.
//!
//! | Space | Composite | Planes |
//! |---|---|---|
//! | RGB | unchanged | raw R, G, B |
//! | XYZ | `X·255`, `Y·255`, `Z·255` | min-max normalised |
//! | Lab | `L·255/100`, `a+128`, `b+128` | min-max normalised |
//! | YCbCr | BT.601 full range | min-max normalised |
//! | YIQ | NTSC matrix, normalised over the whole image | Y as is, I and Q min-max |
//! | YUV | `Y`, `0.492(B−Y)+128`, `0.877(R−Y)+128` | raw |
//! | HSI | hue scaled 0..2π → 0..255, S and I scaled to 255 | same as composite |
//! | Luv | normalised over the whole image | same as composite |

use image::{GrayImage, Luma, Rgb, RgbImage};
use palette::{FromColor, Lab, Luv, Srgb, Xyz};
use serde::Serialize;
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ColorError {
    #[error("Unknown color space '{0}' (expected one of rgb, xyz, lab, ycbcr, yiq, yuv, hsi, luv)")]
    UnknownSpace(String),
    #[error("Cannot convert an empty image")]
    EmptyImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ColorSpace {
    Rgb,
    Xyz,
    Lab,
    YCbCr,
    Yiq,
    Yuv,
    Hsi,
    Luv,
}

impl ColorSpace {
    pub const ALL: [ColorSpace; 8] = [
        ColorSpace::Rgb,
        ColorSpace::Xyz,
        ColorSpace::Lab,
        ColorSpace::YCbCr,
        ColorSpace::Yiq,
        ColorSpace::Yuv,
        ColorSpace::Hsi,
        ColorSpace::Luv,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColorSpace::Rgb => "RGB",
            ColorSpace::Xyz => "XYZ",
            ColorSpace::Lab => "Lab",
            ColorSpace::YCbCr => "YCbCr",
            ColorSpace::Yiq => "YIQ",
            ColorSpace::Yuv => "YUV",
            ColorSpace::Hsi => "HSI",
            ColorSpace::Luv => "Luv",
        }
    }

    pub fn channel_labels(self) -> [&'static str; 3] {
        match self {
            ColorSpace::Rgb => ["R Channel", "G Channel", "B Channel"],
            ColorSpace::Xyz => ["X Component", "Y Component (Luminance)", "Z Component"],
            ColorSpace::Lab => ["L (Luminance)", "a (Green-Red)", "b (Blue-Yellow)"],
            ColorSpace::YCbCr => ["Y (Luminance)", "Cb (Blue Chrominance)", "Cr (Red Chrominance)"],
            ColorSpace::Yiq => ["Y (Luminance)", "I (In-phase)", "Q (Quadrature)"],
            ColorSpace::Yuv => ["Y Channel", "U Channel", "V Channel"],
            ColorSpace::Hsi => ["Hue", "Saturation", "Intensity"],
            ColorSpace::Luv => ["L Channel", "u Channel", "v Channel"],
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorSpace {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorSpace::ALL
            .into_iter()
            .find(|space| space.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ColorError::UnknownSpace(s.to_string()))
    }
}

/// One labelled component of a conversion, ready for display.
#[derive(Debug, Clone)]
pub struct ChannelPlane {
    pub label: &'static str,
    pub image: GrayImage,
}

#[derive(Debug, Clone)]
pub struct ColorConversion {
    pub space: ColorSpace,
    pub composite: RgbImage,
    pub channels: [ChannelPlane; 3],
}

/// Convert an RGB image into `space`.
pub fn convert(img: &RgbImage, space: ColorSpace) -> Result<ColorConversion, ColorError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ColorError::EmptyImage);
    }
    let (width, height) = img.dimensions();

    let (composite, planes) = match space {
        ColorSpace::Rgb => {
            let planes = split(&to_triples(img, |p| p.map(f32::from)));
            (img.clone(), planes.map(|p| plane_raw(&p, width, height)))
        }
        ColorSpace::Xyz => {
            let triples = to_triples(img, |p| {
                let xyz: Xyz = Xyz::from_color(srgb(p));
                [xyz.x, xyz.y, xyz.z]
            });
            let composite = compose(&triples, width, height, |[x, y, z]| {
                [x * 255.0, y * 255.0, z * 255.0]
            });
            (composite, split(&triples).map(|p| plane_minmax(&p, width, height)))
        }
        ColorSpace::Lab => {
            let triples = to_triples(img, |p| {
                let lab: Lab = Lab::from_color(srgb(p));
                [lab.l, lab.a, lab.b]
            });
            let composite = compose(&triples, width, height, |[l, a, b]| {
                [l * 255.0 / 100.0, a + 128.0, b + 128.0]
            });
            (composite, split(&triples).map(|p| plane_minmax(&p, width, height)))
        }
        ColorSpace::YCbCr => {
            let triples = to_triples(img, |p| {
                let [r, g, b] = p.map(f32::from);
                let y = luma(r, g, b);
                [y, 0.564 * (b - y) + 128.0, 0.713 * (r - y) + 128.0]
            });
            let composite = compose(&triples, width, height, |t| t);
            (composite, split(&triples).map(|p| plane_minmax(&p, width, height)))
        }
        ColorSpace::Yiq => {
            let triples = to_triples(img, |p| {
                let [r, g, b] = p.map(|v| f32::from(v) / 255.0);
                [
                    0.299 * r + 0.587 * g + 0.114 * b,
                    0.595_900_6 * r - 0.274_556_67 * g - 0.321_343_92 * b,
                    0.211_536_61 * r - 0.522_736_17 * g + 0.311_199_55 * b,
                ]
            });
            let (lo, hi) = bounds(triples.iter().flatten().copied());
            let scaled: Vec<[f32; 3]> = triples
                .iter()
                .map(|t| t.map(|v| unit(v, lo, hi) * 255.0))
                .collect();
            let composite = compose(&scaled, width, height, |t| t);
            let [y, i, q] = split(&scaled);
            (
                composite,
                [
                    plane_raw(&y, width, height),
                    plane_minmax(&i, width, height),
                    plane_minmax(&q, width, height),
                ],
            )
        }
        ColorSpace::Yuv => {
            let triples = to_triples(img, |p| {
                let [r, g, b] = p.map(f32::from);
                let y = luma(r, g, b);
                [y, 0.492 * (b - y) + 128.0, 0.877 * (r - y) + 128.0]
            });
            let composite = compose(&triples, width, height, |t| t);
            (composite, split(&triples).map(|p| plane_raw(&p, width, height)))
        }
        ColorSpace::Hsi => {
            let triples = to_triples(img, |p| {
                let [h, s, i] = hsi(p);
                [h * 255.0 / (2.0 * PI), s * 255.0, i * 255.0]
            });
            let composite = compose(&triples, width, height, |t| t);
            (composite, split(&triples).map(|p| plane_raw(&p, width, height)))
        }
        ColorSpace::Luv => {
            let triples = to_triples(img, |p| {
                let luv: Luv = Luv::from_color(srgb(p));
                [luv.l, luv.u, luv.v]
            });
            let (lo, hi) = bounds(triples.iter().flatten().copied());
            let scaled: Vec<[f32; 3]> = triples
                .iter()
                .map(|t| t.map(|v| unit(v, lo, hi) * 255.0))
                .collect();
            let composite = compose(&scaled, width, height, |t| t);
            (composite, split(&scaled).map(|p| plane_raw(&p, width, height)))
        }
    };

    let labels = space.channel_labels();
    let [a, b, c] = planes;
    tracing::debug!(%space, width, height, "converted color space");
    Ok(ColorConversion {
        space,
        composite,
        channels: [
            ChannelPlane {
                label: labels[0],
                image: a,
            },
            ChannelPlane {
                label: labels[1],
                image: b,
            },
            ChannelPlane {
                label: labels[2],
                image: c,
            },
        ],
    })
}

fn srgb(p: [u8; 3]) -> Srgb<f32> {
    Srgb::new(
        f32::from(p[0]) / 255.0,
        f32::from(p[1]) / 255.0,
        f32::from(p[2]) / 255.0,
    )
}

fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Hue in radians (0..2π), saturation and intensity in 0..1.
fn hsi(p: [u8; 3]) -> [f32; 3] {
    let [r, g, b] = p.map(|v| f32::from(v) / 255.0);
    let intensity = (r + g + b) / 3.0;
    let minimum = r.min(g).min(b);
    let saturation = 1.0 - 3.0 * minimum / (r + g + b + 1e-6);
    let root = ((r - g) * (r - g) + (r - b) * (g - b)).sqrt();
    let ratio = (0.5 * ((r - g) + (r - b)) / (root + 1e-6)).clamp(-1.0, 1.0);
    let theta = ratio.acos();
    let hue = if b <= g { theta } else { 2.0 * PI - theta };
    [hue, saturation, intensity]
}

fn to_triples(img: &RgbImage, f: impl Fn([u8; 3]) -> [f32; 3]) -> Vec<[f32; 3]> {
    img.pixels().map(|p| f(p.0)).collect()
}

fn split(triples: &[[f32; 3]]) -> [Vec<f32>; 3] {
    [0, 1, 2].map(|c| triples.iter().map(|t| t[c]).collect())
}

fn compose(
    triples: &[[f32; 3]],
    width: u32,
    height: u32,
    f: impl Fn([f32; 3]) -> [f32; 3],
) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let t = triples[(y * width + x) as usize];
        Rgb(f(t).map(to_u8))
    })
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn bounds(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Position of `v` in `[lo, hi]`; 0 when the range is empty.
fn unit(v: f32, lo: f32, hi: f32) -> f32 {
    if hi > lo { (v - lo) / (hi - lo) } else { 0.0 }
}

fn plane_raw(values: &[f32], width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        Luma([to_u8(values[(y * width + x) as usize])])
    })
}

fn plane_minmax(values: &[f32], width: u32, height: u32) -> GrayImage {
    let (lo, hi) = bounds(values.iter().copied());
    GrayImage::from_fn(width, height, |x, y| {
        Luma([to_u8(unit(values[(y * width + x) as usize], lo, hi) * 255.0)])
    })
}
