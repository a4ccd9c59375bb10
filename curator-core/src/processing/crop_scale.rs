// ============================================================================
// curator-core/src/processing/crop_scale.rs
// ============================================================================
//
// CROP/SCALE SOLVER: Aligned crop, pad and scale geometry
//
// Given the source frame size, an optional tier height and an optional
// detected crop box, this module computes the pad/crop/scale triple handed
// to the encoder. Every emitted box and its scaled counterpart satisfies the
// 4:2:0 alignment rule: both dimensions even and `width*height*1.5` a
// multiple of 16.
//
// KEY COMPONENTS:
// - Dimensions / Geometry: plain value types for frame sizes and boxes
// - CropScale: the solver result, absent fields meaning identity
// - solve: exhaustive nearest-candidate search inside the tier window
//
// The solver is a pure function; it performs no I/O and never logs.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Block size the 4:2:0 plane byte count must be a multiple of.
pub const ALIGNMENT_BLOCK: u64 = 16;

/// Pad growth per step on the x axis.
const PAD_STEP_X: i64 = 4;

/// Pad growth per step on the y axis.
const PAD_STEP_Y: i64 = 2;

/// Width/height pair, used for frame sizes and scale targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when both dimensions are even and the 4:2:0 plane is block aligned.
    pub fn is_aligned(&self) -> bool {
        is_aligned(self.width, self.height)
    }
}

/// Positioned rectangle: a crop box, or a padded frame with the offset of
/// the source inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Solver output. `None` fields are identity transforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropScale {
    pub pad: Option<Geometry>,
    pub crop: Option<Geometry>,
    pub scale: Option<Dimensions>,
}

impl CropScale {
    pub fn is_identity(&self) -> bool {
        self.pad.is_none() && self.crop.is_none() && self.scale.is_none()
    }
}

/// Maximum output width of a supported tier height (16:9 table).
pub fn max_width_for(max_height: u32) -> Option<u32> {
    match max_height {
        1080 => Some(1920),
        720 => Some(1280),
        480 => Some(854),
        _ => None,
    }
}

/// Search window half-size in pixels for a tier height.
///
/// Unsupported or absent heights use the 1080 tolerance.
pub fn search_delta(max_height: Option<u32>) -> u32 {
    match max_height {
        Some(720) => 22,
        Some(480) => 46,
        _ => 6,
    }
}

fn is_aligned(width: u32, height: u32) -> bool {
    if width % 2 != 0 || height % 2 != 0 {
        return false;
    }
    let plane = u64::from(width) * u64::from(height) * 3 / 2;
    plane % ALIGNMENT_BLOCK == 0
}

/// Aspect-preserving downscale into `max_width x max_height`.
///
/// Frames already inside the box are returned unchanged.
fn scaled(width: u32, height: u32, max_width: u32, max_height: u32) -> Dimensions {
    if width <= max_width && height <= max_height {
        return Dimensions::new(width, height);
    }
    let mw = f64::from(max_width);
    let mh = f64::from(max_height);
    let max_aspect = mw / mh;
    let aspect = f64::from(width) / f64::from(height);

    let out_width = if aspect >= max_aspect {
        max_width
    } else {
        (mh * aspect).ceil() as u32
    };
    let out_height = if aspect > max_aspect {
        (mw / aspect).ceil() as u32
    } else {
        max_height
    };
    Dimensions::new(out_width, out_height)
}

fn round_up_even(value: u32) -> u32 {
    value + value % 2
}

/// Computes the aligned pad/crop/scale triple for a source frame.
///
/// `detected_crop` is the raw cropdetect box (or `None` for the full frame).
/// The search walks widths (outer) and heights (inner) from the detected box
/// upward in steps of 2 up to the tier tolerance, keeping the candidate
/// nearest to the detected box whose crop and scaled size are both aligned.
/// Ties keep the first candidate enumerated.
pub fn solve(
    original: Dimensions,
    max_height: Option<u32>,
    detected_crop: Option<Geometry>,
) -> CoreResult<CropScale> {
    if max_height.is_none() && detected_crop.is_none() {
        return Ok(CropScale::default());
    }

    let tier = max_height.and_then(|h| max_width_for(h).map(|w| (w, h)));
    let delta = search_delta(max_height);
    let base = detected_crop.unwrap_or(Geometry::new(0, 0, original.width, original.height));
    let base_width = round_up_even(base.width);
    let base_height = round_up_even(base.height);

    let scale_of = |w: u32, h: u32| match tier {
        Some((mw, mh)) => scaled(w, h, mw, mh),
        None => Dimensions::new(w, h),
    };

    let mut best: Option<(u64, u32, u32)> = None;
    for width in (base_width..=base_width + delta).step_by(2) {
        for height in (base_height..=base_height + delta).step_by(2) {
            if !is_aligned(width, height) || !scale_of(width, height).is_aligned() {
                continue;
            }
            let dw = u64::from(width - base.width);
            let dh = u64::from(height - base.height);
            let distance = dw * dw + dh * dh;
            if best.is_none_or(|(d, _, _)| distance < d) {
                best = Some((distance, width, height));
            }
        }
    }

    let Some((_, width, height)) = best else {
        return Err(CoreError::AlignmentUnsatisfiable {
            width: base.width,
            height: base.height,
            max_height,
            delta,
        });
    };

    // Grow the box around its centre; the pad absorbs any overflow.
    let mut x = i64::from(base.x) - i64::from(width - base.width) / 2;
    let mut y = i64::from(base.y) - i64::from(height - base.height) / 2;
    let (pad_x, frame_width) = pad_axis(x, width, original.width, PAD_STEP_X);
    let (pad_y, frame_height) = pad_axis(y, height, original.height, PAD_STEP_Y);
    x += pad_x;
    y += pad_y;

    let pad = (pad_x > 0 || pad_y > 0).then(|| {
        Geometry::new(pad_x as u32, pad_y as u32, frame_width, frame_height)
    });

    let crop_box = Geometry::new(x as u32, y as u32, width, height);
    let crop = (crop_box != Geometry::new(0, 0, frame_width, frame_height)).then_some(crop_box);

    let target = scale_of(width, height);
    let scale = (target != Dimensions::new(width, height)).then_some(target);

    Ok(CropScale { pad, crop, scale })
}

/// Returns the pad offset for one axis and the resulting frame extent.
///
/// A padded extent is rounded up to even, since 4:2:0 `pad` cannot emit
/// odd frames.
fn pad_axis(offset: i64, extent: u32, frame: u32, step: i64) -> (i64, u32) {
    let extent = i64::from(extent);
    let frame = i64::from(frame);
    let mut pad = 0;
    while offset + pad < 0 || offset + pad + extent > frame + 2 * pad {
        pad += step;
    }
    if pad == 0 {
        return (0, frame as u32);
    }
    (pad, round_up_even((frame + 2 * pad) as u32))
}
