//! Rotation-invariant perceptual fingerprints for image files.
//!
//! The image is decoded to grayscale, brought to a canonical vertical
//! orientation (landscape frames are rotated a quarter turn first), and
//! downscaled to a small fixed grid. A column-wise brightness-difference
//! bitmap is taken twice, at the canonical orientation and rotated a further
//! 180 degrees; both are rendered as hex strings, sorted, and concatenated.
//! The resulting fingerprint is identical under any multiple-of-180-degree
//! rotation from either baseline orientation, so rotated duplicates of an
//! image index as the same content.

use opencv::core::{Mat, MatTraitConst, MatTraitConstManual, Size};
use opencv::imgcodecs;
use opencv::imgproc;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Sampled columns per grid row; each row contributes `GRID_WIDTH - 1`
/// difference bits.
pub const GRID_WIDTH: usize = 9;
pub const GRID_HEIGHT: usize = 8;

/// Computes the orientation-invariant perceptual fingerprint of the image at
/// `path`.
pub fn perceptual_fingerprint(path: &Path) -> Result<String, PhashError> {
    let path_string = path
        .to_str()
        .map(|value| value.to_owned())
        .ok_or_else(|| PhashError::InvalidPath(path.to_path_buf()))?;

    let image = imgcodecs::imread(&path_string, imgcodecs::IMREAD_GRAYSCALE)
        .map_err(PhashError::OpenCv)?;
    if image.empty() {
        return Err(PhashError::EmptyImage(path.to_path_buf()));
    }

    let upright = if image.cols() > image.rows() {
        let mut rotated = Mat::default();
        opencv::core::rotate(&image, &mut rotated, opencv::core::ROTATE_90_CLOCKWISE)
            .map_err(PhashError::OpenCv)?;
        rotated
    } else {
        image
    };

    let mut resized = Mat::default();
    imgproc::resize(
        &upright,
        &mut resized,
        Size::new(GRID_WIDTH as i32, GRID_HEIGHT as i32),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .map_err(PhashError::OpenCv)?;

    let data = resized.data_typed::<u8>().map_err(PhashError::OpenCv)?;
    let expected = GRID_WIDTH * GRID_HEIGHT;
    if data.len() != expected {
        return Err(PhashError::UnexpectedGridLength {
            expected,
            actual: data.len(),
            path: path.to_path_buf(),
        });
    }

    Ok(orientation_invariant_hash(data))
}

/// Combines the difference bitmaps of `pixels` and its 180-degree rotation
/// into a single order-independent fingerprint string.
pub(crate) fn orientation_invariant_hash(pixels: &[u8]) -> String {
    let upright = difference_bits(pixels, GRID_WIDTH, GRID_HEIGHT);
    let rotated = difference_bits(&rotate_180(pixels), GRID_WIDTH, GRID_HEIGHT);
    let mut parts = [format!("{:016x}", upright), format!("{:016x}", rotated)];
    parts.sort();
    parts.concat()
}

/// Column-wise brightness-difference bitmap: one bit per adjacent column
/// pair in each row, set when brightness increases left to right.
pub(crate) fn difference_bits(pixels: &[u8], width: usize, height: usize) -> u64 {
    let mut bits = 0u64;
    for row in 0..height {
        for column in 0..width - 1 {
            bits <<= 1;
            if pixels[row * width + column] < pixels[row * width + column + 1] {
                bits |= 1;
            }
        }
    }
    bits
}

/// Rotating a flat row-major grid by 180 degrees is a plain reversal.
pub(crate) fn rotate_180(pixels: &[u8]) -> Vec<u8> {
    let mut rotated = pixels.to_vec();
    rotated.reverse();
    rotated
}

#[derive(Debug)]
pub enum PhashError {
    InvalidPath(PathBuf),
    EmptyImage(PathBuf),
    UnexpectedGridLength {
        expected: usize,
        actual: usize,
        path: PathBuf,
    },
    OpenCv(opencv::Error),
}

impl Display for PhashError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(path) => write!(
                f,
                "unable to convert path {} to UTF-8 string",
                path.display()
            ),
            Self::EmptyImage(path) => write!(f, "image at {} is empty", path.display()),
            Self::UnexpectedGridLength {
                expected,
                actual,
                path,
            } => write!(
                f,
                "unexpected grid length for {}: expected {}, got {}",
                path.display(),
                expected,
                actual
            ),
            Self::OpenCv(error) => write!(f, "opencv error: {}", error),
        }
    }
}

impl Error for PhashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OpenCv(error) => Some(error),
            _ => None,
        }
    }
}

impl From<opencv::Error> for PhashError {
    fn from(error: opencv::Error) -> Self {
        Self::OpenCv(error)
    }
}
