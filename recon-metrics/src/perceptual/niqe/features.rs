//! Natural scene statistics of image patches.
//!
//! Everything here runs on host memory over row-major `f64` luminance planes.

use burn_extra_ops::gaussian_kernel_1d;
use libm::tgamma;

/// Number of features per patch and scale.
pub const FEATURES_PER_SCALE: usize = 18;
/// Number of scales.
pub const SCALES: usize = 2;
/// Length of one patch feature vector.
pub const FEATURE_LEN: usize = FEATURES_PER_SCALE * SCALES;

const MSCN_WINDOW: usize = 7;
const MSCN_SIGMA: f64 = 7.0 / 6.0;
const MSCN_STABILIZER: f64 = 1.0;

/// Shifts of the paired products: horizontal, vertical and both diagonals.
const PAIR_SHIFTS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// A single-channel image in row-major order.
#[derive(Debug, Clone)]
pub struct Plane {
    pub data: Vec<f64>,
    pub height: usize,
    pub width: usize,
}

impl Plane {
    pub fn new(data: Vec<f64>, height: usize, width: usize) -> Self {
        debug_assert_eq!(data.len(), height * width);
        Self {
            data,
            height,
            width,
        }
    }

    fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    /// Top-left `height x width` window.
    pub fn crop(&self, height: usize, width: usize) -> Self {
        let data = (0..height)
            .flat_map(|r| (0..width).map(move |c| (r, c)))
            .map(|(r, c)| self.at(r, c))
            .collect();
        Self::new(data, height, width)
    }

    /// Averages non-overlapping 2x2 blocks.
    pub fn halve(&self) -> Self {
        let (height, width) = (self.height / 2, self.width / 2);
        let mut data = Vec::with_capacity(height * width);
        for r in 0..height {
            for c in 0..width {
                let sum = self.at(2 * r, 2 * c)
                    + self.at(2 * r, 2 * c + 1)
                    + self.at(2 * r + 1, 2 * c)
                    + self.at(2 * r + 1, 2 * c + 1);
                data.push(sum / 4.0);
            }
        }
        Self::new(data, height, width)
    }

    /// Separable filtering with replicated borders.
    fn filter(&self, kernel: &[f64]) -> Self {
        let radius = (kernel.len() / 2) as isize;
        let clamp = |i: isize, n: usize| i.clamp(0, n as isize - 1) as usize;

        let mut rows = vec![0.0; self.data.len()];
        for r in 0..self.height {
            for c in 0..self.width {
                rows[r * self.width + c] = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        w * self.at(r, clamp(c as isize + k as isize - radius, self.width))
                    })
                    .sum();
            }
        }

        let mut out = vec![0.0; self.data.len()];
        for r in 0..self.height {
            for c in 0..self.width {
                out[r * self.width + c] = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let src = clamp(r as isize + k as isize - radius, self.height);
                        w * rows[src * self.width + c]
                    })
                    .sum();
            }
        }
        Self::new(out, self.height, self.width)
    }

    /// Mean-subtracted contrast-normalized coefficients.
    pub fn mscn(&self) -> Self {
        let kernel = gaussian_kernel_1d(MSCN_WINDOW, MSCN_SIGMA);
        let mu = self.filter(&kernel);
        let squared = Self::new(
            self.data.iter().map(|v| v * v).collect(),
            self.height,
            self.width,
        );
        let second_moment = squared.filter(&kernel);

        let data = self
            .data
            .iter()
            .zip(&mu.data)
            .zip(&second_moment.data)
            .map(|((x, m), m2)| {
                let sigma = (m2 - m * m).abs().sqrt();
                (x - m) / (sigma + MSCN_STABILIZER)
            })
            .collect();
        Self::new(data, self.height, self.width)
    }

    /// Copy of the `size x size` patch at `(top, left)`.
    fn patch(&self, top: usize, left: usize, size: usize) -> Self {
        let data = (top..top + size)
            .flat_map(|r| (left..left + size).map(move |c| (r, c)))
            .map(|(r, c)| self.at(r, c))
            .collect();
        Self::new(data, size, size)
    }

    /// Circular shift by `(rows, cols)`, as `np.roll` over both axes.
    fn roll(&self, rows: isize, cols: isize) -> Self {
        let (h, w) = (self.height as isize, self.width as isize);
        let mut data = vec![0.0; self.data.len()];
        for r in 0..h {
            for c in 0..w {
                let dst = ((r + rows).rem_euclid(h) * w + (c + cols).rem_euclid(w)) as usize;
                data[dst] = self.data[(r * w + c) as usize];
            }
        }
        Self::new(data, self.height, self.width)
    }
}

/// Moment-matching lookup for the shape of a generalized Gaussian.
#[derive(Debug, Clone)]
pub struct GammaTable {
    shapes: Vec<f64>,
    ratios: Vec<f64>,
}

impl Default for GammaTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GammaTable {
    /// Shapes `0.2, 0.201, ..., 10.0` with `Γ(2/a)² / (Γ(1/a)·Γ(3/a))`.
    pub fn new() -> Self {
        let shapes: Vec<f64> = (0..=9800).map(|k| 0.2 + 0.001 * k as f64).collect();
        let ratios = shapes
            .iter()
            .map(|a| tgamma(2.0 / a).powi(2) / (tgamma(1.0 / a) * tgamma(3.0 / a)))
            .collect();
        Self { shapes, ratios }
    }

    fn lookup(&self, ratio: f64) -> f64 {
        let mut best = 0;
        let mut best_err = f64::INFINITY;
        for (i, r) in self.ratios.iter().enumerate() {
            let err = (r - ratio).powi(2);
            if err < best_err {
                best = i;
                best_err = err;
            }
        }
        self.shapes[best]
    }

    /// Asymmetric generalized Gaussian fit, `(alpha, beta_left, beta_right)`.
    ///
    /// Gives NaN parameters when one side of the distribution is empty.
    pub fn fit_aggd(&self, values: &[f64]) -> (f64, f64, f64) {
        let side_std = |keep: fn(f64) -> bool| {
            let (sum, count) = values
                .iter()
                .filter(|v| keep(**v))
                .fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
            (sum / count as f64).sqrt()
        };
        let left_std = side_std(|v| v < 0.0);
        let right_std = side_std(|v| v > 0.0);

        let n = values.len() as f64;
        let mean_abs = values.iter().map(|v| v.abs()).sum::<f64>() / n;
        let mean_sq = values.iter().map(|v| v * v).sum::<f64>() / n;

        let gamma_hat = left_std / right_std;
        let r_hat = mean_abs.powi(2) / mean_sq;
        let r_hat_norm =
            r_hat * (gamma_hat.powi(3) + 1.0) * (gamma_hat + 1.0) / (gamma_hat.powi(2) + 1.0).powi(2);
        if r_hat_norm.is_nan() {
            return (f64::NAN, f64::NAN, f64::NAN);
        }

        let alpha = self.lookup(r_hat_norm);
        let scale = (tgamma(1.0 / alpha) / tgamma(3.0 / alpha)).sqrt();
        (alpha, left_std * scale, right_std * scale)
    }

    /// The 18 statistics of one MSCN patch.
    pub fn patch_features(&self, patch: &Plane) -> [f64; FEATURES_PER_SCALE] {
        let mut features = [0.0; FEATURES_PER_SCALE];

        let (alpha, beta_l, beta_r) = self.fit_aggd(&patch.data);
        features[0] = alpha;
        features[1] = (beta_l + beta_r) / 2.0;

        for (i, (rows, cols)) in PAIR_SHIFTS.iter().enumerate() {
            let shifted = patch.roll(*rows, *cols);
            let products: Vec<f64> = patch
                .data
                .iter()
                .zip(&shifted.data)
                .map(|(a, b)| a * b)
                .collect();
            let (alpha, beta_l, beta_r) = self.fit_aggd(&products);
            let mean = (beta_r - beta_l) * tgamma(2.0 / alpha) / tgamma(1.0 / alpha);

            let offset = 2 + 4 * i;
            features[offset..offset + 4].copy_from_slice(&[alpha, mean, beta_l, beta_r]);
        }
        features
    }

    /// One 36-feature row per `patch_size` patch of a luminance plane.
    ///
    /// The plane is cropped to a whole number of patches first; the caller
    /// guarantees at least one fits.
    pub fn image_features(&self, plane: &Plane, patch_size: usize) -> Vec<[f64; FEATURE_LEN]> {
        let blocks_h = plane.height / patch_size;
        let blocks_w = plane.width / patch_size;
        let mut image = plane.crop(blocks_h * patch_size, blocks_w * patch_size);

        let mut rows = vec![[0.0; FEATURE_LEN]; blocks_h * blocks_w];
        for scale in 0..SCALES {
            let size = patch_size >> scale;
            let mscn = image.mscn();
            for bh in 0..blocks_h {
                for bw in 0..blocks_w {
                    let patch = mscn.patch(bh * size, bw * size, size);
                    let offset = scale * FEATURES_PER_SCALE;
                    rows[bh * blocks_w + bw][offset..offset + FEATURES_PER_SCALE]
                        .copy_from_slice(&self.patch_features(&patch));
                }
            }
            if scale + 1 < SCALES {
                image = image.halve();
            }
        }
        rows
    }
}
