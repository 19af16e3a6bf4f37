//! Pixel-wise distortion and structural similarity metrics.

pub mod l1l2;
pub mod lp_norm;
pub mod mae;
pub mod mse;
pub mod nmse;
pub mod psnr;
pub mod qnr;
pub mod ssim;

pub use l1l2::{L1L2Config, L1L2};
pub use lp_norm::{LpNorm, LpNormConfig};
pub use mae::{Mae, MaeConfig};
pub use mse::{Mse, MseConfig};
pub use nmse::{Nmse, NmseConfig};
pub use psnr::{Psnr, PsnrConfig};
pub use qnr::{Qnr, QnrConfig};
pub use ssim::{Ssim, SsimConfig, MS_SSIM_WEIGHTS};
