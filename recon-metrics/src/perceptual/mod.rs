//! Perceptual quality metrics.

pub mod lpips;
pub mod niqe;

pub use lpips::{LinearHeads, Lpips, LpipsConfig, LpipsNetwork, LPIPS_HEAD_KEY_REMAP};
pub use niqe::{Niqe, NiqeConfig, NiqePrior};
