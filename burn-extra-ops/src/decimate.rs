//! Integer-factor box decimation.

use burn::{
    prelude::*,
    tensor::{module::conv2d, ops::ConvOptions},
};

/// Averages non-overlapping `factor x factor` blocks of every channel.
///
/// Trailing rows and columns that do not fill a whole block are dropped.
///
/// # Shapes
///
/// - input: `[batch_size, channels, height, width]`
/// - output: `[batch_size, channels, height / factor, width / factor]`
pub fn box_decimate<B: Backend>(input: Tensor<B, 4>, factor: usize) -> Tensor<B, 4> {
    assert!(factor > 0, "Decimation factor must be positive, got {factor}");
    if factor == 1 {
        return input;
    }

    let [_, channels, _, _] = input.dims();
    let device = input.device();
    let weight = Tensor::<B, 4>::ones([channels, 1, factor, factor], &device)
        .div_scalar((factor * factor) as f64);

    conv2d(
        input,
        weight,
        None,
        ConvOptions::new([factor, factor], [0, 0], [1, 1], channels),
    )
}

#[cfg(test)]
mod tests {
    use burn::tensor::{ops::FloatElem, TensorData, Tolerance};

    use super::*;
    use crate::tests::TestBackend;

    type FT = FloatElem<TestBackend>;

    #[test]
    fn box_decimate_averages_blocks() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::from_floats(
            [[[
                [1.0, 3.0, 5.0, 7.0],
                [1.0, 3.0, 5.0, 7.0],
                [0.0, 0.0, 2.0, 2.0],
                [4.0, 4.0, 2.0, 2.0],
            ]]],
            &device,
        );

        let output = box_decimate(input, 2);

        output.into_data().assert_approx_eq::<FT>(
            &TensorData::from([[[[2.0, 6.0], [2.0, 2.0]]]]),
            Tolerance::default(),
        );
    }

    #[test]
    fn box_decimate_drops_partial_blocks() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::ones([2, 3, 9, 7], &device);

        assert_eq!(box_decimate(input, 4).dims(), [2, 3, 2, 1]);
    }

    #[test]
    #[should_panic = "Decimation factor must be positive"]
    fn box_decimate_zero_factor_panics() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::ones([1, 1, 4, 4], &device);
        let _ = box_decimate(input, 0);
    }
}
