//! # Cyclic Shift
//!
//! `roll` translates a tensor along one or more axes with wrap-around, so elements
//! pushed past the end of an axis re-enter at its start. It follows the semantics
//! of `torch.roll`: a positive shift moves elements towards higher indices.

use burn::prelude::*;

/// Cyclically shifts `input` by `shifts[i]` positions along `dims[i]`.
///
/// Shifts are reduced modulo the size of their axis, so shifting by the full
/// axis length (or zero) returns the input unchanged.
///
/// # Panics
///
/// Panics if `shifts` and `dims` have different lengths or if a dimension index
/// is out of range for `D`.
pub fn roll<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    shifts: &[i64],
    dims: &[usize],
) -> Tensor<B, D> {
    assert_eq!(
        shifts.len(),
        dims.len(),
        "roll expects one shift per dimension"
    );

    shifts
        .iter()
        .zip(dims)
        .fold(input, |x, (&shift, &dim)| roll_dim(x, shift, dim))
}

fn roll_dim<B: Backend, const D: usize>(input: Tensor<B, D>, shift: i64, dim: usize) -> Tensor<B, D> {
    assert!(dim < D, "dimension {dim} out of range for a rank {D} tensor");

    let size = input.dims()[dim] as i64;
    if size == 0 {
        return input;
    }
    let start = (size - shift).rem_euclid(size);
    if start == 0 {
        return input;
    }

    let head = input
        .clone()
        .narrow(dim, start as usize, (size - start) as usize);
    let tail = input.narrow(dim, 0, start as usize);

    Tensor::cat(vec![head, tail], dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type TestBackend = NdArray;

    #[test]
    fn test_roll_single_dim() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0, 2.0, 3.0, 4.0], &device);

        roll(x.clone(), &[2], &[0])
            .into_data()
            .assert_eq(&TensorData::from([3.0f32, 4.0, 0.0, 1.0, 2.0]), false);
        roll(x, &[-1], &[0])
            .into_data()
            .assert_eq(&TensorData::from([1.0f32, 2.0, 3.0, 4.0, 0.0]), false);
    }

    #[test]
    fn test_roll_full_cycle_is_identity() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0, 2.0], &device);

        roll(x.clone(), &[3], &[0])
            .into_data()
            .assert_eq(&x.clone().into_data(), false);
        roll(x.clone(), &[0], &[0])
            .into_data()
            .assert_eq(&x.into_data(), false);
    }

    #[test]
    fn test_roll_two_dims() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_floats(
            [[0.0, 1.0, 2.0], [3.0, 4.0, 5.0], [6.0, 7.0, 8.0]],
            &device,
        );

        roll(x, &[-1, -1], &[0, 1]).into_data().assert_eq(
            &TensorData::from([[4.0f32, 5.0, 3.0], [7.0, 8.0, 6.0], [1.0, 2.0, 0.0]]),
            false,
        );
    }

    #[test]
    fn test_roll_round_trip_restores_input() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random(
            [2, 14, 14, 8],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let shift = 7 / 2;

        let shifted = roll(x.clone(), &[-shift, -shift], &[1, 2]);
        let restored = roll(shifted, &[shift, shift], &[1, 2]);

        restored.into_data().assert_eq(&x.into_data(), true);
    }
}
