//! # Window-based Multi-Head Self-Attention
//!
//! Self-attention computed independently inside non-overlapping square windows of
//! a channels-last feature map, with a learned relative position bias per head.
//!
//! A shifted layer rolls the feature map by half a window before partitioning so
//! that its windows straddle the window boundaries of the previous layer. Rolling
//! wraps the last rows and columns of the map around to the start, so windows of
//! the last row-block and last column-block hold positions that are not spatial
//! neighbours; two boundary masks remove those pairs from the softmax.

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, Linear},
    prelude::*,
    tensor::activation::softmax,
};
use burn_extra_ops::roll;

use crate::{
    error::{SwinError, SwinResult},
    init::ParamInit,
};

/// Partitions a feature map into non-overlapping windows.
///
/// # Arguments
/// - `x`: Input tensor of shape `[batch_size, height, width, channels]`
/// - `window_size`: Side of each window
///
/// # Returns
/// Tensor of shape `[batch_size * num_windows, window_size, window_size, channels]`
/// where windows are ordered batch first, then row of windows, then column.
///
/// # Panics
/// Height and width must be divisible by `window_size`.
pub fn window_partition<B: Backend>(x: Tensor<B, 4>, window_size: usize) -> Tensor<B, 4> {
    let [b, h, w, c] = x.dims();
    let x = x.reshape([
        b,
        h / window_size,
        window_size,
        w / window_size,
        window_size,
        c,
    ]);

    x.permute([0, 1, 3, 2, 4, 5]).reshape([
        b * (h / window_size) * (w / window_size),
        window_size,
        window_size,
        c,
    ])
}

/// Merges windows produced by [`window_partition`] back into a feature map.
///
/// # Arguments
/// - `windows`: Tensor of shape `[batch_size * num_windows, window_size, window_size, channels]`
/// - `window_size`: Side of each window
/// - `h`: Height of the feature map
/// - `w`: Width of the feature map
///
/// # Returns
/// Tensor of shape `[batch_size, height, width, channels]`
pub fn window_reverse<B: Backend>(
    windows: Tensor<B, 4>,
    window_size: usize,
    h: usize,
    w: usize,
) -> Tensor<B, 4> {
    let [total_windows, _, _, channels] = windows.dims();
    let b = total_windows / (h * w / window_size / window_size);
    let x = windows.reshape([
        b,
        h / window_size,
        w / window_size,
        window_size,
        window_size,
        channels,
    ]);

    x.permute([0, 1, 3, 2, 4, 5]).reshape([b, h, w, channels])
}

/// Row and column of every position of a flattened `window_size x window_size` window.
fn window_coordinates<B: Backend>(
    window_size: usize,
    device: &Device<B>,
) -> (Tensor<B, 1, Int>, Tensor<B, 1, Int>) {
    let n = window_size * window_size;
    let index = Tensor::<B, 1, Int>::arange(0..n as i64, device);
    let rows = index.clone().div_scalar(window_size as i64);
    let cols = index - rows.clone().mul_scalar(window_size as i64);

    (rows, cols)
}

/// Pairwise `key - query` differences of a per-position coordinate, shape `[n, n]`.
fn pairwise_offset<B: Backend>(coord: Tensor<B, 1, Int>) -> Tensor<B, 2, Int> {
    let [n] = coord.dims();
    let keys = coord.clone().reshape([1, n]).expand([n, n]);
    let queries = coord.reshape([n, 1]).expand([n, n]);

    keys - queries
}

/// Index into the relative position bias table for every (query, key) pair.
///
/// For positions `i` and `j` of a window with coordinates `(y, x)`, the offset
/// `(dy, dx) = (y_j - y_i, x_j - x_i)` lies in `[-(w - 1), w - 1]` on both axes and
/// maps to `(dy + w - 1) * (2w - 1) + (dx + w - 1)`. Pairs with the same offset
/// share an index wherever they sit in the window.
///
/// # Returns
/// Int tensor of shape `[window_size^2, window_size^2]` with values in
/// `[0, (2 * window_size - 1)^2)`.
pub fn relative_position_index<B: Backend>(
    window_size: usize,
    device: &Device<B>,
) -> Tensor<B, 2, Int> {
    let span = (2 * window_size - 1) as i64;
    let center = window_size as i64 - 1;
    let (rows, cols) = window_coordinates::<B>(window_size, device);

    let dy = pairwise_offset(rows).add_scalar(center);
    let dx = pairwise_offset(cols).add_scalar(center);

    dy.mul_scalar(span) + dx
}

/// Boundary masks of a shifted window with the given displacement.
///
/// # Returns
/// `[upper_lower, left_right]`, both boolean `[window_size^2, window_size^2]`:
/// - `upper_lower` is set where exactly one of query and key lies in the last
///   `displacement` rows of the window (the vertical wrap-around);
/// - `left_right` is set where exactly one of query and key lies in the last
///   `displacement` columns (the horizontal wrap-around).
pub fn shift_masks<B: Backend>(
    window_size: usize,
    displacement: usize,
    device: &Device<B>,
) -> [Tensor<B, 2, Bool>; 2] {
    let boundary = (window_size - displacement) as i64;
    let (rows, cols) = window_coordinates::<B>(window_size, device);

    let crosses_boundary = |coord: Tensor<B, 1, Int>| {
        let region = coord.greater_equal_elem(boundary).int();
        pairwise_offset(region).not_equal_elem(0)
    };

    [crosses_boundary(rows), crosses_boundary(cols)]
}

/// Places the boundary masks on the windows they apply to.
///
/// After a roll by `-(window_size / 2)`, only the last row of windows mixes the
/// bottom and top of the map and only the last column of windows mixes its right
/// and left edges. The corner window receives both masks.
///
/// # Arguments
/// - `upper_lower`, `left_right`: Masks from [`shift_masks`]
/// - `h_windows`: Number of windows along the height
/// - `w_windows`: Number of windows along the width
///
/// # Returns
/// Boolean tensor of shape `[h_windows * w_windows, window_size^2, window_size^2]`
pub fn window_mask<B: Backend>(
    upper_lower: Tensor<B, 2, Bool>,
    left_right: Tensor<B, 2, Bool>,
    h_windows: usize,
    w_windows: usize,
) -> Tensor<B, 3, Bool> {
    let [n, _] = upper_lower.dims();
    let num_windows = h_windows * w_windows;
    let device = upper_lower.device();

    let index = Tensor::<B, 1, Int>::arange(0..num_windows as i64, &device);
    let row = index.clone().div_scalar(w_windows as i64);
    let col = index - row.clone().mul_scalar(w_windows as i64);

    let per_window = |selected: Tensor<B, 1, Bool>, mask: Tensor<B, 2, Bool>| {
        let selected = selected
            .int()
            .reshape([num_windows, 1, 1])
            .expand([num_windows, n, n]);
        let mask = mask.int().reshape([1, n, n]).expand([num_windows, n, n]);
        selected * mask
    };

    let vertical = per_window(row.equal_elem(h_windows as i64 - 1), upper_lower);
    let horizontal = per_window(col.equal_elem(w_windows as i64 - 1), left_right);

    (vertical + horizontal).greater_elem(0)
}

/// Configuration for window-based multi-head self-attention.
///
/// # Arguments
/// - `dim`: Channels of the input feature map
/// - `n_head`: Number of attention heads
/// - `dim_head`: Dimension of every head
/// - `window_size`: Side of the square attention window
/// - `shift`: Whether the layer uses shifted windows
/// - `dropout`: Dropout probability on the attention weights
#[derive(Config, Debug)]
pub struct WindowAttentionConfig {
    dim: usize,
    n_head: usize,
    dim_head: usize,
    #[config(default = "7")]
    window_size: usize,
    #[config(default = "false")]
    shift: bool,
    #[config(default = "0.0")]
    dropout: f64,
    #[config(default = "ParamInit::new()")]
    param_init: ParamInit,
}

impl WindowAttentionConfig {
    /// Builds the attention block.
    ///
    /// # Errors
    /// Returns `SwinError::InvalidConfiguration` if the window size, head count or
    /// head dimension is zero.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinResult<WindowAttention<B>> {
        if self.window_size == 0 || self.n_head == 0 || self.dim_head == 0 {
            return Err(SwinError::InvalidConfiguration {
                reason: format!(
                    "window attention needs a positive window size, head count and head dimension, got {}, {} and {}",
                    self.window_size, self.n_head, self.dim_head
                ),
            });
        }

        let inner_dim = self.n_head * self.dim_head;
        let table_size = (2 * self.window_size - 1) * (2 * self.window_size - 1);

        let (upper_lower_mask, left_right_mask) = if self.shift {
            let [upper_lower, left_right] =
                shift_masks(self.window_size, self.window_size / 2, device);
            (Some(upper_lower), Some(left_right))
        } else {
            (None, None)
        };

        Ok(WindowAttention {
            dim: self.dim,
            n_head: self.n_head,
            dim_head: self.dim_head,
            window_size: self.window_size,
            shift: self.shift,
            qkv: self.param_init.linear(self.dim, inner_dim * 3, false, device),
            proj: self.param_init.linear(inner_dim, self.dim, true, device),
            relative_position_bias: self.param_init.embedding(table_size, self.n_head, device),
            relative_position_index: relative_position_index(self.window_size, device),
            upper_lower_mask,
            left_right_mask,
            attn_drop: DropoutConfig::new(self.dropout).init(),
        })
    }
}

/// Window-based multi-head self-attention with relative position bias.
///
/// # Components
/// - `qkv`: Fused, bias-free query/key/value projection
/// - `proj`: Output projection
/// - `relative_position_bias`: Table of `(2w - 1)^2` offsets by `n_head` biases
/// - `relative_position_index`: Pre-computed table index of every (query, key) pair
/// - `upper_lower_mask`, `left_right_mask`: Boundary masks, present on shifted layers
/// - `attn_drop`: Dropout on the attention weights
#[derive(Module, Debug)]
pub struct WindowAttention<B: Backend> {
    dim: usize,
    n_head: usize,
    dim_head: usize,
    window_size: usize,
    shift: bool,
    qkv: Linear<B>,
    proj: Linear<B>,
    relative_position_bias: Embedding<B>,
    relative_position_index: Tensor<B, 2, Int>,
    upper_lower_mask: Option<Tensor<B, 2, Bool>>,
    left_right_mask: Option<Tensor<B, 2, Bool>>,
    attn_drop: Dropout,
}

impl<B: Backend> WindowAttention<B> {
    pub const fn is_shifted(&self) -> bool {
        self.shift
    }

    /// Relative position bias of every (query, key) pair, shape `[n_head, w^2, w^2]`.
    pub fn relative_position_bias(&self) -> Tensor<B, 3> {
        let n = self.window_size * self.window_size;
        let index = self.relative_position_index.clone().reshape([1, n * n]);

        self.relative_position_bias
            .forward(index)
            .reshape([n, n, self.n_head])
            .permute([2, 0, 1])
    }

    /// Forward pass of window-based multi-head self-attention.
    ///
    /// # Arguments
    /// - `x`: Input tensor of shape `[batch_size, height, width, dim]`
    ///
    /// # Returns
    /// Output tensor of the same shape as the input.
    ///
    /// # Errors
    /// Returns `SwinError::InvalidTensorShape` if height or width is not divisible
    /// by the window size or if the channel count differs from `dim`.
    pub fn forward(&self, x: Tensor<B, 4>) -> SwinResult<Tensor<B, 4>> {
        let dims = x.dims();
        let [b, h, w, c] = dims;
        let window = self.window_size;
        if h % window != 0 || w % window != 0 {
            return Err(SwinError::shape(
                format!(
                    "[batch, height, width, channels] with height and width divisible by {window}"
                ),
                dims,
            ));
        }
        if c != self.dim {
            return Err(SwinError::shape(
                format!("[batch, height, width, {}]", self.dim),
                dims,
            ));
        }

        let h_windows = h / window;
        let w_windows = w / window;
        let num_windows = h_windows * w_windows;
        let n = window * window;
        let displacement = (window / 2) as i64;

        let x = if self.shift {
            roll(x, &[-displacement, -displacement], &[1, 2])
        } else {
            x
        };

        let windows = window_partition(x, window).reshape([b * num_windows, n, c]);
        let qkv = self
            .qkv
            .forward(windows)
            .reshape([b, num_windows, n, 3, self.n_head, self.dim_head])
            .permute([3, 0, 4, 1, 2, 5]);
        let split = |index: usize| {
            qkv.clone()
                .narrow(0, index, 1)
                .reshape([b, self.n_head, num_windows, n, self.dim_head])
        };
        let (q, k, v) = (split(0), split(1), split(2));

        // [batch, head, window, query, key]
        let scores = q
            .matmul(k.swap_dims(3, 4))
            .div_scalar((self.dim_head as f64).sqrt());
        let bias = self
            .relative_position_bias()
            .reshape([1, self.n_head, 1, n, n]);
        let scores = scores + bias;

        let scores = match (&self.upper_lower_mask, &self.left_right_mask) {
            (Some(upper_lower), Some(left_right)) => {
                let mask = window_mask(
                    upper_lower.clone(),
                    left_right.clone(),
                    h_windows,
                    w_windows,
                )
                .reshape([1, 1, num_windows, n, n])
                .expand([b, self.n_head, num_windows, n, n]);
                scores.mask_fill(mask, f32::NEG_INFINITY)
            }
            _ => scores,
        };

        let attn = softmax(scores, 4);
        let attn = self.attn_drop.forward(attn);

        let out = attn
            .matmul(v)
            .permute([0, 2, 3, 1, 4])
            .reshape([b * num_windows, window, window, self.n_head * self.dim_head]);
        let out = window_reverse(out, window, h, w);
        let out = self.proj.forward(out);

        Ok(if self.shift {
            roll(out, &[displacement, displacement], &[1, 2])
        } else {
            out
        })
    }
}
