//! Three-axis float tensor.
//!
//! `Tensor` stores one plane per channel. Each plane is column-major (row
//! index fastest) so that a plane can be handed to GEMM-style kernels as a
//! contiguous `rows x cols` matrix. `raw_shapes()` tracks the logical rank the
//! tensor was last reshaped or viewed to, independent of the physical layout.
use std::fmt;

use crate::formatting::format_truncated;

use super::shape::{default_raw_shape, numel, physical_dims};

/// Dense float32 tensor addressed as `(channel, row, col)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    channels: usize,
    rows: usize,
    cols: usize,
    raw_shapes: Vec<usize>,
}

impl Tensor {
    /// Allocate a zero-filled tensor.
    pub fn new(channels: usize, rows: usize, cols: usize) -> Self {
        assert!(
            channels > 0 && rows > 0 && cols > 0,
            "tensor dims must be positive, got ({}, {}, {})",
            channels,
            rows,
            cols
        );
        Self {
            data: vec![0.0; channels * rows * cols],
            channels,
            rows,
            cols,
            raw_shapes: default_raw_shape(channels, rows, cols),
        }
    }

    /// Allocate a zero-filled tensor from `[channels, rows, cols]`.
    pub fn from_shape(shape: &[usize]) -> Self {
        match *shape {
            [channels, rows, cols] => Self::new(channels, rows, cols),
            _ => panic!("tensor shape must have 3 dims, got {:?}", shape),
        }
    }

    /// Build a tensor from row-major values laid out channel by channel.
    pub fn from_values(channels: usize, rows: usize, cols: usize, values: &[f32]) -> Self {
        let mut tensor = Self::new(channels, rows, cols);
        tensor.fill_values(values);
        tensor
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total element count.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn plane_size(&self) -> usize {
        self.rows * self.cols
    }

    /// Physical shape as `[channels, rows, cols]`.
    pub fn shapes(&self) -> [usize; 3] {
        [self.channels, self.rows, self.cols]
    }

    /// Logical shape of rank 1 to 3.
    pub fn raw_shapes(&self) -> &[usize] {
        &self.raw_shapes
    }

    /// Flat storage in physical order.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Element at a flat physical offset.
    pub fn index(&self, offset: usize) -> f32 {
        assert!(
            offset < self.data.len(),
            "tensor offset {} out of bounds for size {}",
            offset,
            self.data.len()
        );
        self.data[offset]
    }

    pub fn index_mut(&mut self, offset: usize) -> &mut f32 {
        assert!(
            offset < self.data.len(),
            "tensor offset {} out of bounds for size {}",
            offset,
            self.data.len()
        );
        &mut self.data[offset]
    }

    fn offset(&self, channel: usize, row: usize, col: usize) -> usize {
        assert!(
            channel < self.channels && row < self.rows && col < self.cols,
            "tensor index ({}, {}, {}) out of bounds for shape {:?}",
            channel,
            row,
            col,
            self.shapes()
        );
        channel * self.plane_size() + col * self.rows + row
    }

    /// Element at `(channel, row, col)`.
    pub fn at(&self, channel: usize, row: usize, col: usize) -> f32 {
        self.data[self.offset(channel, row, col)]
    }

    pub fn at_mut(&mut self, channel: usize, row: usize, col: usize) -> &mut f32 {
        let offset = self.offset(channel, row, col);
        &mut self.data[offset]
    }

    /// Column-major plane of one channel.
    pub fn channel(&self, channel: usize) -> &[f32] {
        assert!(
            channel < self.channels,
            "channel {} out of bounds for {} channels",
            channel,
            self.channels
        );
        let plane = self.plane_size();
        &self.data[channel * plane..(channel + 1) * plane]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        assert!(
            channel < self.channels,
            "channel {} out of bounds for {} channels",
            channel,
            self.channels
        );
        let plane = self.plane_size();
        &mut self.data[channel * plane..(channel + 1) * plane]
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Fill from row-major values, one plane per channel.
    pub fn fill_values(&mut self, values: &[f32]) {
        assert_eq!(
            values.len(),
            self.data.len(),
            "fill expects {} values, got {}",
            self.data.len(),
            values.len()
        );
        let (rows, cols) = (self.rows, self.cols);
        let plane = self.plane_size();
        for (dst, src) in self.data.chunks_mut(plane).zip(values.chunks(plane)) {
            for row in 0..rows {
                for col in 0..cols {
                    dst[col * rows + row] = src[row * cols + col];
                }
            }
        }
    }

    pub fn ones(&mut self) {
        self.fill(1.0);
    }

    /// Export values row-major, one plane per channel.
    pub fn values(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.data.len());
        for plane in self.data.chunks(self.plane_size()) {
            for row in 0..self.rows {
                for col in 0..self.cols {
                    out.push(plane[col * self.rows + row]);
                }
            }
        }
        out
    }

    /// Add borders around every channel plane.
    ///
    /// `pads` is `[top, bottom, left, right]`.
    pub fn padding(&mut self, pads: [usize; 4], value: f32) {
        let [top, bottom, left, right] = pads;
        let rows = self.rows + top + bottom;
        let cols = self.cols + left + right;
        let mut data = vec![value; self.channels * rows * cols];
        for channel in 0..self.channels {
            let src = self.channel(channel);
            let dst = &mut data[channel * rows * cols..(channel + 1) * rows * cols];
            for col in 0..self.cols {
                let src_col = &src[col * self.rows..(col + 1) * self.rows];
                let start = (col + left) * rows + top;
                dst[start..start + self.rows].copy_from_slice(src_col);
            }
        }
        self.data = data;
        self.rows = rows;
        self.cols = cols;
        self.raw_shapes = default_raw_shape(self.channels, rows, cols);
    }

    /// Relabel the raw shape without moving any element.
    pub fn reshape(&mut self, shape: &[usize]) {
        assert!(
            !shape.is_empty() && shape.len() <= 3,
            "reshape expects 1 to 3 dims, got {:?}",
            shape
        );
        assert_eq!(
            numel(shape),
            self.data.len(),
            "reshape to {:?} does not preserve {} elements",
            shape,
            self.data.len()
        );
        let (channels, rows, cols) = physical_dims(shape);
        self.channels = channels;
        self.rows = rows;
        self.cols = cols;
        self.raw_shapes = shape.to_vec();
    }

    /// Reinterpret the tensor row-major into a new shape, moving elements.
    ///
    /// Every element keeps its position in the `(channel, row, col)` row-major
    /// order of the whole volume.
    pub fn view(&mut self, shape: &[usize]) {
        assert!(
            !shape.is_empty() && shape.len() <= 3,
            "view expects 1 to 3 dims, got {:?}",
            shape
        );
        assert_eq!(
            numel(shape),
            self.data.len(),
            "view to {:?} does not preserve {} elements",
            shape,
            self.data.len()
        );
        let (channels, rows, cols) = physical_dims(shape);
        let target_plane = rows * cols;
        let mut data = vec![0.0; self.data.len()];
        for channel in 0..self.channels {
            let plane = self.channel(channel);
            for col in 0..self.cols {
                for row in 0..self.rows {
                    let pos = channel * self.rows * self.cols + row * self.cols + col;
                    let dst_channel = pos / target_plane;
                    let rem = pos % target_plane;
                    let dst_row = rem / cols;
                    let dst_col = rem % cols;
                    data[dst_channel * target_plane + dst_col * rows + dst_row] =
                        plane[col * self.rows + row];
                }
            }
        }
        self.data = data;
        self.channels = channels;
        self.rows = rows;
        self.cols = cols;
        self.raw_shapes = shape.to_vec();
    }

    /// Relabel to a single raw axis.
    pub fn flatten(&mut self) {
        let size = self.data.len();
        self.reshape(&[size]);
    }

    /// Map `f` over every element.
    pub fn transform<F>(&mut self, f: F)
    where
        F: Fn(f32) -> f32,
    {
        for value in &mut self.data {
            *value = f(*value);
        }
    }

    /// Overwrite the storage with `src`'s elements, keeping this tensor's shape.
    pub fn copy_from(&mut self, src: &Tensor) {
        assert_eq!(
            src.size(),
            self.size(),
            "copy expects {} elements, got {}",
            self.size(),
            src.size()
        );
        self.data.copy_from_slice(&src.data);
    }

    /// Log every channel through the trace channel.
    pub fn show(&self) {
        for channel in 0..self.channels {
            crate::trace!("channel {}: {}", channel, format_truncated(self.channel(channel)));
        }
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={:?}, raw={:?}, values={})",
            self.shapes(),
            self.raw_shapes,
            format_truncated(&self.values())
        )
    }
}
