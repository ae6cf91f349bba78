// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Toolkit-neutral chart payload handed to the front end.

use serde::Serialize;

use crate::common::config::AppConfig;

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

pub fn device_color(device: usize) -> &'static str {
    PALETTE[device % PALETTE.len()]
}

/// Auto-scaling y-axis bounds that only ever widen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YRange {
    low: f64,
    high: f64,
}

impl Default for YRange {
    fn default() -> Self {
        Self {
            low: f64::INFINITY,
            high: f64::NEG_INFINITY,
        }
    }
}

impl YRange {
    pub fn widen(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        let low = value * AppConfig::Y_RANGE_LOW_FACTOR;
        let high = value * AppConfig::Y_RANGE_HIGH_FACTOR;
        if low < self.low {
            self.low = low;
        }
        if high > self.high {
            self.high = high;
        }
    }

    pub fn widen_all(&mut self, values: &[f64]) {
        values.iter().for_each(|&v| self.widen(v));
    }

    /// `None` until a finite value has been observed.
    pub fn bounds(&self) -> Option<[f64; 2]> {
        (self.low.is_finite() && self.high.is_finite()).then_some([self.low, self.high])
    }
}

/// `[min - pad, max + pad]` with the pad a fixed fraction of the span.
pub fn padded_x_range(x: &[f64]) -> Option<[f64; 2]> {
    let (min, max) = x
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    let span = max - min;
    let pad = if span > 0.0 {
        span * AppConfig::X_RANGE_PADDING
    } else {
        // single point
        AppConfig::X_RANGE_PADDING
    };
    Some([min - pad, max + pad])
}

/// Grid shape for `plots` subplots: one column for a single plot, else two.
pub fn layout(plots: usize) -> (usize, usize) {
    let cols = if plots <= 1 { 1 } else { 2 };
    let rows = plots.div_ceil(2).max(1);
    (rows, cols)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Series {
    pub device: usize,
    pub label: String,
    pub color: &'static str,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Subplot {
    pub key: String,
    pub title: String,
    pub y_label: String,
    /// 1-based grid position, filled row by row.
    pub row: usize,
    pub col: usize,
    pub x_range: Option<[f64; 2]>,
    pub y_range: Option<[f64; 2]>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct Frame {
    /// Newest tick rendered, `None` before the first sample.
    pub tick: Option<i64>,
    pub rows: usize,
    pub cols: usize,
    pub subplots: Vec<Subplot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yrange_widens_only() {
        let mut range = YRange::default();
        assert_eq!(range.bounds(), None);

        range.widen_all(&[50.0, 40.0, 60.0]);
        let [low, high] = range.bounds().unwrap();
        assert!((low - 32.0).abs() < 1e-9);
        assert!((high - 75.0).abs() < 1e-9);

        range.widen(f64::NAN);
        range.widen(50.0);
        assert_eq!(range.bounds(), Some([low, high]));
    }

    #[test]
    fn test_padded_x_range() {
        assert_eq!(padded_x_range(&[]), None);
        let [lo, hi] = padded_x_range(&[0.0, 10.0]).unwrap();
        assert!((lo + 0.5).abs() < 1e-9);
        assert!((hi - 10.5).abs() < 1e-9);
        let [lo, hi] = padded_x_range(&[3.0]).unwrap();
        assert!(lo < 3.0 && hi > 3.0);
    }

    #[test]
    fn test_layout() {
        assert_eq!(layout(1), (1, 1));
        assert_eq!(layout(2), (1, 2));
        assert_eq!(layout(5), (3, 2));
        assert_eq!(layout(8), (4, 2));
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(device_color(0), device_color(10));
        assert_ne!(device_color(0), device_color(1));
    }
}
