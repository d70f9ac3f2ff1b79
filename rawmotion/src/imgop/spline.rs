// SPDX-License-Identifier: LGPL-2.1
// Copyright 2025 Daniel Vogelbacher <daniel@chaospixel.com>

use thiserror::Error;

use super::Point;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplineError {
  #[error("Need at least two control points, got {}", _0)]
  TooFewPoints(usize),

  #[error("Curve must span the full range, endpoints are at x {} and {}", _0, _1)]
  BadEndpoints(usize, usize),

  #[error("Control point x {} must be greater than {}", _0, _1)]
  NotIncreasing(usize, usize),
}

// Constant factors for each segment of the curve. Segment i evaluates
// f(x) = a[i] + b[i]*(x - x[i]) + c[i]*(x - x[i])^2 + d[i]*(x - x[i])^3
#[derive(Clone, Debug, Default)]
struct Segment {
  a: f32,
  b: f32,
  c: f32,
  d: f32,
}

/// Natural cubic spline through a set of control points. The second
/// derivative at both curve ends is zero.
pub struct Spline {
  num_segments: usize,
  xcp: Vec<usize>,
  segments: Vec<Segment>,
}

impl Spline {
  fn prepare(&mut self) {
    let n = self.num_segments;
    let mut h = vec![0.0_f32; n];
    let mut alpha = vec![0.0_f32; n];
    let mut l = vec![0.0_f32; n + 1];
    let mut mu = vec![0.0_f32; n + 1];
    let mut z = vec![0.0_f32; n + 1];

    for i in 0..n {
      h[i] = (self.xcp[i + 1] - self.xcp[i]) as f32;
    }

    for i in 1..n {
      let sp = &self.segments[i - 1];
      let s = &self.segments[i];
      let sn = &self.segments[i + 1];
      alpha[i] = (3. / h[i]) * (sn.a - s.a) - (3. / h[i - 1]) * (s.a - sp.a);
    }

    l[0] = 1.0;
    for i in 1..n {
      l[i] = 2. * (self.xcp[i + 1] - self.xcp[i - 1]) as f32 - h[i - 1] * mu[i - 1];
      mu[i] = h[i] / l[i];
      z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
    }

    for i in (0..n).rev() {
      let sn = self.segments[i + 1].clone();
      let s = &mut self.segments[i];
      s.c = z[i] - mu[i] * sn.c;
      s.b = (sn.a - s.a) / h[i] - h[i] * (sn.c + 2. * s.c) / 3.;
      s.d = (sn.c - s.c) / (3. * h[i]);
    }

    // The last segment only carried the final a and c values during the
    // sweeps, drop it now.
    self.segments.pop();
    assert_eq!(self.num_segments, self.segments.len());
  }

  /// Build the spline factors for a set of control points.
  ///
  /// Control points may come straight from deserialized profiles, so
  /// the invariants are reported as errors instead of panics: at least
  /// two points, endpoints at 0 and 65535, strictly increasing x.
  pub fn new(control_points: &[Point]) -> std::result::Result<Self, SplineError> {
    if control_points.len() < 2 {
      return Err(SplineError::TooFewPoints(control_points.len()));
    }
    let first = control_points.first().map(|p| p.x).unwrap_or_default();
    let last = control_points.last().map(|p| p.x).unwrap_or_default();
    if first != u16::MIN as usize || last != u16::MAX as usize {
      return Err(SplineError::BadEndpoints(first, last));
    }

    let mut prev = None;
    for p in control_points {
      if let Some(prev) = prev {
        if p.x <= prev {
          return Err(SplineError::NotIncreasing(p.x, prev));
        }
      }
      prev = Some(p.x);
    }

    let num_coords = control_points.len();
    let num_segments = num_coords - 1;
    let mut xcp = vec![0; num_coords];
    let mut segments = vec![Segment::default(); num_coords];

    for (i, cpoint) in control_points.iter().enumerate() {
      xcp[i] = cpoint.x;
      segments[i].a = cpoint.y as f32;
    }

    let mut val = Self { num_segments, xcp, segments };
    val.prepare();
    Ok(val)
  }

  /// Evaluate the spline over the whole 16-bit input range.
  pub fn calculate_curve(self) -> Vec<u16> {
    let mut curve = vec![0; u16::MAX as usize + 1];

    for (i, s) in self.segments.iter().enumerate() {
      for x in self.xcp[i]..=self.xcp[i + 1] {
        let diff = (x - self.xcp[i]) as f32;
        let interpolated = s.a + s.b * diff + s.c * diff * diff + s.d * diff * diff * diff;
        curve[x] = interpolated.clamp(0.0, u16::MAX as f32) as u16;
      }
    }

    curve
  }
}
