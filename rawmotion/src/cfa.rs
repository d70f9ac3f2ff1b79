use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bayer color filter array layout of a sensor frame.
///
/// Carried in the per-frame metadata and threaded through call signatures
/// so downstream stages never rely on a process-wide pattern.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CfaPattern {
  #[default]
  #[serde(rename = "RGGB")]
  Rggb,
  #[serde(rename = "BGGR")]
  Bggr,
  #[serde(rename = "GRBG")]
  Grbg,
  #[serde(rename = "GBRG")]
  Gbrg,
}

impl CfaPattern {
  /// Color index (0 = red, 1 = green, 2 = blue) at an absolute sensor
  /// position.
  #[inline]
  pub fn color_at(&self, row: usize, col: usize) -> usize {
    let quad = match self {
      Self::Rggb => [0, 1, 1, 2],
      Self::Bggr => [2, 1, 1, 0],
      Self::Grbg => [1, 0, 2, 1],
      Self::Gbrg => [1, 2, 0, 1],
    };
    quad[(row & 1) * 2 + (col & 1)]
  }
}

impl FromStr for CfaPattern {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "RGGB" => Ok(Self::Rggb),
      "BGGR" => Ok(Self::Bggr),
      "GRBG" => Ok(Self::Grbg),
      "GBRG" => Ok(Self::Gbrg),
      other => Err(format!("Unknown CFA pattern: {}", other)),
    }
  }
}

impl fmt::Display for CfaPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Rggb => "RGGB",
      Self::Bggr => "BGGR",
      Self::Grbg => "GRBG",
      Self::Gbrg => "GBRG",
    };
    f.write_str(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rggb_quad() {
    let cfa = CfaPattern::Rggb;
    assert_eq!(cfa.color_at(0, 0), 0);
    assert_eq!(cfa.color_at(0, 1), 1);
    assert_eq!(cfa.color_at(1, 0), 1);
    assert_eq!(cfa.color_at(1, 1), 2);
    // Pattern repeats every two rows/cols
    assert_eq!(cfa.color_at(2, 2), 0);
  }

  #[test]
  fn parse_roundtrip() {
    for name in ["RGGB", "BGGR", "GRBG", "GBRG"] {
      assert_eq!(CfaPattern::from_str(name).unwrap().to_string(), name);
    }
  }
}
