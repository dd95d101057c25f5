use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use half::{bf16, f16};

/// Floating point storage precision an operation runs at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Precision {
    #[default]
    F32,
    F16,
    BF16,
}

impl Precision {
    pub fn tag(&self) -> &'static str {
        match self {
            Precision::F32 => "f32",
            Precision::F16 => "f16",
            Precision::BF16 => "bf16",
        }
    }

    pub fn size_of(&self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F16 | Precision::BF16 => 2,
        }
    }

    pub fn is_reduced(&self) -> bool {
        *self != Precision::F32
    }

    /// Nearest value representable at this precision, widened back to f32.
    pub fn round(&self, x: f32) -> f32 {
        match self {
            Precision::F32 => x,
            Precision::F16 => f16::from_f32(x).to_f32(),
            Precision::BF16 => bf16::from_f32(x).to_f32(),
        }
    }

    pub fn round_slice(&self, xs: &mut [f32]) {
        if self.is_reduced() {
            xs.iter_mut().for_each(|x| *x = self.round(*x));
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Precision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "f32" => Ok(Precision::F32),
            "f16" => Ok(Precision::F16),
            "bf16" => Ok(Precision::BF16),
            _ => bail!("Unknown precision: {s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn f32_is_identity() {
        assert_eq!(Precision::F32.round(0.1), 0.1);
    }

    #[test]
    fn reduced_precisions_lose_bits() {
        let x = 1.0f32 + 1e-4;
        assert_ne!(Precision::F16.round(x), x);
        assert_ne!(Precision::BF16.round(x), x);
        assert_abs_diff_eq!(Precision::F16.round(x), x, epsilon = 1e-3);
        assert_abs_diff_eq!(Precision::BF16.round(x), x, epsilon = 1e-2);
    }

    #[test]
    fn round_slice() {
        let mut xs = [1.0f32 + 1e-4, 2.0, -0.5];
        Precision::F16.round_slice(&mut xs);
        assert_eq!(xs, [1.0, 2.0, -0.5]);
    }

    proptest! {
        #[test]
        fn rounding_is_idempotent(x in -60000f32..60000f32) {
            for p in [Precision::F32, Precision::F16, Precision::BF16] {
                let once = p.round(x);
                prop_assert_eq!(p.round(once), once);
            }
        }
    }
}
