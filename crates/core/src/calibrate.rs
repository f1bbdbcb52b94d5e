//! Raw/engineering calibration.
//!
//! The only calibrator form supported is the polynomial: forward
//! evaluation maps a raw wire value to its engineering value, and the
//! inverse (needed when encoding a calibrated value back into a
//! packet) solves `p(x) = y` for a real root.
//!
//! # Root selection
//!
//! The inverse may find several roots. Selection is deterministic:
//!
//! 1. keep roots whose imaginary part is negligible,
//! 2. keep roots inside the declared raw range, when one exists,
//! 3. prefer the smallest residual `|p(x) - y|`,
//! 4. break residual ties toward the midpoint of the raw range
//!    (or toward the smallest root when no range is declared).

use crate::error::CalibrationError;

/// Tolerance below which an imaginary component is treated as zero,
/// relative to the root's magnitude.
const IMAG_EPSILON: f64 = 1e-9;

/// Residuals within this factor of the best are considered tied.
const RESIDUAL_TIE: f64 = 1e-9;

/// Iteration cap and convergence threshold for the root finder.
const MAX_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-13;

/// One term of a polynomial: `coefficient * x^exponent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialTerm {
    pub coefficient: f64,
    pub exponent: u32,
}

/// Polynomial calibrator `p(x) = sum(c_i * x^i)`.
///
/// Terms are stored densely by exponent; missing exponents contribute
/// zero. Trailing zero coefficients are trimmed so the stored degree
/// is the true degree.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialCalibrator {
    /// coefficients[i] multiplies x^i
    coefficients: Vec<f64>,
}

impl PolynomialCalibrator {
    /// Build from sparse (coefficient, exponent) terms.
    pub fn new(terms: &[PolynomialTerm]) -> Self {
        let degree = terms.iter().map(|t| t.exponent).max().unwrap_or(0);
        let mut coefficients = vec![0.0; degree as usize + 1];
        for term in terms {
            coefficients[term.exponent as usize] += term.coefficient;
        }
        while coefficients.len() > 1 && coefficients.last() == Some(&0.0) {
            coefficients.pop();
        }
        Self { coefficients }
    }

    /// Forward calibration: raw to engineering.
    pub fn calibrate(&self, x: f64) -> f64 {
        // Horner evaluation
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c)
    }

    /// Inverse calibration: engineering back to raw.
    ///
    /// `raw_range` is the parameter's declared raw valid range, used
    /// both to filter roots and to break ties.
    ///
    /// # Errors
    /// - `CalibrationError::NoRealRoot` if every root is complex
    /// - `CalibrationError::NoRootInRange` if real roots exist but
    ///   none lies in `raw_range`
    pub fn uncalibrate(
        &self,
        y: f64,
        raw_range: Option<(f64, f64)>,
    ) -> Result<f64, CalibrationError> {
        let mut roots = self.real_roots(y)?;
        if roots.is_empty() {
            return Err(CalibrationError::NoRealRoot { value: y });
        }
        // Sort before filtering so every later step is order-stable.
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((min, max)) = raw_range {
            let span = (max - min).abs().max(1.0);
            roots.retain(|&r| r >= min - span * 1e-9 && r <= max + span * 1e-9);
            if roots.is_empty() {
                return Err(CalibrationError::NoRootInRange { value: y, min, max });
            }
        }

        let best_residual = roots
            .iter()
            .map(|&r| (self.calibrate(r) - y).abs())
            .fold(f64::INFINITY, f64::min);
        let tolerance = best_residual.max(1.0) * RESIDUAL_TIE + best_residual;
        let tied: Vec<f64> = roots
            .iter()
            .copied()
            .filter(|&r| (self.calibrate(r) - y).abs() <= tolerance)
            .collect();

        let chosen = match raw_range {
            Some((min, max)) => {
                let mid = (min + max) / 2.0;
                tied.iter()
                    .copied()
                    .min_by(|a, b| {
                        (a - mid)
                            .abs()
                            .partial_cmp(&(b - mid).abs())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .unwrap()
            }
            // No range: tied roots were sorted ascending, take the first
            None => tied[0],
        };
        Ok(chosen)
    }

    /// Degree of the polynomial.
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Real roots of `p(x) - y = 0`.
    fn real_roots(&self, y: f64) -> Result<Vec<f64>, CalibrationError> {
        let mut c = self.coefficients.clone();
        c[0] -= y;

        match c.len() {
            1 => {
                // Constant polynomial: either every x works or none does
                if c[0].abs() <= f64::EPSILON {
                    Ok(vec![0.0])
                } else {
                    Err(CalibrationError::NoRealRoot { value: y })
                }
            }
            2 => Ok(vec![-c[0] / c[1]]),
            3 => {
                let (a, b, k) = (c[2], c[1], c[0]);
                let disc = b * b - 4.0 * a * k;
                if disc < 0.0 {
                    // Allow tiny negative discriminants from float noise
                    if disc > -IMAG_EPSILON * b.abs().max(1.0) {
                        Ok(vec![-b / (2.0 * a)])
                    } else {
                        Err(CalibrationError::NoRealRoot { value: y })
                    }
                } else {
                    let s = disc.sqrt();
                    Ok(vec![(-b - s) / (2.0 * a), (-b + s) / (2.0 * a)])
                }
            }
            _ => {
                let roots = durand_kerner(&c);
                let real: Vec<f64> = roots
                    .iter()
                    .filter(|r| r.im.abs() <= IMAG_EPSILON * (1.0 + r.re.abs()))
                    .map(|r| r.re)
                    .collect();
                if real.is_empty() {
                    Err(CalibrationError::NoRealRoot { value: y })
                } else {
                    Ok(real)
                }
            }
        }
    }
}

/// Minimal complex arithmetic for the root finder.
#[derive(Debug, Clone, Copy)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn add(self, o: Complex) -> Complex {
        Complex::new(self.re + o.re, self.im + o.im)
    }

    fn sub(self, o: Complex) -> Complex {
        Complex::new(self.re - o.re, self.im - o.im)
    }

    fn mul(self, o: Complex) -> Complex {
        Complex::new(
            self.re * o.re - self.im * o.im,
            self.re * o.im + self.im * o.re,
        )
    }

    fn div(self, o: Complex) -> Complex {
        let denom = o.re * o.re + o.im * o.im;
        Complex::new(
            (self.re * o.re + self.im * o.im) / denom,
            (self.im * o.re - self.re * o.im) / denom,
        )
    }

    fn norm(self) -> f64 {
        (self.re * self.re + self.im * self.im).sqrt()
    }
}

/// Simultaneous-iteration root finder for polynomials of degree >= 3.
///
/// Works on monic-normalized coefficients with the standard fixed
/// starting points `(0.4 + 0.9i)^k`, which are never roots of a real
/// polynomial and keep the iteration fully deterministic.
fn durand_kerner(coefficients: &[f64]) -> Vec<Complex> {
    let degree = coefficients.len() - 1;
    let lead = coefficients[degree];
    let monic: Vec<f64> = coefficients.iter().map(|&c| c / lead).collect();

    let eval = |x: Complex| -> Complex {
        let mut acc = Complex::new(0.0, 0.0);
        for &c in monic.iter().rev() {
            acc = acc.mul(x).add(Complex::new(c, 0.0));
        }
        acc
    };

    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex> = Vec::with_capacity(degree);
    let mut power = Complex::new(1.0, 0.0);
    for _ in 0..degree {
        power = power.mul(seed);
        roots.push(power);
    }

    for _ in 0..MAX_ITERATIONS {
        let mut max_step = 0.0f64;
        for i in 0..degree {
            let mut denom = Complex::new(1.0, 0.0);
            for j in 0..degree {
                if i != j {
                    denom = denom.mul(roots[i].sub(roots[j]));
                }
            }
            let step = eval(roots[i]).div(denom);
            roots[i] = roots[i].sub(step);
            max_step = max_step.max(step.norm());
        }
        if max_step < CONVERGENCE {
            break;
        }
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> PolynomialCalibrator {
        // p(x) = 1 + 2x
        PolynomialCalibrator::new(&[
            PolynomialTerm {
                coefficient: 1.0,
                exponent: 0,
            },
            PolynomialTerm {
                coefficient: 2.0,
                exponent: 1,
            },
        ])
    }

    #[test]
    fn test_forward_linear() {
        assert_eq!(linear().calibrate(2.0), 5.0);
        assert_eq!(linear().calibrate(0.0), 1.0);
    }

    #[test]
    fn test_inverse_linear() {
        let raw = linear().uncalibrate(5.0, None).unwrap();
        assert!((raw - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_quadratic_prefers_range() {
        // p(x) = x^2 has roots +/-3 for y=9; range selects the positive one
        let p = PolynomialCalibrator::new(&[PolynomialTerm {
            coefficient: 1.0,
            exponent: 2,
        }]);
        let raw = p.uncalibrate(9.0, Some((0.0, 255.0))).unwrap();
        assert!((raw - 3.0).abs() < 1e-9);

        // Without a range, the smallest root wins
        let raw = p.uncalibrate(9.0, None).unwrap();
        assert!((raw + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_quadratic_no_real_root() {
        // x^2 + 1 = 0 has no real solution
        let p = PolynomialCalibrator::new(&[
            PolynomialTerm {
                coefficient: 1.0,
                exponent: 0,
            },
            PolynomialTerm {
                coefficient: 1.0,
                exponent: 2,
            },
        ]);
        assert!(matches!(
            p.uncalibrate(0.0, None),
            Err(CalibrationError::NoRealRoot { .. })
        ));
    }

    #[test]
    fn test_inverse_no_root_in_range() {
        let raw = linear().uncalibrate(5.0, Some((10.0, 20.0)));
        assert!(matches!(
            raw,
            Err(CalibrationError::NoRootInRange { .. })
        ));
    }

    #[test]
    fn test_cubic_round_trip() {
        // p(x) = 2 + 3x - x^2 + 0.5x^3
        let p = PolynomialCalibrator::new(&[
            PolynomialTerm {
                coefficient: 2.0,
                exponent: 0,
            },
            PolynomialTerm {
                coefficient: 3.0,
                exponent: 1,
            },
            PolynomialTerm {
                coefficient: -1.0,
                exponent: 2,
            },
            PolynomialTerm {
                coefficient: 0.5,
                exponent: 3,
            },
        ]);
        for raw in [0.0, 1.0, 7.0, 42.0, 200.0] {
            let y = p.calibrate(raw);
            let back = p.uncalibrate(y, Some((0.0, 255.0))).unwrap();
            assert!(
                (back - raw).abs() < 1e-6,
                "raw {raw} -> y {y} -> back {back}"
            );
        }
    }

    #[test]
    fn test_quartic_real_roots_found() {
        // p(x) = (x-1)(x-2)(x-3)(x-4) = x^4 -10x^3 +35x^2 -50x +24
        let p = PolynomialCalibrator::new(&[
            PolynomialTerm {
                coefficient: 24.0,
                exponent: 0,
            },
            PolynomialTerm {
                coefficient: -50.0,
                exponent: 1,
            },
            PolynomialTerm {
                coefficient: 35.0,
                exponent: 2,
            },
            PolynomialTerm {
                coefficient: -10.0,
                exponent: 3,
            },
            PolynomialTerm {
                coefficient: 1.0,
                exponent: 4,
            },
        ]);
        // y = 0: all four roots are real; the smallest is chosen
        let raw = p.uncalibrate(0.0, None).unwrap();
        assert!((raw - 1.0).abs() < 1e-6);
        // A range around 3 isolates that root
        let raw = p.uncalibrate(0.0, Some((2.5, 3.5))).unwrap();
        assert!((raw - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_determinism() {
        let p = PolynomialCalibrator::new(&[
            PolynomialTerm {
                coefficient: -5.0,
                exponent: 0,
            },
            PolynomialTerm {
                coefficient: 0.25,
                exponent: 1,
            },
            PolynomialTerm {
                coefficient: 1.5,
                exponent: 3,
            },
        ]);
        let first = p.uncalibrate(100.0, Some((0.0, 1000.0))).unwrap();
        for _ in 0..10 {
            assert_eq!(p.uncalibrate(100.0, Some((0.0, 1000.0))).unwrap(), first);
        }
    }

    #[test]
    fn test_sparse_terms_fill_gaps() {
        // p(x) = 7x^4: terms skip exponents 0..=3
        let p = PolynomialCalibrator::new(&[PolynomialTerm {
            coefficient: 7.0,
            exponent: 4,
        }]);
        assert_eq!(p.degree(), 4);
        assert_eq!(p.calibrate(2.0), 112.0);
    }
}
