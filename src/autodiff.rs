//! Forward-mode automatic differentiation with exact second derivatives.
//!
//! Log-densities, response functions and losses are written once, generic
//! over [`Real`]. Evaluated with `f64` they return plain values; evaluated
//! with [`Dual2`] they also carry the first and second derivative with respect
//! to the one input that was seeded with [`Dual2::variable`]. Seeding one raw
//! parameter at a time yields exactly the diagonal Hessian the boosting
//! library asks for.

use statrs::function::gamma;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Scalar type the loss functions are generic over.
pub trait Real:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Lift a constant; its derivatives are zero.
    fn constant(value: f64) -> Self;
    /// The primal value.
    fn value(&self) -> f64;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn ln_1p(self) -> Self;
    fn sqrt(self) -> Self;
    fn powi(self, n: i32) -> Self;
    fn abs(self) -> Self;
    fn ln_gamma(self) -> Self;

    fn recip(self) -> Self {
        Self::constant(1.0) / self
    }
}

impl Real for f64 {
    #[inline]
    fn constant(value: f64) -> Self {
        value
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }

    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn ln_1p(self) -> Self {
        f64::ln_1p(self)
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }

    #[inline]
    fn ln_gamma(self) -> Self {
        gamma::ln_gamma(self)
    }
}

/// Second-order dual number: value, first and second derivative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual2 {
    pub re: f64,
    pub d1: f64,
    pub d2: f64,
}

impl Dual2 {
    pub fn new(re: f64, d1: f64, d2: f64) -> Self {
        Self { re, d1, d2 }
    }

    /// The differentiation variable: `dx/dx = 1`.
    pub fn variable(x: f64) -> Self {
        Self::new(x, 1.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.re.is_finite() && self.d1.is_finite() && self.d2.is_finite()
    }

    /// Apply a scalar function `f` given `f(u)`, `f'(u)` and `f''(u)`.
    #[inline]
    fn chain(self, f: f64, df: f64, d2f: f64) -> Self {
        // Constants stay constants even where f' is infinite.
        if self.d1 == 0.0 && self.d2 == 0.0 {
            return Self::new(f, 0.0, 0.0);
        }
        Self::new(f, df * self.d1, d2f * self.d1 * self.d1 + df * self.d2)
    }
}

impl Add for Dual2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.d1 + rhs.d1, self.d2 + rhs.d2)
    }
}

impl Sub for Dual2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.d1 - rhs.d1, self.d2 - rhs.d2)
    }
}

impl Mul for Dual2 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re,
            self.d1 * rhs.re + self.re * rhs.d1,
            self.d2 * rhs.re + 2.0 * self.d1 * rhs.d1 + self.re * rhs.d2,
        )
    }
}

impl Div for Dual2 {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        self * rhs.recip()
    }
}

impl Neg for Dual2 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.re, -self.d1, -self.d2)
    }
}

impl Real for Dual2 {
    fn constant(value: f64) -> Self {
        Self::new(value, 0.0, 0.0)
    }

    fn value(&self) -> f64 {
        self.re
    }

    fn exp(self) -> Self {
        let e = self.re.exp();
        self.chain(e, e, e)
    }

    fn ln(self) -> Self {
        let u = self.re;
        self.chain(u.ln(), 1.0 / u, -1.0 / (u * u))
    }

    fn ln_1p(self) -> Self {
        let v = 1.0 + self.re;
        self.chain(self.re.ln_1p(), 1.0 / v, -1.0 / (v * v))
    }

    fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        self.chain(s, 0.5 / s, -0.25 / (s * self.re))
    }

    fn powi(self, n: i32) -> Self {
        let u = self.re;
        let nf = n as f64;
        self.chain(
            u.powi(n),
            nf * u.powi(n - 1),
            nf * (nf - 1.0) * u.powi(n - 2),
        )
    }

    fn abs(self) -> Self {
        if self.re < 0.0 { -self } else { self }
    }

    fn ln_gamma(self) -> Self {
        let u = self.re;
        self.chain(gamma::ln_gamma(u), gamma::digamma(u), trigamma(u))
    }

    fn recip(self) -> Self {
        let u = self.re;
        self.chain(1.0 / u, -1.0 / (u * u), 2.0 / (u * u * u))
    }
}

/// Trigamma function `psi_1(x)`, the derivative of the digamma function.
///
/// Shifts the argument above 6 with `psi_1(x) = psi_1(x + 1) + 1 / x^2` and
/// finishes with the asymptotic series. Negative arguments use the
/// reflection formula.
pub fn trigamma(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if x == f64::INFINITY {
        return 0.0;
    }
    if x <= 0.0 && x == x.floor() {
        return f64::INFINITY;
    }
    if x < 0.0 {
        let s = (std::f64::consts::PI * x).sin();
        return std::f64::consts::PI * std::f64::consts::PI / (s * s) - trigamma(1.0 - x);
    }

    let mut x = x;
    let mut acc = 0.0;
    while x < 6.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    acc + inv
        + 0.5 * inv2
        + inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)))
}
