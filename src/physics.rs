/// Hydrogen atom stationary-state wavefunctions
/// Based on the Schrödinger equation for hydrogen-like atoms: psi = R_nl(r) * Y_lm(theta, phi)

use ndarray::{Array, ArrayBase, Data, Dimension, Zip};
use serde::Serialize;
use std::f64::consts::PI;

use crate::error::{Result, WavefunctionError};

/// Represents quantum numbers (n, l, m_l)
/// n: Principal quantum number (1, 2, 3, ...)
/// l: Azimuthal quantum number (0 to n-1)
/// m_l: Magnetic quantum number (-l to l)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuantumNumbers {
    n: u32,
    l: u32,
    m_l: i32,
}

impl QuantumNumbers {
    /// Takes signed input so that negative values coming from a command line are
    /// reported as domain errors instead of wrapping.
    pub fn new(n: i32, l: i32, m_l: i32) -> Result<Self> {
        if n < 1 {
            return Err(WavefunctionError::Domain(format!(
                "principal quantum number n must be >= 1, got {n}"
            )));
        }
        if l < 0 || l > n - 1 {
            return Err(WavefunctionError::Domain(format!(
                "azimuthal quantum number l must satisfy 0 <= l <= n - 1 = {}, got {l}",
                n - 1
            )));
        }
        if m_l.unsigned_abs() > l.unsigned_abs() {
            return Err(WavefunctionError::Domain(format!(
                "magnetic quantum number m must satisfy -{l} <= m <= {l}, got {m_l}"
            )));
        }
        Ok(QuantumNumbers {
            n: n.unsigned_abs(),
            l: l.unsigned_abs(),
            m_l,
        })
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn l(&self) -> u32 {
        self.l
    }

    pub fn m_l(&self) -> i32 {
        self.m_l
    }

    /// `(n, l, m)`, the tuple used in plot labels and file names
    pub fn label(&self) -> String {
        format!("({}, {}, {})", self.n, self.l, self.m_l)
    }

    /// Spectroscopic name such as `2p` or `3d`
    pub fn orbital_name(&self) -> String {
        const LETTERS: [char; 7] = ['s', 'p', 'd', 'f', 'g', 'h', 'i'];
        match LETTERS.get(self.l as usize) {
            Some(letter) => format!("{}{}", self.n, letter),
            None => format!("{}[l={}]", self.n, self.l),
        }
    }
}

/// Length scale of the atom. All radial distances are measured against it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BohrRadius(f64);

impl BohrRadius {
    pub fn new(a0: f64) -> Result<Self> {
        if !a0.is_finite() || a0 < 1.0 {
            return Err(WavefunctionError::Domain(format!(
                "bohr radius a0 must be a finite number >= 1, got {a0}"
            )));
        }
        Ok(BohrRadius(a0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Largest k for which k! is finite in `f64`
pub const MAX_FINITE_FACTORIAL: u32 = 170;

/// Special functions the evaluators depend on. `Recurrence` is the built-in provider;
/// any other numeric library can be plugged in behind this trait.
pub trait SpecialFunctions: Send + Sync {
    fn factorial(&self, k: u32) -> f64;

    /// ln(k!). Normalization constants are built from this so that ratios of
    /// factorials stay finite where the factorials themselves overflow.
    fn ln_factorial(&self, k: u32) -> f64 {
        let head = k.min(MAX_FINITE_FACTORIAL);
        self.factorial(head).ln() + (head + 1..=k).map(|i| f64::from(i).ln()).sum::<f64>()
    }

    /// Generalized Laguerre polynomial L^order_degree(x)
    fn laguerre(&self, degree: u32, order: u32, x: f64) -> f64;

    /// Associated Legendre function P^order_degree(x), Condon-Shortley phase included
    fn legendre(&self, order: u32, degree: u32, x: f64) -> f64;
}

impl<T: SpecialFunctions + ?Sized> SpecialFunctions for &T {
    fn factorial(&self, k: u32) -> f64 {
        (**self).factorial(k)
    }

    fn ln_factorial(&self, k: u32) -> f64 {
        (**self).ln_factorial(k)
    }

    fn laguerre(&self, degree: u32, order: u32, x: f64) -> f64 {
        (**self).laguerre(degree, order, x)
    }

    fn legendre(&self, order: u32, degree: u32, x: f64) -> f64 {
        (**self).legendre(order, degree, x)
    }
}

/// Three-term recurrences in `f64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recurrence;

impl SpecialFunctions for Recurrence {
    /// Infinite above `MAX_FINITE_FACTORIAL`
    fn factorial(&self, k: u32) -> f64 {
        (1..=k).map(f64::from).product()
    }

    fn laguerre(&self, degree: u32, order: u32, x: f64) -> f64 {
        if degree == 0 {
            return 1.0;
        }

        let alpha = f64::from(order);
        let mut l0 = 1.0;
        let mut l1 = 1.0 + alpha - x;

        for i in 2..=degree {
            let i_f = f64::from(i);
            let l_new = ((2.0 * i_f - 1.0 + alpha - x) * l1 - (i_f - 1.0 + alpha) * l0) / i_f;
            l0 = l1;
            l1 = l_new;
        }

        l1
    }

    fn legendre(&self, order: u32, degree: u32, x: f64) -> f64 {
        if order > degree {
            return 0.0;
        }
        if order == 0 {
            return legendre_polynomial(x, degree);
        }

        let m_f = f64::from(order);
        let sign = if order % 2 == 0 { 1.0 } else { -1.0 };
        // (1-x^2)^(m/2) (2m-1)!! in log space; (2m-1)!! leaves f64 range above m = 150
        let ln_double_factorial: f64 = (1..=order).map(|k| f64::from(2 * k - 1).ln()).sum();
        let pmm = sign * (0.5 * m_f * (1.0 - x * x).max(0.0).ln() + ln_double_factorial).exp();

        if degree == order {
            return pmm;
        }

        let pm1m = x * (2.0 * m_f + 1.0) * pmm;

        if degree == order + 1 {
            return pm1m;
        }

        let mut pmn = pmm;
        let mut pm1n = pm1m;

        for i in (order + 2)..=degree {
            let i_f = f64::from(i);
            let pn = ((2.0 * i_f - 1.0) * x * pm1n - (i_f + m_f - 1.0) * pmn) / (i_f - m_f);
            pmn = pm1n;
            pm1n = pn;
        }

        pm1n
    }
}

/// Legendre polynomial P_n(x)
fn legendre_polynomial(x: f64, n: u32) -> f64 {
    match n {
        0 => 1.0,
        1 => x,
        _ => {
            let mut p0 = 1.0;
            let mut p1 = x;

            for i in 2..=n {
                let i_f = f64::from(i);
                let p_new = ((2.0 * i_f - 1.0) * x * p1 - (i_f - 1.0) * p0) / i_f;
                p0 = p1;
                p1 = p_new;
            }

            p1
        }
    }
}

/// Normalized radial function R_nl(r) for a fixed (n, l, a0).
///
/// R(r) = sqrt((2/(n a0))^3 (n-l-1)! / (2n (n+l)!)) * exp(-rho/2) * rho^l * L^(2l+1)_(n-l-1)(rho),
/// with rho = 2r / (n a0). The log of the normalization constant is computed once in `new`
/// and combined with rho^l exp(-rho/2) before exponentiating.
#[derive(Debug, Clone)]
pub struct RadialFunction<S = Recurrence> {
    functions: S,
    n: u32,
    l: u32,
    a0: f64,
    ln_norm: f64,
}

impl RadialFunction<Recurrence> {
    pub fn new(n: u32, l: u32, a0: BohrRadius) -> Result<Self> {
        Self::with_functions(Recurrence, n, l, a0)
    }
}

impl<S: SpecialFunctions> RadialFunction<S> {
    pub fn with_functions(functions: S, n: u32, l: u32, a0: BohrRadius) -> Result<Self> {
        if n == 0 {
            return Err(WavefunctionError::Domain(
                "principal quantum number n must be >= 1, got 0".to_string(),
            ));
        }
        if l >= n {
            return Err(WavefunctionError::Domain(format!(
                "radial function needs l <= n - 1, got n = {n}, l = {l}"
            )));
        }

        let n_f = f64::from(n);
        let a0 = a0.value();
        let ln_norm = 0.5
            * (3.0 * (2.0 / (n_f * a0)).ln() + functions.ln_factorial(n - l - 1)
                - (2.0 * n_f).ln()
                - functions.ln_factorial(n + l));

        Ok(RadialFunction {
            functions,
            n,
            l,
            a0,
            ln_norm,
        })
    }

    /// Evaluate at a non-negative radius. Finite at r = 0.
    pub fn eval(&self, r: f64) -> f64 {
        let rho = 2.0 * r / (f64::from(self.n) * self.a0);

        let poly = self
            .functions
            .laguerre(self.n - self.l - 1, 2 * self.l + 1, rho);

        // ln(norm * exp(-rho/2) * rho^l)
        let mut ln_envelope = self.ln_norm - rho / 2.0;
        if self.l > 0 {
            if rho == 0.0 {
                return 0.0;
            }
            ln_envelope += f64::from(self.l) * rho.ln();
        }

        ln_envelope.exp() * poly
    }
}

/// Real spherical harmonic Y_lm(theta, phi) with the (-1)^m phase convention.
///
/// Y = (-1)^m sqrt((2l+1)(l-|m|)! / (4 pi (l+|m|)!)) * P^|m|_l(cos theta) * cos(m phi)
#[derive(Debug, Clone)]
pub struct AngularFunction<S = Recurrence> {
    functions: S,
    l: u32,
    m_l: i32,
    norm: f64,
}

impl AngularFunction<Recurrence> {
    pub fn new(l: u32, m_l: i32) -> Result<Self> {
        Self::with_functions(Recurrence, l, m_l)
    }
}

impl<S: SpecialFunctions> AngularFunction<S> {
    pub fn with_functions(functions: S, l: u32, m_l: i32) -> Result<Self> {
        let m_abs = m_l.unsigned_abs();
        if m_abs > l {
            return Err(WavefunctionError::Domain(format!(
                "angular function needs |m| <= l, got l = {l}, m = {m_l}"
            )));
        }

        let l_f = f64::from(l);
        let phase = if m_abs % 2 == 0 { 1.0 } else { -1.0 };
        let ln_norm = 0.5
            * ((2.0 * l_f + 1.0).ln() + functions.ln_factorial(l - m_abs)
                - (4.0 * PI).ln()
                - functions.ln_factorial(l + m_abs));
        let norm = phase * ln_norm.exp();

        Ok(AngularFunction {
            functions,
            l,
            m_l,
            norm,
        })
    }

    pub fn eval(&self, theta: f64, phi: f64) -> f64 {
        let legendre = self
            .functions
            .legendre(self.m_l.unsigned_abs(), self.l, theta.cos());

        // Re(e^{i m phi}); exactly 1 on the phi = 0 half-plane
        let azimuthal = (f64::from(self.m_l) * phi).cos();

        self.norm * legendre * azimuthal
    }
}

/// R_nl(r) at a single radius.
pub fn radial_wavefunction(n: u32, l: u32, r: f64, a0: f64) -> Result<f64> {
    check_radius(r)?;
    let radial = RadialFunction::new(n, l, BohrRadius::new(a0)?)?;
    check_finite(radial.eval(r), || format!("R({n}, {l}) at r = {r}"))
}

/// R_nl(r) elementwise; the output has the shape of `r`.
pub fn radial_wavefunction_array<Sd, D>(
    n: u32,
    l: u32,
    r: &ArrayBase<Sd, D>,
    a0: f64,
) -> Result<Array<f64, D>>
where
    Sd: Data<Elem = f64>,
    D: Dimension,
{
    let radial = RadialFunction::new(n, l, BohrRadius::new(a0)?)?;
    r.iter().try_for_each(|&v| check_radius(v))?;
    let values = r.mapv(|v| radial.eval(v));
    check_all_finite(values.iter(), || format!("R({n}, {l})"))?;
    Ok(values)
}

/// Y_lm(theta, phi) at a single direction.
pub fn angular_wavefunction(l: u32, m_l: i32, theta: f64, phi: f64) -> Result<f64> {
    let angular = AngularFunction::new(l, m_l)?;
    check_finite(angular.eval(theta, phi), || {
        format!("Y({l}, {m_l}) at theta = {theta}, phi = {phi}")
    })
}

/// Y_lm elementwise over matching theta and phi arrays.
pub fn angular_wavefunction_array<Sa, Sb, D>(
    l: u32,
    m_l: i32,
    theta: &ArrayBase<Sa, D>,
    phi: &ArrayBase<Sb, D>,
) -> Result<Array<f64, D>>
where
    Sa: Data<Elem = f64>,
    Sb: Data<Elem = f64>,
    D: Dimension,
{
    let angular = AngularFunction::new(l, m_l)?;
    if theta.shape() != phi.shape() {
        return Err(WavefunctionError::Domain(format!(
            "theta shape {:?} does not match phi shape {:?}",
            theta.shape(),
            phi.shape()
        )));
    }
    let values = Zip::from(theta)
        .and(phi)
        .map_collect(|&t, &p| angular.eval(t, p));
    check_all_finite(values.iter(), || format!("Y({l}, {m_l})"))?;
    Ok(values)
}

fn check_radius(r: f64) -> Result<()> {
    if r.is_finite() && r >= 0.0 {
        Ok(())
    } else {
        Err(WavefunctionError::Domain(format!(
            "radius must be a non-negative finite number, got {r}"
        )))
    }
}

fn check_finite(value: f64, what: impl FnOnce() -> String) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(WavefunctionError::NonFinite(format!("{} evaluated to {value}", what())))
    }
}

/// Fails on the first NaN or infinity in `values`.
pub fn check_all_finite<'a>(
    values: impl IntoIterator<Item = &'a f64>,
    what: impl FnOnce() -> String,
) -> Result<()> {
    match values.into_iter().find(|v| !v.is_finite()) {
        Some(&bad) => Err(WavefunctionError::NonFinite(format!("{} evaluated to {bad}", what()))),
        None => Ok(()),
    }
}
