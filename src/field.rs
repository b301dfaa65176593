//! Cross-section of psi on the phi = 0 half-plane and its probability density.
//!
//! Grid cells are evaluated independently of each other, so the sequential and the
//! rayon-backed paths produce identical fields.

use ndarray::{Array1, Array2, Zip};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;
use tracing::debug;

use crate::config::GridConfig;
use crate::error::{Result, WavefunctionError};
use crate::physics::{
    check_all_finite, AngularFunction, BohrRadius, QuantumNumbers, RadialFunction, Recurrence,
    SpecialFunctions,
};

/// Added to y before dividing, so the theta mapping stays finite on the y = 0 line.
pub const THETA_EPSILON: f64 = 1e-10;

/// Evenly spaced coordinates. Cell `(i, j)` sits at `(xs[j], ys[i])`, so rows run along y.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingGrid {
    xs: Array1<f64>,
    ys: Array1<f64>,
}

impl SamplingGrid {
    pub fn new(xs: Array1<f64>, ys: Array1<f64>) -> Result<Self> {
        if xs.is_empty() || ys.is_empty() {
            return Err(WavefunctionError::Config(
                "sampling grid needs at least one coordinate per axis".to_string(),
            ));
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(WavefunctionError::Config(
                "sampling grid coordinates must be finite".to_string(),
            ));
        }
        Ok(SamplingGrid { xs, ys })
    }

    /// Square grid spanning `[-extent, extent]` on both axes.
    pub fn symmetric(extent: f64, samples: usize) -> Result<Self> {
        let points = Array1::linspace(-extent, extent, samples);
        Self::new(points.clone(), points)
    }

    pub fn from_config(config: &GridConfig) -> Result<Self> {
        config.validate()?;
        Self::symmetric(config.extent, config.samples)
    }

    pub fn xs(&self) -> &Array1<f64> {
        &self.xs
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.ys.len(), self.xs.len())
    }

    /// Full coordinate mesh, like `meshgrid(xs, ys)`.
    pub fn mesh(&self) -> (Array2<f64>, Array2<f64>) {
        let shape = self.shape();
        let x = Array2::from_shape_fn(shape, |(_, j)| self.xs[j]);
        let y = Array2::from_shape_fn(shape, |(i, _)| self.ys[i]);
        (x, y)
    }
}

/// Maps a grid point to `(r, theta)` on the plotted slice.
///
/// theta = atan(x / (y + 1e-10)). This is not atan2: it folds the plane onto
/// (-pi/2, pi/2), which is what the reference pictures are drawn with.
pub fn polar_coordinates(x: f64, y: f64) -> (f64, f64) {
    let r = (x * x + y * y).sqrt();
    let theta = (x / (y + THETA_EPSILON)).atan();
    (r, theta)
}

/// psi = R * Y sampled on a grid, for one state.
#[derive(Debug, Clone)]
pub struct WavefunctionSlice {
    pub state: QuantumNumbers,
    pub bohr_radius: BohrRadius,
    pub psi: Array2<f64>,
}

impl WavefunctionSlice {
    pub fn density(&self) -> DensityField {
        DensityField::from_amplitudes(&self.psi)
    }
}

/// |psi|^2 per grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityField {
    values: Array2<f64>,
}

impl DensityField {
    pub fn from_amplitudes(psi: &Array2<f64>) -> Self {
        DensityField {
            values: psi.mapv(|v| v.abs().powi(2)),
        }
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// sqrt(|psi|^2), the dynamic-range compressed field that gets rendered.
    pub fn display(&self) -> Array2<f64> {
        self.values.mapv(f64::sqrt)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

/// Evaluates psi on a fixed sampling grid.
pub struct FieldComposer<S = Recurrence> {
    grid: SamplingGrid,
    parallel: bool,
    pool: Option<ThreadPool>,
    functions: S,
}

impl FieldComposer<Recurrence> {
    pub fn new(config: GridConfig) -> Result<Self> {
        Self::with_functions(config, Recurrence)
    }
}

impl<S: SpecialFunctions + Clone> FieldComposer<S> {
    pub fn with_functions(config: GridConfig, functions: S) -> Result<Self> {
        let grid = SamplingGrid::from_config(&config)?;
        let pool = match config.threads {
            Some(threads) if config.parallel => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| WavefunctionError::Config(format!("thread pool: {e}")))?,
            ),
            _ => None,
        };
        Ok(FieldComposer {
            grid,
            parallel: config.parallel,
            pool,
            functions,
        })
    }

    /// Replaces the configured grid with an arbitrary one.
    pub fn with_grid(mut self, grid: SamplingGrid) -> Self {
        self.grid = grid;
        self
    }

    /// Both evaluators are constructed, and so validated, before any cell is computed.
    /// A field holding NaN or infinity is an error, never a result.
    pub fn compose(&self, state: QuantumNumbers, bohr_radius: BohrRadius) -> Result<WavefunctionSlice> {
        let radial = RadialFunction::with_functions(
            self.functions.clone(),
            state.n(),
            state.l(),
            bohr_radius,
        )?;
        let angular =
            AngularFunction::with_functions(self.functions.clone(), state.l(), state.m_l())?;

        let started = Instant::now();
        let (x, y) = self.grid.mesh();
        let cell = |&x: &f64, &y: &f64| {
            let (r, theta) = polar_coordinates(x, y);
            radial.eval(r) * angular.eval(theta, 0.0)
        };

        let psi = if self.parallel {
            let run = || Zip::from(&x).and(&y).par_map_collect(cell);
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        } else {
            Zip::from(&x).and(&y).map_collect(cell)
        };

        debug!(
            "composed psi for {} ({}) on {:?} grid in {:?} (parallel: {})",
            state.label(),
            state.orbital_name(),
            self.grid.shape(),
            started.elapsed(),
            self.parallel
        );
        check_all_finite(psi.iter(), || format!("psi for {}", state.label()))?;

        Ok(WavefunctionSlice {
            state,
            bohr_radius,
            psi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn small_config(extent: f64, samples: usize, parallel: bool) -> GridConfig {
        GridConfig {
            extent,
            samples,
            parallel,
            threads: None,
        }
    }

    fn compose(n: i32, l: i32, m: i32, a0: f64, config: GridConfig) -> WavefunctionSlice {
        FieldComposer::new(config)
            .unwrap()
            .compose(QuantumNumbers::new(n, l, m).unwrap(), BohrRadius::new(a0).unwrap())
            .unwrap()
    }

    #[test]
    fn test_grid_layout() {
        let grid = SamplingGrid::symmetric(2.0, 5).unwrap();
        assert_eq!(grid.shape(), (5, 5));
        assert_eq!(grid.xs().to_vec(), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);

        let grid = SamplingGrid::new(array![-1.0, 0.0, 1.0], array![5.0, 6.0]).unwrap();
        let (x, y) = grid.mesh();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(x[[1, 2]], 1.0);
        assert_eq!(y[[1, 2]], 6.0);

        assert!(SamplingGrid::new(array![], array![1.0]).is_err());
        assert!(SamplingGrid::new(array![f64::NAN], array![1.0]).is_err());
        assert!(SamplingGrid::from_config(&small_config(0.0, 5, false)).is_err());
    }

    #[test]
    fn test_polar_mapping() {
        let (r, theta) = polar_coordinates(3.0, 4.0);
        assert_relative_eq!(r, 5.0);
        assert_relative_eq!(theta, (3.0_f64 / 4.0).atan(), max_relative = 1e-9);

        let (r, theta) = polar_coordinates(0.0, 0.0);
        assert_eq!(r, 0.0);
        assert_eq!(theta, 0.0);

        // on the y = 0 line the mapping saturates instead of dividing by zero
        let (_, theta) = polar_coordinates(1.0, 0.0);
        assert_relative_eq!(theta, std::f64::consts::FRAC_PI_2, max_relative = 1e-9);
        let (_, theta) = polar_coordinates(-1.0, 0.0);
        assert_relative_eq!(theta, -std::f64::consts::FRAC_PI_2, max_relative = 1e-9);

        // not atan2: opposite quadrants fold together
        let (_, a) = polar_coordinates(1.0, 1.0);
        let (_, b) = polar_coordinates(-1.0, -1.0);
        assert_relative_eq!(a, b, max_relative = 1e-9);
    }

    #[test]
    fn test_origin_is_finite() {
        let slice = compose(2, 0, 0, 1.0, small_config(2.0, 5, false));
        let density = slice.density();
        let center = density.values()[[2, 2]];
        assert!(center.is_finite());
        assert_relative_eq!(center, 0.039788735772973836, max_relative = 1e-12);

        let slice = compose(3, 2, 1, 1.0, small_config(2.0, 5, false));
        assert!(slice.density().values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_s_state_is_mirror_symmetric() {
        let density = compose(2, 0, 0, 1.0, small_config(2.0, 5, false)).density();
        let values = density.values();
        let (rows, cols) = density.shape();
        for i in 0..rows {
            for j in 0..cols {
                let v = values[[i, j]];
                assert_eq!(v, values[[i, cols - 1 - j]]);
                assert_eq!(v, values[[rows - 1 - i, j]]);
                assert_eq!(v, values[[rows - 1 - i, cols - 1 - j]]);
            }
        }
    }

    #[test]
    fn test_pinned_values() {
        // (n, l, m, a0, x, y, psi)
        let cases = [
            (2, 1, 0, 1.0, 1.0, 1.0, 0.04917648703740063),
            (3, 2, 1, 1.0, -1.0, 2.0, 0.006610983082892921),
            (3, 1, -1, 2.0, 2.0, -1.0, 0.008282049187638167),
            (2, 0, 0, 1.0, 0.0, 0.0, 0.19947114020071635),
            (4, 2, 2, 3.0, 1.0, -2.0, 4.492942433801817e-05),
        ];
        for (n, l, m, a0, x, y, expected) in cases {
            let composer = FieldComposer::new(small_config(1.0, 1, false))
                .unwrap()
                .with_grid(SamplingGrid::new(array![x], array![y]).unwrap());
            let slice = composer
                .compose(QuantumNumbers::new(n, l, m).unwrap(), BohrRadius::new(a0).unwrap())
                .unwrap();
            assert_relative_eq!(slice.psi[[0, 0]], expected, max_relative = 1e-10);
            assert_relative_eq!(
                slice.density().values()[[0, 0]],
                expected * expected,
                max_relative = 1e-10
            );
        }
    }

    #[test]
    fn test_recomposition_is_identical() {
        let config = small_config(30.0, 41, true);
        let first = compose(3, 2, -1, 2.0, config.clone());
        let second = compose(3, 2, -1, 2.0, config);
        assert_eq!(first.psi, second.psi);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = compose(4, 3, 2, 1.0, small_config(40.0, 57, false));
        let parallel = compose(4, 3, 2, 1.0, small_config(40.0, 57, true));
        assert_eq!(sequential.psi, parallel.psi);

        let pooled = FieldComposer::new(GridConfig {
            extent: 40.0,
            samples: 57,
            parallel: true,
            threads: Some(2),
        })
        .unwrap()
        .compose(QuantumNumbers::new(4, 3, 2).unwrap(), BohrRadius::new(1.0).unwrap())
        .unwrap();
        assert_eq!(sequential.psi, pooled.psi);
    }

    #[test]
    fn test_density_non_negative() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10 {
            let n = rng.gen_range(1..=5);
            let l = rng.gen_range(0..n);
            let m = rng.gen_range(-l..=l);
            let slice = compose(n, l, m, 1.0, small_config(25.0, 21, true));
            let density = slice.density();
            assert_eq!(density.shape(), (21, 21));
            assert!(density.values().iter().all(|&v| v >= 0.0 && v.is_finite()));
        }
    }

    #[test]
    fn test_zero_field_has_zero_density() {
        let density = DensityField::from_amplitudes(&Array2::zeros((4, 3)));
        assert!(density.values().iter().all(|&v| v == 0.0));
        assert_eq!(density.max(), 0.0);
        assert!(density.display().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_display_is_square_root() {
        let psi = array![[-3.0, 0.5], [2.0, 0.0]];
        let density = DensityField::from_amplitudes(&psi);
        assert_eq!(density.values(), &array![[9.0, 0.25], [4.0, 0.0]]);
        let display = density.display();
        for (d, p) in display.iter().zip(psi.iter()) {
            assert_abs_diff_eq!(*d, p.abs(), epsilon = 1e-15);
        }
        assert_eq!(density.max(), 9.0);
    }

    /// Laguerre values blow up away from the origin.
    #[derive(Clone)]
    struct Unstable;

    impl SpecialFunctions for Unstable {
        fn factorial(&self, k: u32) -> f64 {
            Recurrence.factorial(k)
        }

        fn laguerre(&self, _degree: u32, _order: u32, x: f64) -> f64 {
            if x > 1.0 {
                f64::NAN
            } else {
                1.0
            }
        }

        fn legendre(&self, order: u32, degree: u32, x: f64) -> f64 {
            Recurrence.legendre(order, degree, x)
        }
    }

    #[test]
    fn test_non_finite_field_is_an_error() {
        let composer = FieldComposer::with_functions(small_config(2.0, 5, true), Unstable).unwrap();
        let result = composer.compose(
            QuantumNumbers::new(2, 1, 0).unwrap(),
            BohrRadius::new(1.0).unwrap(),
        );
        assert!(matches!(result, Err(WavefunctionError::NonFinite(_))));

        // valid, but (2l-1)!! for l = 180 is beyond f64
        let composer = FieldComposer::new(small_config(2.0, 5, false)).unwrap();
        let result = composer.compose(
            QuantumNumbers::new(200, 180, 170).unwrap(),
            BohrRadius::new(1.0).unwrap(),
        );
        assert!(matches!(result, Err(WavefunctionError::NonFinite(_))));
    }

    #[test]
    fn test_large_state_composes() {
        let slice = compose(120, 100, 60, 1.0, small_config(30_000.0, 21, true));
        let density = slice.density();
        assert!(density.values().iter().all(|v| v.is_finite()));
        assert!(density.max() > 0.0);
    }
}
