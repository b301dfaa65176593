use axum::{
    extract::Query,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hydrogen_wavefunction::config::{ColorMap, GridConfig, DEFAULT_EXTENT};
use hydrogen_wavefunction::field::{DensityField, FieldComposer};
use hydrogen_wavefunction::physics::{BohrRadius, QuantumNumbers};
use hydrogen_wavefunction::render::{encode_png, render_density, DensityReport};
use hydrogen_wavefunction::{Result, WavefunctionError};

/// Previews are smaller than the CLI's default 680 x 680 plot
const DEFAULT_PREVIEW_SAMPLES: usize = 340;
const MIN_SAMPLES: usize = 16;
const MAX_SAMPLES: usize = 1024;

#[derive(Deserialize, Default)]
struct DensityQuery {
    n: Option<i32>,
    l: Option<i32>,
    m: Option<i32>,
    a0: Option<i32>,
    cm: Option<String>,
    samples: Option<usize>,
    extent: Option<f64>,
}

struct DensityRequest {
    state: QuantumNumbers,
    bohr_radius: BohrRadius,
    colormap: ColorMap,
    grid: GridConfig,
}

impl DensityQuery {
    fn resolve(&self) -> Result<DensityRequest> {
        let state = QuantumNumbers::new(
            self.n.unwrap_or(2),
            self.l.unwrap_or(1),
            self.m.unwrap_or(0),
        )?;
        let bohr_radius = BohrRadius::new(f64::from(self.a0.unwrap_or(1)))?;
        let colormap = match self.cm.as_deref() {
            Some(selector) => ColorMap::from_selector(selector)?,
            None => ColorMap::default(),
        };
        let grid = GridConfig {
            extent: self.extent.unwrap_or(DEFAULT_EXTENT),
            samples: self
                .samples
                .unwrap_or(DEFAULT_PREVIEW_SAMPLES)
                .clamp(MIN_SAMPLES, MAX_SAMPLES),
            ..GridConfig::default()
        };
        grid.validate()?;
        Ok(DensityRequest {
            state,
            bohr_radius,
            colormap,
            grid,
        })
    }
}

fn compute_density(request: &DensityRequest) -> Result<DensityField> {
    let composer = FieldComposer::new(request.grid.clone())?;
    Ok(composer.compose(request.state, request.bohr_radius)?.density())
}

fn error_response(err: WavefunctionError) -> Response {
    let status = if err.is_input_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    warn!("request failed: {err}");
    (status, err.to_string()).into_response()
}

/// Runs the grid evaluation off the async workers.
async fn run_blocking<T, F>(job: F) -> Response
where
    T: IntoResponse,
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(Ok(body)) => body.into_response(),
        Ok(Err(err)) => error_response(err),
        Err(join_err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("density worker failed: {join_err}"),
        )
            .into_response(),
    }
}

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn density_png(Query(q): Query<DensityQuery>) -> Response {
    let request = match q.resolve() {
        Ok(request) => request,
        Err(err) => return error_response(err),
    };
    run_blocking(move || {
        let density = compute_density(&request)?;
        let png = encode_png(&render_density(&density, request.colormap))?;
        info!(
            "rendered {} on {} samples ({} bytes)",
            request.state.label(),
            request.grid.samples,
            png.len()
        );
        Ok(([(header::CONTENT_TYPE, "image/png")], png))
    })
    .await
}

async fn density_json(Query(q): Query<DensityQuery>) -> Response {
    let request = match q.resolve() {
        Ok(request) => request,
        Err(err) => return error_response(err),
    };
    run_blocking(move || {
        let density = compute_density(&request)?;
        Ok(Json(DensityReport::new(
            &request.state,
            request.bohr_radius,
            request.grid.extent,
            &density,
            false,
        )))
    })
    .await
}

fn app() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/density.png", get(density_png))
        .route("/density.json", get(density_json))
}

/// Binds `addr` and serves until the server stops. Bind and serve failures are returned.
async fn serve(addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving on http://{}", listener.local_addr()?);
    axum::serve(listener, app()).await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    match serve(addr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server on {addr} failed: {e}");
            ExitCode::FAILURE
        }
    }
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Hydrogen wavefunction probability density</title>
<style>
  body { font-family: sans-serif; background: #111; color: #eee; margin: 2em; }
  input, select { width: 4em; margin-right: 1em; }
  img { display: block; margin-top: 1em; image-rendering: pixelated; }
</style>
</head>
<body>
<h2>Hydrogen wavefunction probability density</h2>
<form id="params">
  n <input name="n" type="number" value="2" min="1">
  l <input name="l" type="number" value="1" min="0">
  m <input name="m" type="number" value="0">
  a0 <input name="a0" type="number" value="1" min="1">
  cm <select name="cm">
    <option value="1">inferno</option>
    <option value="2">gist_heat</option>
    <option value="3">afmhot</option>
    <option value="4">gist_gray</option>
  </select>
  <button type="submit">plot</button>
</form>
<p id="label"></p>
<img id="plot" alt="">
<script>
  const form = document.getElementById('params');
  async function plot(event) {
    if (event) event.preventDefault();
    const query = new URLSearchParams(new FormData(form)).toString();
    const res = await fetch('/density.json?' + query);
    if (!res.ok) {
      document.getElementById('label').textContent = await res.text();
      return;
    }
    const report = await res.json();
    document.getElementById('label').textContent = report.label + ' ' + report.orbital;
    document.getElementById('plot').src = '/density.png?' + query;
  }
  form.addEventListener('submit', plot);
  plot();
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let request = DensityQuery::default().resolve().unwrap();
        assert_eq!(request.state, QuantumNumbers::new(2, 1, 0).unwrap());
        assert_eq!(request.bohr_radius.value(), 1.0);
        assert_eq!(request.colormap, ColorMap::Inferno);
        assert_eq!(request.grid.samples, DEFAULT_PREVIEW_SAMPLES);
        assert_eq!(request.grid.extent, DEFAULT_EXTENT);
    }

    #[test]
    fn test_query_clamps_samples() {
        let q = DensityQuery {
            samples: Some(5),
            ..Default::default()
        };
        assert_eq!(q.resolve().unwrap().grid.samples, MIN_SAMPLES);
        let q = DensityQuery {
            samples: Some(1_000_000),
            ..Default::default()
        };
        assert_eq!(q.resolve().unwrap().grid.samples, MAX_SAMPLES);
    }

    #[test]
    fn test_query_rejects_invalid_input() {
        let q = DensityQuery {
            n: Some(1),
            l: Some(1),
            ..Default::default()
        };
        assert!(matches!(q.resolve(), Err(WavefunctionError::Domain(_))));

        let q = DensityQuery {
            cm: Some("7".to_string()),
            ..Default::default()
        };
        assert!(matches!(q.resolve(), Err(WavefunctionError::Config(_))));

        let q = DensityQuery {
            extent: Some(-3.0),
            ..Default::default()
        };
        assert!(q.resolve().is_err());
    }

    #[test]
    fn test_compute_density_shape() {
        let q = DensityQuery {
            n: Some(3),
            l: Some(2),
            m: Some(-1),
            samples: Some(20),
            extent: Some(30.0),
            ..Default::default()
        };
        let density = compute_density(&q.resolve().unwrap()).unwrap();
        assert_eq!(density.shape(), (20, 20));
        assert!(density.max() > 0.0);
    }

    #[test]
    fn test_error_status() {
        let response = error_response(WavefunctionError::Domain("bad".to_string()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = error_response(WavefunctionError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk",
        )));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_serve_reports_bind_failure() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let err = serve(addr).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
    }
}
