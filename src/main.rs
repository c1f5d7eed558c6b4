use lambda_runtime::{service_fn, Error, LambdaEvent};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use skyview_engine::catalog::{InMemoryTileSource, TileIndex};
use skyview_engine::constellation::{load_constellations, ConstellationFigure, SkyFigure};
use skyview_engine::pipeline::{DrawRequest, SkyPipeline};
use skyview_engine::project::{DiscViewport, ProjectedStar, SkyStar};
use skyview_engine::transform::{Instant, Observer};

/// Observer fallback when the request omits a location.
const DEFAULT_LAT_DEG: f64 = 35.68;
const DEFAULT_LON_DEG: f64 = 139.76;
const DEFAULT_MAG_LIMIT: f64 = 6.0;

const DEMO_INDEX: &str = r#"[{"address": "demo_mag6.json", "mag_max": 6}]"#;

const DEMO_TILE: &str = r#"[
    {"id": 32349, "name": "Sirius",     "ra_hours": 6.752481,  "dec_deg": -16.716116, "mag": -1.46},
    {"id": 27989, "name": "Betelgeuse", "ra_hours": 5.919529,  "dec_deg": 7.407064,   "mag": 0.42},
    {"id": 24436, "name": "Rigel",      "ra_hours": 5.242298,  "dec_deg": -8.201638,  "mag": 0.12},
    {"id": 91262, "name": "Vega",       "ra_hours": 18.615649, "dec_deg": 38.78369,   "mag": 0.03},
    {"id": 97649, "name": "Altair",     "ra_hours": 19.846388, "dec_deg": 8.868321,   "mag": 0.77},
    {"id": 102098, "name": "Deneb",     "ra_hours": 20.690532, "dec_deg": 45.280338,  "mag": 1.25},
    {"id": 11767, "name": "Polaris",    "ra_hours": 2.530301,  "dec_deg": 89.264109,  "mag": 1.98}
]"#;

const DEMO_CONSTELLATIONS: &str = r#"[{
    "name": "Summer Triangle",
    "stars": [
        {"ra_hours": 18.615649, "dec_deg": 38.78369,  "mag": 0.03},
        {"ra_hours": 19.846388, "dec_deg": 8.868321,  "mag": 0.77},
        {"ra_hours": 20.690532, "dec_deg": 45.280338, "mag": 1.25}
    ],
    "lines": [[0, 1], [1, 2], [2, 0]]
}]"#;

static PIPELINE: Lazy<SkyPipeline<InMemoryTileSource>> = Lazy::new(|| {
    // Tiny built-in catalog; replace with a packed bundle in production.
    let index = TileIndex::from_json(DEMO_INDEX.as_bytes()).expect("demo tile index is valid");
    let source = InMemoryTileSource::from_tiles([(
        "demo_mag6.json".to_string(),
        DEMO_TILE.as_bytes().to_vec(),
    )]);
    let constellations = load_constellations(DEMO_CONSTELLATIONS.as_bytes())
        .expect("demo constellation data is valid");
    SkyPipeline::new(index, source, constellations)
});

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EngineRequest {
    Disc {
        instant_ms: i64,
        lat: Option<f64>,
        lon: Option<f64>,
        height: Option<f64>,
        mag_limit: Option<f64>,
        viewport: Option<DiscViewport>,
    },
    Dome {
        instant_ms: i64,
        lat: Option<f64>,
        lon: Option<f64>,
        height: Option<f64>,
        mag_limit: Option<f64>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EngineResponse {
    Disc {
        generation: u64,
        stars: Vec<ProjectedStar>,
        figures: Vec<ConstellationFigure>,
    },
    Dome {
        generation: u64,
        stars: Vec<SkyStar>,
        figures: Vec<SkyFigure>,
    },
    Error {
        message: String,
    },
}

fn draw_request(
    instant_ms: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    height: Option<f64>,
    mag_limit: Option<f64>,
) -> DrawRequest {
    DrawRequest {
        instant: Instant::from_epoch_ms(instant_ms),
        observer: Observer::new(
            lat.unwrap_or(DEFAULT_LAT_DEG),
            lon.unwrap_or(DEFAULT_LON_DEG),
            height.unwrap_or(0.0),
        ),
        mag_limit: mag_limit.unwrap_or(DEFAULT_MAG_LIMIT),
    }
}

async fn handler(event: LambdaEvent<EngineRequest>) -> Result<EngineResponse, Error> {
    match event.payload {
        EngineRequest::Disc {
            instant_ms,
            lat,
            lon,
            height,
            mag_limit,
            viewport,
        } => {
            let request = draw_request(instant_ms, lat, lon, height, mag_limit);
            let viewport = viewport.unwrap_or(DiscViewport {
                center_x: 512.0,
                center_y: 512.0,
                radius: 512.0,
            });
            match PIPELINE.draw_disc(&request, &viewport).await {
                Ok(frame) => Ok(EngineResponse::Disc {
                    generation: frame.generation,
                    stars: frame.stars,
                    figures: frame.figures,
                }),
                Err(e) => Ok(EngineResponse::Error {
                    message: e.to_string(),
                }),
            }
        }
        EngineRequest::Dome {
            instant_ms,
            lat,
            lon,
            height,
            mag_limit,
        } => {
            let request = draw_request(instant_ms, lat, lon, height, mag_limit);
            match PIPELINE.draw_dome(&request).await {
                Ok(frame) => Ok(EngineResponse::Dome {
                    generation: frame.generation,
                    stars: frame.stars,
                    figures: frame.figures,
                }),
                Err(e) => Ok(EngineResponse::Error {
                    message: e.to_string(),
                }),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    let func = service_fn(handler);
    lambda_runtime::run(func).await
}
