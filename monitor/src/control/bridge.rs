use burstcore::config::{ConfigBus, ConfigPatch};
use burstcore::prelude::DetectionResult;
use burstcore::telemetry::MetricsRecorder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

pub fn control_bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Most recent detector output, kept for plotting consumers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LatestModel {
    pub mjd: f64,
    pub power: Vec<f32>,
    pub significance: f32,
    pub best_trial: Option<usize>,
    pub passed: bool,
    pub results_seen: u64,
}

/// HTTP control surface: configuration get/set, latest spectrum, and run
/// counters. Every `POST /config` goes through the bus's validate-then-swap
/// protocol; a rejected patch returns 400 and changes nothing.
pub struct ControlBridge {
    latest: Arc<RwLock<LatestModel>>,
}

impl ControlBridge {
    pub fn new(bus: Arc<ConfigBus>, metrics: Arc<MetricsRecorder>, bind: SocketAddr) -> Self {
        let latest = Arc::new(RwLock::new(LatestModel::default()));
        let latest_for_filter = latest.clone();
        let latest_filter = warp::any().map(move || latest_for_filter.clone());
        let bus_for_get = bus.clone();
        let bus_filter = warp::any().map(move || bus.clone());
        let metrics_filter = warp::any().map(move || metrics.clone());

        let get_config = warp::path("config")
            .and(warp::get())
            .map(move || warp::reply::json(&*bus_for_get.snapshot()));

        let set_config = warp::path("config")
            .and(warp::post())
            .and(warp::body::json())
            .and(bus_filter)
            .map(|patch: ConfigPatch, bus: Arc<ConfigBus>| match bus.apply(&patch) {
                Ok(cfg) => warp::reply::with_status(warp::reply::json(&*cfg), StatusCode::OK),
                Err(err) => warp::reply::with_status(
                    warp::reply::json(&json!({ "error": err.to_string() })),
                    StatusCode::BAD_REQUEST,
                ),
            });

        let get_latest = warp::path("latest")
            .and(warp::get())
            .and(latest_filter)
            .map(|latest: Arc<RwLock<LatestModel>>| {
                warp::reply::json(&*latest.read().unwrap())
            });

        let get_status = warp::path("status")
            .and(warp::get())
            .and(metrics_filter)
            .map(|metrics: Arc<MetricsRecorder>| warp::reply::json(&metrics.snapshot()));

        thread::spawn(move || {
            let routes = get_config.or(set_config).or(get_latest).or(get_status);
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build bridge runtime");
            runtime.block_on(async move {
                warp::serve(routes).run(bind).await;
            });
        });

        Self { latest }
    }

    /// Records one detection result for the `/latest` endpoint.
    pub fn publish(&self, result: &DetectionResult) {
        let mut guard = self.latest.write().unwrap();
        guard.results_seen += 1;
        guard.mjd = result.mjd;
        guard.power = result.power.clone();
        guard.significance = result.significance;
        guard.best_trial = result.best_trial;
        guard.passed = result.passed;
    }

    #[cfg(test)]
    pub fn latest(&self) -> LatestModel {
        self.latest.read().unwrap().clone()
    }
}
