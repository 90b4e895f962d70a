mod handler;
mod metrics;
mod store;

use handler::{LoopbackFactory, RequestReceived};
use metrics::OnionMetrics;
use onion_core::{OrchestratorConfig, TorOrchestrator};
use onion_core::OrchestratorEvent;
use std::sync::Arc;
use store::JsonIdentityStore;
use tokio::sync::Mutex;
use warp::Filter;

type Orchestrator = TorOrchestrator<JsonIdentityStore>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = std::env::var("ONION_GATE_DATA_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("onion-gate-node"));
    std::fs::create_dir_all(&data_dir)?;

    let store = JsonIdentityStore::open(data_dir.join("identities.json"))?;
    let config = OrchestratorConfig::from_env();
    let metrics = OnionMetrics::new()?;

    let (request_tx, request_rx) = std::sync::mpsc::channel::<RequestReceived>();
    let factory = Box::new(LoopbackFactory::new(request_tx));

    let orchestrator = Arc::new(Mutex::new(Orchestrator::new(
        config,
        data_dir.clone(),
        store,
        factory,
    )?));

    {
        let mut orch = orchestrator.lock().await;
        orch.ensure_default_service().await;
        if let Err(e) = orch.start_if_autoconnect().await {
            eprintln!("[main] ⚠️ autoconnect start failed: {e}");
        }
    }

    spawn_event_pump(orchestrator.clone(), metrics.clone());
    spawn_request_counter(orchestrator.clone(), metrics.clone(), request_rx);

    let api_port: u16 = std::env::var("ONION_GATE_API_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);

    let routes = build_routes(orchestrator, metrics);
    println!("[main] 🚀 onion-gate-node listening on 127.0.0.1:{api_port}");
    warp::serve(routes).run(([127, 0, 0, 1], api_port)).await;
    Ok(())
}

fn spawn_event_pump(orchestrator: Arc<Mutex<Orchestrator>>, metrics: Arc<OnionMetrics>) {
    tokio::spawn(async move {
        loop {
            let event = {
                let mut orch = orchestrator.lock().await;
                orch.drive_once().await
            };
            match event {
                Some(OrchestratorEvent::BootstrapProgressChanged(pct)) => {
                    metrics.bootstrap_progress.set(pct as i64);
                }
                Some(OrchestratorEvent::RunningChanged(true)) | Some(OrchestratorEvent::Started) => {
                    metrics.onion_reachable.set(1);
                    metrics.onion_consecutive_failures.set(0);
                }
                Some(OrchestratorEvent::Stopped) | Some(OrchestratorEvent::RunningChanged(false)) => {
                    metrics.onion_reachable.set(0);
                }
                Some(OrchestratorEvent::Error(msg)) => {
                    eprintln!("[main] ⚠️ {msg}");
                    metrics.onion_consecutive_failures.inc();
                }
                Some(OrchestratorEvent::Log(line)) | Some(OrchestratorEvent::StatusChanged(line)) => {
                    println!("[tor] {line}");
                }
                Some(_) => {}
                None => break,
            }
        }
    });
}

fn spawn_request_counter(
    _orchestrator: Arc<Mutex<Orchestrator>>,
    metrics: Arc<OnionMetrics>,
    request_rx: std::sync::mpsc::Receiver<RequestReceived>,
) {
    std::thread::spawn(move || {
        while let Ok(req) = request_rx.recv() {
            metrics.requests_total.with_label_values(&[&req.onion]).inc();
            println!("[main] 📥 {} {} from {}", req.onion, req.path, req.peer);
        }
    });
}

fn build_routes(
    orchestrator: Arc<Mutex<Orchestrator>>,
    metrics: Arc<OnionMetrics>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_orchestrator = warp::any().map(move || orchestrator.clone());
    let with_metrics = warp::any().map(move || metrics.clone());

    let metrics_route = warp::path("metrics").and(with_metrics.clone()).map(|m: Arc<OnionMetrics>| {
        match m.export() {
            Ok(body) => warp::reply::with_header(body, "Content-Type", "text/plain; version=0.0.4"),
            Err(e) => warp::reply::with_header(format!("metrics export error: {e}"), "Content-Type", "text/plain"),
        }
    });

    let list_onions = warp::path("onions")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_orchestrator.clone())
        .and_then(|orch: Arc<Mutex<Orchestrator>>| async move {
            let orch = orch.lock().await;
            Ok::<_, std::convert::Infallible>(warp::reply::json(&orch.identities()))
        });

    let add_onion = warp::path("onions")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_orchestrator.clone())
        .and_then(|body: serde_json::Value, orch: Arc<Mutex<Orchestrator>>| async move {
            let label = body.get("label").and_then(|v| v.as_str()).unwrap_or("service").to_string();
            let mut orch = orch.lock().await;
            let ok = orch.add_new_service(label).await;
            Ok::<_, std::convert::Infallible>(warp::reply::json(&serde_json::json!({ "ok": ok })))
        });

    let remove_onion = warp::path!("onions" / String)
        .and(warp::delete())
        .and(with_orchestrator.clone())
        .and_then(|onion: String, orch: Arc<Mutex<Orchestrator>>| async move {
            let mut orch = orch.lock().await;
            let ok = orch.remove_service(&onion).await;
            Ok::<_, std::convert::Infallible>(warp::reply::json(&serde_json::json!({ "ok": ok })))
        });

    let status_route = warp::path("status")
        .and(warp::get())
        .and(with_orchestrator)
        .and_then(|orch: Arc<Mutex<Orchestrator>>| async move {
            let orch = orch.lock().await;
            Ok::<_, std::convert::Infallible>(warp::reply::json(&serde_json::json!({
                "running": orch.running(),
                "initializing": orch.initializing(),
                "installing": orch.installing(),
                "bootstrap_progress": orch.bootstrap_progress(),
                "onion_addresses": orch.online_onion_addresses(),
            })))
        });

    metrics_route
        .boxed()
        .or(list_onions.boxed())
        .or(add_onion.boxed())
        .or(remove_onion.boxed())
        .or(status_route.boxed())
        .boxed()
}
