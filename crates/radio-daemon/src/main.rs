mod core;
mod gpio;
mod http;
mod mpv;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use radio_core::catalog::{FileStationStore, StationCatalog};
use radio_core::clock::{Clock, MonotonicClock};
use radio_core::config::Config;
use radio_core::input::InputClassifier;
use radio_core::session::{FileStatusStore, PlaybackSession};
use radio_core::{platform, wifi};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_logging() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("microradio.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,radio_core=debug,radio_daemon=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);
    Ok(())
}

fn build_controller(
    config: &Config,
    events: mpsc::Receiver<core::ControllerEvent>,
) -> anyhow::Result<core::ControllerCore> {
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());

    let mut classifier = InputClassifier::new(
        Box::new(gpio::SysfsGpio::new(&config.gpio.sysfs_root)),
        clock.clone(),
    );
    for binding in &config.gpio.buttons {
        classifier.register(binding.pin, binding.short.into(), binding.long.into());
    }

    let mpv_binary = match &config.engine.mpv_binary {
        Some(path) => path.clone(),
        None => platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?,
    };
    info!("using player {:?}", mpv_binary);
    let engine = mpv::MpvEngine::new(
        mpv_binary,
        platform::mpv_socket_path(),
        Duration::from_millis(config.engine.open_timeout_ms),
    );

    let catalog = StationCatalog::new(Box::new(FileStationStore::new(
        &config.controller.stations_file,
    )));
    let session = PlaybackSession::new(
        catalog,
        Box::new(engine),
        Box::new(FileStatusStore::new(&config.controller.status_file)),
        clock,
    );

    Ok(core::ControllerCore::new(
        classifier,
        session,
        events,
        Duration::from_millis(config.controller.poll_interval_ms),
    ))
}

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    match wifi::load(&config.controller.wifi_file) {
        Ok(Some(credentials)) => info!("wifi credentials stored for {:?}", credentials.ssid),
        Ok(None) => {}
        Err(e) => warn!("failed to read wifi credentials: {}", e),
    }

    // The configuration surface runs on its own runtime and only talks to the
    // poll loop through this channel.
    let (event_tx, event_rx) = mpsc::channel::<core::ControllerEvent>(256);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    if config.http.enabled {
        let state = http::HttpState {
            event_tx: event_tx.clone(),
            web_root: config.http.web_root.clone(),
            wifi_file: config.controller.wifi_file.clone(),
        };
        runtime.spawn(http::serve(
            config.http.bind_address.clone(),
            config.http.port,
            state,
        ));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown_flag.store(true, Ordering::Relaxed),
            Err(e) => error!("failed to listen for Ctrl-C: {}", e),
        }
    });

    let mut controller = build_controller(&config, event_rx)?;
    controller.start();
    controller.run(&shutdown);
    info!(
        "stopped on station {} at volume {}",
        controller.session().current_station(),
        controller.session().volume()
    );

    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}
