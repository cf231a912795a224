use std::env;

use flow_core::CONFIG;
use flow_oracle::ExecutionMode;
use log::error;
use tupleflow_rust::demo;

fn main() {
    // Cargar variables de entorno desde .env si existe (antes de leer CONFIG)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let input = args.next().unwrap_or_else(|| "abcdefghijklmnopqrstuvwxyz".to_string());
    let mode = match args.next().as_deref() {
        Some("distributed") => ExecutionMode::Distributed,
        _ => ExecutionMode::Embedded,
    };

    let report = match demo::run(&input, mode, CONFIG.clone()) {
        Ok(report) => report,
        Err(e) => {
            error!("demo:failed err={e}");
            std::process::exit(1);
        }
    };
    for c in &report.conditions {
        println!("{}", c.detail);
    }
    match serde_json::to_string_pretty(&report.metrics) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("demo:metrics_json err={e}"),
    }
    if !report.all_valid() {
        std::process::exit(2);
    }
}
