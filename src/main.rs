use std::process::exit;
use std::sync::Arc;

use clap::App;
use tokio::sync::watch;

mod config;
mod ingest;
mod log_writer;
mod record;
mod server;

use config::Configuration;
use log_writer::RotatingLogWriter;

static DEFAULT_CONFIG_PATH: &str = "resources/sensorlogd.yml";
static DEFAULT_LOG_CONFIG_PATH: &str = "resources/log.yml";

fn main() {
    let cli_yaml = clap::load_yaml!("cli.yml");
    let matches = App::from(cli_yaml).get_matches();

    let log_config_path = matches.value_of("log-config").unwrap_or(DEFAULT_LOG_CONFIG_PATH);
    match log4rs::init_file(log_config_path, Default::default()) {
        Ok(_) => {},
        Err(err) => {
            eprintln!("Could not create logger from yaml configuration: {}", err);
            exit(-100);
        }
    };

    let config_path = matches.value_of("config").unwrap_or(DEFAULT_CONFIG_PATH);
    let mut configuration = match Configuration::from_file(config_path) {
        Ok(res) => res,
        Err(err) => {
            log::error!(target: "sensorlogd", "Cannot load the configuration: \'{}\'", err);
            exit(100);
        }
    };

    if let Some(address) = matches.value_of("address") {
        configuration.server_parameters.address = String::from(address);
    }
    if let Some(port) = matches.value_of("port") {
        configuration.server_parameters.port = match port.parse::<u16>() {
            Ok(port) => port,
            Err(err) => {
                log::error!(target: "sensorlogd", "Invalid port \'{}\': \'{}\'", port, err);
                exit(101);
            }
        };
    }

    let writer = RotatingLogWriter::new(configuration.log_writer_parameters.clone());
    match writer.ensure_initialized() {
        Ok(_) => log::info!(
            target: "sensorlogd",
            "Writing sensor data to \'{}\'",
            writer.directory().display()
        ),
        Err(err) => {
            log::error!(target: "sensorlogd", "Cannot initialize the data log: \'{}\'", err);
            exit(201);
        }
    };
    let writer = Arc::new(writer);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .thread_name("http")
        .enable_all()
        .build() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!(target: "sensorlogd", "Cannot start the async runtime: \'{}\'", err);
            exit(202);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    match ctrlc::set_handler(move || {
        log::info!(target: "sensorlogd", "Termination signal received!");
        let _ = shutdown_tx.send(true);
    }) {
        Ok(_) => {},
        Err(err) => {
            log::error!(target: "sensorlogd", "Cannot set the termination handler: \'{}\'", err);
            exit(203);
        }
    };

    match runtime.block_on(server::serve(configuration.server_parameters, writer, shutdown_rx)) {
        Ok(_) => log::debug!(target: "sensorlogd", "Http server stopped!"),
        Err(err) => {
            log::error!(target: "sensorlogd", "Http server failed: \'{}\'", err);
            exit(301);
        }
    };

    log::info!(target: "sensorlogd", "Exiting");
    exit(0);
}
