// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};

use netiface::{
    register_builtin_communicators, run_house_keeping, setup_local_tracing, setup_tracing,
    AppConfig, AppResult, CommunicatorRegistry, EndpointConfig, NetworkInterface,
    NetworkInterfaceConfigType, Shutdown,
};

#[derive(Parser)]
#[command(version)]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    /// write rolling log files into this directory as well as to stdout
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// print the effective configuration and exit
    PrintConfig,
}

fn level_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn bring_up(interface: &NetworkInterface, endpoint: &EndpointConfig) -> AppResult<()> {
    interface.configure(
        endpoint.config_type,
        &endpoint.name,
        &endpoint.communicator,
        &endpoint.host,
        endpoint.port,
        endpoint.max_threads,
    )?;
    if !endpoint.autostart {
        return Ok(());
    }
    match endpoint.config_type {
        NetworkInterfaceConfigType::LocalUnicastServer => {
            interface.start_local_unicast_server(&endpoint.name)
        }
        NetworkInterfaceConfigType::LocalMulticastClient => {
            interface.start_local_multicast_client(&endpoint.name)
        }
        other => {
            warn!("autostart has no effect on {} endpoint {}", other, endpoint.name);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let commandline: CommandLine = CommandLine::parse();

    let level = level_filter(commandline.verbose);
    let _log_guard = match &commandline.log_dir {
        Some(log_dir) => Some(setup_tracing(log_dir, level)?),
        None => {
            setup_local_tracing(level)?;
            None
        }
    };

    let config_path = commandline.conf.as_ref().map_or_else(
        || {
            let mut path = PathBuf::from("conf");
            path.push("netiface.toml");
            path
        },
        PathBuf::from,
    );
    let app_config = AppConfig::load(&config_path)?;
    if let Some(Command::PrintConfig) = commandline.command {
        println!("{:#?}", app_config);
        return Ok(());
    }

    let registry = CommunicatorRegistry::new();
    let inbox = register_builtin_communicators(&registry)?;
    let interface = Arc::new(NetworkInterface::new(
        app_config.network_interface.clone(),
        Arc::new(registry),
    ));
    for endpoint in &app_config.endpoints {
        bring_up(&interface, endpoint)?;
    }
    info!(
        "network interface up with {} endpoints from {}",
        app_config.endpoints.len(),
        config_path.display()
    );

    let (notify_shutdown, _) = broadcast::channel(1);
    let house_keeper = tokio::spawn(run_house_keeping(
        interface.clone(),
        app_config.network_interface.house_keeping_interval(),
        Shutdown::subscribe(&notify_shutdown),
    ));
    let inbox_reader = tokio::spawn(async move {
        while let Ok(line) = inbox.recv().await {
            info!("multicast message: {}", line);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("received ctrl-c, shutting down");

    let _ = notify_shutdown.send(());
    if let Err(e) = house_keeper.await {
        error!("house keeper did not exit cleanly: {}", e);
    }
    let closing = interface.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || closing.close_all()).await {
        error!("closing network interface failed: {}", e);
    }
    inbox_reader.abort();

    Ok(())
}
