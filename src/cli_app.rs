//! Command-line surface and process wiring.
//!
//! Flags override the optional TOML file, which overrides built-in defaults.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::daemon::loop_main::{Watchdog, WatchdogSettings};
use crate::daemon::pacer::SleepPacer;
use crate::daemon::service::{self, DaemonRole};
use crate::daemon::signals;
use crate::logger;
use crate::notify::pushover::PushoverGateway;
use crate::probe::s7::S7Probe;

/// Watch an S7 PLC and raise a Pushover emergency when it enters STOP.
#[derive(Debug, Default, Parser)]
#[command(name = "plcwatchd", version, about)]
pub struct Cli {
    /// PLC IP address or host name.
    #[arg(short = 'i', long = "ip", value_name = "ADDR")]
    pub ip: Option<String>,

    /// CPU rack number [default: 0].
    #[arg(short = 'r', long)]
    pub rack: Option<u16>,

    /// CPU slot number [default: 2].
    #[arg(short = 's', long)]
    pub slot: Option<u16>,

    /// Pushover user key.
    #[arg(short = 'k', long = "key", value_name = "KEY")]
    pub user_key: Option<String>,

    /// Pushover application token.
    #[arg(short = 't', long = "token", value_name = "TOKEN")]
    pub app_token: Option<String>,

    /// Seconds between poll cycles [default: 10].
    #[arg(short = 'p', long = "polling", value_name = "SECS")]
    pub polling: Option<u64>,

    /// Seconds between emergency re-deliveries [default: 60].
    #[arg(short = 'c', long = "retry", value_name = "SECS")]
    pub retry: Option<u32>,

    /// Seconds an emergency keeps re-delivering [default: 600].
    #[arg(short = 'e', long = "expire", value_name = "SECS")]
    pub expire: Option<u32>,

    /// Restrict delivery to these devices (repeatable or comma-separated).
    #[arg(short = 'D', long = "device", value_name = "NAME", value_delimiter = ',')]
    pub devices: Vec<String>,

    /// Append log output to this file instead of stderr.
    #[arg(short = 'l', long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Detach from the terminal and run in the background.
    #[arg(short = 'd', long)]
    pub daemonize: bool,

    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seconds between acknowledgment polls during an incident [default: 5].
    #[arg(long, value_name = "SECS")]
    pub grace: Option<u64>,
}

/// How a successful [`run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// The launcher handed off to a detached child.
    Detached { pid: u32 },
    /// The watchdog ran until a termination signal.
    Stopped { cycles: u64 },
}

impl Cli {
    /// Merge defaults, the TOML file and flags into a validated [`Config`].
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        config.resolve_paths()?;
        Ok(config)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(ip) = &self.ip {
            config.controller.ip.clone_from(ip);
        }
        if let Some(rack) = self.rack {
            config.controller.rack = rack;
        }
        if let Some(slot) = self.slot {
            config.controller.slot = slot;
        }
        if let Some(key) = &self.user_key {
            config.pushover.user_key.clone_from(key);
        }
        if let Some(token) = &self.app_token {
            config.pushover.app_token.clone_from(token);
        }
        if let Some(retry) = self.retry {
            config.pushover.retry_secs = retry;
        }
        if let Some(expire) = self.expire {
            config.pushover.expire_secs = expire;
        }
        if !self.devices.is_empty() {
            config.pushover.devices = self
                .devices
                .iter()
                .map(|device| device.trim().to_string())
                .filter(|device| !device.is_empty())
                .collect();
        }
        if let Some(polling) = self.polling {
            config.watchdog.polling_interval_secs = polling;
        }
        if let Some(grace) = self.grace {
            config.watchdog.grace_interval_secs = grace;
        }
        if self.log_file.is_some() {
            config.logging.file.clone_from(&self.log_file);
        }
        config.logging.verbose |= self.verbose;
    }
}

/// Resolve configuration, optionally detach, then supervise until shutdown.
pub fn run(cli: &Cli) -> Result<Launch> {
    let config = cli.resolve_config()?;

    if cli.daemonize {
        if let DaemonRole::Parent { pid } = service::daemonize()? {
            return Ok(Launch::Detached { pid });
        }
    }

    logger::init(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        controller = %config.controller.label(),
        port = config.controller.port,
        retry_secs = config.pushover.retry_secs,
        expire_secs = config.pushover.expire_secs,
        devices = ?config.pushover.devices,
        "plcwatchd starting"
    );

    let shutdown = signals::install_shutdown_flag()?;
    let probe = S7Probe::from_config(&config.controller);
    let gateway = PushoverGateway::from_config(&config.pushover)?;
    let pacer = SleepPacer::new(shutdown);

    let mut watchdog = Watchdog::new(probe, gateway, pacer, WatchdogSettings::from_config(&config));
    let cycles = watchdog.run();
    watchdog.shutdown();
    info!(cycles, "plcwatchd stopped");
    Ok(Launch::Stopped { cycles })
}
