//! vmhalt - shut down a VM backed by a local hypervisor process.
//!
//! Runs the configured shutdown command (through `sh -c`) and waits for the
//! hypervisor process to exit, or kills the process outright when no command
//! is configured.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use vmhalt::step::BoxedStep;
use vmhalt::{
    ConsoleSink, LoggingOptions, ProcessDriver, ShellExecutor, ShutdownConfig, ShutdownContext,
    ShutdownStep, StepRunner, VmHandle, VmhaltResult,
};

#[derive(Parser, Debug)]
#[command(name = "vmhalt", version, about = "Shut down a VM, gracefully if possible")]
struct Args {
    /// VM name (exported to the shutdown command as VMHALT_VM)
    #[arg(long)]
    vm: String,

    /// PID of the hypervisor process running the VM
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pid: u32,

    /// JSON shutdown config; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Command that powers off the guest, e.g. "ssh admin@vm sudo poweroff"
    #[arg(long)]
    shutdown_command: Option<String>,

    /// Budget for the command and the power-off wait, e.g. "5m"
    #[arg(long, value_parser = humantime::parse_duration)]
    shutdown_timeout: Option<Duration>,

    /// Pause between power-state checks, e.g. "1s"
    #[arg(long, value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Also write logs to daily-rolling files in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn shutdown_config(&self) -> VmhaltResult<ShutdownConfig> {
        let mut config = match &self.config {
            Some(path) => ShutdownConfig::load(path)?,
            None => ShutdownConfig::default(),
        };

        if let Some(command) = &self.shutdown_command {
            config.shutdown_command = command.clone();
        }
        if let Some(timeout) = self.shutdown_timeout {
            config.shutdown_timeout = timeout;
        }
        if let Some(interval) = self.poll_interval {
            config.poll_interval = interval;
        }

        config.sanitize()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let logging = LoggingOptions {
        log_dir: args.log_dir.clone(),
        default_directive: "warn".to_string(),
        ..LoggingOptions::default()
    };
    if let Err(e) = vmhalt::init_logging(&logging) {
        eprintln!("vmhalt: {}", e);
        return ExitCode::from(2);
    }

    let config = match args.shutdown_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vmhalt: {}", e);
            return ExitCode::from(2);
        }
    };

    let vm = VmHandle::new(args.vm);
    let driver = Arc::new(ProcessDriver::new());
    driver.register(vm.clone(), args.pid);

    let ctx = ShutdownContext::new(
        vm,
        config,
        Arc::new(ShellExecutor::new()),
        driver,
        Arc::new(ConsoleSink::new()),
    );

    let steps: Vec<BoxedStep<ShutdownContext>> = vec![Box::new(ShutdownStep)];
    let report = StepRunner::run(&steps, &ctx).await;

    tracing::debug!(
        total_duration_ms = report.total_duration_ms,
        halted_at = ?report.halted_at,
        "Shutdown run finished"
    );

    if report.outcome.is_continue() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
