//! End-to-end shutdowns against real processes.
//!
//! A `sleep` process stands in for the hypervisor; the shutdown command runs
//! through `ShellExecutor` and "powers off" the VM by killing that process.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::task::JoinHandle;
use vmhalt::driver::{is_process_alive, kill_process};
use vmhalt::step::BoxedStep;
use vmhalt::{
    MemorySink, ProcessDriver, ShellExecutor, ShutdownConfig, ShutdownContext, ShutdownStep,
    StepOutcome, StepRunner, VmHandle, VmhaltError,
};

struct FakeHypervisor {
    pid: u32,
    reaper: JoinHandle<std::process::ExitStatus>,
}

impl FakeHypervisor {
    fn spawn() -> Self {
        let mut child = Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .expect("spawn fake hypervisor");
        let pid = child.id().expect("fake hypervisor pid");
        // Reap promptly so the PID disappears as soon as the process dies.
        let reaper = tokio::spawn(async move { child.wait().await.expect("wait fake hypervisor") });
        Self { pid, reaper }
    }

    async fn assert_stopped(self) {
        tokio::time::timeout(Duration::from_secs(5), self.reaper)
            .await
            .expect("hypervisor did not exit")
            .expect("reaper panicked");
    }

    fn kill(&self) {
        kill_process(self.pid);
    }
}

fn context(
    hypervisor: &FakeHypervisor,
    config: ShutdownConfig,
) -> (ShutdownContext, Arc<MemorySink>) {
    let vm = VmHandle::new("it-vm");
    let driver = Arc::new(ProcessDriver::new());
    driver.register(vm.clone(), hypervisor.pid);
    let sink = Arc::new(MemorySink::new());

    let ctx = ShutdownContext::new(
        vm,
        config,
        Arc::new(ShellExecutor::new()),
        driver,
        sink.clone(),
    );
    (ctx, sink)
}

fn config(command: String, timeout: Duration) -> ShutdownConfig {
    ShutdownConfig {
        poll_interval: Duration::from_millis(50),
        ..ShutdownConfig::graceful(command, timeout)
    }
}

#[tokio::test]
async fn test_graceful_command_powers_off_vm() {
    let hypervisor = FakeHypervisor::spawn();
    let command = format!(
        "echo \"stopping $VMHALT_VM\"; echo 'flushing disks' >&2; kill {}",
        hypervisor.pid
    );
    let (ctx, sink) = context(&hypervisor, config(command, Duration::from_secs(10)));

    let outcome = vmhalt::shutdown(&ctx).await;

    assert!(outcome.is_continue(), "unexpected outcome: {:?}", outcome);
    let messages = sink.messages();
    assert!(messages.contains(&"stopping it-vm".to_string()));
    assert!(messages.contains(&"flushing disks".to_string()));
    assert!(sink.errors().is_empty());
    hypervisor.assert_stopped().await;
}

#[tokio::test]
async fn test_failing_command_halts_and_leaves_vm_running() {
    let hypervisor = FakeHypervisor::spawn();
    let (ctx, sink) = context(
        &hypervisor,
        config("echo 'not permitted' >&2; exit 4".into(), Duration::from_secs(10)),
    );

    let outcome = vmhalt::shutdown(&ctx).await;

    assert!(matches!(outcome, StepOutcome::Halt(VmhaltError::NonZeroExit(4))));
    assert!(sink.messages().contains(&"not permitted".to_string()));
    assert!(is_process_alive(hypervisor.pid));
    hypervisor.kill();
}

#[tokio::test]
async fn test_failing_command_with_background_child_halts_promptly() {
    let hypervisor = FakeHypervisor::spawn();
    // The background sleep inherits stdout/stderr and keeps them open.
    let (ctx, _sink) = context(
        &hypervisor,
        config("sleep 5 & exit 3".into(), Duration::from_secs(10)),
    );

    let start = Instant::now();
    let outcome = vmhalt::shutdown(&ctx).await;

    assert!(matches!(outcome, StepOutcome::Halt(VmhaltError::NonZeroExit(3))));
    assert!(start.elapsed() < Duration::from_secs(4));
    hypervisor.kill();
}

#[tokio::test]
async fn test_vm_that_ignores_command_times_out() {
    let hypervisor = FakeHypervisor::spawn();
    let (ctx, sink) = context(&hypervisor, config("true".into(), Duration::from_millis(300)));

    let outcome = vmhalt::shutdown(&ctx).await;

    assert!(matches!(outcome, StepOutcome::Halt(VmhaltError::ShutdownTimeout)));
    assert_eq!(sink.errors().len(), 1);
    hypervisor.kill();
}

#[tokio::test]
async fn test_hung_command_is_abandoned_at_deadline() {
    let hypervisor = FakeHypervisor::spawn();
    let (ctx, _sink) = context(
        &hypervisor,
        config("sleep 30".into(), Duration::from_millis(300)),
    );

    let start = Instant::now();
    let outcome = vmhalt::shutdown(&ctx).await;

    assert!(matches!(outcome, StepOutcome::Halt(VmhaltError::ShutdownTimeout)));
    assert!(start.elapsed() < Duration::from_secs(5));
    hypervisor.kill();
}

#[tokio::test]
async fn test_forceful_stop_kills_hypervisor() {
    let hypervisor = FakeHypervisor::spawn();
    let (ctx, sink) = context(&hypervisor, ShutdownConfig::forceful());

    let outcome = vmhalt::shutdown(&ctx).await;

    assert!(outcome.is_continue());
    assert!(sink.messages().is_empty());
    hypervisor.assert_stopped().await;
}

#[tokio::test]
async fn test_config_file_through_step_runner() {
    let hypervisor = FakeHypervisor::spawn();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shutdown.json");
    std::fs::write(
        &path,
        format!(
            r#"{{"shutdown_command": "kill {}", "shutdown_timeout": "10s", "poll_interval": "50ms"}}"#,
            hypervisor.pid
        ),
    )
    .unwrap();

    let (ctx, _sink) = context(&hypervisor, ShutdownConfig::load(&path).unwrap());
    let steps: Vec<BoxedStep<ShutdownContext>> = vec![Box::new(ShutdownStep)];

    let report = StepRunner::run(&steps, &ctx).await;

    assert!(report.outcome.is_continue());
    assert!(report.halted_at.is_none());
    hypervisor.assert_stopped().await;
}
