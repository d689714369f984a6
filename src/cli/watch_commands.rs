use crate::analyzers::{MeetingClassifier, MeetingMonitor};
use crate::collectors::{CaptureHandle, LocalNetworkContext, PacketCollector};
use crate::config::AppConfig;
use crate::models::{MeetingEvent, MeetingStatus};
use crate::outputs::{Actuator, IndicatorColor, LogActuator, MeetingNotifier, SessionLog};
use anyhow::{Context, Result};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{MissedTickBehavior, interval};

use super::commands::SignState;

/// Flag overrides for the `watch` command, applied on top of the loaded config
#[derive(Debug, Default, Clone)]
pub struct WatchOptions {
    pub config: Option<PathBuf>,
    pub idle_timeout: Option<u64>,
    pub interval: Option<u64>,
    pub session_log: Option<PathBuf>,
    pub json: bool,
}

impl WatchOptions {
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(secs) = self.idle_timeout {
            config.monitor.idle_timeout_secs = secs;
        }
        if let Some(secs) = self.interval {
            config.monitor.check_interval_secs = secs;
        }
        if let Some(path) = &self.session_log {
            config.session_log.path = path.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

pub struct WatchCommandHandler {
    actuator: Arc<dyn Actuator>,
}

impl WatchCommandHandler {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self { actuator }
    }

    pub async fn handle_watch_command(&self, options: WatchOptions) -> Result<()> {
        let config = options.resolve()?;
        let context = LocalNetworkContext::resolve(config.network.subnet_prefix_len)?;
        let signatures = config.signature_table()?;

        println!("⚠️  Note: Packet capture requires elevated privileges (sudo/administrator)");
        println!();
        println!("🔍 Watching {} (LAN {})", context.address(), context.subnet());
        println!(
            "📋 {} signatures, idle timeout {}s, check every {}s",
            signatures.len(),
            config.monitor.idle_timeout_secs,
            config.monitor.check_interval_secs
        );
        println!("📝 Session log: {}", config.session_log.path.display());
        println!("Press Ctrl+C to stop");
        println!();

        let classifier = MeetingClassifier::new(signatures, context.address(), config.idle_timeout());
        let (monitor, mut events) = MeetingMonitor::new(classifier);
        let monitor = Arc::new(monitor);

        let notifier = MeetingNotifier::new(
            Arc::clone(&self.actuator),
            Some(SessionLog::new(config.session_log.path.clone())),
        );

        let handle = CaptureHandle::new();
        let collector = PacketCollector::open(context, handle.clone())?;
        let capture = collector.spawn(Arc::clone(&monitor));

        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {e}");
            }
            println!();
            println!("🛑 Stopping...");
        };
        watch_until(
            &monitor,
            &mut events,
            &notifier,
            config.check_interval(),
            options.json,
            ctrl_c,
        )
        .await;

        handle.close();
        match capture.await {
            Ok(summary) => info!(
                "Capture summary: {} received, {} relevant",
                summary.received, summary.relevant
            ),
            Err(e) => error!("Capture task failed: {e}"),
        }

        while let Ok(event) = events.try_recv() {
            notifier.notify(&event).await;
        }
        if monitor.is_active() {
            notifier.shutdown().await;
        }

        println!("✅ Meeting watch stopped");
        Ok(())
    }

    pub fn handle_signatures_command(&self, config: Option<PathBuf>, json: bool) -> Result<()> {
        let config = AppConfig::load(config.as_deref()).context("Failed to load configuration")?;
        let table = config.signature_table()?;

        if json {
            println!("{}", serde_json::to_string_pretty(table.signatures())?);
            return Ok(());
        }

        println!("📋 Platform signatures (match order)");
        println!("{}", "=".repeat(60));
        for (index, signature) in table.signatures().iter().enumerate() {
            let networks: Vec<String> = signature.networks.iter().map(|n| n.to_string()).collect();
            let ports: Vec<String> = signature.ports.iter().map(|p| p.to_string()).collect();
            println!(
                "{:>2}. {:<6} networks: {:<40} ports: {}",
                index + 1,
                signature.platform,
                if networks.is_empty() { "any".to_string() } else { networks.join(", ") },
                if ports.is_empty() { "any".to_string() } else { ports.join(", ") }
            );
        }
        Ok(())
    }

    pub fn handle_local_command(&self, config: Option<PathBuf>) -> Result<()> {
        let config = AppConfig::load(config.as_deref()).context("Failed to load configuration")?;
        let context = LocalNetworkContext::resolve(config.network.subnet_prefix_len)?;

        println!("🖥️  Local address: {}", context.address());
        println!("🌐 LAN subnet:    {}", context.subnet());
        println!("   Prefix:        {}*", context.subnet_prefix());
        Ok(())
    }

    pub async fn handle_sign_command(&self, state: SignState) -> Result<()> {
        match state {
            SignState::On => {
                self.actuator.turn_on(IndicatorColor::DEFAULT).await?;
                println!("💡 Indicator on ({})", IndicatorColor::DEFAULT);
            }
            SignState::Off => {
                self.actuator.turn_off().await?;
                println!("⚫ Indicator off");
            }
        }
        Ok(())
    }
}

impl Default for WatchCommandHandler {
    fn default() -> Self {
        Self::new(Arc::new(LogActuator::new()))
    }
}

/// Ticks, prints and notifies until `shutdown` resolves; returns the number of checks run
///
/// `shutdown` is polled across iterations, so a signal that arrives while a
/// tick or event is being handled still ends the loop.
async fn watch_until<F>(
    monitor: &MeetingMonitor,
    events: &mut UnboundedReceiver<MeetingEvent>,
    notifier: &MeetingNotifier,
    check_interval: Duration,
    json: bool,
    shutdown: F,
) -> u64
where
    F: Future<Output = ()>,
{
    let mut ticker = interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut checks = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                monitor.check_meeting_status();
                checks += 1;
                print_status(&monitor.status(), json);
            }
            Some(event) = events.recv() => {
                print_event(&event, json);
                notifier.notify(&event).await;
            }
            _ = &mut shutdown => break,
        }
    }
    checks
}

fn print_status(status: &MeetingStatus, json: bool) {
    if json {
        match serde_json::to_string(status) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("Failed to serialize status: {e}"),
        }
        return;
    }
    println!("{}", format_status(status));
}

fn print_event(event: &MeetingEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("Failed to serialize event: {e}"),
        }
        return;
    }
    match event {
        MeetingEvent::Started { platform, remote, .. } => {
            println!("🟢 {platform} meeting started with {remote}");
        }
        MeetingEvent::Ended {
            platform,
            remote,
            counters,
            ..
        } => {
            println!(
                "🔴 {platform} meeting with {remote} ended ({} packets: {} in / {} out)",
                counters.total, counters.inbound, counters.outbound
            );
        }
    }
}

fn format_status(status: &MeetingStatus) -> String {
    let time = chrono::Local::now().format("%H:%M:%S");
    let counters = &status.counters;
    if status.active {
        let remote = status.remote.map(|r| r.to_string()).unwrap_or_default();
        format!(
            "[{time}] 📞 {} {} | in {} out {} total {}",
            status.platform, remote, counters.inbound, counters.outbound, counters.total
        )
    } else {
        format!("[{time}] 💤 No meeting | total {}", counters.total)
    }
}
