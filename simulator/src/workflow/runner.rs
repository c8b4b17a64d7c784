use crate::generator::SyntheticSensor;
use crate::optimizer::{FrameRate, FrameRateOptimizer, PresenceState};
use crate::workflow::config::SimulationConfig;
use anyhow::{anyhow, Context};
use rdmcore::frame::decode_samples;
use rdmcore::math::StatsHelper;
use rdmcore::telemetry::MetricsSnapshot;
use rdmcore::{ConsumerHandle, ManagerState, RadarDataManager, RdmError, SubscriberId, TaskNotifier};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tokio::runtime::Builder;
use tokio::sync::watch;

type SharedManager = Arc<Mutex<RadarDataManager<SyntheticSensor>>>;

fn lock(manager: &SharedManager) -> anyhow::Result<MutexGuard<'_, RadarDataManager<SyntheticSensor>>> {
    manager
        .lock()
        .map_err(|_| anyhow!("radar data manager lock poisoned"))
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumerSummary {
    pub name: String,
    pub windows: usize,
    pub last_rms: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub frames_emitted: usize,
    pub frames_dropped: usize,
    pub consumers: Vec<ConsumerSummary>,
    pub metrics: MetricsSnapshot,
    pub final_state: ManagerState,
    pub frame_rate: FrameRate,
    pub rate_switches: usize,
}

struct Consumer {
    name: String,
    id: SubscriberId,
    notifier: TaskNotifier,
    manager: SharedManager,
    activity_threshold: f32,
    optimizer: Option<FrameRateOptimizer>,
}

impl Consumer {
    async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> (ConsumerSummary, Option<FrameRateOptimizer>) {
        let mut summary = ConsumerSummary {
            name: self.name.clone(),
            windows: 0,
            last_rms: 0.0,
        };

        loop {
            tokio::select! {
                _ = self.notifier.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let samples = match self.take_window() {
                Ok(Some(samples)) => samples,
                Ok(None) => continue,
                Err(err) => {
                    log::error!("{} stopped: {:#}", self.name, err);
                    break;
                }
            };

            summary.windows += 1;
            summary.last_rms = StatsHelper::ac_rms(&samples);
            if let Some(optimizer) = self.optimizer.as_mut() {
                let state = if summary.last_rms > self.activity_threshold {
                    PresenceState::MacroPresence
                } else {
                    PresenceState::Absence
                };
                optimizer.optimize(state);
            }
        }

        (summary, self.optimizer)
    }

    /// Copies out and acknowledges the current window, if there is a fresh one.
    fn take_window(&self) -> anyhow::Result<Option<Vec<u16>>> {
        let mut guard = lock(&self.manager)?;
        if guard.is_acknowledged(self.id) {
            return Ok(None);
        }
        let samples = match guard.read_from_buffer(self.id) {
            Ok(window) => decode_samples(window),
            Err(RdmError::NotReady(_)) => return Ok(None),
            Err(err) => return Err(err).context("reading staged window"),
        };
        guard.ack(self.id).context("acknowledging staged window")?;
        Ok(Some(samples))
    }
}

fn interval_for(rate: FrameRate, config: &SimulationConfig) -> u64 {
    match rate {
        FrameRate::Low => config.low_rate_interval_ms,
        FrameRate::High => config.high_rate_interval_ms,
    }
}

#[derive(Clone)]
pub struct Runner {
    config: SimulationConfig,
}

impl Runner {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> anyhow::Result<SimulationResult> {
        let config = &self.config;
        let sensor = SyntheticSensor::new(config.to_sensor_config());
        let manager = RadarDataManager::with_config(sensor, &config.to_manager_config())
            .context("initializing radar data manager")?;
        let manager: SharedManager = Arc::new(Mutex::new(manager));

        let interval = Arc::new(AtomicU64::new(0));
        let sink = interval.clone();
        let rate_config = config.clone();
        let optimizer = FrameRateOptimizer::new(config.mode, move |rate| {
            sink.store(interval_for(rate, &rate_config), Ordering::Relaxed);
        });
        interval.store(interval_for(optimizer.current(), config), Ordering::Relaxed);
        let mut rate_outcome = (optimizer.current(), 0);
        let mut optimizer = Some(optimizer);

        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("building consumer runtime")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut ids = Vec::with_capacity(config.consumers);
        let mut tasks = Vec::with_capacity(config.consumers);
        for idx in 0..config.consumers {
            let name = format!("consumer-{}", idx);
            let notifier = TaskNotifier::new();
            let id = lock(&manager)?
                .subscribe(ConsumerHandle::task(name.clone(), notifier.clone()))
                .with_context(|| format!("subscribing {}", name))?;
            ids.push(id);

            let consumer = Consumer {
                name,
                id,
                notifier,
                manager: manager.clone(),
                activity_threshold: config.activity_threshold,
                optimizer: optimizer.take(),
            };
            tasks.push(runtime.spawn(consumer.run(shutdown_rx.clone())));
        }

        let producer_manager = manager.clone();
        let producer_interval = interval.clone();
        let frames = config.frames;
        let producer = thread::Builder::new()
            .name("sensor-irq".into())
            .spawn(move || -> anyhow::Result<()> {
                for _ in 0..frames {
                    thread::sleep(Duration::from_millis(
                        producer_interval.load(Ordering::Relaxed),
                    ));
                    lock(&producer_manager)?
                        .run_from_isr()
                        .context("running radar data manager")?;
                }
                Ok(())
            })
            .context("spawning sensor interrupt thread")?;
        producer
            .join()
            .map_err(|_| anyhow!("sensor interrupt thread panicked"))??;

        thread::sleep(Duration::from_millis(config.drain_ms));
        if let Err(err) = shutdown_tx.send(true) {
            log::debug!("no consumer left to receive shutdown: {}", err);
        }

        let outcomes = runtime.block_on(async {
            let mut outcomes = Vec::with_capacity(tasks.len());
            for task in tasks {
                outcomes.push(task.await.context("joining consumer task")?);
            }
            Ok::<_, anyhow::Error>(outcomes)
        })?;

        let mut consumers = Vec::with_capacity(outcomes.len());
        for (summary, optimizer) in outcomes {
            if let Some(optimizer) = optimizer {
                rate_outcome = (optimizer.current(), optimizer.switches());
            }
            consumers.push(summary);
        }
        let (frame_rate, rate_switches) = rate_outcome;

        let mut guard = lock(&manager)?;
        for id in ids {
            guard.unsubscribe(id);
        }
        let final_state = guard.state();
        let metrics = guard.metrics().snapshot();
        let frames_emitted = guard.producer().emitted();
        let frames_dropped = guard.producer().dropped();
        guard.deinit().context("releasing radar data manager")?;

        Ok(SimulationResult {
            frames_emitted,
            frames_dropped,
            consumers,
            metrics,
            final_state,
            frame_rate,
            rate_switches,
        })
    }
}
