use anyhow::Result;
use async_trait::async_trait;
use keel::{
    logging, Assembly, AssemblyContext, Component, ComponentContainer, ComponentContext,
    HealthManager, HealthMonitorable, KeelConfig,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Pretend connection pool that drops its connection every few probes
#[derive(Default)]
struct ConnectionPool {
    connected: AtomicBool,
    probes: AtomicU32,
}

#[async_trait]
impl Component for ConnectionPool {
    fn name(&self) -> &str {
        "connection_pool"
    }

    async fn init(&self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        info!("Connection pool configured");
        Ok(())
    }

    async fn start(&self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        info!("Connection pool connected");
        Ok(())
    }

    async fn stop(&self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        info!("Connection pool closed");
        Ok(())
    }
}

#[async_trait]
impl HealthMonitorable for ConnectionPool {
    fn name(&self) -> &str {
        "connection_pool"
    }

    async fn is_healthy(&self) -> bool {
        if self.probes.fetch_add(1, Ordering::SeqCst) % 4 == 3 {
            self.connected.store(false, Ordering::SeqCst);
        }
        self.connected.load(Ordering::SeqCst)
    }

    async fn recover(&self) -> anyhow::Result<()> {
        warn!("Reconnecting connection pool");
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves requests until its budget runs out, then asks for shutdown
struct Worker {
    pool: Arc<ConnectionPool>,
    budget: Duration,
}

#[async_trait]
impl Component for Worker {
    fn name(&self) -> &str {
        "worker"
    }

    async fn start(&self, ctx: &ComponentContext) -> anyhow::Result<()> {
        if !self.pool.connected.load(Ordering::SeqCst) {
            anyhow::bail!("connection pool is not connected");
        }

        let ctx = ctx.clone();
        let budget = self.budget;
        tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            ctx.request_termination("work budget exhausted", None);
        });
        Ok(())
    }
}

struct Service {
    config: KeelConfig,
    budget: Duration,
}

impl Assembly for Service {
    fn assemble(&self, ctx: &mut AssemblyContext<'_>) -> keel::Result<()> {
        ctx.add_component("pool", Arc::new(ConnectionPool::default()))?;

        let pool = ctx
            .get::<ConnectionPool>("pool")
            .ok_or_else(|| keel::KeelError::system("pool was not registered"))?;
        ctx.add_component(
            "worker",
            Arc::new(Worker {
                pool,
                budget: self.budget,
            }),
        )?;

        ctx.add_anonymous_component(Arc::new(HealthManager::new(self.config.health.clone())))?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = KeelConfig::load()?;
    config.validate()?;
    let _guard = logging::init(&config.logging)?;

    let container = ComponentContainer::new(config.container.clone());
    container.assemble(&Service {
        config: config.clone(),
        budget: Duration::from_secs(10),
    })?;

    if let Err(e) = container.startup().await {
        error!("Startup failed: {}", e);
        return Err(e.into());
    }

    let health = container
        .lookup_by_type::<HealthManager>()?
        .ok_or_else(|| anyhow::anyhow!("health manager is not registered"))?;
    let pool = container
        .lookup_as::<ConnectionPool>("pool")
        .ok_or_else(|| anyhow::anyhow!("connection pool is not registered"))?;
    health.add_health_monitorable(pool, Duration::from_secs(1))?;

    let request = container.run().await?;
    info!("Stopped: {}", request);

    for report in health.report() {
        info!(
            "{}: {} probe(s), {} recover(ies)",
            report.name, report.metrics.probes, report.metrics.recoveries
        );
    }

    Ok(())
}
