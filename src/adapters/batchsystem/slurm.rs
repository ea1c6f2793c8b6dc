//! Slurm batch-system adapter.
//!
//! Machine state comes from `sinfo`; nodes are addressed by the value of
//! their `features` column and drained through `scontrol`. Integration and
//! disintegration are no-ops: Slurm nodes are statically configured and
//! join the partition on their own once booted.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::{AgentError, AgentResult};
use crate::domain::models::MachineStatus;
use crate::domain::ports::{BatchSystemAgent, CommandRunner};
use crate::services::config::BatchSystemConfig;

const SINFO_FORMAT: &str = "statelong,cpusstate,allocmem,memory,features,nodehost";
const DRAIN_REASON: &str = "aviary";

/// One node row parsed from `sinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SlurmNode {
    state: String,
    allocated_cpus: u64,
    total_cpus: u64,
    allocated_memory: u64,
    total_memory: u64,
    features: String,
    node_host: String,
}

impl SlurmNode {
    fn machine_status(&self) -> MachineStatus {
        match self.state.as_str() {
            "mixed" | "idle" | "allocated" | "alloc" => MachineStatus::Available,
            "draining" => MachineStatus::Draining,
            _ => MachineStatus::NotAvailable,
        }
    }

    /// `[cpu ratio, memory ratio]` of allocated over total.
    fn ratios(&self) -> [f64; 2] {
        let cpu = if self.total_cpus == 0 {
            0.0
        } else {
            self.allocated_cpus as f64 / self.total_cpus as f64
        };
        let memory = if self.total_memory == 0 {
            0.0
        } else {
            self.allocated_memory as f64 / self.total_memory as f64
        };
        [cpu, memory]
    }
}

fn parse_sinfo(stdout: &str) -> AgentResult<HashMap<String, SlurmNode>> {
    let mut nodes = HashMap::new();
    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        let malformed = || AgentError::Batch(format!("malformed sinfo line: {line}"));

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(malformed());
        }
        let cpus: Vec<&str> = fields[1].split('/').collect();
        if cpus.len() != 4 {
            return Err(malformed());
        }

        let node = SlurmNode {
            state: fields[0].to_string(),
            allocated_cpus: cpus[0].parse().map_err(|_| malformed())?,
            total_cpus: cpus[3].parse().map_err(|_| malformed())?,
            allocated_memory: fields[2].parse().map_err(|_| malformed())?,
            total_memory: fields[3].parse().map_err(|_| malformed())?,
            features: fields[4].to_string(),
            node_host: fields[5].to_string(),
        };
        nodes.insert(node.features.clone(), node);
    }
    Ok(nodes)
}

struct CachedNodes {
    taken_at: Instant,
    nodes: HashMap<String, SlurmNode>,
}

/// `BatchSystemAgent` implementation backed by the Slurm CLIs.
pub struct SlurmBatchSystemAgent {
    runner: Arc<dyn CommandRunner>,
    options: BTreeMap<String, String>,
    max_age: Duration,
    cache: Mutex<Option<CachedNodes>>,
}

impl SlurmBatchSystemAgent {
    pub fn new(config: &BatchSystemConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            options: config.options.clone(),
            max_age: Duration::from_secs(config.max_age),
            cache: Mutex::new(None),
        }
    }

    fn status_command(&self) -> String {
        let mut command = format!(r#"sinfo --Format="{SINFO_FORMAT}" -e --noheader -r"#);
        for (key, value) in &self.options {
            command.push_str(&format!(" --{key}={value}"));
        }
        command
    }

    /// Current node table, refreshed when the cache is older than
    /// `max_age`.
    async fn nodes(&self) -> AgentResult<HashMap<String, SlurmNode>> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.taken_at.elapsed() < self.max_age {
                return Ok(cached.nodes.clone());
            }
        }

        let stdout = self.runner.run(&self.status_command()).await?;
        let nodes = parse_sinfo(&stdout)?;
        *cache = Some(CachedNodes {
            taken_at: Instant::now(),
            nodes: nodes.clone(),
        });
        Ok(nodes)
    }

    async fn node(&self, dns_name: &str) -> AgentResult<Option<SlurmNode>> {
        Ok(self.nodes().await?.get(dns_name).cloned())
    }
}

#[async_trait]
impl BatchSystemAgent for SlurmBatchSystemAgent {
    async fn integrate_machine(&self, _dns_name: &str) -> AgentResult<()> {
        Ok(())
    }

    async fn get_machine_status(&self, dns_name: &str) -> AgentResult<MachineStatus> {
        Ok(self
            .node(dns_name)
            .await?
            .map_or(MachineStatus::NotAvailable, |node| node.machine_status()))
    }

    async fn get_allocation(&self, dns_name: &str) -> AgentResult<f64> {
        Ok(self.node(dns_name).await?.map_or(0.0, |node| {
            let [cpu, memory] = node.ratios();
            cpu.max(memory)
        }))
    }

    async fn get_utilisation(&self, dns_name: &str) -> AgentResult<f64> {
        Ok(self.node(dns_name).await?.map_or(0.0, |node| {
            let [cpu, memory] = node.ratios();
            cpu.min(memory)
        }))
    }

    async fn drain_machine(&self, dns_name: &str) -> AgentResult<()> {
        // Unknown machines have nothing to drain.
        let Some(node) = self.node(dns_name).await? else {
            return Ok(());
        };
        let command = format!(
            "scontrol update NodeName={} State=DRAIN Reason='{}'",
            node.node_host, DRAIN_REASON
        );
        self.runner.run(&command).await?;
        Ok(())
    }

    async fn disintegrate_machine(&self, _dns_name: &str) -> AgentResult<()> {
        Ok(())
    }
}
