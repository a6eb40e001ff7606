//! Worker configuration
//!
//! Defines all configurable parameters for the worker: control-plane
//! connection, watched and archive directories, polling intervals, scheduler
//! job settings and persistence file locations.

use std::path::PathBuf;
use std::time::Duration;

/// Batch scheduler job settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Directory holding the stage scripts (`pipeline_stage_*.py`)
    pub scripts_dir: PathBuf,

    /// Where job-description files and scheduler stdout/stderr logs are written
    pub work_dir: PathBuf,

    pub partition: String,
    pub memory: String,
    pub cpus_per_task: u32,

    /// Conda environment activated before the stage script runs
    pub conda_env: Option<String>,

    /// Upper bound on every scheduler command
    pub timeout: Duration,

    /// Scheduler executables, overridable for testing
    pub submit_command: String,
    pub queue_command: String,
    pub accounting_command: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("."),
            work_dir: PathBuf::from("/tmp"),
            partition: "CPU".to_string(),
            memory: "50G".to_string(),
            cpus_per_task: 2,
            conda_env: None,
            timeout: Duration::from_secs(10),
            submit_command: "sbatch".to_string(),
            queue_command: "squeue".to_string(),
            accounting_command: "sacct".to_string(),
        }
    }
}

/// Upload stability check settings
#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// Consecutive samples that must repeat the previous non-zero size
    pub required_stable_reads: u32,
    pub sample_interval: Duration,
    pub max_wait: Duration,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            required_stable_reads: 3,
            sample_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifier reported to the control plane
    pub worker_id: String,

    /// Control plane base URL (e.g., "http://localhost:8000")
    pub control_plane_url: String,

    /// Directory watched for uploaded `.h5` volumes; also where step outputs land
    pub watch_dir: PathBuf,

    /// Staging area files are sorted into after the summary image exists
    pub archive_staging_dir: PathBuf,

    /// Final home of promoted image directories
    pub archive_database_dir: PathBuf,

    /// Sample preparation tree that receives a copy of each summary image
    pub sample_preparation_dir: PathBuf,

    pub job_store_path: PathBuf,
    pub ledger_path: PathBuf,

    /// How often the job monitor polls the scheduler
    pub job_check_interval: Duration,

    pub heartbeat_interval: Duration,

    /// How often the arrival watcher scans the watched directory
    pub watch_interval: Duration,

    /// Delay before restored jobs are re-validated
    pub recovery_delay: Duration,

    /// Bound on every control-plane call
    pub http_timeout: Duration,

    /// How long processed file names are remembered
    pub ledger_retention: chrono::Duration,

    /// Uploader tag sent with pipeline creation requests
    pub uploader: String,
    pub notification_emails: Vec<String>,

    pub scheduler: SchedulerConfig,
    pub stability: StabilityConfig,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(worker_id: String, control_plane_url: String) -> Self {
        Self {
            worker_id,
            control_plane_url,
            watch_dir: PathBuf::from("./data/transfer_temp"),
            archive_staging_dir: PathBuf::from("./data/Processed_Files_Archive"),
            archive_database_dir: PathBuf::from("./HNDB/PTRSB_DB/ImageArchive"),
            sample_preparation_dir: PathBuf::from("./HNDB/HNDB_files/SamplePreparation"),
            job_store_path: PathBuf::from("running_jobs.json"),
            ledger_path: PathBuf::from("processed_files.json"),
            job_check_interval: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            watch_interval: Duration::from_secs(5),
            recovery_delay: Duration::from_secs(3),
            http_timeout: Duration::from_secs(30),
            ledger_retention: chrono::Duration::days(30),
            uploader: "sluice".to_string(),
            notification_emails: Vec::new(),
            scheduler: SchedulerConfig::default(),
            stability: StabilityConfig::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - CONTROL_PLANE_URL (required)
    /// - WORKER_ID (optional, default: worker_<pid>)
    /// - WATCH_DIR, ARCHIVE_STAGING_DIR, ARCHIVE_DATABASE_DIR, SAMPLE_PREPARATION_DIR
    /// - JOB_STORE_PATH, LEDGER_PATH
    /// - JOB_CHECK_INTERVAL, HEARTBEAT_INTERVAL, WATCH_INTERVAL, RECOVERY_DELAY,
    ///   SCHEDULER_TIMEOUT, HTTP_TIMEOUT (optional, seconds)
    /// - LEDGER_RETENTION_DAYS (optional, default: 30)
    /// - UPLOADER, NOTIFICATION_EMAILS (comma separated)
    /// - STAGE_SCRIPTS_DIR, SCHEDULER_WORK_DIR, SLURM_PARTITION, SLURM_MEMORY,
    ///   SLURM_CPUS_PER_TASK, CONDA_ENV
    pub fn from_env() -> anyhow::Result<Self> {
        let control_plane_url = std::env::var("CONTROL_PLANE_URL")
            .map_err(|_| anyhow::anyhow!("CONTROL_PLANE_URL environment variable not set"))?;

        let worker_id = std::env::var("WORKER_ID").unwrap_or_else(|_| default_worker_id());

        let mut config = Self::new(worker_id, control_plane_url);

        if let Some(dir) = env_path("WATCH_DIR") {
            config.watch_dir = dir;
        }
        if let Some(dir) = env_path("ARCHIVE_STAGING_DIR") {
            config.archive_staging_dir = dir;
        }
        if let Some(dir) = env_path("ARCHIVE_DATABASE_DIR") {
            config.archive_database_dir = dir;
        }
        if let Some(dir) = env_path("SAMPLE_PREPARATION_DIR") {
            config.sample_preparation_dir = dir;
        }
        if let Some(path) = env_path("JOB_STORE_PATH") {
            config.job_store_path = path;
        }
        if let Some(path) = env_path("LEDGER_PATH") {
            config.ledger_path = path;
        }

        config.job_check_interval = env_secs("JOB_CHECK_INTERVAL", config.job_check_interval);
        config.heartbeat_interval = env_secs("HEARTBEAT_INTERVAL", config.heartbeat_interval);
        config.watch_interval = env_secs("WATCH_INTERVAL", config.watch_interval);
        config.recovery_delay = env_secs("RECOVERY_DELAY", config.recovery_delay);
        config.http_timeout = env_secs("HTTP_TIMEOUT", config.http_timeout);

        if let Some(days) = std::env::var("LEDGER_RETENTION_DAYS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
        {
            config.ledger_retention = chrono::Duration::days(days);
        }

        if let Ok(uploader) = std::env::var("UPLOADER") {
            config.uploader = uploader;
        }
        if let Ok(emails) = std::env::var("NOTIFICATION_EMAILS") {
            config.notification_emails = parse_list(&emails);
        }

        let scheduler = &mut config.scheduler;
        if let Some(dir) = env_path("STAGE_SCRIPTS_DIR") {
            scheduler.scripts_dir = dir;
        }
        if let Some(dir) = env_path("SCHEDULER_WORK_DIR") {
            scheduler.work_dir = dir;
        }
        if let Ok(partition) = std::env::var("SLURM_PARTITION") {
            scheduler.partition = partition;
        }
        if let Ok(memory) = std::env::var("SLURM_MEMORY") {
            scheduler.memory = memory;
        }
        if let Some(cpus) = std::env::var("SLURM_CPUS_PER_TASK")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            scheduler.cpus_per_task = cpus;
        }
        scheduler.conda_env = std::env::var("CONDA_ENV").ok().filter(|s| !s.is_empty());
        scheduler.timeout = env_secs("SCHEDULER_TIMEOUT", scheduler.timeout);

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_id.is_empty() {
            anyhow::bail!("worker_id cannot be empty");
        }

        if self.control_plane_url.is_empty() {
            anyhow::bail!("control_plane_url cannot be empty");
        }

        if !self.control_plane_url.starts_with("http://")
            && !self.control_plane_url.starts_with("https://")
        {
            anyhow::bail!("control_plane_url must start with http:// or https://");
        }

        if self.job_check_interval.is_zero() {
            anyhow::bail!("job_check_interval must be greater than 0");
        }

        if self.heartbeat_interval.is_zero() {
            anyhow::bail!("heartbeat_interval must be greater than 0");
        }

        if self.watch_interval.is_zero() {
            anyhow::bail!("watch_interval must be greater than 0");
        }

        if self.scheduler.timeout.is_zero() {
            anyhow::bail!("scheduler timeout must be greater than 0");
        }

        if self.stability.required_stable_reads == 0 {
            anyhow::bail!("required_stable_reads must be greater than 0");
        }

        if self.ledger_retention <= chrono::Duration::zero() {
            anyhow::bail!("ledger_retention must be positive");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(default_worker_id(), "http://localhost:8000".to_string())
    }
}

fn default_worker_id() -> String {
    format!("worker_{}", std::process::id())
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
