//! Append-only sinks for the environment's step log and episode reward log.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Destination for the textual environment logs
pub trait StepSink: Send {
    /// Append the rendered state after step `iteration`
    fn record_step(&mut self, iteration: u64, rendered: &str) -> io::Result<()>;

    /// Append the mean total reward of a finished episode
    fn record_episode_reward(&mut self, mean_reward: f32) -> io::Result<()>;
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StepSink for NullSink {
    fn record_step(&mut self, _iteration: u64, _rendered: &str) -> io::Result<()> {
        Ok(())
    }

    fn record_episode_reward(&mut self, _mean_reward: f32) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryLog {
    steps: String,
    rewards: String,
}

/// Keeps log text in memory; clones share the same buffers
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written to the step log so far
    pub fn steps(&self) -> String {
        self.with_log(|log| log.steps.clone())
    }

    /// Everything written to the reward log so far
    pub fn rewards(&self) -> String {
        self.with_log(|log| log.rewards.clone())
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut MemoryLog) -> T) -> T {
        let mut log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut log)
    }
}

impl StepSink for MemorySink {
    fn record_step(&mut self, iteration: u64, rendered: &str) -> io::Result<()> {
        self.with_log(|log| write_step(&mut log.steps, iteration, rendered));
        Ok(())
    }

    fn record_episode_reward(&mut self, mean_reward: f32) -> io::Result<()> {
        self.with_log(|log| log.rewards.push_str(&format_reward(mean_reward)));
        Ok(())
    }
}

/// Appends to a pair of files, flushing after every record
pub struct FileSink {
    steps: BufWriter<File>,
    rewards: BufWriter<File>,
}

impl FileSink {
    /// Open (or create) both logs in append mode
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(step_log: P, reward_log: Q) -> io::Result<Self> {
        Ok(Self {
            steps: BufWriter::new(open_append(step_log.as_ref())?),
            rewards: BufWriter::new(open_append(reward_log.as_ref())?),
        })
    }
}

impl StepSink for FileSink {
    fn record_step(&mut self, iteration: u64, rendered: &str) -> io::Result<()> {
        let mut block = String::with_capacity(rendered.len() + 32);
        write_step(&mut block, iteration, rendered);
        self.steps.write_all(block.as_bytes())?;
        self.steps.flush()
    }

    fn record_episode_reward(&mut self, mean_reward: f32) -> io::Result<()> {
        self.rewards.write_all(format_reward(mean_reward).as_bytes())?;
        self.rewards.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn write_step(out: &mut String, iteration: u64, rendered: &str) {
    out.push_str(&format!("Iteration {}:\n", iteration));
    out.push_str(rendered);
    out.push_str(",\n");
}

fn format_reward(mean_reward: f32) -> String {
    format!("{:.10}\n", mean_reward)
}
