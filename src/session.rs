use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::combinations::{enumerate, Combination};
use crate::device::{CodeCapture, DeviceError};
use crate::profile::SmartIrDoc;
use crate::skip::{SkipDecision, SkipPolicy};
use crate::tree::{CommandTree, TreeError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no IR signal learnt for the OFF command within timeout")]
    OffTimeout,
    #[error("no IR signal learnt within timeout for\n{combination}")]
    CaptureTimeout { combination: String },
    #[error("interrupted, partial progress checkpointed")]
    Cancelled,
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("failed to serialize output document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("console i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Operator-facing terminal. Every prompt after the very first one blocks on
/// a newline so the operator can get the remote ready before the transceiver
/// starts listening.
pub struct Console {
    reader: BufReader<Box<dyn Read>>,
    writer: Box<dyn Write>,
    gate_armed: bool,
}

impl Console {
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdin()), Box::new(io::stdout()))
    }

    pub fn new(reader: Box<dyn Read>, writer: Box<dyn Write>) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            gate_armed: false,
        }
    }

    fn prompt(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.writer, "{msg}")?;
        if self.gate_armed {
            writeln!(self.writer, "-->> press enter when ready <<--")?;
            self.writer.flush()?;
            let mut line = String::new();
            self.reader.read_line(&mut line)?;
        }
        self.gate_armed = true;
        Ok(())
    }

    fn say(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.writer, "{msg}")
    }
}

/// The learning session: walks every combination of the profile, captures or
/// reuses codes, checkpoints at axis boundaries and produces the final merged
/// SmartIR file.
///
/// Cancellation arrives through the shared flag (the binary wires SIGINT and
/// SIGTERM to it); the loop reacts at the next combination by writing a last
/// checkpoint and bailing out with [`SessionError::Cancelled`].
pub struct Session {
    doc: SmartIrDoc,
    tree: CommandTree,
    policy: SkipPolicy,
    capture: CodeCapture,
    store: CheckpointStore,
    console: Console,
    cancel: Arc<AtomicBool>,
    // swing-skip reuse cache, keyed by (temperature, fan mode)
    swing_cache: HashMap<(String, Option<String>), String>,
}

impl Session {
    pub fn new(
        doc: SmartIrDoc,
        policy: SkipPolicy,
        capture: CodeCapture,
        mut store: CheckpointStore,
        console: Console,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, SessionError> {
        let mut tree = CommandTree::new(doc.commands_template(), &doc.profile)?;
        if let Some((snapshot, seq)) = store.load_latest()? {
            info!("restored checkpoint {:03}, resuming the session", seq);
            tree.merge(snapshot);
        }
        Ok(Self {
            doc,
            tree,
            policy,
            capture,
            store,
            console,
            cancel,
            swing_cache: HashMap::new(),
        })
    }

    /// Runs the whole session: OFF code, full walk, final output file.
    pub fn run(&mut self) -> Result<PathBuf, SessionError> {
        self.learn_off()?;
        self.learn_all()?;
        self.save_final()
    }

    /// The OFF code sits outside the combination walk and is mandatory: a
    /// timeout here aborts the session before it starts.
    pub fn learn_off(&mut self) -> Result<(), SessionError> {
        self.console.prompt(
            "First of all, let's learn the OFF command:\n\
             turn ON the remote and then turn it OFF when 'Listening...' is on screen, \
             or interrupt with ctrl-c...",
        )?;
        match self.capture.capture_one()? {
            Some(code) => {
                self.tree.set_off(&code);
                Ok(())
            }
            None => Err(SessionError::OffTimeout),
        }
    }

    /// Walks the enumerated combinations in order, capturing or reusing each
    /// code. Leaves already populated (from a restored checkpoint) are skipped
    /// silently.
    pub fn learn_all(&mut self) -> Result<(), SessionError> {
        let combinations: Vec<Combination> = enumerate(&self.doc.profile).collect();
        let mut previous_group: Option<(String, Option<String>, Option<String>)> = None;

        for comb in combinations {
            if self.cancel.load(Ordering::SeqCst) {
                self.store.save(&self.tree.without_off())?;
                return Err(SessionError::Cancelled);
            }

            let path = comb.key_path();
            if !self.tree.get(&path)?.is_empty() {
                continue;
            }

            let decision = self.policy.decide(&comb);
            let cache_key = (
                comb.temperature().to_string(),
                comb.fan().map(str::to_string),
            );
            match decision {
                SkipDecision::ReuseTemperature
                    if comb.temperature() > self.doc.profile.min_temperature =>
                {
                    // the code at this mode's minimum temperature is already
                    // in the tree, captured earlier or restored
                    let mut min_path = path.clone();
                    if let Some(last) = min_path.last_mut() {
                        *last = self.doc.profile.min_temperature.to_string();
                    }
                    let code = self.tree.get(&min_path)?.to_string();
                    if !code.is_empty() {
                        self.tree.set(&path, &code)?;
                        continue;
                    }
                }
                SkipDecision::ReuseSwing => {
                    if let Some(code) = self.swing_cache.get(&cache_key).cloned() {
                        self.tree.set(&path, &code)?;
                        continue;
                    }
                    // first swing position at this (temperature, fan mode) is
                    // still captured for real, seeding the cache below
                }
                _ => {}
            }

            let group = comb.group();
            if let Some(previous) = &previous_group {
                if *previous != group {
                    self.store.save(&self.tree.without_off())?;
                }
            }
            previous_group = Some(group);

            self.console.prompt(&format!(
                "{}\nLet's learn the IR command of\n{}\n\
                 Prepare the remote so the transceiver can listen to the above combination \
                 when 'Listening...' is on screen, or interrupt with ctrl-c...",
                "-".repeat(30),
                comb
            ))?;
            match self.capture.capture_one()? {
                None => {
                    self.store.save(&self.tree.without_off())?;
                    return Err(SessionError::CaptureTimeout {
                        combination: comb.to_string(),
                    });
                }
                Some(code) => {
                    if decision == SkipDecision::ReuseSwing {
                        self.swing_cache.insert(cache_key, code.clone());
                    }
                    self.tree.set(&path, &code)?;
                }
            }
        }

        self.console.say("All combinations learnt.")?;
        Ok(())
    }

    /// Writes the timestamped output file with the fully populated command
    /// tree merged back into the template, then drops all checkpoints.
    pub fn save_final(&mut self) -> Result<PathBuf, SessionError> {
        let now = chrono::Local::now();
        let path = self.doc.dir().join(format!(
            "{}_{}.json",
            self.doc.stem(),
            now.format("%Y%m%d_%H%M%S")
        ));
        let merged = self.doc.with_commands(self.tree.to_value());
        fs::write(&path, serde_json::to_string_pretty(&merged)?)?;
        self.console
            .say(&format!("Created new file {}", path.display()))?;
        self.store.purge()?;
        Ok(path)
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }
}
