// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! File watcher for hot-reloading the score.
//!
//! The score file's parent directory is watched (editors often replace the
//! file rather than write it in place) and events for other files are
//! ignored. Bursts of modifications are collapsed into one reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

/// Events emitted by the score watcher
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreEvent {
    /// The score changed; `source` is its new contents
    Modified { path: PathBuf, source: String },
    /// The score file was removed
    Removed(PathBuf),
    /// The score changed but could not be read
    Error(String),
}

/// Watches one score file
pub struct ScoreWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<ScoreEvent>,
    watched_path: PathBuf,
}

impl ScoreWatcher {
    /// Watch `path` for changes, waiting `debounce` after the last
    /// modification before reading it
    pub fn new<P: AsRef<Path>>(path: P, debounce: Duration) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let file_name = watched_path
            .file_name()
            .ok_or_else(|| anyhow!("Not a file path: {:?}", watched_path))?
            .to_os_string();
        let directory = match watched_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx): (Sender<ScoreEvent>, Receiver<ScoreEvent>) = mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch path {:?}: {}", directory, e))?;
        debug!(path = ?watched_path, "watching score");

        let score_path = watched_path.clone();
        std::thread::spawn(move || {
            let mut last_event_time: Option<Instant> = None;

            loop {
                match notify_rx.recv_timeout(Duration::from_millis(20)) {
                    Ok(event) => {
                        let ours = event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()));
                        if !ours {
                            continue;
                        }
                        match event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) => {
                                last_event_time = Some(Instant::now());
                            }
                            EventKind::Remove(_) => {
                                // A rename-over-write shows up as remove then create
                                if !score_path.exists() {
                                    last_event_time = None;
                                    if event_tx.send(ScoreEvent::Removed(score_path.clone())).is_err() {
                                        break;
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }

                // Check if debounce period has passed
                if let Some(last_time) = last_event_time {
                    if last_time.elapsed() >= debounce {
                        last_event_time = None;
                        let event = match fs::read_to_string(&score_path) {
                            Ok(source) => ScoreEvent::Modified {
                                path: score_path.clone(),
                                source,
                            },
                            Err(e) => {
                                ScoreEvent::Error(format!("Failed to read {:?}: {}", score_path, e))
                            }
                        };
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Try to receive the next event (non-blocking)
    pub fn try_recv(&self) -> Option<ScoreEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending events
    pub fn recv_all(&self) -> Vec<ScoreEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ScoreEvent> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Get the path being watched
    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}
