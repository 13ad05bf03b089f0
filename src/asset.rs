// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! Asset module decodes sprite images off the render thread.
//!
//! `request` starts a worker that reads and decodes one image to RGBA8; the
//! result comes back as a one-shot [`LoadEvent`] on a channel. The render
//! thread drains finished events with `poll` at tick boundaries and does the
//! GPU upload itself, so no GPU object ever crosses threads.

use crate::render::ImageData;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("decode {path}: {source}")]
    Decode {
        path: String,
        source: image::ImageError,
    },
}

/// Completion signal for one requested image.
#[derive(Debug)]
pub struct LoadEvent {
    pub id: String,
    pub result: Result<ImageData, AssetError>,
}

pub fn decode_bytes(bytes: &[u8], path: &str) -> Result<ImageData, AssetError> {
    let img = image::load_from_memory(bytes)
        .map_err(|source| AssetError::Decode {
            path: path.to_string(),
            source,
        })?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok(ImageData {
        width,
        height,
        pixels: img.into_raw(),
    })
}

pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<ImageData, AssetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode_bytes(&bytes, &path.display().to_string())
}

pub struct AssetLoader {
    tx: Sender<LoadEvent>,
    rx: Receiver<LoadEvent>,
    pending: usize,
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx, pending: 0 }
    }

    /// Starts decoding `path`, the event carries `id` back.
    pub fn request<P: Into<PathBuf>>(&mut self, id: &str, path: P) {
        let path = path.into();
        let id = id.to_string();
        let tx = self.tx.clone();
        info!("asset load:{:?}", path);
        self.pending += 1;
        thread::spawn(move || {
            let result = decode_file(&path);
            // receiver gone means the loader was dropped, nothing to report to
            let _ = tx.send(LoadEvent { id, result });
        });
    }

    /// Finished loads, never blocks.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let events: Vec<LoadEvent> = self.rx.try_iter().collect();
        self.pending = self.pending.saturating_sub(events.len());
        if !events.is_empty() {
            debug!("{} asset(s) finished, {} pending", events.len(), self.pending);
        }
        events
    }

    /// Blocks until every requested load has finished.
    pub fn wait_all(&mut self) -> Vec<LoadEvent> {
        let mut events = vec![];
        while self.pending > 0 {
            match self.rx.recv() {
                Ok(ev) => {
                    self.pending -= 1;
                    events.push(ev);
                }
                Err(_) => break,
            }
        }
        events
    }

    pub fn pending(&self) -> usize {
        self.pending
    }
}
