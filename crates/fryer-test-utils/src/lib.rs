//! Testing utilities for fryer workspace
//!
//! In-memory storage, a recording transform engine, and image fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use bytes::Bytes;
use fryer_engine::{TransformEngine, TransformError, TransformOp};
use fryer_storage::{Locality, StorageBackend, StorageError};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Storage backed by a map, with call counters and failure injection
#[derive(Debug)]
pub struct MemoryStorage {
    locality: Locality,
    objects: Mutex<HashMap<String, Bytes>>,
    failing: Mutex<HashSet<String>>,
    latency: Option<Duration>,
    downloads: AtomicUsize,
    uploads: AtomicUsize,
}

impl MemoryStorage {
    pub fn new(locality: Locality) -> Self {
        Self {
            locality,
            objects: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            latency: None,
            downloads: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
        }
    }

    pub fn with_object(self, key: &str, body: impl Into<Bytes>) -> Self {
        self.objects.lock().insert(key.to_string(), body.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every call touching `key` fail with a 503
    pub fn failing_on(self, key: &str) -> Self {
        self.failing.lock().insert(key.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().get(key).cloned()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    async fn enter(&self, key: &str) -> Result<(), StorageError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.lock().contains(key) {
            let source = object_store::Error::Generic {
                store: "memory",
                source: "503 Service Unavailable".into(),
            };
            return Err(StorageError::from_object_store(key, source));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn download(&self, key: &str) -> Result<Bytes, StorageError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.enter(key).await?;
        self.get(key).ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })
    }

    async fn upload(&self, key: &str, body: Bytes) -> Result<(), StorageError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.enter(key).await?;
        self.objects.lock().insert(key.to_string(), body);
        Ok(())
    }

    fn locality(&self) -> Locality {
        self.locality
    }
}

/// What `RecordingEngine` does with its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineScript {
    /// Append the effective quality byte to the input
    Tag,
    /// Return an empty buffer
    Empty,
    /// Fail every call
    Fail,
}

/// Engine that records every op it receives
#[derive(Debug)]
pub struct RecordingEngine {
    script: EngineScript,
    latency: Option<Duration>,
    ops: Mutex<Vec<TransformOp>>,
}

impl RecordingEngine {
    pub fn new(script: EngineScript) -> Self {
        Self {
            script,
            latency: None,
            ops: Mutex::new(Vec::new()),
        }
    }

    pub fn tagging() -> Self {
        Self::new(EngineScript::Tag)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn ops(&self) -> Vec<TransformOp> {
        self.ops.lock().clone()
    }

    pub fn qualities(&self) -> Vec<u8> {
        self.ops.lock().iter().map(TransformOp::effective_quality).collect()
    }
}

#[async_trait]
impl TransformEngine for RecordingEngine {
    async fn transform(&self, input: Bytes, op: TransformOp) -> Result<Bytes, TransformError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.ops.lock().push(op);
        match self.script {
            EngineScript::Tag => {
                let mut out = input.to_vec();
                out.push(op.effective_quality());
                Ok(Bytes::from(out))
            }
            EngineScript::Empty => Ok(Bytes::new()),
            EngineScript::Fail => Err(TransformError::InvalidParameters(
                "scripted failure".to_string(),
            )),
        }
    }
}

/// Encoded checkerboard JPEG
pub fn sample_jpeg(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_fn(width, height, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgb([230, 180, 60])
        } else {
            Rgb([40, 70, 160])
        }
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode_image(&img)
        .unwrap();
    Bytes::from(out)
}

/// Install a test-writer subscriber once per process
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
