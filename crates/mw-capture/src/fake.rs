//! Scripted camera for tests. Stills are a fixed two-colour frame and
//! recordings are container headers whose duration is the time the recorder
//! ran for.

use crate::codec::{container_mime, VIDEO_MIME_PREFERENCES};
use crate::hardware::{CaptureHardware, Frame, MediaStream, Recorder, StreamConstraints};
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use mw_core::probe::fixtures;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Default)]
struct Log {
    open: usize,
    opened_total: usize,
    recordings: usize,
    last_constraints: Option<StreamConstraints>,
    last_recording_mime: Option<String>,
}

pub struct FakeHardware {
    pub deny: bool,
    pub torch: bool,
    pub supported: Vec<&'static str>,
    pub(crate) log: Arc<Mutex<Log>>,
}

impl Default for FakeHardware {
    fn default() -> Self {
        Self {
            deny: false,
            torch: false,
            supported: VIDEO_MIME_PREFERENCES.to_vec(),
            log: Arc::default(),
        }
    }
}

impl FakeHardware {
    /// A camera whose recorder only reports the given MIME types.
    pub fn with_codecs(supported: Vec<&'static str>) -> Self {
        Self {
            supported,
            ..Self::default()
        }
    }

    pub fn open_streams(&self) -> usize {
        self.log.lock().unwrap().open
    }

    pub fn opened_total(&self) -> usize {
        self.log.lock().unwrap().opened_total
    }

    pub fn recordings_started(&self) -> usize {
        self.log.lock().unwrap().recordings
    }

    pub fn last_constraints(&self) -> Option<StreamConstraints> {
        self.log.lock().unwrap().last_constraints.clone()
    }

    pub fn last_recording_mime(&self) -> Option<String> {
        self.log.lock().unwrap().last_recording_mime.clone()
    }
}

#[async_trait]
impl CaptureHardware for FakeHardware {
    async fn open_stream(&self, constraints: &StreamConstraints) -> anyhow::Result<Box<dyn MediaStream>> {
        if self.deny {
            bail!("NotAllowedError: permission denied");
        }
        let mut log = self.log.lock().unwrap();
        log.open += 1;
        log.opened_total += 1;
        log.last_constraints = Some(constraints.clone());
        Ok(Box::new(FakeStream {
            torch: self.torch,
            supported: self.supported.clone(),
            stopped: false,
            log: self.log.clone(),
        }))
    }
}

struct FakeStream {
    torch: bool,
    supported: Vec<&'static str>,
    stopped: bool,
    log: Arc<Mutex<Log>>,
}

impl MediaStream for FakeStream {
    /// 32x16, left half red and right half blue.
    fn grab_frame(&mut self) -> anyhow::Result<Frame> {
        let (width, height) = (32u32, 16u32);
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..height {
            for x in 0..width {
                let px: [u8; 4] = if x < width / 2 { [220, 20, 20, 255] } else { [20, 20, 220, 255] };
                rgba.extend_from_slice(&px);
            }
        }
        Ok(Frame { width, height, rgba })
    }

    fn supports_torch(&self) -> bool {
        self.torch
    }

    fn set_torch(&mut self, _on: bool) -> anyhow::Result<()> {
        if !self.torch {
            return Err(anyhow!("torch not supported"));
        }
        Ok(())
    }

    fn supports_mime(&self, mime_type: &str) -> bool {
        self.supported.contains(&mime_type)
    }

    fn start_recording(&mut self, mime_type: &str) -> anyhow::Result<Box<dyn Recorder>> {
        let mut log = self.log.lock().unwrap();
        log.recordings += 1;
        log.last_recording_mime = Some(mime_type.to_string());
        Ok(Box::new(FakeRecorder {
            container: container_mime(mime_type).to_string(),
            started: Instant::now(),
        }))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.log.lock().unwrap().open -= 1;
        }
    }
}

struct FakeRecorder {
    container: String,
    started: Instant,
}

impl Recorder for FakeRecorder {
    /// The clip comes back in two chunks, split mid-header.
    fn finish(self: Box<Self>) -> anyhow::Result<Vec<Bytes>> {
        let millis = u32::try_from(self.started.elapsed().as_millis())?;
        let clip = match self.container.as_str() {
            "video/mp4" => fixtures::mp4(1000, millis),
            _ => fixtures::webm(Some(millis as f64)),
        };
        let mut first = Bytes::from(clip);
        let second = first.split_off(first.len() / 2);
        Ok(vec![first, second])
    }
}
