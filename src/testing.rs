//! In-process backends that record every call, for driving sessions in tests.

use crate::clip::ClipHandle;
use crate::session::backend::{CaptureBackend, Permission, PlaybackBackend};
use anyhow::Result;
use async_trait::async_trait;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared, ordered record of backend calls.
#[derive(Debug, Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Hands out `clip-1`, `clip-2`, ... on each finalize.
pub struct FakeCapture {
    log: Log,
    finalized: u32,
    pub deny_permission: bool,
    pub fail_open: bool,
    pub fail_finalize: bool,
}

impl FakeCapture {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            finalized: 0,
            deny_permission: false,
            fail_open: false,
            fail_finalize: false,
        }
    }
}

#[async_trait(?Send)]
impl CaptureBackend for FakeCapture {
    type Stream = ();

    async fn request_permission(&mut self) -> Permission {
        self.log.push("permission");
        if self.deny_permission {
            Permission::Denied
        } else {
            Permission::Granted
        }
    }

    async fn configure_for_recording(&mut self) -> Result<()> {
        self.log.push("configure");
        Ok(())
    }

    async fn open(&mut self) -> Result<()> {
        self.log.push("open");
        if self.fail_open {
            anyhow::bail!("no input device");
        }
        Ok(())
    }

    async fn finalize(&mut self, _stream: ()) -> Result<ClipHandle> {
        if self.fail_finalize {
            self.log.push("finalize failed");
            anyhow::bail!("encoder crashed");
        }
        self.finalized += 1;
        let handle = ClipHandle::new(format!("clip-{}", self.finalized));
        self.log.push(format!("finalize {}", handle));
        Ok(handle)
    }
}

pub struct FakeSound(ClipHandle);

pub struct FakePlayback {
    log: Log,
    live: usize,
    finished: bool,
    pub missing: Vec<ClipHandle>,
    pub fail_play: bool,
}

impl FakePlayback {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            live: 0,
            finished: false,
            missing: Vec::new(),
            fail_play: false,
        }
    }

    /// Resources loaded and not yet unloaded.
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn finish_all(&mut self) {
        self.finished = true;
    }
}

#[async_trait(?Send)]
impl PlaybackBackend for FakePlayback {
    type Resource = FakeSound;

    async fn load(&mut self, handle: &ClipHandle) -> Result<FakeSound> {
        self.log.push(format!("load {}", handle));
        if self.missing.contains(handle) {
            anyhow::bail!("no such file: {}", handle);
        }
        assert_eq!(self.live, 0, "a second resource was loaded while one is held");
        self.live += 1;
        self.finished = false;
        Ok(FakeSound(handle.clone()))
    }

    async fn play(&mut self, resource: &mut FakeSound) -> Result<()> {
        self.log.push(format!("play {}", resource.0));
        if self.fail_play {
            anyhow::bail!("output device busy");
        }
        Ok(())
    }

    async fn stop(&mut self, resource: &mut FakeSound) {
        self.log.push(format!("stop {}", resource.0));
    }

    async fn unload(&mut self, resource: FakeSound) {
        self.log.push(format!("unload {}", resource.0));
        self.live -= 1;
    }

    fn is_finished(&self, _resource: &FakeSound) -> bool {
        self.finished
    }
}
