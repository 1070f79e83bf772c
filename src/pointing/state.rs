use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::sync::Mutex;
use thiserror::Error;

/// Azimuth/elevation pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AzEl {
    pub az: f64,
    pub el: f64,
}

impl AzEl {
    pub const ZERO: AzEl = AzEl { az: 0.0, el: 0.0 };

    pub fn new(az: f64, el: f64) -> Self {
        Self { az, el }
    }

    /// True when both axes are within `tolerance_deg` of `other`.
    pub fn within(&self, other: AzEl, tolerance_deg: f64) -> bool {
        (self.az - other.az).abs() <= tolerance_deg && (self.el - other.el).abs() <= tolerance_deg
    }

    pub fn pair(&self) -> (f64, f64) {
        (self.az, self.el)
    }
}

impl Add for AzEl {
    type Output = AzEl;

    fn add(self, rhs: AzEl) -> AzEl {
        AzEl::new(self.az + rhs.az, self.el + rhs.el)
    }
}

impl fmt::Display for AzEl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.az, self.el)
    }
}

/// Configured azimuth/elevation travel limits.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub az: (f64, f64),
    pub el: (f64, f64),
}

impl Bounds {
    pub fn contains(&self, p: AzEl) -> bool {
        p.az >= self.az.0 && p.az <= self.az.1 && p.el >= self.el.0 && p.el <= self.el.1
    }
}

#[derive(Debug, Error)]
pub enum PointingError {
    #[error("commanded position {commanded} outside travel bounds")]
    OutOfBounds { commanded: AzEl },
}

/// Full pointing model as seen by any one reader.
#[derive(Debug, Clone)]
pub struct Pointing {
    /// Last position read back from the motor driver.
    pub observed: AzEl,
    /// Base target before offset.
    pub destination: AzEl,
    /// Additive fine adjustment.
    pub offset: AzEl,
    /// `destination + offset`; the value the reconciliation loop drives toward.
    pub commanded: AzEl,
    /// Set iff an ephemeris-tracked object is being followed.
    pub tracked_object: Option<String>,
}

/// Shared pointing state behind a single lock.
///
/// All writers go through compound updates that recompute `commanded` and
/// enforce the travel bounds before committing, so no reader can ever see a
/// destination without its matching commanded position. A rejected update
/// commits nothing except clearing `tracked_object`.
pub struct PointingStore {
    inner: Mutex<Pointing>,
    bounds: Bounds,
}

impl PointingStore {
    pub fn new(initial: AzEl, bounds: Bounds) -> Self {
        Self {
            inner: Mutex::new(Pointing {
                observed: initial,
                destination: initial,
                offset: AzEl::ZERO,
                commanded: initial,
                tracked_object: None,
            }),
            bounds,
        }
    }

    pub fn snapshot(&self) -> Pointing {
        self.inner.lock().unwrap().clone()
    }

    pub fn observed(&self) -> AzEl {
        self.inner.lock().unwrap().observed
    }

    pub fn commanded(&self) -> AzEl {
        self.inner.lock().unwrap().commanded
    }

    pub fn tracked_object(&self) -> Option<String> {
        self.inner.lock().unwrap().tracked_object.clone()
    }

    /// Position write-back from the rotor reconciliation loop.
    pub fn record_observed(&self, position: AzEl) {
        self.inner.lock().unwrap().observed = position;
    }

    /// True when the mount has arrived at the current commanded position.
    pub fn arrived(&self, tolerance_deg: f64) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.observed.within(inner.commanded, tolerance_deg)
    }

    /// Points at a literal destination: offset zeroed, tracking cleared.
    pub fn set_destination(&self, destination: AzEl) -> Result<(), PointingError> {
        self.commit(destination, AzEl::ZERO, Track::Clear)
    }

    /// Starts following a named object: offset zeroed, tracking set.
    pub fn set_tracked_object(&self, id: &str, destination: AzEl) -> Result<(), PointingError> {
        self.commit(destination, AzEl::ZERO, Track::Object(id.to_string()))
    }

    /// Fine adjustment relative to the current destination; destination and
    /// tracking are untouched.
    pub fn set_offset(&self, offset: AzEl) -> Result<(), PointingError> {
        let destination = self.inner.lock().unwrap().destination;
        self.commit(destination, offset, Track::Keep)
    }

    /// One scan/beam-switch leg: destination refresh and offset committed
    /// together so the reconciliation loop never chases a half-updated pair.
    pub fn set_scan_cell(&self, destination: AzEl, offset: AzEl) -> Result<(), PointingError> {
        self.commit(destination, offset, Track::Keep)
    }

    /// Restores a zero offset after a scan, keeping destination and tracking.
    pub fn zero_offset(&self) -> Result<(), PointingError> {
        let destination = self.inner.lock().unwrap().destination;
        self.commit(destination, AzEl::ZERO, Track::Keep)
    }

    /// Ephemeris refresh for the tracked object. Both the raw destination and
    /// destination-plus-current-offset must independently pass bounds, or the
    /// update is rejected and tracking cleared.
    pub fn refresh_destination(&self, destination: AzEl) -> Result<(), PointingError> {
        let mut inner = self.inner.lock().unwrap();
        let commanded = destination + inner.offset;
        if !self.bounds.contains(destination) || !self.bounds.contains(commanded) {
            inner.tracked_object = None;
            return Err(PointingError::OutOfBounds { commanded });
        }
        inner.destination = destination;
        inner.commanded = commanded;
        Ok(())
    }

    pub fn clear_tracking(&self) {
        self.inner.lock().unwrap().tracked_object = None;
    }

    fn commit(&self, destination: AzEl, offset: AzEl, track: Track) -> Result<(), PointingError> {
        let commanded = destination + offset;
        let mut inner = self.inner.lock().unwrap();
        if !self.bounds.contains(commanded) {
            inner.tracked_object = None;
            return Err(PointingError::OutOfBounds { commanded });
        }
        inner.destination = destination;
        inner.offset = offset;
        inner.commanded = commanded;
        match track {
            Track::Keep => {}
            Track::Clear => inner.tracked_object = None,
            Track::Object(id) => inner.tracked_object = Some(id),
        }
        Ok(())
    }
}

enum Track {
    Keep,
    Clear,
    Object(String),
}
