//! Resize requests

use std::path::PathBuf;
use std::sync::atomic::{AtomicI8, Ordering};

use tessera_render::OutputFormat;

/// Resize strategy, numbered as scripts pass it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeOp {
    /// Meter strip: a whole number of equal frames
    Strip = 1,
    /// Exact size, aspect ratio ignored
    Scale = 2,
    /// Scale to cover, then crop around the center
    CoverCrop = 3,
}

impl ResizeOp {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ResizeOp::Strip),
            2 => Some(ResizeOp::Scale),
            3 => Some(ResizeOp::CoverCrop),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Progress of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeStatus {
    Pending,
    Complete,
    Error,
}

impl ResizeStatus {
    /// `0` pending, `1` complete, `-1` error
    pub fn code(self) -> i32 {
        self.as_i8() as i32
    }

    fn as_i8(self) -> i8 {
        match self {
            ResizeStatus::Pending => 0,
            ResizeStatus::Complete => 1,
            ResizeStatus::Error => -1,
        }
    }

    fn from_i8(v: i8) -> Self {
        match v {
            0 => ResizeStatus::Pending,
            1 => ResizeStatus::Complete,
            _ => ResizeStatus::Error,
        }
    }
}

/// What to resize, where to, and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeParams {
    pub src: PathBuf,
    pub dest: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Frame count for [`ResizeOp::Strip`]
    pub sequence: u32,
    pub op: ResizeOp,
    pub format: OutputFormat,
}

impl ResizeParams {
    /// Requests are identified by source, destination and size only
    pub fn same_target(&self, other: &ResizeParams) -> bool {
        self.width == other.width && self.height == other.height && self.src == other.src && self.dest == other.dest
    }
}

/// A submitted request; parameters are fixed, the status is updated by the
/// worker and read by the submitter without locking
#[derive(Debug)]
pub struct ResizeRequest {
    params: ResizeParams,
    status: AtomicI8,
}

impl ResizeRequest {
    pub fn new(params: ResizeParams) -> Self {
        Self {
            params,
            status: AtomicI8::new(ResizeStatus::Pending.as_i8()),
        }
    }

    pub fn params(&self) -> &ResizeParams {
        &self.params
    }

    pub fn status(&self) -> ResizeStatus {
        ResizeStatus::from_i8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: ResizeStatus) {
        self.status.store(status.as_i8(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(src: &str, w: u32) -> ResizeParams {
        ResizeParams {
            src: src.into(),
            dest: "out.png".into(),
            width: w,
            height: 10,
            sequence: 1,
            op: ResizeOp::Scale,
            format: OutputFormat::Png,
        }
    }

    #[test]
    fn test_op_codes() {
        assert_eq!(ResizeOp::from_code(1), Some(ResizeOp::Strip));
        assert_eq!(ResizeOp::from_code(3), Some(ResizeOp::CoverCrop));
        assert_eq!(ResizeOp::from_code(0), None);
        assert_eq!(ResizeOp::from_code(4), None);
        assert_eq!(ResizeOp::CoverCrop.code(), 3);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ResizeStatus::Pending.code(), 0);
        assert_eq!(ResizeStatus::Complete.code(), 1);
        assert_eq!(ResizeStatus::Error.code(), -1);
    }

    #[test]
    fn test_same_target_ignores_op_and_sequence() {
        let a = params("a.png", 10);
        let mut b = params("a.png", 10);
        b.op = ResizeOp::Strip;
        b.sequence = 7;
        assert!(a.same_target(&b));
        assert!(!a.same_target(&params("a.png", 11)));
        assert!(!a.same_target(&params("b.png", 10)));
    }

    #[test]
    fn test_status_updates() {
        let req = ResizeRequest::new(params("a.png", 1));
        assert_eq!(req.status(), ResizeStatus::Pending);
        req.set_status(ResizeStatus::Error);
        assert_eq!(req.status(), ResizeStatus::Error);
    }
}
