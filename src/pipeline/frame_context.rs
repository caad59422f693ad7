// src/pipeline/frame_context.rs
//
// Everything the engine knows about one frame: the frame itself and the
// detector output, with each detection's role resolved once through the
// class map so no stage re-derives it.

use crate::config::ClassMap;
use crate::types::{Detection, DetectionRole, Frame};

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame: Frame,
    detections: Vec<Detection>,
    roles: Vec<DetectionRole>,
}

impl FrameContext {
    pub fn new(frame: Frame, detections: Vec<Detection>, classes: &ClassMap) -> Self {
        let roles = detections.iter().map(|d| classes.role_of(d.class_id)).collect();
        Self {
            frame,
            detections,
            roles,
        }
    }

    pub fn index(&self) -> u64 {
        self.frame.index
    }

    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Detections in detector order with their role.
    pub fn iter(&self) -> impl Iterator<Item = (&Detection, DetectionRole)> {
        self.detections.iter().zip(self.roles.iter().copied())
    }

    pub fn with_role(&self, role: DetectionRole) -> impl Iterator<Item = &Detection> {
        self.iter().filter(move |(_, r)| *r == role).map(|(d, _)| d)
    }

    pub fn has_role(&self, role: DetectionRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn count(&self, role: DetectionRole) -> usize {
        self.roles.iter().filter(|&&r| r == role).count()
    }
}
