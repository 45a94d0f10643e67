/// RenderPass trait - pluggable unit of draw-call logic

use crate::error::Result;
use crate::renderer::{CommandList, FrameContext};
use crate::scene::DrawableSet;

/// Draw statistics of one pass execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Draw calls recorded
    pub draw_calls: u32,
    /// Drawables ignored because their mesh or material was missing
    pub skipped: u32,
}

impl PassStats {
    pub fn accumulate(&mut self, other: PassStats) {
        self.draw_calls += other.draw_calls;
        self.skipped += other.skipped;
    }
}

/// Render pass registered with the frame orchestrator
///
/// `execute` runs once per frame, in registration order, inside the frame's
/// render pass instance. It reads the drawable set and records draw calls.
pub trait RenderPass: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    fn execute(
        &mut self,
        cmd: &mut dyn CommandList,
        ctx: &FrameContext,
        drawables: &DrawableSet,
    ) -> Result<PassStats>;
}
