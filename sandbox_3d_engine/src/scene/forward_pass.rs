/// ForwardPass - one draw per complete drawable.
///
/// For each drawable: bind its material, hand it `proj * view * model`, draw
/// its mesh. Drawables with a missing mesh or material are counted as
/// skipped and the frame goes on.

use crate::error::Result;
use crate::renderer::{CommandList, FrameContext, PassStats, RenderPass};
use super::drawable::DrawableSet;

const SOURCE: &str = "sandbox3d::forward";

pub struct ForwardPass {
    name: String,
    last_stats: PassStats,
}

impl Default for ForwardPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardPass {
    pub fn new() -> Self {
        Self { name: "Forward Pass".to_string(), last_stats: PassStats::default() }
    }

    /// Statistics of the most recent execution
    pub fn last_stats(&self) -> PassStats {
        self.last_stats
    }
}

impl RenderPass for ForwardPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &mut self,
        cmd: &mut dyn CommandList,
        ctx: &FrameContext,
        drawables: &DrawableSet,
    ) -> Result<PassStats> {
        let view_projection = ctx.view_projection();
        let mut stats = PassStats::default();

        for drawable in drawables {
            let (Some(mesh), Some(material)) = (&drawable.mesh, &drawable.material) else {
                stats.skipped += 1;
                continue;
            };

            material.bind(cmd)?;
            material.set_transform(cmd, &(view_projection * drawable.transform))?;
            mesh.draw(cmd)?;
            stats.draw_calls += 1;
        }

        if stats.skipped > 0 && self.last_stats.skipped != stats.skipped {
            crate::engine_debug!(
                SOURCE,
                "Skipped {} drawable(s) without mesh or material",
                stats.skipped
            );
        }
        self.last_stats = stats;
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "forward_pass_tests.rs"]
mod tests;
