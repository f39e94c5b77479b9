//! Bounded save/restore stack that makes meta state changes invisible to
//! the caller.

mod axes;
mod mask;

pub use mask::SaveMask;

use tracing::debug;

use crate::context::{OcclusionQuery, QueryState, RenderContext, TransformFeedbackState};

use axes::{Saved, AXES};

/// Maximum nesting of save regions.
pub const MAX_SAVE_DEPTH: usize = 8;

/// One save region: the mask it was opened with and the previous value of
/// every axis in that mask, in table order.
#[derive(Debug)]
pub struct SavedStateFrame {
    mask: SaveMask,
    values: Vec<Saved>,
    paused_transform_feedback: bool,
    suspended_query: Option<OcclusionQuery>,
}

impl SavedStateFrame {
    pub fn mask(&self) -> SaveMask {
        self.mask
    }
}

#[derive(Debug, Default)]
pub struct SaveStack {
    frames: Vec<SavedStateFrame>,
    begins: u64,
    ends: u64,
    max_depth: usize,
}

impl SaveStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&SavedStateFrame> {
        self.frames.last()
    }

    pub fn begins(&self) -> u64 {
        self.begins
    }

    pub fn ends(&self) -> u64 {
        self.ends
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Open a save region: capture every axis in `mask` and force it to its
    /// neutral value.
    ///
    /// # Panics
    ///
    /// Panics if [`MAX_SAVE_DEPTH`] regions are already open.
    pub fn begin(&mut self, ctx: &mut RenderContext, mask: SaveMask) {
        assert!(
            self.frames.len() < MAX_SAVE_DEPTH,
            "meta save stack overflow (depth {MAX_SAVE_DEPTH})"
        );

        let mut frame = SavedStateFrame {
            mask,
            values: Vec::with_capacity(mask.bits().count_ones() as usize),
            paused_transform_feedback: false,
            suspended_query: None,
        };

        // Meta draws must not be captured or counted.
        let tfb = ctx.transform_feedback;
        if tfb.active && !tfb.paused {
            ctx.set_transform_feedback(TransformFeedbackState {
                paused: true,
                ..tfb
            });
            frame.paused_transform_feedback = true;
        }
        if let Some(query) = ctx.query.occlusion {
            ctx.set_query(QueryState { occlusion: None });
            frame.suspended_query = Some(query);
        }

        for axis in AXES.iter().filter(|axis| mask.contains(axis.bit)) {
            frame.values.push((axis.capture)(ctx));
            (axis.apply_default)(ctx);
        }

        self.frames.push(frame);
        self.begins += 1;
        self.max_depth = self.max_depth.max(self.frames.len());
        debug!(depth = self.frames.len(), mask = ?mask, "meta begin");
    }

    /// Close the innermost save region, restoring exactly the axes it
    /// captured.
    ///
    /// # Panics
    ///
    /// Panics if no region is open.
    pub fn end(&mut self, ctx: &mut RenderContext) {
        let frame = self.frames.pop().expect("meta save stack underflow");
        let SavedStateFrame {
            mask,
            values,
            paused_transform_feedback,
            suspended_query,
        } = frame;

        let mut values = values.into_iter();
        for axis in AXES.iter().filter(|axis| mask.contains(axis.bit)) {
            let saved = values
                .next()
                .expect("save frame holds fewer values than its mask");
            (axis.restore)(ctx, saved);
        }
        assert!(
            values.next().is_none(),
            "save frame holds more values than its mask"
        );

        if paused_transform_feedback {
            ctx.set_transform_feedback(TransformFeedbackState {
                paused: false,
                ..ctx.transform_feedback
            });
        }
        // Re-begin the query, carrying the samples counted before the region.
        if let Some(query) = suspended_query {
            ctx.set_query(QueryState {
                occlusion: Some(query),
            });
        }

        self.ends += 1;
        debug!(depth = self.frames.len(), mask = ?mask, "meta end");
    }
}
