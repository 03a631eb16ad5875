/// Issues monotonically increasing frame indices.
///
/// The clock only counts frames. Image slots come from the presentation
/// engine, which may hand them out in any order:
///
/// ```text
/// frame:  0  1  2  3  4  5  6
/// image:  0  1  2  0  2  1  0   (whatever acquire returned)
/// ```
///
/// Skipped frames do not tick, so frame indices have no gaps.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    next_frame: u64,
}

impl FrameClock {
    /// Create a clock whose first tick is frame 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by one frame and return the new frame index.
    pub fn tick(&mut self) -> u64 {
        let frame_index = self.next_frame;
        self.next_frame += 1;
        log::trace!("Frame clock tick: frame {}", frame_index);
        frame_index
    }

    /// Index of the most recently issued frame.
    pub fn current_frame(&self) -> Option<u64> {
        self.next_frame.checked_sub(1)
    }
}
