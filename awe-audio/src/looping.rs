//! Loop sequencer - playback position traversal
//!
//! A [`Loop`] walks a floating-point frame position between two bounds.
//! How it behaves at a bound depends on its [`LoopMethod`]; which way it
//! walks depends on its [`Direction`].

use crate::error::{AweError, Result};

/// What happens when the position reaches a bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMethod {
    /// Behaves like `Once`
    Undefined,
    /// Stop at the bound and pause
    #[default]
    Once,
    /// Jump back to the opposite bound
    Repeat,
    /// Turn around (ping-pong)
    Alternating,
}

/// Direction of travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// The opposite direction
    #[inline]
    pub fn inverted(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// Traversal mode of a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopMode {
    pub method: LoopMethod,
    pub direction: Direction,
}

impl LoopMode {
    const METHOD_MASK: u8 = 0x03;
    const DIRECTION_BIT: u8 = 0x08;

    pub fn new(method: LoopMethod, direction: Direction) -> Self {
        Self { method, direction }
    }

    pub fn once() -> Self {
        Self::new(LoopMethod::Once, Direction::Forward)
    }

    pub fn repeat() -> Self {
        Self::new(LoopMethod::Repeat, Direction::Forward)
    }

    pub fn alternating() -> Self {
        Self::new(LoopMethod::Alternating, Direction::Forward)
    }

    /// Same method, travelling `direction`
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Decode the packed form: bits 0-1 method, bit 3 direction.
    /// Any other bit set is rejected.
    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits & !(Self::METHOD_MASK | Self::DIRECTION_BIT) != 0 {
            return Err(AweError::InvalidLoopMode(bits));
        }
        let method = match bits & Self::METHOD_MASK {
            0x0 => LoopMethod::Undefined,
            0x1 => LoopMethod::Once,
            0x2 => LoopMethod::Repeat,
            _ => LoopMethod::Alternating,
        };
        let direction = if bits & Self::DIRECTION_BIT != 0 {
            Direction::Reverse
        } else {
            Direction::Forward
        };
        Ok(Self { method, direction })
    }

    /// Packed form, the inverse of [`from_bits`](Self::from_bits)
    pub fn bits(&self) -> u8 {
        let method = match self.method {
            LoopMethod::Undefined => 0x0,
            LoopMethod::Once => 0x1,
            LoopMethod::Repeat => 0x2,
            LoopMethod::Alternating => 0x3,
        };
        match self.direction {
            Direction::Forward => method,
            Direction::Reverse => method | Self::DIRECTION_BIT,
        }
    }

    #[inline]
    pub fn is_reverse(&self) -> bool {
        self.direction == Direction::Reverse
    }
}

/// Bounded playback position with a traversal mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Loop {
    pub begin: f64,
    pub now: f64,
    pub end: f64,
    pub mode: LoopMode,
    pub paused: bool,
}

impl Loop {
    /// Create a loop positioned at the start for its direction of travel
    /// (`begin` going forward, `end` in reverse). Swapped bounds are reordered.
    pub fn new(begin: f64, end: f64, mode: LoopMode) -> Self {
        let (begin, end) = if begin <= end { (begin, end) } else { (end, begin) };
        let now = if mode.is_reverse() { end } else { begin };
        Self {
            begin,
            now,
            end,
            mode,
            paused: false,
        }
    }

    /// Create a loop at an explicit position
    pub fn with_position(begin: f64, now: f64, end: f64, mode: LoopMode) -> Self {
        let mut lp = Self::new(begin, end, mode);
        lp.now = now;
        lp
    }

    /// Move the position by `delta` frames in the direction of travel.
    ///
    /// Returns true when the loop is paused after the move, meaning there is
    /// nothing left to play this call.
    pub fn advance(&mut self, delta: f64) -> bool {
        if self.paused {
            return true;
        }

        let forward = !self.mode.is_reverse();

        match self.mode.method {
            LoopMethod::Undefined | LoopMethod::Once => {
                if forward {
                    self.now += delta;
                    if self.now > self.end {
                        self.now = self.end;
                        self.paused = true;
                    }
                } else {
                    self.now -= delta;
                    if self.now < self.begin {
                        self.now = self.begin;
                        self.paused = true;
                    }
                }
            }
            LoopMethod::Repeat => {
                if forward {
                    self.now += delta;
                } else {
                    self.now -= delta;
                }

                if self.now > self.end {
                    self.now = self.begin;
                } else if self.now < self.begin {
                    self.now = self.end;
                }
            }
            LoopMethod::Alternating => {
                if forward {
                    self.now += delta;
                } else {
                    self.now -= delta;
                }

                // Only the direction turns; `now` keeps its overshoot.
                if self.now < self.begin || self.now > self.end {
                    self.mode.direction = self.mode.direction.inverted();
                }
            }
        }

        self.paused
    }

    /// Replace the mode from its packed form. The loop is left untouched on error.
    pub fn set_mode_bits(&mut self, bits: u8) -> Result<()> {
        self.mode = LoopMode::from_bits(bits)?;
        Ok(())
    }

    /// Rewind to the start for the current direction and unpause
    pub fn reset(&mut self) {
        self.now = if self.mode.is_reverse() {
            self.end
        } else {
            self.begin
        };
        self.paused = false;
    }

    /// Jump to `position`, clamped into the loop bounds
    pub fn seek(&mut self, position: f64) {
        self.now = position.clamp(self.begin, self.end);
    }

    #[inline]
    pub fn begin_index(&self) -> usize {
        floor_index(self.begin)
    }

    #[inline]
    pub fn now_index(&self) -> usize {
        floor_index(self.now)
    }

    #[inline]
    pub fn end_index(&self) -> usize {
        floor_index(self.end)
    }

    /// Frame to read for the current position.
    ///
    /// Never returns `end` itself: the terminal position reads the last frame
    /// instead of one past it.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.now_index().min(self.end_index().saturating_sub(1))
    }

    /// Position within the loop, 0.0 at `begin` and 1.0 at `end`
    pub fn progress(&self) -> f64 {
        let span = self.end - self.begin;
        if span <= 0.0 {
            return 0.0;
        }
        (self.now - self.begin) / span
    }

    /// Loop length in frames
    #[inline]
    pub fn length(&self) -> f64 {
        self.end - self.begin
    }
}

impl Default for Loop {
    /// An empty, paused loop
    fn default() -> Self {
        Self {
            begin: 0.0,
            now: 0.0,
            end: 0.0,
            mode: LoopMode::default(),
            paused: true,
        }
    }
}

#[inline]
fn floor_index(position: f64) -> usize {
    if position.is_nan() || position <= 0.0 {
        0
    } else {
        position.floor() as usize
    }
}
