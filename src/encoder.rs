//! Software quadrature decoding for the two drive wheels.
//!
//! Each wheel's A/B lines form a 2-bit state `(A << 1) | B`. A healthy
//! encoder walks the cycle 0 -> 1 -> 3 -> 2 -> 0 going forward and the reverse
//! going backward. The counter only moves on iterations where the raw A line
//! changed; B-only changes update the tracked state but never count.

use crate::drivers::encoder_lines::LinePair;

/// Direction of a single state step: +1, -1, or 0 for anything that is not
/// an adjacent step of the quadrature cycle.
#[inline]
pub fn direction(prev_state: u8, state: u8) -> i8 {
    match (prev_state & 0b11, state & 0b11) {
        (0, 1) | (1, 3) | (3, 2) | (2, 0) => 1,
        (0, 2) | (2, 3) | (3, 1) | (1, 0) => -1,
        _ => 0,
    }
}

/// A jump to the opposite corner of the cycle; one state was missed.
#[inline]
fn is_diagonal(prev_state: u8, state: u8) -> bool {
    (prev_state ^ state) & 0b11 == 0b11
}

/// Decoder state for one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderChannel {
    state: u8,
    prev_state: u8,
    prev_a: bool,
    counter: i32,
    anomalies: u32,
}

impl EncoderChannel {
    /// Seed the channel from a real first read so the first step is measured
    /// against where the wheel actually is.
    pub fn new(initial: LinePair) -> Self {
        let state = initial.state();
        Self {
            state,
            prev_state: state,
            prev_a: initial.a,
            counter: 0,
            anomalies: 0,
        }
    }

    /// Decode one iteration's reading. Returns the applied delta.
    pub fn update(&mut self, lines: LinePair) -> i8 {
        self.state = lines.state();

        let dir = direction(self.prev_state, self.state);
        if is_diagonal(self.prev_state, self.state) {
            self.anomalies = self.anomalies.wrapping_add(1);
        }

        let delta = if lines.a != self.prev_a { dir } else { 0 };
        self.counter = self.counter.wrapping_add(delta as i32);

        self.prev_state = self.state;
        self.prev_a = lines.a;
        delta
    }

    pub fn state(&self) -> u8 {
        self.state
    }

    pub fn counter(&self) -> i32 {
        self.counter
    }

    /// Diagonal transitions seen so far. They never move the counter.
    pub fn anomalies(&self) -> u32 {
        self.anomalies
    }
}

/// Published tick pair, both channels positive when the base drives forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickMessage {
    pub left: i16,
    pub right: i16,
}

impl TickMessage {
    /// The right wheel is mounted mirrored, so its raw count is negated.
    /// Both values wrap to the 16-bit wire width.
    pub fn from_channels(left: &EncoderChannel, right: &EncoderChannel) -> Self {
        Self {
            left: left.counter() as i16,
            right: right.counter().wrapping_neg() as i16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: u8, b: u8) -> LinePair {
        LinePair {
            a: a != 0,
            b: b != 0,
        }
    }

    fn from_state(state: u8) -> LinePair {
        pair(state >> 1, state & 1)
    }

    const FORWARD: [(u8, u8); 4] = [(0, 1), (1, 3), (3, 2), (2, 0)];
    const BACKWARD: [(u8, u8); 4] = [(0, 2), (1, 0), (2, 3), (3, 1)];

    #[test]
    fn test_direction_table() {
        for (prev, next) in FORWARD {
            assert_eq!(direction(prev, next), 1, "{} -> {}", prev, next);
        }
        for (prev, next) in BACKWARD {
            assert_eq!(direction(prev, next), -1, "{} -> {}", prev, next);
        }
        for s in 0..4 {
            assert_eq!(direction(s, s), 0);
        }
        for (prev, next) in [(0, 3), (3, 0), (1, 2), (2, 1)] {
            assert_eq!(direction(prev, next), 0, "{} -> {}", prev, next);
        }
    }

    #[test]
    fn test_first_read_seeds_previous_state() {
        let ch = EncoderChannel::new(pair(1, 1));
        assert_eq!(ch.state(), 3);
        assert_eq!(ch.counter(), 0);

        // Booting at state 3 then stepping to 2 is a single forward step;
        // assuming a 0 start would have seen a diagonal 0 -> 2 instead.
        let mut ch = ch;
        ch.update(pair(1, 0));
        assert_eq!(ch.anomalies(), 0);
    }

    #[test]
    fn test_state_change_without_a_edge_does_not_count() {
        // 0 -> 1 is a valid forward step but only B moved.
        let mut ch = EncoderChannel::new(pair(0, 0));
        assert_eq!(ch.update(pair(0, 1)), 0);
        assert_eq!(ch.counter(), 0);
        assert_eq!(ch.state(), 1);

        // 1 -> 3 moves A, counts with the table direction.
        assert_eq!(ch.update(pair(1, 1)), 1);
        assert_eq!(ch.counter(), 1);
    }

    #[test]
    fn test_unchanged_lines_do_not_count() {
        let mut ch = EncoderChannel::new(pair(1, 0));
        for _ in 0..10 {
            assert_eq!(ch.update(pair(1, 0)), 0);
        }
        assert_eq!(ch.counter(), 0);
    }

    #[test]
    fn test_forward_and_backward_cycles_cancel() {
        let mut ch = EncoderChannel::new(from_state(0));
        for state in [1, 3, 2, 0] {
            ch.update(from_state(state));
        }
        let forward = ch.counter();
        assert!(forward > 0);

        for state in [2, 3, 1, 0] {
            ch.update(from_state(state));
        }
        assert_eq!(ch.counter(), 0);
    }

    #[test]
    fn test_diagonal_jump_is_zero_movement_anomaly() {
        let mut ch = EncoderChannel::new(from_state(0));
        // 0 -> 3 flips A, but the table says 0.
        assert_eq!(ch.update(from_state(3)), 0);
        assert_eq!(ch.counter(), 0);
        assert_eq!(ch.anomalies(), 1);

        // 3 -> 0 again diagonal.
        ch.update(from_state(0));
        assert_eq!(ch.anomalies(), 2);
        assert_eq!(ch.counter(), 0);
    }

    #[test]
    fn test_counter_wraps_instead_of_overflowing() {
        let mut ch = EncoderChannel::new(from_state(1));
        ch.counter = i32::MAX;
        ch.update(from_state(3));
        assert_eq!(ch.counter(), i32::MIN);
    }

    #[test]
    fn test_right_channel_negated_once() {
        let mut left = EncoderChannel::new(from_state(0));
        let mut right = EncoderChannel::new(from_state(0));

        // Mirrored mounting: forward drive turns the right encoder backward.
        for state in [1, 3, 2, 0] {
            left.update(from_state(state));
        }
        for state in [2, 3, 1, 0] {
            right.update(from_state(state));
        }
        assert!(left.counter() > 0);
        assert!(right.counter() < 0);

        let msg = TickMessage::from_channels(&left, &right);
        assert!(msg.left > 0);
        assert!(msg.right > 0);
        assert_eq!(msg.left, msg.right);
        assert_eq!(msg.right as i32, -right.counter());
    }

    #[test]
    fn test_published_ticks_wrap_to_16_bits() {
        let mut left = EncoderChannel::new(from_state(0));
        let mut right = EncoderChannel::new(from_state(0));
        left.counter = i16::MAX as i32 + 1;
        right.counter = -(i16::MAX as i32 + 1);

        let msg = TickMessage::from_channels(&left, &right);
        assert_eq!(msg.left, i16::MIN);
        assert_eq!(msg.right, i16::MIN);
    }
}
