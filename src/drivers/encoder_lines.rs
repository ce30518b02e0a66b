//! Raw encoder line sampling.
//!
//! All four lines are read back to back in a single call so the decoder gets
//! one consistent snapshot per control cycle.

use embedded_hal::digital::v2::InputPin;

/// Levels of one wheel's A and B lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinePair {
    pub a: bool,
    pub b: bool,
}

impl LinePair {
    /// 2-bit quadrature state, `A << 1 | B`.
    #[inline]
    pub fn state(&self) -> u8 {
        ((self.a as u8) << 1) | self.b as u8
    }
}

/// One snapshot of both wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderLines {
    pub left: LinePair,
    pub right: LinePair,
}

pub trait SensorLines {
    type Error;

    fn read(&mut self) -> Result<EncoderLines, Self::Error>;
}

impl<T: SensorLines + ?Sized> SensorLines for &mut T {
    type Error = T::Error;

    fn read(&mut self) -> Result<EncoderLines, T::Error> {
        (**self).read()
    }
}

/// Polls four GPIO inputs: left A/B then right A/B.
pub struct PolledLines<LA, LB, RA, RB> {
    left_a: LA,
    left_b: LB,
    right_a: RA,
    right_b: RB,
}

impl<LA, LB, RA, RB> PolledLines<LA, LB, RA, RB> {
    pub fn new(left_a: LA, left_b: LB, right_a: RA, right_b: RB) -> Self {
        Self {
            left_a,
            left_b,
            right_a,
            right_b,
        }
    }
}

impl<E, LA, LB, RA, RB> SensorLines for PolledLines<LA, LB, RA, RB>
where
    LA: InputPin<Error = E>,
    LB: InputPin<Error = E>,
    RA: InputPin<Error = E>,
    RB: InputPin<Error = E>,
{
    type Error = E;

    fn read(&mut self) -> Result<EncoderLines, E> {
        Ok(EncoderLines {
            left: LinePair {
                a: self.left_a.is_high()?,
                b: self.left_b.is_high()?,
            },
            right: LinePair {
                a: self.right_a.is_high()?,
                b: self.right_b.is_high()?,
            },
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a script of snapshots, then holds the last one.
    pub struct ScriptedLines {
        script: VecDeque<EncoderLines>,
        last: EncoderLines,
        pub reads: usize,
        pub fail: bool,
    }

    impl ScriptedLines {
        pub fn new(script: impl IntoIterator<Item = EncoderLines>) -> Self {
            Self {
                script: script.into_iter().collect(),
                last: EncoderLines::default(),
                reads: 0,
                fail: false,
            }
        }

        pub fn push(&mut self, lines: EncoderLines) {
            self.script.push_back(lines);
        }
    }

    impl SensorLines for ScriptedLines {
        type Error = ();

        fn read(&mut self) -> Result<EncoderLines, ()> {
            self.reads += 1;
            if self.fail {
                return Err(());
            }
            if let Some(next) = self.script.pop_front() {
                self.last = next;
            }
            Ok(self.last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::convert::Infallible;

    struct FakePin<'a>(&'a Cell<bool>);

    impl InputPin for FakePin<'_> {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Infallible> {
            Ok(self.0.get())
        }

        fn is_low(&self) -> Result<bool, Infallible> {
            Ok(!self.0.get())
        }
    }

    struct BrokenPin;

    impl InputPin for BrokenPin {
        type Error = &'static str;

        fn is_high(&self) -> Result<bool, &'static str> {
            Err("pin fault")
        }

        fn is_low(&self) -> Result<bool, &'static str> {
            Err("pin fault")
        }
    }

    struct OkPin(bool);

    impl InputPin for OkPin {
        type Error = &'static str;

        fn is_high(&self) -> Result<bool, &'static str> {
            Ok(self.0)
        }

        fn is_low(&self) -> Result<bool, &'static str> {
            Ok(!self.0)
        }
    }

    #[test]
    fn test_line_pair_state_encoding() {
        assert_eq!(LinePair { a: false, b: false }.state(), 0);
        assert_eq!(LinePair { a: false, b: true }.state(), 1);
        assert_eq!(LinePair { a: true, b: false }.state(), 2);
        assert_eq!(LinePair { a: true, b: true }.state(), 3);
    }

    #[test]
    fn test_polled_lines_map_pins_to_wheels() {
        let levels = [
            Cell::new(true),
            Cell::new(false),
            Cell::new(false),
            Cell::new(true),
        ];
        let mut lines = PolledLines::new(
            FakePin(&levels[0]),
            FakePin(&levels[1]),
            FakePin(&levels[2]),
            FakePin(&levels[3]),
        );

        let snap = lines.read().unwrap();
        assert_eq!(snap.left, LinePair { a: true, b: false });
        assert_eq!(snap.right, LinePair { a: false, b: true });

        levels[1].set(true);
        assert_eq!(lines.read().unwrap().left.state(), 3);
    }

    #[test]
    fn test_pin_error_propagates() {
        let mut lines = PolledLines::new(OkPin(true), OkPin(true), BrokenPin, OkPin(false));
        assert_eq!(lines.read(), Err("pin fault"));
    }
}
