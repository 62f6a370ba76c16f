use crate::error::{BridgeError, Result};
use crate::MAX_WINDOW_SIZE;
use circular_buffer::CircularBuffer;

pub type Sample = i32;

/// What the windower holds after a push.
#[derive(Debug, PartialEq)]
pub enum WindowStatus<'a> {
    /// Not enough samples yet; carries how many are buffered.
    Filling(usize),
    /// The most recent `window_size` samples, oldest first.
    Full(&'a [Sample]),
}

/// Sliding window over the last `window_size` samples.
///
/// Samples live in a fixed ring so eviction is O(1). A full window is handed
/// out by rotating the ring in place.
pub struct Windower {
    ring: Box<CircularBuffer<MAX_WINDOW_SIZE, Sample>>,
    window_size: usize,
}

impl Windower {
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 || window_size > MAX_WINDOW_SIZE {
            return Err(BridgeError::InvalidConfig(format!(
                "window size must be between 1 and {MAX_WINDOW_SIZE}, got {window_size}"
            )));
        }
        Ok(Windower {
            ring: CircularBuffer::<MAX_WINDOW_SIZE, Sample>::boxed(),
            window_size,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.len() == self.window_size
    }

    pub fn push(&mut self, sample: Sample) -> WindowStatus<'_> {
        if self.ring.len() == self.window_size {
            self.ring.pop_front();
        }
        self.ring.push_back(sample);

        if self.is_full() {
            WindowStatus::Full(self.ring.make_contiguous())
        } else {
            WindowStatus::Filling(self.ring.len())
        }
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_window_fails_fast() {
        assert!(Windower::new(0).is_err());
        assert!(Windower::new(MAX_WINDOW_SIZE + 1).is_err());
        assert!(Windower::new(MAX_WINDOW_SIZE).is_ok());
    }

    #[test]
    fn reports_filling_until_warm() {
        let mut windower = Windower::new(4).unwrap();
        assert_eq!(windower.push(10), WindowStatus::Filling(1));
        assert_eq!(windower.push(11), WindowStatus::Filling(2));
        assert_eq!(windower.push(12), WindowStatus::Filling(3));
        assert_eq!(windower.push(13), WindowStatus::Full(&[10, 11, 12, 13]));
    }

    #[test]
    fn full_on_every_push_after_warmup() {
        let mut windower = Windower::new(3).unwrap();
        for s in 1..=3 {
            windower.push(s);
        }
        assert_eq!(windower.push(4), WindowStatus::Full(&[2, 3, 4]));
        assert_eq!(windower.push(5), WindowStatus::Full(&[3, 4, 5]));
        assert_eq!(windower.len(), 3);
    }

    #[test]
    fn window_always_holds_last_n_in_order() {
        let window_size = 64;
        let mut windower = Windower::new(window_size).unwrap();
        let samples: Vec<Sample> = (0..1000).map(|i| (i * 7919 % 1024) - 512).collect();

        for (i, s) in samples.iter().enumerate() {
            let pushed = i + 1;
            match windower.push(*s) {
                WindowStatus::Filling(count) => {
                    assert!(pushed < window_size);
                    assert_eq!(count, pushed);
                }
                WindowStatus::Full(window) => {
                    assert!(pushed >= window_size);
                    assert_eq!(window.len(), window_size);
                    assert_eq!(window, &samples[pushed - window_size..pushed]);
                }
            }
        }
    }

    #[test]
    fn stays_ordered_after_the_ring_wraps() {
        let mut windower = Windower::new(5).unwrap();
        let total = 3 * MAX_WINDOW_SIZE as Sample + 7;
        for s in 0..total - 1 {
            windower.push(s);
        }
        let expected: Vec<Sample> = (total - 5..total).collect();
        assert_eq!(windower.push(total - 1), WindowStatus::Full(&expected));
    }

    #[test]
    fn window_of_one() {
        let mut windower = Windower::new(1).unwrap();
        assert_eq!(windower.push(-7), WindowStatus::Full(&[-7]));
        assert_eq!(windower.push(9), WindowStatus::Full(&[9]));
    }

    #[test]
    fn clear_restarts_warmup() {
        let mut windower = Windower::new(2).unwrap();
        windower.push(1);
        windower.push(2);
        windower.clear();
        assert!(windower.is_empty());
        assert_eq!(windower.push(3), WindowStatus::Filling(1));
    }
}
