/// Fixed-capacity circular buffer. Pre-allocated, no heap allocs after init.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        self.buf[self.head] = value;
        self.head = (self.head + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let start = if self.len < self.capacity {
            0
        } else {
            self.head
        };
        let cap = self.capacity;
        let len = self.len;
        (0..len).map(move |i| &self.buf[(start + i) % cap])
    }
}

impl RingBuffer<f64> {
    /// (mean, min, max) of the held samples.
    pub fn summary(&self) -> Option<(f64, f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let mut sum = 0.0;
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for &v in self.iter() {
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        Some((sum / self.len as f64, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrites_oldest() {
        let mut r = RingBuffer::new(3);
        for v in 1..=5u32 {
            r.push(v);
        }
        assert_eq!(r.len(), 3);
        assert_eq!(r.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn summary_of_durations() {
        let mut r = RingBuffer::new(4);
        assert!(r.summary().is_none());
        r.push(1.0);
        r.push(3.0);
        assert_eq!(r.summary(), Some((2.0, 1.0, 3.0)));
    }
}
