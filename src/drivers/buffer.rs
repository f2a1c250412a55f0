use std::collections::VecDeque;
/// Bounded per-channel history: timestamps, raw codes and derived values in
/// lock-step. Oldest entries are evicted first once `depth` is exceeded.
#[derive(Clone, Debug)]
pub struct ChannelBuffer {
    times: VecDeque<i64>,
    raw_codes: VecDeque<i64>,
    values: VecDeque<f64>,
    depth: usize,
}
impl ChannelBuffer {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            times: VecDeque::with_capacity(depth),
            raw_codes: VecDeque::with_capacity(depth),
            values: VecDeque::with_capacity(depth),
            depth,
        }
    }
    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.depth
    }
    /// Applies to subsequent pushes; already buffered history is left alone.
    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth.max(1);
    }
    pub fn push(&mut self, time: i64, raw_code: i64, value: f64) {
        self.times.push_back(time);
        self.raw_codes.push_back(raw_code);
        self.values.push_back(value);
        while self.times.len() > self.depth {
            self.times.pop_front();
            self.raw_codes.pop_front();
            self.values.pop_front();
        }
    }
    pub fn reset(&mut self) {
        self.times.clear();
        self.raw_codes.clear();
        self.values.clear();
    }
    pub fn len(&self) -> usize {
        self.times.len()
    }
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
    #[cfg(test)]
    pub fn times(&self) -> impl Iterator<Item = i64> + '_ {
        self.times.iter().copied()
    }
    #[cfg(test)]
    pub fn raw_codes(&self) -> impl Iterator<Item = i64> + '_ {
        self.raw_codes.iter().copied()
    }
    #[cfg(test)]
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
    /// Raw codes that stay buffered once `incoming` is pushed, oldest first.
    /// Averaged units are computed over exactly this window.
    pub fn window_with(&self, incoming: i64) -> impl Iterator<Item = i64> + '_ {
        let skip = (self.raw_codes.len() + 1).saturating_sub(self.depth);
        self.raw_codes
            .iter()
            .copied()
            .chain(std::iter::once(incoming))
            .skip(skip)
    }
    pub fn first_time(&self) -> Option<i64> {
        self.times.front().copied()
    }
    pub fn last_time(&self) -> Option<i64> {
        self.times.back().copied()
    }
    /// `[time, value]` pairs ready for plotting.
    pub fn points(&self) -> Vec<[f64; 2]> {
        self.times
            .iter()
            .zip(&self.values)
            .map(|(&t, &v)| [t as f64, v])
            .collect()
    }
    /// Min and max of the derived values, ignoring NaNs.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
/// One [`ChannelBuffer`] per analog input.
#[derive(Clone, Debug)]
pub struct ChannelBank {
    channels: Vec<ChannelBuffer>,
}
impl ChannelBank {
    pub fn new(num_channels: usize, depth: usize) -> Self {
        Self {
            channels: (0..num_channels).map(|_| ChannelBuffer::new(depth)).collect(),
        }
    }
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }
    pub fn get(&self, channel: usize) -> Option<&ChannelBuffer> {
        self.channels.get(channel)
    }
    pub fn get_mut(&mut self, channel: usize) -> Option<&mut ChannelBuffer> {
        self.channels.get_mut(channel)
    }
    pub fn set_depth(&mut self, depth: usize) {
        for ch in &mut self.channels {
            ch.set_depth(depth);
        }
    }
    pub fn reset(&mut self, channel: usize) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.reset();
        }
    }
    pub fn reset_all(&mut self) {
        for ch in &mut self.channels {
            ch.reset();
        }
    }
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ChannelBuffer)> {
        self.channels.iter().enumerate()
    }
}
