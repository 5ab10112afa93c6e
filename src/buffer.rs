/// Non-interleaved multi-channel audio that voices mix into.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    frames: usize,
}

impl AudioBuffer {
    /// A silent buffer.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channels],
            frames,
        }
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.channels[ch]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        &mut self.channels[ch]
    }

    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.channels.iter_mut().map(Vec::as_mut_slice)
    }

    /// Adds `sample` to frame `frame` of every channel.
    #[inline]
    pub fn add_to_all(&mut self, frame: usize, sample: f32) {
        for channel in &mut self.channels {
            channel[frame] += sample;
        }
    }
}
