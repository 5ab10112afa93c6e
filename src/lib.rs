mod buffer;
pub mod decay;
mod error;
pub mod excitation;
pub mod note;
pub mod post;
pub mod voice;

pub use buffer::AudioBuffer;
pub use error::{Error, Result};
pub use note::Note;
pub use voice::{StringVoice, VoiceState};

use decay::{
    table::{BandedDecay, FlatDecay},
    DecayPolicy,
};
use excitation::Excitation;
use post::PostProcessor;

/// Which coefficient set the strings are tuned with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecayKind {
    /// Bass, middle and treble bands, see [`decay::table::PIANO_BANDS`].
    #[default]
    Banded,
    /// The same coefficients for every key, see [`FlatDecay`].
    Flat,
}

impl DecayKind {
    pub fn policy(self) -> Box<dyn DecayPolicy> {
        match self {
            DecayKind::Banded => Box::new(BandedDecay::default()),
            DecayKind::Flat => Box::new(FlatDecay),
        }
    }
}

pub struct Config {
    /// Playback rate the strings are tuned for, in Hz. Sets every delay-line length.
    pub sample_rate: f32,
    /// Frames per block handed out by [`Piano::new_block`].
    pub buffer_size: usize,
    /// The coefficient set of the strings.
    pub decay: DecayKind,
    /// Seed for the noise bursts. Each key derives its own stream from it, so a seeded piano
    /// renders the same audio every run. Without a seed every burst is drawn from entropy.
    pub seed: Option<u64>,
}

pub const DEFAULT_SAMPLE_RATE: f32 = 44_100.0;
/// Five milliseconds at the default rate.
pub const DEFAULT_BUFFER_SIZE: usize = DEFAULT_SAMPLE_RATE as usize / 200;

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            decay: DecayKind::default(),
            seed: None,
        }
    }
}

/// A keyboard of string voices, one per playable note, mixed and then passed through a
/// post-processor.
///
/// Voices are never stolen or shared: an event for a note goes to the voice bound to that note,
/// or nowhere.
pub struct Piano<P: PostProcessor> {
    /// The configuration the piano was built with.
    cfg: Config,

    /// One voice per note, indexed by [`Note::index`].
    voices: Vec<StringVoice>,

    /// Applied to every rendered block.
    post: P,

    /// Channel count the post-processor was last prepared for.
    channels: usize,
}

impl<P: PostProcessor> Piano<P> {
    /// Builds every voice and prepares it at `cfg.sample_rate` for `channels` output channels.
    pub fn new(cfg: Config, post: P, channels: usize) -> Result<Self> {
        let policy = cfg.decay.policy();
        let voices = Note::all()
            .map(|note| {
                let excitation = match cfg.seed {
                    Some(seed) => Excitation::from_seed(seed ^ u64::from(note.number())),
                    None => Excitation::from_entropy(),
                };
                StringVoice::new(note, &policy, excitation)
            })
            .collect();

        let mut piano = Self {
            cfg,
            voices,
            post,
            channels,
        };
        piano.prepare(piano.cfg.sample_rate, channels)?;
        Ok(piano)
    }

    /// Resizes every string for a new sample rate. Allocates, so call it off the audio thread.
    ///
    /// On error nothing changes: the strings and the post-processor keep their previous rate.
    pub fn prepare(&mut self, sample_rate: f32, channels: usize) -> Result<()> {
        for voice in &self.voices {
            voice.note().delay_line_length(sample_rate)?;
        }
        self.post.prepare(sample_rate, channels)?;
        for voice in &mut self.voices {
            voice.prepare(sample_rate)?;
        }
        self.cfg.sample_rate = sample_rate;
        self.channels = channels;
        log::debug!(
            "piano prepared: {} voices at {} Hz, {} channels",
            self.voices.len(),
            sample_rate,
            channels
        );
        Ok(())
    }

    fn voice_for_mut(&mut self, note: u8) -> Option<&mut StringVoice> {
        let index = Note::new(note).ok()?.index();
        self.voices.get_mut(index).filter(|voice| voice.can_play(note))
    }

    pub fn voice(&self, note: u8) -> Option<&StringVoice> {
        let index = Note::new(note).ok()?.index();
        self.voices.get(index).filter(|voice| voice.can_play(note))
    }

    /// Strikes `note`. Notes outside the keyboard are ignored.
    pub fn note_on(&mut self, note: u8, velocity: f32) {
        match self.voice_for_mut(note) {
            Some(voice) => {
                log::trace!("note on {note} at {velocity}");
                voice.note_on(note, velocity);
            }
            None => log::debug!("ignoring note on for unplayable note {note}"),
        }
    }

    /// Releases `note`. Notes outside the keyboard are ignored.
    pub fn note_off(&mut self, note: u8, allow_tail_off: bool) {
        match self.voice_for_mut(note) {
            Some(voice) => {
                log::trace!("note off {note}");
                voice.note_off(allow_tail_off);
            }
            None => log::debug!("ignoring note off for unplayable note {note}"),
        }
    }

    pub fn all_notes_off(&mut self, allow_tail_off: bool) {
        for voice in &mut self.voices {
            voice.note_off(allow_tail_off);
        }
    }

    /// Mixes every sounding string into `buffer` and runs the post-processor over the block.
    pub fn render(&mut self, buffer: &mut AudioBuffer, start: usize, num_samples: usize) {
        debug_assert_eq!(buffer.num_channels(), self.channels);
        for voice in self.voices.iter_mut().filter(|voice| voice.is_active()) {
            voice.render(buffer, start, num_samples);
        }
        self.post.process(buffer, start, num_samples);
    }

    /// A silent buffer of `buffer_size` frames on every prepared channel.
    pub fn new_block(&self) -> AudioBuffer {
        AudioBuffer::new(self.channels, self.cfg.buffer_size)
    }

    /// The number of strings still making sound.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_active()).count()
    }

    pub fn voices(&self) -> &[StringVoice] {
        &self.voices
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{Bypass, ButterworthLowPass};

    fn seeded(decay: DecayKind) -> Config {
        Config {
            decay,
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn one_voice_per_key() {
        let piano = Piano::new(Config::default(), Bypass, 2).unwrap();
        assert_eq!(piano.voices().len(), Note::all().count());
        for (voice, note) in piano.voices().iter().zip(Note::all()) {
            assert_eq!(voice.note(), note);
            assert!(voice.is_prepared());
        }
        assert!(piano.voice(60).unwrap().can_play(60));
        assert!(piano.voice(Note::MIN - 1).is_none());
        assert!(piano.voice(Note::MAX + 1).is_none());
    }

    #[test]
    fn routes_events_to_the_bound_voice() {
        let mut piano = Piano::new(seeded(DecayKind::Banded), Bypass, 1).unwrap();
        piano.note_on(64, 1.0);
        assert_eq!(piano.active_voices(), 1);
        assert_eq!(piano.voice(64).unwrap().state(), VoiceState::Held);

        piano.note_off(64, true);
        assert!(matches!(
            piano.voice(64).unwrap().state(),
            VoiceState::TailingOff(_)
        ));
        piano.note_off(64, false);
        assert_eq!(piano.active_voices(), 0);
    }

    #[test]
    fn ignores_unplayable_notes() {
        let mut piano = Piano::new(seeded(DecayKind::Banded), Bypass, 1).unwrap();
        piano.note_on(10, 1.0);
        piano.note_on(120, 1.0);
        piano.note_off(10, true);
        assert_eq!(piano.active_voices(), 0);
    }

    #[test]
    fn decay_kind_selects_coefficients() {
        let flat = Piano::new(seeded(DecayKind::Flat), Bypass, 1).unwrap();
        assert_eq!(
            flat.voice(90).unwrap().coefficients(),
            FlatDecay::COEFFICIENTS
        );
        let banded = Piano::new(seeded(DecayKind::Banded), Bypass, 1).unwrap();
        assert_eq!(banded.voice(90).unwrap().coefficients().filter_blend, 0.85);
    }

    #[test]
    fn seeded_pianos_render_identically() {
        let mut a = Piano::new(seeded(DecayKind::Banded), ButterworthLowPass::piano(), 2).unwrap();
        let mut b = Piano::new(seeded(DecayKind::Banded), ButterworthLowPass::piano(), 2).unwrap();
        let mut out_a = AudioBuffer::new(2, 256);
        let mut out_b = AudioBuffer::new(2, 256);
        for piano in [&mut a, &mut b] {
            piano.note_on(48, 0.9);
            piano.note_on(67, 0.6);
        }
        a.render(&mut out_a, 0, 256);
        b.render(&mut out_b, 0, 256);
        assert_eq!(out_a, out_b);
        assert!(out_a.channel(0).iter().any(|s| *s != 0.0));
    }

    #[test]
    fn all_notes_off_silences_everything() {
        let mut piano = Piano::new(seeded(DecayKind::Banded), Bypass, 1).unwrap();
        for note in [40, 52, 64, 76, 88] {
            piano.note_on(note, 1.0);
        }
        assert_eq!(piano.active_voices(), 5);
        piano.all_notes_off(false);
        assert_eq!(piano.active_voices(), 0);

        let mut out = AudioBuffer::new(1, 128);
        piano.render(&mut out, 0, 128);
        assert!(out.channel(0).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn prepare_rejects_bad_sample_rate() {
        assert!(Piano::new(
            Config {
                sample_rate: 0.0,
                ..Default::default()
            },
            Bypass,
            1
        )
        .is_err());

        let mut piano = Piano::new(Config::default(), Bypass, 1).unwrap();
        assert!(piano.prepare(0.0, 1).is_err());
        assert_eq!(piano.voice(69).unwrap().sample_rate(), DEFAULT_SAMPLE_RATE);
        piano.prepare(48_000.0, 1).unwrap();
        assert_eq!(piano.config().sample_rate, 48_000.0);
        assert_eq!(piano.voice(69).unwrap().delay_line().len(), 109);
    }

    #[test]
    fn failed_prepare_changes_nothing() {
        let mut piano = Piano::new(Config::default(), ButterworthLowPass::piano(), 2).unwrap();
        assert_eq!(
            piano.prepare(8_000.0, 1),
            Err(Error::InvalidFilter("cutoff must be below Nyquist"))
        );
        assert_eq!(piano.config().sample_rate, DEFAULT_SAMPLE_RATE);
        let a4 = piano.voice(69).unwrap();
        assert_eq!(a4.sample_rate(), DEFAULT_SAMPLE_RATE);
        assert_eq!(a4.delay_line().len(), 100);

        piano.note_on(69, 1.0);
        let mut out = piano.new_block();
        assert_eq!(out.num_channels(), 2);
        piano.render(&mut out, 0, DEFAULT_BUFFER_SIZE);
        assert!(out.channel(0).iter().any(|s| *s != 0.0));
    }

    #[test]
    fn blocks_follow_config() {
        let piano = Piano::new(
            Config {
                buffer_size: 64,
                ..Default::default()
            },
            Bypass,
            3,
        )
        .unwrap();
        let block = piano.new_block();
        assert_eq!(block.num_channels(), 3);
        assert_eq!(block.num_frames(), 64);
        assert!(block.channel(2).iter().all(|s| *s == 0.0));
    }
}
