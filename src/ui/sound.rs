/// Sound engine: procedural chiptune effects and a looping tune via rodio.
///
/// All buffers are generated as in-memory WAV data at init time.
/// Effects are fire-and-forget (one detached Sink each); the music has a
/// Sink of its own so its volume can follow the settings live.
///
/// Compile with `--no-default-features` or without "sound" feature
/// to disable audio entirely (the stub SoundEngine does nothing).

#[cfg(feature = "sound")]
mod inner {
    use std::f32::consts::TAU;
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
    use tracing::{debug, warn};

    use crate::settings::SettingsManager;

    const SAMPLE_RATE: u32 = 22050;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        music: Option<Sink>,
        sfx_volume: f32,
        sfx_coin: Arc<Vec<u8>>,
        sfx_gem: Arc<Vec<u8>>,
        sfx_jump: Arc<Vec<u8>>,
        sfx_hurt: Arc<Vec<u8>>,
        sfx_clear: Arc<Vec<u8>>,
        sfx_game_over: Arc<Vec<u8>>,
        sfx_complete: Arc<Vec<u8>>,
        sfx_tick: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("no audio output: {e}");
                    return None;
                }
            };

            let music = start_music(&handle);

            Some(SoundEngine {
                _stream: stream,
                handle,
                music,
                sfx_volume: 1.0,
                sfx_coin: Arc::new(make_wav(&gen_coin())),
                sfx_gem: Arc::new(make_wav(&gen_gem())),
                sfx_jump: Arc::new(make_wav(&gen_jump())),
                sfx_hurt: Arc::new(make_wav(&gen_hurt())),
                sfx_clear: Arc::new(make_wav(&gen_clear())),
                sfx_game_over: Arc::new(make_wav(&gen_game_over())),
                sfx_complete: Arc::new(make_wav(&gen_complete())),
                sfx_tick: Arc::new(make_wav(&tone(880.0, 0.03, 0.2))),
            })
        }

        /// Follow the current music toggle and volumes.
        pub fn apply_settings(&mut self, settings: &SettingsManager) {
            self.sfx_volume = settings.volume_sfx();
            if let Some(music) = &self.music {
                let volume = settings.effective_music_volume();
                music.set_volume(volume);
                if volume > 0.0 { music.play() } else { music.pause() }
            }
            debug!(
                music = settings.effective_music_volume(),
                sfx = self.sfx_volume,
                "audio settings applied"
            );
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            if self.sfx_volume <= 0.0 {
                return;
            }
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = Decoder::new(cursor) {
                    sink.set_volume(self.sfx_volume);
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        pub fn play_coin(&self) { self.play(&self.sfx_coin); }
        pub fn play_gem(&self) { self.play(&self.sfx_gem); }
        pub fn play_jump(&self) { self.play(&self.sfx_jump); }
        pub fn play_hurt(&self) { self.play(&self.sfx_hurt); }
        pub fn play_clear(&self) { self.play(&self.sfx_clear); }
        pub fn play_game_over(&self) { self.play(&self.sfx_game_over); }
        pub fn play_complete(&self) { self.play(&self.sfx_complete); }
        pub fn play_tick(&self) { self.play(&self.sfx_tick); }
    }

    fn start_music(handle: &OutputStreamHandle) -> Option<Sink> {
        let sink = Sink::try_new(handle).ok()?;
        let src = Decoder::new(Cursor::new(make_wav(&gen_theme()))).ok()?;
        sink.append(src.repeat_infinite());
        sink.pause();
        Some(sink)
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators: all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    /// Sine + a little 3rd harmonic, linear fade out.
    fn tone(freq: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - i as f32 / n as f32;
                let wave = (t * freq * TAU).sin() * 0.8 + (t * freq * 3.0 * TAU).sin() * 0.2;
                wave * env * volume
            })
            .collect()
    }

    fn sequence(notes: &[(f32, f32)], volume: f32) -> Vec<f32> {
        notes.iter().flat_map(|&(f, d)| tone(f, d, volume)).collect()
    }

    /// Frequency sweep from `from` to `to` Hz.
    fn sweep(from: f32, to: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let p = i as f32 / n as f32;
                phase += (from + (to - from) * p) / SAMPLE_RATE as f32;
                (phase * TAU).sin() * (1.0 - p).powf(0.6) * volume
            })
            .collect()
    }

    /// Coin: two quick high notes (B5, E6).
    fn gen_coin() -> Vec<f32> {
        sequence(&[(988.0, 0.05), (1319.0, 0.09)], 0.25)
    }

    /// Gem: bright three-note run (E6, G6, C7).
    fn gen_gem() -> Vec<f32> {
        sequence(&[(1319.0, 0.05), (1568.0, 0.05), (2093.0, 0.12)], 0.25)
    }

    /// Jump: short rising whistle.
    fn gen_jump() -> Vec<f32> {
        sweep(300.0, 750.0, 0.12, 0.25)
    }

    /// Hurt: falling buzz with noise.
    fn gen_hurt() -> Vec<f32> {
        let mut rng: u32 = 2024;
        sweep(420.0, 120.0, 0.2, 0.3)
            .into_iter()
            .map(|s| {
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                s * 0.7 + noise * s.abs() * 0.3
            })
            .collect()
    }

    /// Level clear: C5 E5 G5 C6.
    fn gen_clear() -> Vec<f32> {
        sequence(&[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.3)], 0.3)
    }

    /// Game over: slow descent A4 F4 D4 A3.
    fn gen_game_over() -> Vec<f32> {
        sequence(&[(440.0, 0.2), (349.0, 0.2), (294.0, 0.2), (220.0, 0.5)], 0.3)
    }

    /// Game complete: the clear fanfare, then a held chord-ish tail.
    fn gen_complete() -> Vec<f32> {
        let mut s = gen_clear();
        s.extend(sequence(&[(784.0, 0.12), (1047.0, 0.12), (1319.0, 0.5)], 0.3));
        s
    }

    /// Background loop: a gentle 8-bar arpeggio.
    fn gen_theme() -> Vec<f32> {
        const BARS: [[f32; 4]; 4] = [
            [262.0, 330.0, 392.0, 330.0], // C
            [220.0, 262.0, 330.0, 262.0], // Am
            [175.0, 220.0, 262.0, 220.0], // F
            [196.0, 247.0, 294.0, 247.0], // G
        ];
        BARS.iter()
            .chain(BARS.iter())
            .flat_map(|bar| bar.iter().flat_map(|&f| tone(f, 0.25, 0.18)))
            .collect()
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: wraps f32 samples into a 16-bit PCM buffer
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        const CHANNELS: u16 = 1;
        const BITS: u16 = 16;
        let byte_rate = SAMPLE_RATE * u32::from(CHANNELS) * u32::from(BITS) / 8;
        let block_align = CHANNELS * BITS / 8;
        let data_size = samples.len() as u32 * 2;

        let mut buf = Vec::with_capacity(44 + data_size as usize);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&CHANNELS.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&BITS.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn apply_settings(&mut self, _settings: &crate::settings::SettingsManager) {}
    pub fn play_coin(&self) {}
    pub fn play_gem(&self) {}
    pub fn play_jump(&self) {}
    pub fn play_hurt(&self) {}
    pub fn play_clear(&self) {}
    pub fn play_game_over(&self) {}
    pub fn play_complete(&self) {}
    pub fn play_tick(&self) {}
}
