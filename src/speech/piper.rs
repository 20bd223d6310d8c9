//! Piper-backed speech service. Each chunk is synthesized to a cached WAV
//! under the TTS cache dir and played on its own rodio sink.

use super::service::{SpeechErrorKind, SpeechService, Utterance, UtteranceCallback};
use super::Voice;
use crate::config::AppConfig;
use anyhow::{Context, Result};
use piper_rs::synth::{AudioOutputConfig, PiperSpeechSynthesizer};
use piper_rs::{PiperModel, from_config_path};
use rodio::{Decoder, OutputStream, Sink};
use sha2::{Digest, Sha256};
use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

type SharedModel = Arc<dyn PiperModel + Send + Sync>;

pub struct PiperSpeech {
    model_path: PathBuf,
    cache_dir: PathBuf,
    model: Option<SharedModel>,
    playback: Option<Playback>,
}

/// Control handles shared with the thread playing the current utterance.
#[derive(Clone, Default)]
struct Playback {
    canceled: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    sink: Arc<Mutex<Option<Arc<Sink>>>>,
}

impl Playback {
    fn with_sink(&self, action: impl FnOnce(&Sink)) {
        if let Ok(slot) = self.sink.lock() {
            if let Some(sink) = slot.as_ref() {
                action(sink);
            }
        }
    }
}

impl PiperSpeech {
    /// Loads the model eagerly; a missing or broken model leaves the
    /// service unsupported instead of failing startup.
    pub fn from_config(config: &AppConfig) -> Self {
        let model_path = PathBuf::from(&config.tts_model_path);
        let espeak_path = sanitize_espeak_root(PathBuf::from(&config.tts_espeak_path));
        if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
            // Set once during startup before any synthesis thread exists.
            unsafe {
                env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
            }
        }
        info!(
            model = %model_path.display(),
            espeak_root = %espeak_path.display(),
            "Initializing Piper speech"
        );
        let model = match load_model(&model_path) {
            Ok(model) => Some(model),
            Err(err) => {
                warn!("Piper unavailable: {err:#}");
                None
            }
        };
        Self {
            model_path,
            cache_dir: PathBuf::from(&config.tts_cache_dir),
            model,
            playback: None,
        }
    }
}

impl SpeechService for PiperSpeech {
    fn is_supported(&self) -> bool {
        self.model.is_some()
    }

    fn list_voices(&self) -> Vec<Voice> {
        if self.model.is_none() {
            return Vec::new();
        }
        let stem = model_voice_name(&self.model_path);
        // Piper model names look like `zh_CN-huayan-medium`.
        let language = stem.split('-').next().unwrap_or_default().replace('_', "-");
        vec![Voice::new(stem, language, true)]
    }

    fn speak(&mut self, utterance: Utterance, callback: UtteranceCallback) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .map(Arc::clone)
            .context("Piper model not loaded")?;
        self.cancel()?;

        if let Some(voice) = utterance.voice.as_deref() {
            if voice != model_voice_name(&self.model_path) {
                debug!(voice, "Requested voice is not loaded; using the configured model");
            }
        }
        let playback = Playback::default();
        self.playback = Some(playback.clone());
        let path = cache_path(
            &self.cache_dir,
            &self.model_path,
            &utterance.text,
            utterance.rate,
            utterance.pitch,
        );

        thread::Builder::new()
            .name(format!("piper-chunk-{}", utterance.chunk_index))
            .spawn(move || {
                let outcome = synthesize_and_play(model, &path, &utterance, &playback);
                if playback.canceled.load(Ordering::SeqCst) {
                    callback.fail(SpeechErrorKind::Canceled);
                    return;
                }
                match outcome {
                    Ok(()) => callback.complete(),
                    Err(err) => {
                        warn!(chunk = utterance.chunk_index, "Piper playback failed: {err:#}");
                        callback.fail(SpeechErrorKind::Failed(format!("{err:#}")));
                    }
                }
            })
            .context("Spawning Piper playback thread")?;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if let Some(playback) = &self.playback {
            debug!("Pausing playback");
            playback.paused.store(true, Ordering::SeqCst);
            playback.with_sink(Sink::pause);
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if let Some(playback) = &self.playback {
            debug!("Resuming playback");
            playback.paused.store(false, Ordering::SeqCst);
            playback.with_sink(Sink::play);
        }
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        if let Some(playback) = self.playback.take() {
            playback.canceled.store(true, Ordering::SeqCst);
            playback.with_sink(Sink::stop);
        }
        Ok(())
    }
}

fn load_model(model_path: &Path) -> Result<SharedModel> {
    let config_path = resolve_piper_config(model_path);
    if !config_path.exists() {
        anyhow::bail!(
            "Piper config not found at {} (expected from {})",
            config_path.display(),
            model_path.display()
        );
    }
    from_config_path(&config_path).context("Loading Piper model")
}

fn synthesize_and_play(
    model: SharedModel,
    path: &Path,
    utterance: &Utterance,
    playback: &Playback,
) -> Result<()> {
    if !path.exists() {
        let piper = PiperSpeechSynthesizer::new(model).context("Preparing Piper synthesizer")?;
        synthesize_to_cache(&piper, path, utterance)?;
    }
    if playback.canceled.load(Ordering::SeqCst) {
        return Ok(());
    }

    // The output stream is not Send, so it lives on this thread.
    let (_stream, handle) = OutputStream::try_default().context("Opening audio output")?;
    let sink = Arc::new(Sink::try_new(&handle).context("Creating sink")?);
    sink.set_volume(utterance.volume);
    let reader = BufReader::new(File::open(path).with_context(|| format!("Opening {}", path.display()))?);
    sink.append(Decoder::new(reader).context("Decoding synthesized audio")?);
    if playback.paused.load(Ordering::SeqCst) {
        sink.pause();
    }
    if let Ok(mut slot) = playback.sink.lock() {
        *slot = Some(Arc::clone(&sink));
    }
    if playback.canceled.load(Ordering::SeqCst) {
        sink.stop();
    }

    debug!(chunk = utterance.chunk_index, path = %path.display(), "Playing chunk");
    sink.sleep_until_end();
    if let Ok(mut slot) = playback.sink.lock() {
        slot.take();
    }
    Ok(())
}

fn synthesize_to_cache(
    piper: &PiperSpeechSynthesizer,
    path: &Path,
    utterance: &Utterance,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Creating TTS cache directory")?;
    }
    debug!(
        path = %path.display(),
        rate = utterance.rate,
        pitch = utterance.pitch,
        chars = utterance.text.chars().count(),
        "Synthesizing chunk with Piper"
    );
    let temp = unique_temp_wav_path(path);
    piper
        .synthesize_to_file(
            &temp,
            utterance.text.clone(),
            output_config(utterance.rate, utterance.pitch),
        )
        .context("Synthesizing audio")?;
    if let Err(err) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(err).with_context(|| format!("Replacing {}", path.display()));
    }
    Ok(())
}

/// `None` keeps Piper's defaults when both rate and pitch are neutral.
fn output_config(rate: f32, pitch: f32) -> Option<AudioOutputConfig> {
    let neutral = |value: f32| (value - 1.0).abs() <= f32::EPSILON;
    if neutral(rate) && neutral(pitch) {
        return None;
    }
    Some(AudioOutputConfig {
        rate: (!neutral(rate)).then(|| rate_to_percent(rate)),
        volume: None,
        pitch: (!neutral(pitch)).then(|| pitch_to_percent(pitch)),
        appended_silence_ms: None,
    })
}

fn cache_path(base: &Path, model_path: &Path, text: &str, rate: f32, pitch: f32) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(model_path.as_os_str().to_string_lossy().as_bytes());
    hasher.update(text.as_bytes());
    hasher.update(rate.to_le_bytes());
    hasher.update(pitch.to_le_bytes());
    let hash = format!("{:x}", hasher.finalize());
    base.join(format!("tts-{hash}.wav"))
}

fn model_voice_name(model_path: &Path) -> String {
    model_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn unique_temp_wav_path(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nonce = SEQ.fetch_add(1, Ordering::Relaxed);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tts");
    path.with_file_name(format!("{stem}.tmp-{}-{nonce}.wav", std::process::id()))
}

/// Piper expects the directory containing `espeak-ng-data/`, not the data
/// directory itself.
fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path.file_name().is_some_and(|n| n == "espeak-ng-data") {
        if let Some(parent) = path.parent() {
            return parent.to_path_buf();
        }
    }
    path
}

fn resolve_piper_config(model_path: &Path) -> PathBuf {
    if model_path.extension().is_some_and(|ext| ext == "onnx") {
        return model_path.with_extension("onnx.json");
    }
    model_path.to_path_buf()
}

/// Maps the 0.1–10 speech rate onto Piper's 0–100 rate percentage.
fn rate_to_percent(rate: f32) -> u8 {
    let clamped = rate.clamp(0.5, 5.5);
    let percent = ((clamped - 0.5) / 5.0) * 100.0;
    percent.round().clamp(0.0, 100.0) as u8
}

/// Maps the 0–2 pitch multiplier onto Piper's 0–100 pitch percentage
/// (1.0 lands on 50).
fn pitch_to_percent(pitch: f32) -> u8 {
    let percent = pitch.clamp(0.0, 2.0) / 2.0 * 100.0;
    percent.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_depends_on_text_rate_and_pitch() {
        let base = Path::new("/tmp/tts");
        let model = Path::new("model.onnx");
        let a = cache_path(base, model, "你好。", 1.0, 1.0);
        assert_eq!(a, cache_path(base, model, "你好。", 1.0, 1.0));
        assert_ne!(a, cache_path(base, model, "你好。", 1.5, 1.0));
        assert_ne!(a, cache_path(base, model, "你好。", 1.0, 1.4));
        assert_ne!(a, cache_path(base, model, "再见。", 1.0, 1.0));
        assert!(a.to_string_lossy().ends_with(".wav"));
    }

    #[test]
    fn espeak_root_is_trimmed() {
        assert_eq!(
            sanitize_espeak_root(PathBuf::from("/usr/share/espeak-ng-data")),
            PathBuf::from("/usr/share")
        );
        assert_eq!(
            sanitize_espeak_root(PathBuf::from("/usr/share")),
            PathBuf::from("/usr/share")
        );
    }

    #[test]
    fn onnx_model_resolves_json_config() {
        assert_eq!(
            resolve_piper_config(Path::new("voices/zh.onnx")),
            PathBuf::from("voices/zh.onnx.json")
        );
    }

    #[test]
    fn rate_percent_is_bounded() {
        assert_eq!(rate_to_percent(0.1), 0);
        assert_eq!(rate_to_percent(10.0), 100);
        assert_eq!(rate_to_percent(3.0), 50);
    }

    #[test]
    fn pitch_maps_onto_piper_percent() {
        assert_eq!(pitch_to_percent(0.0), 0);
        assert_eq!(pitch_to_percent(1.0), 50);
        assert_eq!(pitch_to_percent(1.5), 75);
        assert_eq!(pitch_to_percent(9.0), 100);
    }

    #[test]
    fn output_config_carries_only_changed_values() {
        assert!(output_config(1.0, 1.0).is_none());
        let pitched = output_config(1.0, 1.5).expect("pitch changed");
        assert_eq!(pitched.pitch, Some(75));
        assert_eq!(pitched.rate, None);
        let faster = output_config(3.0, 1.0).expect("rate changed");
        assert_eq!(faster.rate, Some(50));
        assert_eq!(faster.pitch, None);
    }
}
