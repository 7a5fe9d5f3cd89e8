//! End-to-end pipeline behaviour against a mock extractor.

use std::io::Cursor;
use std::sync::Arc;

use assert_matches::assert_matches;
use cadence_core::logging::capture_logs;
use cadence_inference::mock::mock_bundle;
use cadence_inference::{
    AudioFormat, ModelRegistry, PredictError, Predictor, RawAudioBlob, RegistryState, decode,
    normalize,
};
use tracing::Level;

const GENRES: [&str; 5] = ["ambient", "dnb", "house", "techno", "trance"];

fn sine_wav(sample_rate: u32, channels: u16, seconds: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..sample_rate * seconds {
            let t = i as f32 / sample_rate as f32;
            for ch in 0..channels {
                let freq = 110.0 * f32::from(ch + 2);
                let s = (t * freq * std::f32::consts::TAU).sin() * 12_000.0;
                writer.write_sample(s as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn ready() -> (Predictor, Arc<cadence_inference::mock::MockExtractor>) {
    let (extractor, bundle) = mock_bundle(&GENRES, 32).unwrap();
    let registry = Arc::new(ModelRegistry::new());
    let _ = registry.load_with(|| Ok(bundle)).unwrap();
    (Predictor::new(registry), extractor)
}

#[tokio::test]
async fn thirty_second_mono_clip_scores_every_genre() {
    let (predictor, _) = ready();
    let blob = RawAudioBlob::new(sine_wav(16_000, 1, 30), Some(AudioFormat::Wav));

    let result = predictor.predict(blob).await.unwrap();

    assert_eq!(result.all_probabilities.len(), 5);
    let names: Vec<&str> = result.all_probabilities.iter().map(|(g, _)| g.as_str()).collect();
    assert_eq!(names, GENRES);
    let sum: f32 = result.all_probabilities.iter().map(|(_, p)| p).sum();
    assert!((sum - 1.0).abs() < 1e-4);
    let max = result
        .all_probabilities
        .iter()
        .map(|(_, p)| *p)
        .fold(f32::MIN, f32::max);
    assert_eq!(result.confidence, max);
    assert!(GENRES.contains(&result.predicted_genre.as_str()));
}

#[tokio::test]
async fn corrupt_mp3_does_not_poison_the_service() {
    let (predictor, extractor) = ready();
    let calls_before = extractor.calls();

    let corrupt = RawAudioBlob::new(vec![0x42; 10], AudioFormat::infer(Some("song.mp3"), None));
    assert_matches!(predictor.predict(corrupt).await, Err(PredictError::Decode(_)));
    assert_eq!(extractor.calls(), calls_before);

    let valid = RawAudioBlob::new(sine_wav(16_000, 1, 1), Some(AudioFormat::Wav));
    let _ = predictor.predict(valid).await.unwrap();
    assert_eq!(extractor.calls(), calls_before + 1);
    assert_eq!(predictor.registry().state(), RegistryState::Ready);
}

#[tokio::test]
async fn requests_before_loading_are_refused_without_inference() {
    let registry = Arc::new(ModelRegistry::new());
    let predictor = Predictor::new(Arc::clone(&registry));
    let blob = RawAudioBlob::new(sine_wav(16_000, 1, 1), Some(AudioFormat::Wav));

    let (logs, _guard) = capture_logs();
    let err = predictor.predict(blob.clone()).await.unwrap_err();
    assert_matches!(
        err,
        PredictError::ServiceNotReady {
            state: RegistryState::Uninitialized
        }
    );
    assert_eq!(err.code(), "SERVICE_NOT_READY");
    assert!(logs.has_event(Level::WARN, "prediction refused"));

    let (extractor, bundle) = mock_bundle(&GENRES, 8).unwrap();
    let _ = registry.load_with(|| Ok(bundle)).unwrap();
    let probe_calls = extractor.calls();
    let _ = predictor.predict(blob).await.unwrap();
    assert_eq!(extractor.calls(), probe_calls + 1);
}

#[tokio::test]
async fn failed_startup_refuses_with_model_load_failed() {
    let registry = Arc::new(ModelRegistry::new());
    let _ = registry.load_with(|| {
        Err(cadence_inference::LoadError::ModelShapeMismatch(
            "768 != 3840".into(),
        ))
    });
    let predictor = Predictor::new(registry);

    let blob = RawAudioBlob::new(sine_wav(16_000, 1, 1), Some(AudioFormat::Wav));
    let err = predictor.predict(blob).await.unwrap_err();
    assert_eq!(err.code(), "MODEL_LOAD_FAILED");
    assert!(err.to_string().contains("768 != 3840"));
}

#[test]
fn stereo_44k_normalizes_to_16k_mono() {
    let waveform = decode(sine_wav(44_100, 2, 3), Some(AudioFormat::Wav)).unwrap();
    assert_eq!(waveform.channels(), 2);
    assert_eq!(waveform.sample_rate(), 44_100);

    let normalized = normalize(&waveform, 16_000).unwrap();
    assert_eq!(normalized.sample_rate(), 16_000);
    let expected = 3 * 16_000;
    assert!(normalized.len().abs_diff(expected) <= 1, "{}", normalized.len());
}

#[tokio::test]
async fn identical_input_gives_identical_output() {
    let (predictor, _) = ready();
    let bytes = sine_wav(22_050, 2, 2);
    let a = predictor
        .predict(RawAudioBlob::new(bytes.clone(), Some(AudioFormat::Wav)))
        .await
        .unwrap();
    let b = predictor
        .predict(RawAudioBlob::new(bytes, Some(AudioFormat::Wav)))
        .await
        .unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn concurrent_requests_share_one_bundle() {
    let (predictor, extractor) = ready();
    let before = extractor.calls();
    let bytes = sine_wav(16_000, 1, 1);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let predictor = predictor.clone();
            let blob = RawAudioBlob::new(bytes.clone(), Some(AudioFormat::Wav));
            tokio::spawn(async move { predictor.predict(blob).await })
        })
        .collect();

    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap().unwrap());
    }
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(extractor.calls(), before + 8);
}
