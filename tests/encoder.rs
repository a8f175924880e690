mod common;

use burn_ndarray::NdArrayDevice;
use common::{tiny_config, values, write_caption_model, write_safetensors, TestBackend, TEXT_DIM};
use stackgen::SentenceEncoder;

#[test]
fn embedding_is_deterministic() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_dir = dir.path().join("text_model");
    write_caption_model(&model_dir);
    let config = tiny_config(dir.path());

    let device = NdArrayDevice::default();
    let encoder = SentenceEncoder::<TestBackend>::from_dir(&model_dir, &config.embedding, &device)
        .expect("encoder");
    assert_eq!(encoder.embedding_dim(), TEXT_DIM);

    let texts = vec!["a small bird with red wings".to_string(), "yellow belly".to_string()];
    let first = encoder.embed(&texts).expect("embed");
    let second = encoder.embed(&texts).expect("embed");
    assert_eq!(first.dims(), [2, TEXT_DIM]);
    let first = values(first.to_data());
    assert_eq!(first, values(second.to_data()));
    assert!(first.iter().all(|v| *v >= 0.0));
}

#[test]
fn unknown_words_are_dropped_before_padding() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_dir = dir.path().join("text_model");
    write_caption_model(&model_dir);
    let config = tiny_config(dir.path());

    let device = NdArrayDevice::default();
    let encoder = SentenceEncoder::<TestBackend>::from_dir(&model_dir, &config.embedding, &device)
        .expect("encoder");
    let with_unknown = encoder
        .embed(&["a zebra bird".to_string()])
        .expect("embed");
    let without = encoder.embed(&["a bird".to_string()]).expect("embed");
    assert_eq!(values(with_unknown.to_data()), values(without.to_data()));
}

#[test]
fn missing_model_directory_errors() {
    let device = NdArrayDevice::default();
    let config = stackgen::Config::default();
    let err = SentenceEncoder::<TestBackend>::from_dir(
        "/nonexistent/text_model",
        &config.embedding,
        &device,
    )
    .unwrap_err();
    assert!(err.to_string().contains("Caption model directory not found"));
}

#[test]
fn dense_size_must_match_sentence_length() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_dir = dir.path().join("text_model");
    write_caption_model(&model_dir);
    let mut config = tiny_config(dir.path());
    config.embedding.max_sent_length = 60;

    let device = NdArrayDevice::default();
    let err = SentenceEncoder::<TestBackend>::from_dir(&model_dir, &config.embedding, &device)
        .unwrap_err();
    assert!(err.to_string().contains("dense.weight"), "{err}");
}

#[test]
fn missing_encoder_tensor_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let model_dir = dir.path().join("text_model");
    write_caption_model(&model_dir);
    write_safetensors(
        &model_dir.join("model.safetensors"),
        &[common::FixtureTensor::new("embedding_1/embeddings:0", vec![10, 4])],
    );
    let config = tiny_config(dir.path());

    let device = NdArrayDevice::default();
    let err = SentenceEncoder::<TestBackend>::from_dir(&model_dir, &config.embedding, &device)
        .unwrap_err();
    assert!(err.to_string().contains("Missing tensor"), "{err}");
}
