mod common;

use std::fs;

use common::onnx::logistic_model;
use common::{network_spec, sigmoid, vectorizer_spec};
use nima_predict::classifier::model::{Activation, DenseLayerSpec, DenseNetworkSpec};
use nima_predict::{ArtifactPaths, ClassifierError, LoadError, ModelLoader};
use serde_json::json;

fn write_artifacts(dir: &tempfile::TempDir, network: &DenseNetworkSpec) -> ArtifactPaths {
    let model = dir.path().join("model.json");
    let vectorizer = dir.path().join("vectorizer.json");
    fs::write(&model, serde_json::to_vec(network).unwrap()).unwrap();
    fs::write(&vectorizer, serde_json::to_vec(&vectorizer_spec()).unwrap()).unwrap();
    ArtifactPaths::new(model, vectorizer)
}

fn write_onnx_artifacts(dir: &tempfile::TempDir, model_bytes: &[u8]) -> ArtifactPaths {
    let paths = write_artifacts(dir, &network_spec());
    let model = dir.path().join("model.onnx");
    fs::write(&model, model_bytes).unwrap();
    ArtifactPaths::new(model, paths.vectorizer)
}

fn logistic_weights(columns: usize) -> Vec<Vec<f32>> {
    [2.0, 2.0, 2.0, 0.0, -2.0, -2.0]
        .iter()
        .map(|&w| vec![w; columns])
        .collect()
}

#[test]
fn test_loaded_engine_scores_requests() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let engine = ModelLoader::default().load(&write_artifacts(&dir, &network_spec()))?;

    let request = json!({
        "thesis": "Environmental policy in the Amazon",
        "article": ["Market", "finance"],
        "course": {"nome": "Ecologia", "conteudo": "sustainability de ecossistemas"}
    });
    let scores = engine.classify_request(request.as_object().unwrap())?;

    assert_eq!(scores.len(), 3);
    assert_eq!(scores[0].0, "thesis");
    assert!((scores[0].1 - sigmoid(1.0)).abs() < 1e-6);
    assert!((scores[1].1 - sigmoid(-5.0)).abs() < 1e-6);
    assert!((scores[2].1 - sigmoid(1.0)).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_shape_errors_abort_whole_request() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let engine = ModelLoader::default().load(&write_artifacts(&dir, &network_spec()))?;

    let request = json!({"good": "ecology", "bad": {"content": "no title"}});
    let result = engine.classify_request(request.as_object().unwrap());
    assert!(matches!(result, Err(ClassifierError::MissingField { field: "name", .. })));

    let request = json!({"good": "ecology", "bad": 4.5});
    let result = engine.classify_request(request.as_object().unwrap());
    assert!(matches!(result, Err(ClassifierError::TypeMismatch { found: "number", .. })));
    Ok(())
}

#[test]
fn test_deep_network_export() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let hidden = DenseLayerSpec {
        weights: vec![vec![1.0, 0.5]; 6],
        bias: vec![0.0, 0.0],
        activation: Activation::Relu,
    };
    let output = DenseLayerSpec {
        weights: vec![vec![1.0], vec![1.0]],
        bias: vec![-1.0],
        activation: Activation::Sigmoid,
    };
    let network = DenseNetworkSpec { layers: vec![hidden, output] };
    let engine = ModelLoader::default().load(&write_artifacts(&dir, &network))?;

    let scores = engine.classify(&["ecology ecology".to_string(), "nothing".to_string()])?;
    assert!((scores[0] - sigmoid(2.0)).abs() < 1e-6);
    assert!((scores[1] - sigmoid(-1.0)).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_width_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let network = DenseNetworkSpec {
        layers: vec![DenseLayerSpec {
            weights: vec![vec![1.0]; 3],
            bias: vec![0.0],
            activation: Activation::Sigmoid,
        }],
    };
    let result = ModelLoader::default().load(&write_artifacts(&dir, &network));
    assert!(matches!(
        result,
        Err(LoadError::Classifier(ClassifierError::ValidationError(_)))
    ));
}

#[test]
fn test_corrupt_model_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_artifacts(&dir, &network_spec());
    fs::write(&paths.model, b"{\"layers\": [").unwrap();
    assert!(matches!(
        ModelLoader::default().load(&paths),
        Err(LoadError::Classifier(ClassifierError::ModelError(_)))
    ));
}

#[test]
fn test_onnx_model_scores_like_dense_export() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let paths = write_onnx_artifacts(&dir, &logistic_model(&logistic_weights(1), &[-1.0]));
    let engine = ModelLoader::default().load(&paths)?;

    let texts = vec![
        "Environmental policy".to_string(),
        "finance market".to_string(),
        "ecology sustainability".to_string(),
    ];
    let scores = engine.classify(&texts)?;
    assert_eq!(scores.len(), 3);
    assert!((scores[0] - sigmoid(1.0)).abs() < 1e-5);
    assert!((scores[1] - sigmoid(-5.0)).abs() < 1e-5);
    assert!((scores[2] - sigmoid(3.0)).abs() < 1e-5);

    let dense_scores = common::test_engine().classify(&texts)?;
    for (onnx, dense) in scores.iter().zip(dense_scores) {
        assert!((onnx - dense).abs() < 1e-5);
    }
    Ok(())
}

#[test]
fn test_onnx_output_must_have_one_value_per_row() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let paths = write_onnx_artifacts(&dir, &logistic_model(&logistic_weights(2), &[0.0, 0.0]));
    let engine = ModelLoader::default().load(&paths)?;

    let result = engine.classify(&["ecology".to_string(), "market".to_string()]);
    assert!(matches!(result, Err(ClassifierError::PredictionError(_))));
    Ok(())
}

#[test]
fn test_onnx_width_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let weights = vec![vec![1.0]; 4];
    let paths = write_onnx_artifacts(&dir, &logistic_model(&weights, &[0.0]));
    assert!(matches!(
        ModelLoader::default().load(&paths),
        Err(LoadError::Classifier(ClassifierError::ValidationError(_)))
    ));
}

#[test]
fn test_corrupt_onnx_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_onnx_artifacts(&dir, b"definitely not a protobuf model");
    assert!(matches!(
        ModelLoader::default().load(&paths),
        Err(LoadError::Classifier(ClassifierError::ModelError(_)))
    ));
}
