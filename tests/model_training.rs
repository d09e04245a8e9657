use approx::assert_abs_diff_eq;

use dense_nn::network::MetricHistory;
use dense_nn::{
    ActivationFunction, CrossEntropyLoss, DatasetLoader, Error, InMemoryLoader, Linear, Matrix, Metric, Model,
    Reduction, Split, TrainConfig,
};

const TOLERANCE: f64 = 1e-9;

fn features() -> Matrix {
    Matrix::from_data(vec![
        vec![4.0, -3.0, 2.0, 4.0],
        vec![6.0, -3.0, 6.0, 1.0],
        vec![5.0, 9.0, 8.0, 3.0],
        vec![8.0, -10.0, 8.0, -7.0],
        vec![0.0, 3.0, 7.0, 5.0],
        vec![7.0, -6.0, 8.0, 8.0],
        vec![1.0, -10.0, -7.0, 5.0],
        vec![-6.0, 5.0, 4.0, -9.0],
        vec![4.0, -3.0, 8.0, 6.0],
        vec![5.0, -9.0, 2.0, 1.0],
    ])
}

fn labels() -> Vec<usize> {
    vec![0, 1, 1, 1, 1, 0, 1, 1, 1, 0]
}

fn classes() -> Vec<String> {
    vec!["0".to_owned(), "1".to_owned()]
}

fn loader(split: f64) -> InMemoryLoader {
    InMemoryLoader::new(features(), labels(), classes(), split).unwrap()
}

/// 4 -> 3 (identity) -> 2 (ReLU) with every weight and bias set to 1.
fn model() -> Model {
    let hidden =
        Linear::from_parameters(Matrix::ones(3, 4), Matrix::ones(1, 3), ActivationFunction::Identity).unwrap();
    let output = Linear::from_parameters(Matrix::ones(2, 3), Matrix::ones(1, 2), ActivationFunction::ReLU).unwrap();
    let mut model = Model::new(vec![hidden, output], CrossEntropyLoss::new(Reduction::Sum)).unwrap();
    model.set_train_metric_types(&["loss", "accuracy"]).unwrap();
    model.set_validation_metric_types(&["loss"]).unwrap();
    model
}

fn losses(model: &Model, validation: bool) -> Vec<f64> {
    let history = if validation {
        model.validation_metrics()
    } else {
        model.train_metrics()
    };
    match &history[&Metric::Loss] {
        MetricHistory::Single(values) => values.clone(),
        MetricHistory::PerClass(_) => panic!("loss history must be scalar"),
    }
}

fn assert_values(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_abs_diff_eq!(a, e, epsilon = TOLERANCE);
    }
}

/// Every hidden unit shares `hidden_row` and `hidden_bias`; output unit `j`
/// has all weights equal to `output_weights[j]`.
fn assert_parameters(model: &Model, hidden_row: [f64; 4], hidden_bias: f64, output_weights: [f64; 2], output_bias: [f64; 2]) {
    let hidden = &model.layers()[0];
    for row in &hidden.weight().data {
        assert_values(row, &hidden_row);
    }
    assert_values(&hidden.bias().data[0], &[hidden_bias; 3]);

    let output = &model.layers()[1];
    for (row, &value) in output.weight().data.iter().zip(&output_weights) {
        assert_values(row, &[value; 3]);
    }
    assert_values(&output.bias().data[0], &output_bias);
}

#[test]
fn forward_matches_hand_computation() {
    let mut model = model();
    let logits = model.forward(&features()).unwrap();
    let expected = Matrix::from_data(
        [25.0, 34.0, 79.0, 1.0, 49.0, 55.0, 0.0, 0.0, 49.0, 1.0]
            .iter()
            .map(|&x| vec![x, x])
            .collect(),
    );
    assert_eq!(logits, expected);
}

#[test]
fn predict_maps_argmax_to_class_names() {
    let mut model = model();
    model.set_classes(classes());
    assert_eq!(model.predict(&Matrix::zeros(1, 4)).unwrap(), vec!["0".to_owned()]);
}

#[test]
fn one_epoch_without_validation() {
    let mut model = model();
    model.train(&loader(1.0), &TrainConfig::new(1, 1, 1e-4)).unwrap();

    assert_values(&losses(&model, false), &[0.6935848934440013]);
    assert!(losses(&model, true).is_empty());
    assert_eq!(model.total_epochs(), 1);
    assert_eq!(model.classes(), classes().as_slice());
    assert_parameters(
        &model,
        [0.999998755067, 1.000002096106, 1.000000522309, 0.999998187911],
        0.9999999267982,
        [0.998065222731, 1.001934777269],
        [0.999912134981, 1.000087865019],
    );
}

#[test]
fn one_epoch_with_validation() {
    let mut model = model();
    model.train(&loader(0.7), &TrainConfig::new(1, 1, 1e-4)).unwrap();

    assert_values(&losses(&model, false), &[0.7016281735019937]);
    assert_values(&losses(&model, true), &[0.6748015101206345]);
    assert_parameters(
        &model,
        [0.999999277295, 1.000000688537, 1.00000001873, 0.999997713475],
        1.000000008979,
        [0.998819881654, 1.001180118346],
        [0.999909294313, 1.000090705687],
    );
}

#[test]
fn three_epochs_with_validation() {
    let mut model = model();
    model.train(&loader(0.7), &TrainConfig::new(3, 1, 1e-4)).unwrap();

    assert_values(
        &losses(&model, false),
        &[0.7016281735019937, 0.6905228054354888, 0.6832302979740017],
    );
    assert_values(
        &losses(&model, true),
        &[0.6748015101206345, 0.6608838491713985, 0.6502008469335846],
    );
    assert_eq!(model.total_epochs(), 3);
    assert_eq!(model.train_metrics()[&Metric::Accuracy].len(), 3);
    assert_parameters(
        &model,
        [0.999999463368, 1.000004564799, 1.000004417718, 0.999989087074],
        1.000000421266,
        [0.997116223774, 1.002883776226],
        [0.999763917669, 1.000236082331],
    );
}

#[test]
fn batches_of_three() {
    let mut model = model();
    model.train(&loader(0.7), &TrainConfig::new(1, 3, 1e-4)).unwrap();

    assert_values(&losses(&model, false), &[1.62205669796401]);
    assert_values(&losses(&model, true), &[2.02241995571785]);
    assert_parameters(
        &model,
        [1.000000065579, 0.999999892849, 1.000000853661, 0.999998408936],
        1.000000123572,
        [0.998776001136, 1.001223998864],
        [0.999907388883, 1.000092611117],
    );
}

#[test]
fn total_epochs_accumulate_across_runs() {
    let mut model = model();
    let loader = loader(0.7);
    model.train(&loader, &TrainConfig::new(2, 1, 1e-4)).unwrap();
    model.train(&loader, &TrainConfig::new(3, 1, 1e-4)).unwrap();
    assert_eq!(model.total_epochs(), 5);
    assert_eq!(losses(&model, false).len(), 5);
    assert_eq!(losses(&model, true).len(), 5);
}

#[test]
fn trained_model_survives_json_round_trip() {
    let mut model = model();
    model.train(&loader(0.7), &TrainConfig::new(1, 1, 1e-4)).unwrap();

    let restored = Model::from_json(&model.to_json().unwrap()).unwrap();
    assert_eq!(restored, model);
    assert_eq!(restored.total_epochs(), 1);
    assert_eq!(restored.classes(), model.classes());
    assert_values(&losses(&restored, false), &losses(&model, false));
    assert_values(&losses(&restored, true), &losses(&model, true));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trained.json");
    model.save(&path).unwrap();
    assert_eq!(Model::load(&path).unwrap(), model);
}

#[test]
fn eval_toggle_clears_cached_inputs() {
    let mut model = model();
    model.forward(&features()).unwrap();
    model.set_eval(true);
    model.set_eval(false);
    let grad = Matrix::ones(10, 2);
    assert!(matches!(
        model.layers()[1].backward(&grad),
        Err(Error::BackwardCalledWithNoInput)
    ));
}

#[test]
fn test_reports_loss_and_confusion() {
    let mut model = model();
    model.set_classes(classes());
    let loader = loader(1.0);
    let batcher = loader.batcher(Split::Train, 4).unwrap();
    let (loss, confusion) = model.test(batcher.as_ref()).unwrap();

    // Both logits are equal for every sample, so each batch loss is
    // rows * ln 2 under the sum reduction and every prediction is class 0.
    let ln2 = std::f64::consts::LN_2;
    assert_abs_diff_eq!(loss, (4.0 + 4.0 + 2.0) * ln2 / 3.0, epsilon = 1e-12);
    assert_eq!(confusion.counts(), &[vec![3, 7], vec![0, 0]]);
    assert!(!model.eval());
}

#[test]
fn loader_without_classes_fails() {
    let mut model = model();
    let empty = InMemoryLoader::new(Matrix::zeros(0, 4), vec![], vec![], 1.0).unwrap();
    assert!(matches!(
        model.train(&empty, &TrainConfig::new(1, 1, 1e-4)),
        Err(Error::InvalidNumberOfClasses(0))
    ));
    assert_eq!(model.total_epochs(), 0);
}
