mod common;

use common::{daily_records, model_store};
use spend_forecast::{
    forecast::{
        aggregate, backend::SeasonalModel, ForecastBackend, LinearBackend, ModelKind,
        SeasonalBackend, TrainedModel,
    },
    ledger::Frequency,
    storage::ModelStore,
};

#[test]
fn trained_models_roundtrip_exactly() {
    let store = model_store();
    let series = aggregate(
        &daily_records(45, |i| 17.3 + 0.37 * i as f64 + (i % 7) as f64 / 3.0),
        Frequency::Day,
    )
    .expect("aggregate");

    let linear = LinearBackend::new().train(&series).expect("linear fit");
    store.save("linear_expense", &linear).expect("save linear");
    assert_eq!(store.load("linear_expense", ModelKind::Linear).expect("load"), Some(linear));

    // Seasonal models are trained directly so the check holds with the engine switched off.
    let seasonal = TrainedModel::Seasonal(SeasonalModel::fit(&series).expect("seasonal fit"));
    store.save("seasonal_expense", &seasonal).expect("save seasonal");
    let loaded = store
        .load("seasonal_expense", ModelKind::Seasonal)
        .expect("load")
        .expect("stored model");
    assert_eq!(loaded, seasonal);
    assert_eq!(
        loaded.predict(5, Frequency::Day).expect("predict"),
        seasonal.predict(5, Frequency::Day).expect("predict")
    );
}

#[test]
fn save_overwrites_and_remove_deletes() {
    let store = model_store();
    let short = aggregate(&daily_records(5, |i| i as f64 + 1.0), Frequency::Day).expect("aggregate");
    let long = aggregate(&daily_records(9, |i| i as f64 + 1.0), Frequency::Day).expect("aggregate");
    let backend = LinearBackend::new();

    store
        .save("budget", &backend.train(&short).expect("fit"))
        .expect("save");
    store
        .save("budget", &backend.train(&long).expect("fit"))
        .expect("overwrite");
    let stored = store
        .load("budget", ModelKind::Linear)
        .expect("load")
        .expect("stored model");
    assert_eq!(stored.training_length(), 9);

    let listed = store.list().expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].kind, ModelKind::Linear);

    assert!(store.remove("budget", ModelKind::Linear).expect("remove"));
    assert_eq!(store.load("budget", ModelKind::Linear).expect("load"), None);
}

#[test]
fn backend_rejects_foreign_artifacts() {
    let series = aggregate(&daily_records(10, |i| i as f64 + 2.0), Frequency::Day).expect("aggregate");
    let linear = LinearBackend::new().train(&series).expect("fit");
    let seasonal = SeasonalBackend::new(true);
    if seasonal.is_available() {
        assert!(seasonal.predict(&linear, 3, Frequency::Day).is_err());
    }
    assert!(LinearBackend::new().predict(&linear, 3, Frequency::Day).is_ok());
}
