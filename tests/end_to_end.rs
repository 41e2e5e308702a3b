//! Train, persist, reload and score through the public API.

use ledgerscan::{
    Entry, FeatureSchema, FileRegistry, LedgerScanError, ModelConfig, ModelRegistry, ModelTrainer,
    ScoringEngine,
};
use tempfile::tempdir;

/// Daytime debits across a few everyday categories
fn household_history(n: usize) -> Vec<Entry> {
    let categories = ["food", "transport", "shopping", "utilities", "health"];
    (0..n)
        .map(|i| {
            let amount = 12.0 + ((i * 53) % 180) as f64 + (i % 3) as f64 * 0.25;
            let hour = 8 + (i * 7) % 12;
            let minute = (i * 11) % 60;
            Entry::new(
                amount,
                format!("2024-01-{:02}T{:02}:{:02}:00", 1 + i % 28, hour, minute),
            )
            .with_user(format!("user-{}", i % 17))
            .with_category(categories[i % categories.len()])
            .with_type("debit")
        })
        .collect()
}

fn salary() -> Entry {
    Entry::new(15000.0, "2024-03-01T02:13:00")
        .with_user("u-1")
        .with_category("salary")
        .with_type("credit")
        .with_reversal(false)
}

fn groceries() -> Entry {
    Entry::new(60.0, "2024-03-01T12:30:00")
        .with_category("shopping")
        .with_type("debit")
}

#[test]
fn train_save_load_score() {
    let dir = tempdir().unwrap();
    let registry = FileRegistry::with_path(dir.path());
    registry.init().unwrap();

    let trainer = ModelTrainer::new(ModelConfig::default().with_seed(2024), FeatureSchema::default());
    let (model, summary) = trainer
        .train_and_save(&household_history(1000), &registry, "household")
        .unwrap();
    assert_eq!(summary.rows, 1000);
    assert_eq!(registry.list().unwrap(), vec!["household"]);

    let engine = ScoringEngine::load(&registry, "household").unwrap();

    let odd = engine.score_entry(&salary()).unwrap();
    let usual = engine.score_entry(&groceries()).unwrap();
    assert!(odd.is_anomaly, "salary at 02:13 should be anomalous: {:?}", odd);
    assert!(!usual.is_anomaly, "groceries should be normal: {:?}", usual);
    assert!(odd.score > usual.score);

    // Reloaded model scores exactly like the in-memory one
    let vector = model.encoder().encode(&salary()).unwrap();
    assert_eq!(model.evaluate(&vector).unwrap(), odd);
}

#[test]
fn same_seed_same_model() {
    let history = household_history(400);
    let config = ModelConfig::default().with_seed(77).with_trees(60);
    let trainer = ModelTrainer::new(config, FeatureSchema::default());

    let (a, _) = trainer.train(&history).unwrap();
    let (b, _) = trainer.train(&history).unwrap();

    for entry in [salary(), groceries()] {
        let va = a.encoder().encode(&entry).unwrap();
        let vb = b.encoder().encode(&entry).unwrap();
        assert_eq!(a.evaluate(&va).unwrap(), b.evaluate(&vb).unwrap());
    }
}

#[test]
fn missing_model_and_bad_requests() {
    let dir = tempdir().unwrap();
    let registry = FileRegistry::with_path(dir.path());
    assert!(matches!(
        ScoringEngine::load(&registry, "nope"),
        Err(LedgerScanError::ModelNotFound(_))
    ));

    let trainer = ModelTrainer::new(ModelConfig::default().with_seed(5), FeatureSchema::default());
    trainer
        .train_and_save(&household_history(300), &registry, "household")
        .unwrap();
    let engine = ScoringEngine::load(&registry, "household").unwrap();

    let mut undated = groceries();
    undated.timestamp = None;
    let err = engine.score_entry(&undated).unwrap_err();
    assert!(err.is_request_error());

    // The engine keeps serving after a rejected request
    assert!(engine.score_entry(&groceries()).is_ok());
    assert_eq!(engine.stats().requests_rejected, 1);
}

#[test]
fn json_entries_to_json_verdicts() {
    let trainer = ModelTrainer::new(ModelConfig::default().with_seed(11), FeatureSchema::default());
    let (model, _) = trainer.train(&household_history(300)).unwrap();
    let engine = ScoringEngine::from_model("inline", model);

    let entries = Entry::parse_many(
        r#"[
            {"userId": "u-1", "amount": 15000, "timestamp": "2024-03-01T02:13:00",
             "category": "salary", "type": "credit", "isReversal": false},
            {"amount": 40, "timestamp": "2024-03-01T13:05:00", "category": "food", "type": "debit"}
        ]"#,
    )
    .unwrap();

    let verdicts: Vec<_> = engine
        .score_batch(&entries)
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    let json = serde_json::to_value(&verdicts).unwrap();
    assert_eq!(json[0]["isAnomaly"], serde_json::Value::Bool(true));
    assert!(json[1]["score"].as_f64().unwrap() < json[0]["score"].as_f64().unwrap());
}
