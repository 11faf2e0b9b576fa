// End-to-end: registry on disk -> batch review -> response log -> feedback

use serde_json::json;
use std::fs;
use subscription_review::{
    BatchReviewer, Classification, Decision, DecisionEngine, Feedback, FeedbackLoop,
    RegistryStore, ResponseLog, ReviewConfig,
};
use tempfile::tempdir;

fn questionnaire(id: &str) -> serde_json::Value {
    json!({
        "questionnaire_id": id,
        "investor_name": "Maria Lopez",
        "investor_address": "44 Elm Road, Austin",
        "investment_amount": 150000.0,
        "is_accredited_investor": true,
        "accreditation_details": "Annual income above $300k for the last two years",
        "source_of_funds_description": "Savings from employment",
        "tax_id_provided": true,
        "signature_present": true,
        "submission_date": "2024-05-20",
        "investor_type": "individual"
    })
}

fn seed_registry(path: &std::path::Path) {
    let mut store = RegistryStore::load(path).unwrap();
    store.add_keyword("vague_terms", "tbd", None).unwrap();
    store.add_keyword("high_risk_sources", "crypto", Some("Digital assets")).unwrap();
    store.add_pattern("pending", "Pending status").unwrap();
}

#[test]
fn test_batch_classifies_every_branch() {
    let dir = tempdir().unwrap();
    let config = ReviewConfig {
        registry_path: dir.path().join("suspicious_keywords.json"),
        response_path: dir.path().join("response.json"),
        feedback_path: dir.path().join("feedback.json"),
        ..ReviewConfig::default()
    };
    seed_registry(&config.registry_path);

    let mut approve = questionnaire("Q-APPROVE");
    approve["source_of_funds_description"] = json!("Outbid at auction, used savings instead");

    let mut missing = questionnaire("Q-MISSING");
    missing["signature_present"] = json!(false);
    missing["investor_address"] = json!("  ");
    missing["source_of_funds_description"] = json!("crypto, amount tbd");

    let mut zero = questionnaire("Q-ZERO");
    zero["investment_amount"] = json!(0.0);

    let mut unaccredited = questionnaire("Q-UNACCREDITED");
    unaccredited["is_accredited_investor"] = json!(false);

    let mut pending = questionnaire("Q-PENDING");
    pending["accreditation_details"] = json!("status pending review");

    let mut keyword = questionnaire("Q-KEYWORD");
    keyword["source_of_funds_description"] = json!("Gains from Crypto trading");

    let broken = json!({ "questionnaire_id": "Q-BROKEN", "investor_name": "Half a record" });

    let input = dir.path().join("questionnaire.json");
    fs::write(
        &input,
        serde_json::to_vec_pretty(&json!([
            approve, missing, zero, unaccredited, pending, keyword, broken
        ]))
        .unwrap(),
    )
    .unwrap();

    let engine = DecisionEngine::new(config.policy().unwrap());
    let mut store = RegistryStore::load(&config.registry_path).unwrap();
    let log = ResponseLog::new(&config.response_path);

    let summary = BatchReviewer::new(&engine, &mut store, &log)
        .review_file(&input)
        .unwrap();

    assert_eq!(summary.total, 7);
    assert_eq!(summary.succeeded, 6);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors[0].questionnaire_id, "Q-BROKEN");
    assert_eq!((summary.approved, summary.returned, summary.escalated), (1, 2, 3));

    let decisions = log.entries().unwrap();
    assert_eq!(
        decisions,
        vec![
            Decision::approved("Q-APPROVE"),
            Decision::returned(
                "Q-MISSING",
                vec!["investor_address".to_string(), "signature_present".to_string()]
            ),
            Decision::returned("Q-ZERO", vec!["investment_amount".to_string()]),
            Decision::escalated("Q-UNACCREDITED", None),
            Decision::escalated("Q-PENDING", Some("Ambiguous source of funds".to_string())),
            Decision::escalated("Q-KEYWORD", Some("Ambiguous source of funds".to_string())),
        ]
    );

    // Written document uses nulls, not empty lists
    let raw: serde_json::Value =
        serde_json::from_slice(&fs::read(&config.response_path).unwrap()).unwrap();
    assert_eq!(raw[0]["missing_fields"], serde_json::Value::Null);
    assert_eq!(raw[0]["escalation_reason"], serde_json::Value::Null);
}

#[test]
fn test_feedback_changes_later_reviews() {
    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("suspicious_keywords.json");
    seed_registry(&registry_path);

    let engine = DecisionEngine::default();
    let log = ResponseLog::new(dir.path().join("response.json"));

    let mut q = questionnaire("Q-SHELL");
    q["source_of_funds_description"] = json!("Transfer from a shell company in Panama");
    let input = dir.path().join("questionnaire.json");
    fs::write(&input, serde_json::to_vec(&json!([q.clone()])).unwrap()).unwrap();

    // The batch holds its own store handle for the whole run
    let mut batch_store = RegistryStore::load(&registry_path).unwrap();

    let first = BatchReviewer::new(&engine, &mut batch_store, &log)
        .review_file(&input)
        .unwrap();
    assert_eq!(first.approved, 1);

    // Reviewer says this should have been escalated
    let mut feedback_store = RegistryStore::load(&registry_path).unwrap();
    let feedback_loop = FeedbackLoop::new(dir.path().join("feedback.json"));
    let record = feedback_loop
        .submit(
            &mut feedback_store,
            Feedback::new(
                serde_json::from_value(q).unwrap(),
                Classification::Approve,
                Classification::Escalate,
                "Funds routed via a shell company",
            ),
        )
        .unwrap();
    assert_eq!(record.learned_terms, vec!["shell"]);

    // The batch handle notices the registry changed on disk
    let second = BatchReviewer::new(&engine, &mut batch_store, &log)
        .review_file(&input)
        .unwrap();
    assert_eq!(second.escalated, 1);

    let history = log.find("Q-SHELL").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].decision, Classification::Approve);
    assert_eq!(history[1].decision, Classification::Escalate);

    // Seeded entries survived the feedback write
    let merged = RegistryStore::load(&registry_path).unwrap();
    assert!(merged.all_keywords().contains("tbd"));
    assert!(merged.all_keywords().contains("shell"));
    assert_eq!(feedback_loop.log().len().unwrap(), 1);
}

#[test]
fn test_same_snapshot_gives_identical_bytes() {
    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("suspicious_keywords.json");
    seed_registry(&registry_path);

    let store = RegistryStore::load(&registry_path).unwrap();
    let engine = DecisionEngine::default();

    let mut value = questionnaire("Q-REPEAT");
    value["source_of_funds_description"] = json!("Sale of property, remainder TBD");
    let q = serde_json::from_value(value).unwrap();

    let a = serde_json::to_vec(&engine.evaluate(&q, &store.snapshot()).unwrap()).unwrap();
    let b = serde_json::to_vec(&engine.evaluate(&q, &store.snapshot()).unwrap()).unwrap();

    assert_eq!(a, b);
}

#[test]
fn test_hand_edited_bad_pattern_does_not_block_reviews() {
    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("suspicious_keywords.json");
    fs::write(
        &registry_path,
        serde_json::to_vec_pretty(&json!({
            "keywords": {},
            "patterns": [
                { "pattern": "(unclosed", "description": "typo" },
                { "pattern": "pending", "description": "Pending status" }
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    let mut pending = questionnaire("Q-PENDING");
    pending["accreditation_details"] = json!("status pending review");
    let input = dir.path().join("questionnaire.json");
    fs::write(
        &input,
        serde_json::to_vec(&json!([questionnaire("Q-OK"), pending])).unwrap(),
    )
    .unwrap();

    let engine = DecisionEngine::default();
    let log = ResponseLog::new(dir.path().join("response.json"));
    let mut store = RegistryStore::load(&registry_path).unwrap();

    let summary = BatchReviewer::new(&engine, &mut store, &log)
        .review_file(&input)
        .unwrap();
    assert_eq!((summary.approved, summary.escalated, summary.failed), (1, 1, 0));

    // The broken entry can still be removed through the store
    assert!(store.remove_pattern("(unclosed").unwrap());
    let repaired = RegistryStore::load(&registry_path).unwrap();
    assert_eq!(repaired.all_patterns(), vec!["pending".to_string()]);
}
