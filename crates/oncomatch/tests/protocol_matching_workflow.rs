//! Integration scenarios for the protocol matching workflow.
//!
//! Scenarios load a protocol catalog, match patients through the public service facade and HTTP
//! router, and export the ranked results, without reaching into private modules.

mod common {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use oncomatch::matching::{
        MatchingEngine, MatchingSettings, PatientId, PatientProfile, PatientRepository,
        ProtocolCatalog, ProtocolFilters, ProtocolMatchingService, ProtocolRepository,
        RepositoryError, TreatmentProtocol,
    };

    const CATALOG: &str = r#"[
        {
            "id": "nsclc-osimertinib",
            "name": "Osimertinib monotherapy",
            "cancer_types": ["lung_adenocarcinoma"],
            "line_of_therapy": 1,
            "treatment_intent": "palliative",
            "evidence_level": "A",
            "eligibility": {
                "stages": ["IV"],
                "ecog_range": { "min": 0, "max": 2 },
                "age_range": { "min": 18, "max": 90 }
            },
            "biomarker_requirements": [
                { "biomarker_id": "EGFR", "required_status": "positive" }
            ],
            "drugs": [{ "name": "osimertinib", "drug_class": "EGFR TKI" }],
            "toxicity": { "grade_3_4_rate": 0.18 }
        },
        {
            "id": "nsclc-carbo-pemetrexed",
            "name": "Carboplatin and pemetrexed",
            "cancer_types": ["lung_adenocarcinoma", "non_small_cell_lung_cancer"],
            "line_of_therapy": 1,
            "evidence_level": "B",
            "eligibility": {
                "stages": ["IV"],
                "ecog_range": { "min": 0, "max": 2 },
                "organ_function": { "creatinine_max": 1.5 }
            },
            "drugs": [
                { "name": "carboplatin", "drug_class": "platinum" },
                { "name": "pemetrexed", "drug_class": "antifolate" }
            ],
            "toxicity": { "grade_3_4_rate": 0.3 }
        },
        {
            "id": "nsclc-pembrolizumab",
            "name": "Pembrolizumab monotherapy",
            "cancer_types": ["lung_adenocarcinoma"],
            "line_of_therapy": 1,
            "evidence_level": "A",
            "eligibility": { "stages": ["IV"], "ecog_range": { "min": 0, "max": 1 } },
            "drugs": [{ "name": "pembrolizumab", "drug_class": "PD-1 inhibitor" }],
            "contraindications": [
                {
                    "condition": "autoimmune disease",
                    "impact": "absolute",
                    "alternative_approach": "Chemotherapy doublet"
                }
            ]
        },
        {
            "id": "breast-ac-t",
            "name": "Doxorubicin, cyclophosphamide then paclitaxel",
            "cancer_types": ["breast_cancer"],
            "line_of_therapy": 1,
            "evidence_level": "A"
        }
    ]"#;

    pub(super) fn catalog() -> Vec<TreatmentProtocol> {
        ProtocolCatalog::from_reader(Cursor::new(CATALOG)).expect("catalog parses")
    }

    pub(super) fn patient() -> PatientProfile {
        serde_json::from_value(json!({
            "patient_id": "pt-7731",
            "demographics": { "age": 67, "sex": "male" },
            "disease_status": {
                "primary_cancer_type": "lung_adenocarcinoma",
                "stage": "Stage IV",
                "biomarkers": { "EGFR": { "status": "positive", "value": "exon 19 deletion" } }
            },
            "performance": { "ecog": 1 },
            "laboratory": {
                "renal": { "creatinine": 1.1 },
                "hepatic": { "bilirubin": 0.7 },
                "hematologic": { "anc": 2.8 }
            },
            "comorbidities": [
                { "condition": "rheumatoid arthritis", "severity": "moderate", "impact": "significant" }
            ]
        }))
        .expect("patient fixture deserializes")
    }

    pub(super) struct CatalogRepository {
        protocols: Vec<TreatmentProtocol>,
    }

    #[async_trait]
    impl ProtocolRepository for CatalogRepository {
        async fn fetch_protocols(
            &self,
            filters: &ProtocolFilters,
        ) -> Result<Vec<TreatmentProtocol>, RepositoryError> {
            Ok(self
                .protocols
                .iter()
                .filter(|protocol| filters.admits(protocol))
                .cloned()
                .collect())
        }
    }

    #[derive(Default, Clone)]
    pub(super) struct MemoryPatients {
        records: Arc<Mutex<HashMap<PatientId, PatientProfile>>>,
    }

    #[async_trait]
    impl PatientRepository for MemoryPatients {
        async fn fetch_patient(
            &self,
            id: &PatientId,
        ) -> Result<Option<PatientProfile>, RepositoryError> {
            Ok(self.records.lock().expect("lock").get(id).cloned())
        }

        async fn update_patient(&self, patient: PatientProfile) -> Result<(), RepositoryError> {
            self.records
                .lock()
                .expect("lock")
                .insert(patient.patient_id.clone(), patient);
            Ok(())
        }
    }

    pub(super) fn build_service() -> ProtocolMatchingService<CatalogRepository, MemoryPatients> {
        let repository = Arc::new(CatalogRepository {
            protocols: catalog(),
        });
        let engine = MatchingEngine::new(repository, MatchingSettings::default());
        ProtocolMatchingService::new(Arc::new(engine), Arc::new(MemoryPatients::default()))
    }

    pub(super) use MemoryPatients as Patients;
}

mod matching {
    use super::common::*;
    use oncomatch::matching::{ConfidenceLevel, MatchingRequest, ProtocolId};

    #[tokio::test]
    async fn targeted_therapy_ranks_first_for_egfr_positive_patient() {
        let service = build_service();
        let results = service
            .match_profile(&patient(), &MatchingRequest::default())
            .await
            .expect("matching succeeds");

        let ids: Vec<&str> = results.iter().map(|result| result.protocol_id.0.as_str()).collect();
        assert_eq!(ids.len(), 3, "breast protocol is never a candidate: {ids:?}");
        assert_eq!(ids[0], "nsclc-osimertinib");
        assert!(results
            .windows(2)
            .all(|pair| pair[0].match_score >= pair[1].match_score));

        let top = &results[0];
        assert!(top.eligibility.eligible);
        assert!(top.contraindications.is_empty());
        assert!(top
            .alternative_protocols
            .contains(&ProtocolId("nsclc-carbo-pemetrexed".to_string())));
        assert!(!top
            .alternative_protocols
            .contains(&ProtocolId("nsclc-pembrolizumab".to_string())));
    }

    #[tokio::test]
    async fn absolute_contraindication_is_reported_then_excludable() {
        let service = build_service();
        let results = service
            .match_profile(&patient(), &MatchingRequest::default())
            .await
            .expect("matching succeeds");

        let immunotherapy = results
            .iter()
            .find(|result| result.protocol_id.0 == "nsclc-pembrolizumab")
            .expect("immunotherapy is still reported");
        assert!(immunotherapy.has_absolute_contraindication());
        assert_eq!(immunotherapy.confidence, ConfidenceLevel::VeryLow);
        assert!(immunotherapy.rationale.contains("absolute contraindication"));
        assert!(immunotherapy.contraindications[0]
            .alternative_approaches
            .contains(&"Chemotherapy doublet".to_string()));

        let filtered = service
            .match_profile(
                &patient(),
                &MatchingRequest::default().excluding_contraindicated(),
            )
            .await
            .expect("matching succeeds");
        let ids: Vec<&str> = filtered.iter().map(|result| result.protocol_id.0.as_str()).collect();
        assert_eq!(ids, vec!["nsclc-osimertinib", "nsclc-carbo-pemetrexed"]);
    }

    #[tokio::test]
    async fn stored_patient_is_matched_after_update() {
        let service = build_service();
        let patient = patient();
        service
            .update_patient(patient.clone())
            .await
            .expect("update succeeds");

        let results = service
            .match_patient(&patient.patient_id, &MatchingRequest::default().with_max_results(1))
            .await
            .expect("matching succeeds");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].protocol_id.0, "nsclc-osimertinib");
    }
}

mod reporting {
    use super::common::*;
    use oncomatch::matching::report::render_results;
    use oncomatch::matching::MatchingRequest;

    #[tokio::test]
    async fn csv_report_lists_ranked_rows() {
        let service = build_service();
        let results = service
            .match_profile(
                &patient(),
                &MatchingRequest::default().excluding_contraindicated(),
            )
            .await
            .expect("matching succeeds");

        let report = render_results(&results).expect("report renders");
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines[0],
            "Rank,Protocol,Name,Evidence,Match Score,Confidence,Eligible,Risk Level,Contraindications,Required Assessments,Alternatives"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1,nsclc-osimertinib,Osimertinib monotherapy,A,"));
        assert!(lines[2].starts_with("2,nsclc-carbo-pemetrexed,"));
    }
}

mod routing {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use oncomatch::matching::matching_router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn build_router() -> axum::Router {
        matching_router::<_, Patients>(Arc::new(build_service()))
    }

    #[tokio::test]
    async fn post_matching_returns_results_for_snapshot() {
        let router = build_router();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/matching")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({
                    "patient": patient(),
                    "options": { "exclude_contraindicated": true, "minimum_evidence_level": "A" }
                }))
                .expect("serialize payload"),
            ))
            .expect("request");

        let response = router.oneshot(request).await.expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("patient_id"), Some(&json!("pt-7731")));
        let results = payload
            .get("results")
            .and_then(Value::as_array)
            .expect("results");
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].get("protocol_id"),
            Some(&json!("nsclc-osimertinib"))
        );
    }

    #[tokio::test]
    async fn unknown_stored_patient_is_not_found() {
        let router = build_router();
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/patients/pt-unknown/matches")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
