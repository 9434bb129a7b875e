//! Normalization driver
//!
//! Sends one normalization request per classified entity and projects the
//! response onto the category's coding systems. An entity is never lost:
//! when there is nothing to normalize or the service fails, it comes back
//! with an empty coding map.

use std::sync::Arc;

use futures::future::join_all;

use ambient_core::{
    CategorizedEntities, Category, ClassifiedEntity, CodedEntity, NormalizationService,
    NormalizeRequest,
};

use crate::codemap;

/// Drives the normalization service for classified entities
#[derive(Clone)]
pub struct NormalizationDriver {
    service: Arc<dyn NormalizationService>,
}

impl NormalizationDriver {
    pub fn new(service: Arc<dyn NormalizationService>) -> Self {
        Self { service }
    }

    /// Normalize one entity
    pub async fn normalize(&self, entity: ClassifiedEntity, category: Category) -> CodedEntity {
        if entity.code.is_empty() {
            tracing::debug!(entity_id = %entity.entity_id, "No lexical code, skipping normalization");
            return CodedEntity::uncoded(entity);
        }

        let request = NormalizeRequest::for_entity(&entity, category);

        match self.service.normalize(&request).await {
            Ok(response) => {
                let codes = codemap::project(&response, category);
                CodedEntity { entity, codes }
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request.client_request_id,
                    error = %e,
                    "Normalization failed, keeping entity uncoded"
                );
                CodedEntity::uncoded(entity)
            }
        }
    }

    /// Normalize every entity; each list keeps its source order
    pub async fn normalize_all(
        &self,
        entities: CategorizedEntities,
    ) -> CategorizedEntities<CodedEntity> {
        let mut coded = CategorizedEntities::new();

        for (category, list) in entities.into_lists() {
            let results = join_all(
                list.into_iter()
                    .map(|entity| self.normalize(entity, category)),
            )
            .await;

            for entity in results {
                coded.push(category, entity);
            }
        }

        let normalized = [
            &coded.problems,
            &coded.procedures,
            &coded.medications,
            &coded.labs,
        ]
        .iter()
        .flat_map(|list| list.iter())
        .filter(|e| e.is_normalized())
        .count();

        tracing::info!(
            total = coded.total(),
            normalized,
            "Normalization complete"
        );

        coded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambient_core::{AmbientError, CodeMaps, CodingSystem, Result};
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers from a fixed table keyed by input code and records requests
    struct TableService {
        responses: Vec<(&'static str, Value)>,
        seen: Mutex<Vec<NormalizeRequest>>,
    }

    impl TableService {
        fn new(responses: Vec<(&'static str, Value)>) -> Self {
            Self {
                responses,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl NormalizationService for TableService {
        async fn normalize(&self, request: &NormalizeRequest) -> Result<Value> {
            self.seen.lock().unwrap().push(request.clone());
            let code = request.requests[0].input_code.clone();

            // later entities answer first
            if code == "slow" {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }

            self.responses
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| AmbientError::Service(format!("no mapping for {code}")))
        }
    }

    fn entity(text: &str, code: &str) -> ClassifiedEntity {
        ClassifiedEntity {
            text: text.to_string(),
            code: code.to_string(),
            code_system: "IMO".to_string(),
            description: String::new(),
            offset: 0,
            length: text.chars().count() as i64,
            confidence: 0.9,
            context: String::new(),
            entity_id: format!("id-{text}"),
            semantic: "problem".to_string(),
            assertion: "present".to_string(),
            codemaps: CodeMaps::default(),
        }
    }

    fn icd_response(code: &str) -> Value {
        json!({
            "requests": [{ "response": { "items": [{ "metadata": { "mappings": {
                "icd10cm": { "codes": [{ "code": code, "title": format!("title {code}") }] }
            }}}]}}]
        })
    }

    #[tokio::test]
    async fn test_success_projects_codes() {
        let service = Arc::new(TableService::new(vec![("84356", icd_response("I10"))]));
        let driver = NormalizationDriver::new(service.clone());

        let coded = driver
            .normalize(entity("hypertension", "84356"), Category::Problem)
            .await;

        assert_eq!(coded.code(CodingSystem::Icd10Cm), "I10");
        assert_eq!(coded.code(CodingSystem::SnomedInternational), "");
        assert_eq!(coded.entity.code, "84356");

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen[0].client_request_id, "normalize_84356");
        assert_eq!(seen[0].requests[0].domain, "Problem");
    }

    #[tokio::test]
    async fn test_empty_code_skips_service() {
        let service = Arc::new(TableService::new(vec![]));
        let driver = NormalizationDriver::new(service.clone());

        let coded = driver.normalize(entity("aspirin", ""), Category::Medication).await;

        assert!(!coded.is_normalized());
        assert!(service.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_service_error_keeps_entity() {
        let driver = NormalizationDriver::new(Arc::new(TableService::new(vec![])));

        let coded = driver
            .normalize(entity("troponin", "999"), Category::Lab)
            .await;

        assert_eq!(coded.entity.text, "troponin");
        assert_eq!(coded.entity.code, "999");
        assert_eq!(coded.code(CodingSystem::Loinc), "");
        assert!(!coded.is_normalized());
    }

    #[tokio::test]
    async fn test_normalize_all_preserves_order() {
        let service = Arc::new(TableService::new(vec![
            ("slow", icd_response("A00")),
            ("fast", icd_response("B00")),
        ]));
        let driver = NormalizationDriver::new(service);

        let mut entities = CategorizedEntities::new();
        entities.push(Category::Problem, entity("first", "slow"));
        entities.push(Category::Problem, entity("second", "fast"));
        entities.push(Category::Problem, entity("third", "unknown"));
        entities.push(Category::Medication, entity("aspirin", ""));

        let coded = driver.normalize_all(entities).await;

        let texts: Vec<&str> = coded.problems.iter().map(|e| e.entity.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(coded.problems[0].code(CodingSystem::Icd10Cm), "A00");
        assert_eq!(coded.problems[1].code(CodingSystem::Icd10Cm), "B00");
        assert!(!coded.problems[2].is_normalized());
        assert_eq!(coded.medications.len(), 1);
    }
}
