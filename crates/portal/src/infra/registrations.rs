//! Cached reader and writer for registrations
//!
//! Reads degrade to an empty list when the backend is unreachable and no
//! cache exists; callers treat an empty list as "unknown", not as a
//! confirmed zero. The write invalidates both read caches because a new
//! registration makes previously read snapshots stale.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use portal_core::RegistrationDraft;
use serde::Serialize;

use crate::infra::{
    CompetitionCatalog, EventBackend, FilePart, FreshCache, ProgressObserver, RegistrationRecord,
    SubmitAck, SubmitError, SubmitRequest,
};

pub struct RegistrationService {
    backend: Arc<dyn EventBackend>,
    catalog: Arc<CompetitionCatalog>,
    cache: FreshCache<Vec<RegistrationRecord>>,
}

#[derive(Serialize)]
struct WireMember<'a> {
    name: &'a str,
    phone: &'a str,
    is_leader: bool,
}

#[derive(Serialize)]
struct WireOfficial<'a> {
    role: &'a str,
    name: &'a str,
    phone: &'a str,
}

impl RegistrationService {
    pub fn new(
        backend: Arc<dyn EventBackend>,
        catalog: Arc<CompetitionCatalog>,
        ttl: Duration,
    ) -> Self {
        Self {
            backend,
            catalog,
            cache: FreshCache::new(ttl),
        }
    }

    /// Previously stored registrations. Same cache policy as the catalog
    /// but with a shorter window, and total failure degrades to an empty
    /// list instead of an error.
    pub async fn pending(&self) -> Vec<RegistrationRecord> {
        if let Some(cached) = self.cache.fresh().await {
            return cached;
        }

        match self.backend.fetch_registrations().await {
            Ok(list) => {
                self.cache.store(list.clone()).await;
                list
            }
            Err(err) => {
                if let Some(stale) = self.cache.any().await {
                    warn!("registrations fetch failed, serving stale cache: {err}");
                    return stale;
                }
                warn!("registrations fetch failed with no cache, treating as unknown: {err}");
                Vec::new()
            }
        }
    }

    /// Submits the draft as one multipart payload. On success both read
    /// caches are invalidated.
    pub async fn submit(
        &self,
        draft: &RegistrationDraft,
        progress: Option<ProgressObserver>,
    ) -> Result<SubmitAck, SubmitError> {
        let request = build_payload(draft)?;
        let ack = self.backend.submit_registration(request, progress).await?;

        info!("registration stored for team '{}'", draft.team_name);
        self.cache.clear().await;
        self.catalog.invalidate().await;

        Ok(ack)
    }
}

/// Flattens the draft into the wire payload the backend expects: scalar
/// fields, two JSON-encoded arrays, and one file field per document slot
/// per person.
fn build_payload(draft: &RegistrationDraft) -> Result<SubmitRequest, SubmitError> {
    let mut request = SubmitRequest::default();

    let competition_id = draft
        .competition
        .as_ref()
        .and_then(|c| c.id)
        // The backend's oldest seeded competition; kept for rows that
        // predate catalog ids.
        .unwrap_or(1);

    request
        .fields
        .push(("competition_id".into(), competition_id.to_string()));
    request
        .fields
        .push(("total_fee".into(), draft.total_fee.to_string()));
    request
        .fields
        .push(("total_members".into(), draft.headcount().to_string()));
    request.fields.push(("name".into(), draft.team_name.clone()));
    if let Some(school) = &draft.school {
        request.fields.push(("school".into(), school.clone()));
    }
    request.fields.push(("email".into(), draft.email.clone()));
    request
        .fields
        .push(("whatsapp".into(), draft.whatsapp.clone()));

    let mut members = vec![WireMember {
        name: &draft.leader.name,
        phone: &draft.leader.phone,
        is_leader: true,
    }];
    members.extend(draft.members.iter().map(|member| WireMember {
        name: &member.name,
        phone: &member.phone,
        is_leader: false,
    }));
    request.fields.push((
        "team_members".into(),
        serde_json::to_string(&members).map_err(client_fault)?,
    ));

    let officials: Vec<WireOfficial> = draft
        .officials
        .iter()
        .map(|official| WireOfficial {
            role: official.role.as_str(),
            name: &official.name,
            phone: &official.phone,
        })
        .collect();
    request.fields.push((
        "officials".into(),
        serde_json::to_string(&officials).map_err(client_fault)?,
    ));

    let mut push_file = |field: String, attachment: &Option<portal_core::Attachment>| {
        if let Some(attachment) = attachment {
            request.files.push(FilePart {
                field,
                attachment: attachment.clone(),
            });
        }
    };

    push_file("leader_photo".into(), &draft.leader.photo);
    push_file("leader_surat".into(), &draft.leader.surat);
    push_file("leader_pakta".into(), &draft.leader.pakta);

    for (idx, member) in draft.members.iter().enumerate() {
        push_file(format!("member_{idx}_photo"), &member.photo);
        push_file(format!("member_{idx}_surat"), &member.surat);
        push_file(format!("member_{idx}_pakta"), &member.pakta);
    }

    for (idx, official) in draft.officials.iter().enumerate() {
        push_file(format!("official_{idx}_photo"), &official.photo);
    }

    Ok(request)
}

fn client_fault(err: serde_json::Error) -> SubmitError {
    SubmitError::Client(format!("could not encode draft: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ApiError;
    use portal_core::{Attachment, Competition, Official, OfficialRole, TeamMember};
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn draft() -> RegistrationDraft {
        let mut competition = Competition::named("Short Movie", 150_000);
        competition.id = Some(4);

        let mut draft = RegistrationDraft {
            competition: Some(competition),
            team_name: "Garuda".into(),
            school: Some("SMA 3".into()),
            email: "kapten@example.com".into(),
            whatsapp: "0812000".into(),
            total_fee: 170_000,
            ..Default::default()
        };
        draft.leader.name = "Sinta".into();
        draft.leader.phone = "0812111".into();
        draft.leader.photo = Some(Attachment::new("foto.png", "image/png", vec![0u8; 4]));
        draft.members.push(TeamMember {
            name: "Joko".into(),
            phone: "0812222".into(),
            surat: Some(Attachment::new("surat.pdf", "application/pdf", vec![1u8; 4])),
            ..Default::default()
        });
        let mut coach = Official::blank(OfficialRole::Coach);
        coach.name = "Pak Budi".into();
        coach.phone = "0813".into();
        draft.officials.push(coach);
        draft
    }

    fn field<'a>(request: &'a SubmitRequest, name: &str) -> &'a str {
        request
            .fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or_else(|| panic!("missing field {name}"))
    }

    #[test]
    fn test_payload_scalars() {
        let request = build_payload(&draft()).unwrap();
        assert_eq!(field(&request, "competition_id"), "4");
        assert_eq!(field(&request, "total_fee"), "170000");
        assert_eq!(field(&request, "total_members"), "2");
        assert_eq!(field(&request, "school"), "SMA 3");
    }

    #[test]
    fn test_payload_member_array_marks_leader() {
        let request = build_payload(&draft()).unwrap();
        let members: Value = serde_json::from_str(field(&request, "team_members")).unwrap();
        assert_eq!(members[0]["name"], "Sinta");
        assert_eq!(members[0]["is_leader"], true);
        assert_eq!(members[1]["is_leader"], false);

        let officials: Value = serde_json::from_str(field(&request, "officials")).unwrap();
        assert_eq!(officials[0]["role"], "coach");
    }

    #[test]
    fn test_payload_file_slots() {
        let request = build_payload(&draft()).unwrap();
        let names: Vec<&str> = request.files.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["leader_photo", "member_0_surat"]);
    }

    struct FakeBackend {
        catalog_fetches: AtomicUsize,
        read_fails: AtomicBool,
        submit_token: Option<String>,
    }

    impl FakeBackend {
        fn new(submit_token: Option<&str>) -> Self {
            Self {
                catalog_fetches: AtomicUsize::new(0),
                read_fails: AtomicBool::new(false),
                submit_token: submit_token.map(String::from),
            }
        }
    }

    #[async_trait::async_trait]
    impl EventBackend for FakeBackend {
        async fn fetch_competitions(&self) -> Result<Vec<Competition>, ApiError> {
            self.catalog_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Competition::named("Band", 150_000)])
        }

        async fn fetch_registrations(&self) -> Result<Vec<RegistrationRecord>, ApiError> {
            if self.read_fails.load(Ordering::SeqCst) {
                return Err(ApiError::Request("backend down".into()));
            }
            Ok(vec![RegistrationRecord {
                id: Some(1),
                ..Default::default()
            }])
        }

        async fn submit_registration(
            &self,
            _request: SubmitRequest,
            _progress: Option<ProgressObserver>,
        ) -> Result<SubmitAck, SubmitError> {
            match &self.submit_token {
                Some(token) => Ok(SubmitAck {
                    snap_token: token.clone(),
                    echo: Value::Null,
                }),
                None => Err(SubmitError::NoResponse),
            }
        }
    }

    fn service(backend: Arc<FakeBackend>) -> (RegistrationService, Arc<CompetitionCatalog>) {
        let catalog = Arc::new(CompetitionCatalog::new(
            backend.clone(),
            Duration::from_secs(300),
        ));
        (
            RegistrationService::new(backend, catalog.clone(), Duration::from_secs(120)),
            catalog,
        )
    }

    #[tokio::test]
    async fn test_pending_degrades_to_empty_list() {
        let backend = Arc::new(FakeBackend::new(None));
        backend.read_fails.store(true, Ordering::SeqCst);
        let (service, _) = service(backend);

        assert!(service.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_pending_serves_stale_cache_on_failure() {
        let backend = Arc::new(FakeBackend::new(None));
        let (service, _) = {
            let catalog = Arc::new(CompetitionCatalog::new(
                backend.clone(),
                Duration::from_secs(300),
            ));
            (
                RegistrationService::new(backend.clone(), catalog.clone(), Duration::ZERO),
                catalog,
            )
        };

        let first = service.pending().await;
        assert_eq!(first.len(), 1);

        backend.read_fails.store(true, Ordering::SeqCst);
        let second = service.pending().await;
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_successful_submit_invalidates_both_caches() {
        let backend = Arc::new(FakeBackend::new(Some("tok-1")));
        let (service, catalog) = service(backend.clone());

        // warm both caches
        catalog.competitions().await.unwrap();
        service.pending().await;
        assert_eq!(backend.catalog_fetches.load(Ordering::SeqCst), 1);

        let ack = service.submit(&draft(), None).await.unwrap();
        assert_eq!(ack.snap_token, "tok-1");

        // catalog refetches because its cache was cleared
        catalog.competitions().await.unwrap();
        assert_eq!(backend.catalog_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_caches_intact() {
        let backend = Arc::new(FakeBackend::new(None));
        let (service, catalog) = service(backend.clone());

        catalog.competitions().await.unwrap();
        let err = service.submit(&draft(), None).await.unwrap_err();
        assert!(matches!(err, SubmitError::NoResponse));

        catalog.competitions().await.unwrap();
        assert_eq!(backend.catalog_fetches.load(Ordering::SeqCst), 1);
    }
}
