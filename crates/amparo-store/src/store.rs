use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use amparo_core::document::validate_document;
use amparo_core::error::{Error, Result};
use amparo_core::policy::{self, Capability};
use amparo_db::Database;
use amparo_db::queries::MarkerPatch;

use amparo_types::models::{Actor, Marker, NewMarker, Status, UNRANKED_INDEX};

use crate::subscription::{Registry, Subscription, Watcher};

/// Who is creating a marker: an anonymous citizen through the public form,
/// or an authenticated actor.
pub enum Creator<'a> {
    Citizen,
    Actor(&'a Actor),
}

/// Authoritative per-city ordered collection of help requests, with live
/// subscription semantics. The store is a low-level primitive: it validates
/// shape, not transition legality — that is the lifecycle engine's job.
pub struct RequestStore {
    db: Arc<Database>,
    watchers: Arc<Registry>,
    next_watcher_id: AtomicU64,
}

impl RequestStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            watchers: Arc::new(Mutex::new(HashMap::new())),
            next_watcher_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Create a marker in a city partition. Authority-verified markers skip
    /// triage and enter the working set directly; everything else starts in
    /// triage. New markers get the unranked sentinel index so they sort last
    /// until a manager orders them.
    pub fn create(&self, city: &str, new: NewMarker, creator: Creator<'_>) -> Result<Marker> {
        if !new.lat.is_finite() || !new.lng.is_finite() {
            return Err(Error::Validation("coordinates must be finite numbers".into()));
        }
        if new.contact.trim().is_empty() {
            return Err(Error::Validation("contact must not be empty".into()));
        }
        if let Some(doc) = new.document.as_deref()
            && !doc.trim().is_empty()
            && !validate_document(doc)
        {
            return Err(Error::Validation("document failed CPF/RG validation".into()));
        }

        if new.is_city_hall {
            match &creator {
                Creator::Citizen => {
                    return Err(Error::Validation(
                        "authority-verified markers require an authenticated authority actor"
                            .into(),
                    ));
                }
                Creator::Actor(actor) => {
                    policy::ensure(actor, Capability::CreateVerified)?;
                    policy::ensure_city(actor, city)?;
                }
            }
        }

        self.db
            .get_city(city)
            .map_err(Error::Transient)?
            .ok_or_else(|| Error::not_found("city", city))?;

        let status = if new.is_city_hall {
            Status::InProgress
        } else {
            Status::Triage
        };

        let marker = Marker {
            id: Uuid::new_v4(),
            city: city.to_string(),
            lat: new.lat,
            lng: new.lng,
            contact: new.contact,
            document: new.document.filter(|d| !d.trim().is_empty()),
            description: new.description,
            needs: new.needs,
            housing: new.housing,
            status,
            index: UNRANKED_INDEX,
            is_city_hall: new.is_city_hall,
            adults: new.adults,
            kids: new.kids,
            elderly: new.elderly,
            pcd: new.pcd,
            image_urls: vec![],
            created_at: Utc::now(),
            updated_at: None,
            updated_by: None,
            update_reason: None,
        };

        self.db.insert_marker(&marker).map_err(Error::Transient)?;
        self.notify(city);
        Ok(marker)
    }

    pub fn get(&self, city: &str, id: Uuid) -> Result<Marker> {
        let row = self
            .db
            .get_marker(city, &id.to_string())
            .map_err(Error::Transient)?
            .ok_or_else(|| Error::not_found("marker", id))?;
        row.into_marker().map_err(Error::Transient)
    }

    /// Low-level field merge. Does not check transition legality; notifies
    /// subscribers of the city.
    pub fn update(&self, city: &str, id: Uuid, patch: &MarkerPatch) -> Result<Marker> {
        let existed = self
            .db
            .update_marker(city, &id.to_string(), patch)
            .map_err(Error::Transient)?;
        if !existed {
            return Err(Error::not_found("marker", id));
        }
        let updated = self.get(city, id)?;
        self.notify(city);
        Ok(updated)
    }

    /// Matching markers ordered by manual rank ascending; markers sharing a
    /// rank come back earliest-created first.
    pub fn query(&self, city: &str, statuses: Option<&[Status]>) -> Result<Vec<Marker>> {
        let rows = self
            .db
            .query_markers(city, statuses)
            .map_err(Error::Transient)?;
        rows.into_iter()
            .map(|row| row.into_marker().map_err(Error::Transient))
            .collect()
    }

    /// Register a live query. The current snapshot is queued before this
    /// returns, so the first `recv` never blocks on a change happening.
    /// Snapshot and registration happen under the registry lock — a write
    /// racing the subscribe either lands in the initial snapshot or is
    /// delivered as the first refresh, never lost between the two.
    pub fn subscribe(&self, city: &str, statuses: Option<Vec<Status>>) -> Result<Subscription> {
        let id = self.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watchers = self.watchers.lock().expect("watcher registry poisoned");
        let snapshot = self.query(city, statuses.as_deref())?;
        let serialized = serde_json::to_string(&snapshot).ok();
        let _ = tx.send(snapshot);
        watchers.insert(
            id,
            Watcher {
                city: city.to_string(),
                statuses,
                tx,
                last: serialized,
            },
        );

        Ok(Subscription::new(id, Arc::clone(&self.watchers), rx))
    }

    /// Recompute and deliver snapshots to every watcher of a city whose
    /// result set actually changed. Serialized under the registry lock so
    /// delivery cannot interleave with subscribe/close.
    fn notify(&self, city: &str) {
        let mut watchers = self.watchers.lock().expect("watcher registry poisoned");
        let mut dead = Vec::new();

        for (&id, watcher) in watchers.iter_mut() {
            if watcher.city != city {
                continue;
            }
            let snapshot = match self.query(city, watcher.statuses.as_deref()) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("snapshot recompute failed for watcher {}: {}", id, e);
                    continue;
                }
            };
            let serialized = serde_json::to_string(&snapshot).ok();
            if serialized.is_some() && serialized == watcher.last {
                continue;
            }
            watcher.last = serialized;
            if watcher.tx.send(snapshot).is_err() {
                dead.push(id);
            }
        }

        for id in dead {
            watchers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amparo_types::models::{HousingStatus, Role};
    use std::collections::BTreeSet;

    fn store() -> RequestStore {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_city(&amparo_types::models::City {
            slug: "agudo".into(),
            name: "Agudo".into(),
            lat: -29.6447,
            lng: -53.2515,
            created_at: Utc::now(),
        })
        .unwrap();
        RequestStore::new(db)
    }

    fn new_marker() -> NewMarker {
        NewMarker {
            lat: -29.6,
            lng: -53.2,
            contact: "Ana - 55999990000".into(),
            document: None,
            description: "casa alagada".into(),
            needs: BTreeSet::new(),
            housing: HousingStatus::Home,
            is_city_hall: false,
            adults: 2,
            kids: 0,
            elderly: 1,
            pcd: false,
        }
    }

    fn city_hall_actor() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            email: "prefeitura@agudo.example".into(),
            role: Role::CityHall,
            city: "agudo".into(),
        }
    }

    #[test]
    fn citizen_creation_enters_triage_unranked() {
        let store = store();
        let marker = store
            .create("agudo", new_marker(), Creator::Citizen)
            .unwrap();
        assert_eq!(marker.status, Status::Triage);
        assert_eq!(marker.index, 100_000_000);
        assert!(!marker.is_city_hall);
    }

    #[test]
    fn authority_creation_skips_triage() {
        let store = store();
        let actor = city_hall_actor();
        let mut new = new_marker();
        new.is_city_hall = true;
        let marker = store
            .create("agudo", new, Creator::Actor(&actor))
            .unwrap();
        assert_eq!(marker.status, Status::InProgress);
        assert!(marker.is_city_hall);
    }

    #[test]
    fn citizen_cannot_claim_authority() {
        let store = store();
        let mut new = new_marker();
        new.is_city_hall = true;
        assert!(matches!(
            store.create("agudo", new, Creator::Citizen),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn helper_cannot_create_verified() {
        let store = store();
        let actor = Actor {
            role: Role::Helping,
            ..city_hall_actor()
        };
        let mut new = new_marker();
        new.is_city_hall = true;
        assert!(matches!(
            store.create("agudo", new, Creator::Actor(&actor)),
            Err(Error::Unauthorized { .. })
        ));
    }

    #[test]
    fn non_finite_coordinates_are_rejected_before_write() {
        let store = store();
        let mut new = new_marker();
        new.lat = f64::NAN;
        assert!(matches!(
            store.create("agudo", new, Creator::Citizen),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn bad_document_is_rejected() {
        let store = store();
        let mut new = new_marker();
        new.document = Some("529.982.247-26".into());
        assert!(matches!(
            store.create("agudo", new, Creator::Citizen),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn unknown_city_partition_is_not_found() {
        let store = store();
        assert!(matches!(
            store.create("atlantida", new_marker(), Creator::Citizen),
            Err(Error::NotFound { kind: "city", .. })
        ));
    }

    #[test]
    fn get_missing_marker_is_not_found() {
        let store = store();
        assert!(matches!(
            store.get("agudo", Uuid::new_v4()),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn query_orders_by_rank_then_age() {
        let store = store();
        // R1 stays in triage; R2 and R3 are in progress with ranks 5 and 3.
        let _r1 = store.create("agudo", new_marker(), Creator::Citizen).unwrap();
        let r2 = store.create("agudo", new_marker(), Creator::Citizen).unwrap();
        let r3 = store.create("agudo", new_marker(), Creator::Citizen).unwrap();

        for (marker, index) in [(&r2, 5), (&r3, 3)] {
            let patch = MarkerPatch {
                status: Some(Status::InProgress),
                index: Some(index),
                ..Default::default()
            };
            store.update("agudo", marker.id, &patch).unwrap();
        }

        let in_progress = store
            .query("agudo", Some(&[Status::InProgress]))
            .unwrap();
        let ids: Vec<Uuid> = in_progress.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![r3.id, r2.id]);
    }

    #[test]
    fn equal_ranks_fall_back_to_creation_order() {
        let store = store();
        let first = store.create("agudo", new_marker(), Creator::Citizen).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.create("agudo", new_marker(), Creator::Citizen).unwrap();

        for marker in [&second, &first] {
            let patch = MarkerPatch {
                status: Some(Status::InProgress),
                index: Some(7),
                ..Default::default()
            };
            store.update("agudo", marker.id, &patch).unwrap();
        }

        let markers = store.query("agudo", Some(&[Status::InProgress])).unwrap();
        assert_eq!(markers[0].id, first.id, "earliest-created wins the tie");
    }

    #[tokio::test]
    async fn working_set_snapshot_is_rank_ordered() {
        let store = store();
        // R1 stays in triage; R2 (rank 5) and R3 (rank 3) are in progress.
        let _r1 = store.create("agudo", new_marker(), Creator::Citizen).unwrap();
        let r2 = store.create("agudo", new_marker(), Creator::Citizen).unwrap();
        let r3 = store.create("agudo", new_marker(), Creator::Citizen).unwrap();
        for (marker, index) in [(&r2, 5), (&r3, 3)] {
            let patch = MarkerPatch {
                status: Some(Status::InProgress),
                index: Some(index),
                ..Default::default()
            };
            store.update("agudo", marker.id, &patch).unwrap();
        }

        let mut sub = store
            .subscribe("agudo", Some(vec![Status::InProgress]))
            .unwrap();
        let snapshot = sub.recv().await.unwrap();
        let ids: Vec<Uuid> = snapshot.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![r3.id, r2.id], "rank 3 before rank 5");
    }

    #[tokio::test]
    async fn subscription_delivers_initial_snapshot_immediately() {
        let store = store();
        store.create("agudo", new_marker(), Creator::Citizen).unwrap();

        let mut sub = store
            .subscribe("agudo", Some(vec![Status::Triage]))
            .unwrap();
        let snapshot = sub.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn subscription_sees_changes_and_filter_exits() {
        let store = store();
        let marker = store.create("agudo", new_marker(), Creator::Citizen).unwrap();

        let mut sub = store
            .subscribe("agudo", Some(vec![Status::Triage]))
            .unwrap();
        assert_eq!(sub.recv().await.unwrap().len(), 1);

        // Approving moves the marker out of the watched status set.
        let patch = MarkerPatch {
            status: Some(Status::InProgress),
            ..Default::default()
        };
        store.update("agudo", marker.id, &patch).unwrap();

        let snapshot = sub.recv().await.unwrap();
        assert!(snapshot.is_empty(), "marker left the filter");
    }

    #[tokio::test]
    async fn unchanged_result_sets_are_not_redelivered() {
        let store = store();
        let triaged = store.create("agudo", new_marker(), Creator::Citizen).unwrap();

        let mut done_watch = store
            .subscribe("agudo", Some(vec![Status::Done]))
            .unwrap();
        assert!(done_watch.recv().await.unwrap().is_empty());

        // A triage-side change is invisible to a done-only watcher.
        let patch = MarkerPatch {
            index: Some(1),
            ..Default::default()
        };
        store.update("agudo", triaged.id, &patch).unwrap();
        assert!(done_watch.try_recv().is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_stops_delivery() {
        let store = store();
        let mut sub = store.subscribe("agudo", None).unwrap();
        assert!(sub.recv().await.is_some());

        sub.close();
        sub.close();

        store.create("agudo", new_marker(), Creator::Citizen).unwrap();
        assert!(sub.recv().await.is_none());
    }
}
