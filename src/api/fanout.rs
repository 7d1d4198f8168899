//! Fetching parcel outlines for many companies at once.

use super::client::InfoSource;
use crate::registry::{Company, FetchedPolygon};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default number of `info.php` requests in flight.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Fetch outlines for every company with at most `concurrency` requests in
/// flight. Results keep the input order. Failed requests and responses
/// without an outline are logged and left out.
pub async fn load_all_coordinates<S>(
    source: Arc<S>,
    companies: &[Company],
    concurrency: usize,
) -> Vec<FetchedPolygon>
where
    S: InfoSource + ?Sized + 'static,
{
    let limit = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, company) in companies.iter().cloned().enumerate() {
        let source = Arc::clone(&source);
        let limit = Arc::clone(&limit);
        tasks.spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else {
                return (index, None);
            };
            let location = company.location.clone();
            let outcome = tokio::task::spawn_blocking(move || source.fetch_info(&location)).await;
            let fetched = match outcome {
                Ok(Ok(info)) => {
                    let polygon = FetchedPolygon::from_info(&company, info);
                    if polygon.is_none() {
                        debug!(company = %company.company_title, location = %company.location, "no outline in response");
                    }
                    polygon
                }
                Ok(Err(e)) => {
                    warn!(company = %company.company_title, location = %company.location, error = %e, "coordinate fetch failed");
                    None
                }
                Err(e) => {
                    warn!(company = %company.company_title, error = %e, "coordinate fetch task aborted");
                    None
                }
            };
            (index, fetched)
        });
    }

    let mut slots: Vec<Option<FetchedPolygon>> = vec![None; companies.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, fetched)) => slots[index] = fetched,
            Err(e) => warn!(error = %e, "coordinate fetch task aborted"),
        }
    }

    let polygons: Vec<FetchedPolygon> = slots.into_iter().flatten().collect();
    info!(requested = companies.len(), fetched = polygons.len(), "loaded coordinates");
    polygons
}

/// Merge by id: an existing entry is replaced in place, a new one appended.
pub fn merge_polygons(existing: &mut Vec<FetchedPolygon>, incoming: Vec<FetchedPolygon>) {
    for polygon in incoming {
        match existing.iter().position(|p| p.id == polygon.id) {
            Some(i) => existing[i] = polygon,
            None => existing.push(polygon),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::registry::LicenseInfo;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeSource {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeSource {
        fn new() -> Self {
            Self { in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0) }
        }
    }

    impl InfoSource for FakeSource {
        fn fetch_info(&self, location: &str) -> Result<LicenseInfo, ApiError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match location {
                "fail" => Err(ApiError::Network("connection reset".into())),
                "empty" => Ok(LicenseInfo::default()),
                other => {
                    let lon: f64 = other.parse().unwrap_or(80.0);
                    Ok(LicenseInfo {
                        nlicense: Some(format!("L-{}", other)),
                        coordinates: json!([[[[lon, 50.0], [lon + 0.1, 50.0], [lon, 50.1]]]]),
                        ..Default::default()
                    })
                }
            }
        }
    }

    fn company(title: &str, location: &str) -> Company {
        Company {
            location: location.into(),
            company_title: title.into(),
            kind: "добыча".into(),
            category: "ОПИ".into(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_keeps_order_and_skips_failures() {
        let source = Arc::new(FakeSource::new());
        let companies = vec![
            company("A", "81"),
            company("B", "fail"),
            company("C", "82"),
            company("D", "empty"),
            company("E", "83"),
        ];

        let polygons = load_all_coordinates(source, &companies, 3).await;
        let ids: Vec<&str> = polygons.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["A-81", "C-82", "E-83"]);
        assert_eq!(polygons[0].coordinates[0], [50.0, 81.0]);
        assert_eq!(polygons[2].data.nlicense.as_deref(), Some("L-83"));
    }

    #[tokio::test]
    async fn test_fan_out_respects_bound() {
        let source = Arc::new(FakeSource::new());
        let companies: Vec<Company> = (0..8).map(|i| company(&format!("T{}", i), &format!("{}", 70 + i))).collect();

        let polygons = load_all_coordinates(Arc::clone(&source), &companies, 2).await;
        assert_eq!(polygons.len(), 8);
        assert_eq!(source.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fan_out_empty_input() {
        let source = Arc::new(FakeSource::new());
        assert!(load_all_coordinates(source, &[], 4).await.is_empty());
    }

    #[test]
    fn test_merge_replaces_in_place() {
        let make = |id: &str, license: &str| FetchedPolygon {
            id: id.into(),
            coordinates: vec![[0.0, 0.0]],
            company: company("X", "1"),
            data: LicenseInfo { nlicense: Some(license.into()), ..Default::default() },
        };

        let mut existing = vec![make("a", "old"), make("b", "old")];
        merge_polygons(&mut existing, vec![make("a", "new"), make("c", "new")]);

        let ids: Vec<&str> = existing.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(existing[0].data.nlicense.as_deref(), Some("new"));
    }
}
