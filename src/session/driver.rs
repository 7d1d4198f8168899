//! Runs session effects against a live info source.

use super::state::{Action, Effect, Session};
use crate::api::{load_all_coordinates, ApiError, InfoSource};
use crate::registry::{Activity, Category, Region};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

pub struct Driver<S: ?Sized> {
    source: Arc<S>,
    concurrency: usize,
    honor_delays: bool,
}

impl<S> Driver<S>
where
    S: InfoSource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, concurrency: usize) -> Self {
        Self {
            source,
            concurrency,
            honor_delays: true,
        }
    }

    /// Skip the highlight pause; for batch use where nobody watches the map.
    pub fn without_delays(mut self) -> Self {
        self.honor_delays = false;
        self
    }

    /// Reduce `action`, then run every resulting effect (and the effects
    /// those produce) until the session settles.
    pub async fn dispatch(&self, session: Session, action: Action) -> Session {
        let (mut session, effects) = session.reduce(action);
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            let follow_up = self.run(effect).await;
            let (next, effects) = session.reduce(follow_up);
            session = next;
            queue.extend(effects);
        }
        session
    }

    /// Select a region and optionally its category and activity tabs.
    ///
    /// Only the final selection's outlines are fetched. An activity applies
    /// within a category and is ignored without one.
    pub async fn load_region(&self, region: Region, category: Option<Category>, activity: Option<Activity>) -> Session {
        let Some(category) = category else {
            return self.dispatch(Session::new(), Action::SelectRegion(region)).await;
        };
        let (session, _) = Session::new().reduce(Action::SelectRegion(region));
        let Some(activity) = activity else {
            return self.dispatch(session, Action::SelectCategory(Some(category).into())).await;
        };
        let (session, _) = session.reduce(Action::SelectCategory(Some(category).into()));
        self.dispatch(session, Action::SelectActivity(Some(activity).into())).await
    }

    async fn run(&self, effect: Effect) -> Action {
        match effect {
            Effect::FetchAll(companies) => {
                debug!(count = companies.len(), "running fetch-all");
                let polygons = load_all_coordinates(Arc::clone(&self.source), &companies, self.concurrency).await;
                Action::CoordinatesLoaded(polygons)
            }
            Effect::FetchInfo(company) => {
                let source = Arc::clone(&self.source);
                let location = company.location.clone();
                let result = tokio::task::spawn_blocking(move || source.fetch_info(&location))
                    .await
                    .unwrap_or_else(|e| Err(ApiError::Network(e.to_string())))
                    .map_err(|e| e.user_message());
                Action::InfoLoaded { company, result }
            }
            Effect::Highlight { ring, after } => {
                if self.honor_delays {
                    tokio::time::sleep(after).await;
                }
                Action::HighlightElapsed(ring)
            }
        }
    }
}
