//! Exercise orchestration.
//!
//! Reacts to the upcoming break published by the scheduler, recommends
//! an exercise for it and manages the exercise session around
//! [`SessionEngine`]. History is most-recent-first.

pub mod engine;

pub use engine::{SessionEngine, SessionPhase};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::breaks::BreakScheduler;
use crate::error::CoreError;
use crate::identity::IdentityContext;
use crate::model::{BreakPoint, Exercise, ExerciseResult, User};
use crate::observable::{Observable, Subscription};
use crate::providers::PredictionModel;
use crate::storage::Repository;

pub struct ExerciseOrchestrator {
    repo: Arc<dyn Repository>,
    prediction: Arc<dyn PredictionModel>,
    current_user: Observable<Option<User>>,
    recommended: Observable<Option<Exercise>>,
    history: Observable<Vec<ExerciseResult>>,
    phase: Observable<SessionPhase>,
    last_error: Observable<Option<String>>,
    loading: Observable<bool>,
    engine: Mutex<SessionEngine>,
    _break_sub: Mutex<Option<Subscription>>,
}

impl ExerciseOrchestrator {
    /// Build the orchestrator and subscribe it to upcoming-break
    /// changes.
    pub fn new(
        repo: Arc<dyn Repository>,
        prediction: Arc<dyn PredictionModel>,
        scheduler: &BreakScheduler,
        identity: &IdentityContext,
    ) -> Arc<Self> {
        let orchestrator = Arc::new(Self {
            repo,
            prediction,
            current_user: identity.current_user(),
            recommended: Observable::new(None),
            history: Observable::new(Vec::new()),
            phase: Observable::new(SessionPhase::Idle),
            last_error: Observable::new(None),
            loading: Observable::new(false),
            engine: Mutex::new(SessionEngine::new()),
            _break_sub: Mutex::new(None),
        });

        let weak = Arc::downgrade(&orchestrator);
        let sub = scheduler.upcoming_break().subscribe(move |upcoming| {
            if let Some(orchestrator) = weak.upgrade() {
                match upcoming {
                    Some(point) => orchestrator.on_upcoming_break(point),
                    None => orchestrator.on_break_cleared(),
                }
            }
        });
        *orchestrator
            ._break_sub
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sub);
        orchestrator
    }

    fn on_upcoming_break(&self, point: &BreakPoint) {
        {
            let mut engine = self.lock_engine();
            if !engine.mark_recommending() {
                return; // a running session is never hijacked
            }
        }
        self.phase.set(SessionPhase::Recommending);

        let recommendation = match self.current_user.get() {
            None => None,
            Some(user) => match self.prediction.recommend(&user, point.duration_secs) {
                Ok(list) => list.into_iter().next(),
                Err(err) => {
                    warn!(error = %err, "recommendation unavailable");
                    None
                }
            },
        };
        if let Some(exercise) = &recommendation {
            info!(exercise_id = %exercise.id, "exercise recommended for upcoming break");
        }
        self.recommended.set(recommendation);
    }

    fn on_break_cleared(&self) {
        self.recommended.set(None);
        let phase = {
            let mut engine = self.lock_engine();
            engine.mark_idle();
            engine.phase()
        };
        self.phase.set(phase);
    }

    /// Begin an exercise session.
    ///
    /// # Errors
    /// [`CoreError::InvalidTransition`] while a session is active; the
    /// running session is left untouched.
    pub fn start_exercise(&self, exercise: Exercise) -> Result<(), CoreError> {
        {
            let mut engine = self.lock_engine();
            engine.start(exercise)?;
        }
        self.phase.set(SessionPhase::InProgress);
        Ok(())
    }

    /// Pause the running session. No-op unless in progress.
    pub fn pause_exercise(&self) -> bool {
        let paused = self.lock_engine().pause();
        if paused {
            self.phase.set(SessionPhase::Paused);
        }
        paused
    }

    /// Resume a paused session. No-op unless paused.
    pub fn resume_exercise(&self) -> bool {
        let resumed = self.lock_engine().resume();
        if resumed {
            self.phase.set(SessionPhase::InProgress);
        }
        resumed
    }

    /// End the session: produce exactly one result, prepend it to
    /// history and persist it. A persistence failure keeps the history
    /// entry and surfaces on `last_error`.
    pub async fn stop_exercise(&self) -> Result<ExerciseResult, CoreError> {
        let result = {
            let mut engine = self.lock_engine();
            engine.stop()?
        };
        self.phase.set(SessionPhase::Completed);

        let mut history = self.history.get();
        history.insert(0, result.clone());
        self.history.set(history);

        match self.current_user.get() {
            Some(user) => {
                if let Err(err) = self.repo.save_exercise_result(&user.id, &result).await {
                    warn!(error = %err, "exercise result not persisted");
                    self.last_error.set(Some(err.to_string()));
                }
            }
            None => warn!("no signed-in user, exercise result kept in memory only"),
        }

        {
            let mut engine = self.lock_engine();
            engine.finish();
        }
        self.phase.set(SessionPhase::Idle);
        Ok(result)
    }

    /// Fetch the signed-in user's persisted history, most recent first.
    ///
    /// # Errors
    /// [`CoreError::Auth`] without a user; fetch failures surface on
    /// `last_error` and are returned, but are not fatal to the session.
    pub async fn load_history(&self) -> Result<Vec<ExerciseResult>, CoreError> {
        let Some(user) = self.current_user.get() else {
            return Err(CoreError::Auth("no user signed in".into()));
        };
        self.loading.set(true);
        let fetched = self.repo.fetch_exercise_history(&user.id).await;
        self.loading.set(false);
        match fetched {
            Ok(history) => {
                self.history.set(history.clone());
                Ok(history)
            }
            Err(err) => {
                let err: CoreError = err.into();
                self.last_error.set(Some(err.to_string()));
                Err(err)
            }
        }
    }

    pub fn recommended(&self) -> Observable<Option<Exercise>> {
        self.recommended.clone()
    }

    pub fn history(&self) -> Observable<Vec<ExerciseResult>> {
        self.history.clone()
    }

    pub fn phase(&self) -> Observable<SessionPhase> {
        self.phase.clone()
    }

    pub fn last_error(&self) -> Observable<Option<String>> {
        self.last_error.clone()
    }

    pub fn loading(&self) -> Observable<bool> {
        self.loading.clone()
    }

    fn lock_engine(&self) -> MutexGuard<'_, SessionEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
