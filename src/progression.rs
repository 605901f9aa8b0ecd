use crate::curriculum::{Curriculum, CurriculumError, Lesson, Level, LevelBuckets, PlanParams};
use crate::session::{MismatchPolicy, Session};
use crate::storage::{self, keys, KvStore};
use serde::{Deserialize, Serialize};

/// Where the learner sits in a course.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressionState {
    /// Plan requested, nothing to type yet.
    Loading,
    /// Working through the lesson at (module, lesson).
    Active { module: usize, lesson: usize },
    /// Every lesson in the plan is done.
    Complete,
    /// The plan broke mid-course (e.g. an empty module was reached).
    Error(String),
}

/// Read-only progress summary for display and persistence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current_module_index: usize,
    pub current_lesson_index: usize,
    pub completed_lessons: usize,
    pub total_lessons: usize,
}

/// The persisted unit: the plan, the parameters it answered, and how far
/// the learner got.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedPlan {
    pub params: PlanParams,
    pub curriculum: Curriculum,
    pub progress: ProgressSnapshot,
}

/// Drives advancement through a curriculum, persisting progress after
/// every completed lesson.
#[derive(Debug)]
pub struct ProgressionController {
    params: PlanParams,
    curriculum: Curriculum,
    state: ProgressionState,
    buckets: LevelBuckets,
}

impl ProgressionController {
    /// Start a fresh run at the first lesson. Only the starting position
    /// is checked here; later modules are validated as they are reached,
    /// so a plan that degrades mid-course fails at the transition rather
    /// than up front.
    pub fn new(params: PlanParams, curriculum: Curriculum, buckets: LevelBuckets) -> Self {
        let state = match curriculum.lesson(0, 0) {
            Some(_) => ProgressionState::Active {
                module: 0,
                lesson: 0,
            },
            None => ProgressionState::Error("plan has no starting lesson".into()),
        };
        Self {
            params,
            curriculum,
            state,
            buckets,
        }
    }

    /// Resume from a saved plan. Returns `None` when the saved plan does
    /// not answer `params`, fails structural validation, or points past
    /// the curriculum it carries; the caller then starts fresh.
    pub fn restore(saved: SavedPlan, params: &PlanParams, buckets: LevelBuckets) -> Option<Self> {
        if !saved.params.answers(params) {
            return None;
        }
        saved.curriculum.validate().ok()?;

        let progress = saved.progress;
        let state = if progress.completed_lessons >= saved.curriculum.total_lessons() {
            ProgressionState::Complete
        } else {
            saved
                .curriculum
                .lesson(progress.current_module_index, progress.current_lesson_index)?;
            ProgressionState::Active {
                module: progress.current_module_index,
                lesson: progress.current_lesson_index,
            }
        };

        Some(Self {
            params: saved.params,
            curriculum: saved.curriculum,
            state,
            buckets,
        })
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn params(&self) -> &PlanParams {
        &self.params
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    pub fn current_lesson(&self) -> Option<&Lesson> {
        match self.state {
            ProgressionState::Active { module, lesson } => self.curriculum.lesson(module, lesson),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = self.curriculum.total_lessons();
        match self.state {
            ProgressionState::Active { module, lesson } => ProgressSnapshot {
                current_module_index: module,
                current_lesson_index: lesson,
                completed_lessons: self.curriculum.lessons_before_module(module) + lesson,
                total_lessons: total,
            },
            ProgressionState::Complete => ProgressSnapshot {
                current_module_index: self.curriculum.modules.len().saturating_sub(1),
                current_lesson_index: 0,
                completed_lessons: total,
                total_lessons: total,
            },
            _ => ProgressSnapshot {
                current_module_index: 0,
                current_lesson_index: 0,
                completed_lessons: 0,
                total_lessons: total,
            },
        }
    }

    /// A fresh typing session for the current lesson, with the mismatch
    /// policy the lesson's target pace calls for.
    pub fn session_for_current(&self) -> Option<Session> {
        let lesson = self.current_lesson()?;
        Some(Session::new(
            &lesson.content,
            self.policy_for_lesson(lesson),
        ))
    }

    /// Intermediate-pace lessons advance past mistakes so flow can build;
    /// everything else blocks until the right key is hit.
    pub fn policy_for_lesson(&self, lesson: &Lesson) -> MismatchPolicy {
        match Level::from_wpm(lesson.target_wpm, &self.buckets) {
            Level::Intermediate => MismatchPolicy::Advance,
            _ => MismatchPolicy::Block,
        }
    }

    /// Mark the current lesson done and move to the next, persisting the
    /// new position. Each transition re-checks the lesson it lands on, so
    /// an empty module reached mid-course turns into an `Error` state
    /// instead of a panic. No-op outside `Active`.
    pub fn advance(&mut self, store: &dyn KvStore) -> Result<(), CurriculumError> {
        let (module, lesson) = match self.state {
            ProgressionState::Active { module, lesson } => (module, lesson),
            _ => return Ok(()),
        };

        let current_module = match self.curriculum.modules.get(module) {
            Some(m) => m,
            None => {
                let err = CurriculumError::IndexOutOfBounds { module, lesson };
                self.state = ProgressionState::Error(err.to_string());
                return Err(err);
            }
        };

        let next = if lesson + 1 < current_module.lessons.len() {
            Some((module, lesson + 1))
        } else if module + 1 < self.curriculum.modules.len() {
            Some((module + 1, 0))
        } else {
            None
        };

        match next {
            Some((nm, nl)) => {
                if self.curriculum.lesson(nm, nl).is_none() {
                    let err = match self.curriculum.modules.get(nm) {
                        Some(m) if m.lessons.is_empty() => CurriculumError::EmptyModule {
                            index: nm,
                            name: m.name.clone(),
                        },
                        _ => CurriculumError::IndexOutOfBounds {
                            module: nm,
                            lesson: nl,
                        },
                    };
                    self.state = ProgressionState::Error(err.to_string());
                    return Err(err);
                }
                self.state = ProgressionState::Active {
                    module: nm,
                    lesson: nl,
                };
            }
            None => self.state = ProgressionState::Complete,
        }

        self.persist(store);
        Ok(())
    }

    /// Write the current plan and position. Failures are swallowed; a
    /// missed save costs at most one lesson of progress on the next run.
    pub fn persist(&self, store: &dyn KvStore) {
        let saved = SavedPlan {
            params: self.params.clone(),
            curriculum: self.curriculum.clone(),
            progress: self.snapshot(),
        };
        let _ = storage::put_json(store, keys::SAVED_PLAN, &saved);
    }

    /// Drop the saved plan so the next run starts from scratch.
    pub fn reset(store: &dyn KvStore) {
        let _ = store.remove(keys::SAVED_PLAN);
    }
}

/// Load whatever plan was saved, if any.
pub fn load_saved_plan(store: &dyn KvStore) -> Option<SavedPlan> {
    storage::get_json(store, keys::SAVED_PLAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::Module;
    use crate::storage::MemoryKvStore;

    fn lesson(content: &str, target_wpm: f64) -> Lesson {
        Lesson {
            title: content.to_string(),
            description: String::new(),
            content: content.to_string(),
            target_wpm,
        }
    }

    fn two_module_course() -> Curriculum {
        Curriculum {
            modules: vec![
                Module {
                    name: "home row".into(),
                    description: String::new(),
                    lessons: vec![lesson("asdf", 15.0), lesson("jkl;", 15.0)],
                },
                Module {
                    name: "top row".into(),
                    description: String::new(),
                    lessons: vec![lesson("qwer", 40.0)],
                },
            ],
        }
    }

    fn params() -> PlanParams {
        PlanParams::Level {
            level: Level::Beginner,
            current_wpm: 12.0,
        }
    }

    fn controller(curriculum: Curriculum) -> ProgressionController {
        ProgressionController::new(params(), curriculum, LevelBuckets::default())
    }

    #[test]
    fn starts_at_first_lesson() {
        let ctrl = controller(two_module_course());
        assert_eq!(
            ctrl.state(),
            &ProgressionState::Active {
                module: 0,
                lesson: 0
            }
        );
        assert_eq!(ctrl.current_lesson().unwrap().content, "asdf");
    }

    #[test]
    fn advance_walks_lessons_then_modules_then_completes() {
        let store = MemoryKvStore::new();
        let mut ctrl = controller(two_module_course());

        ctrl.advance(&store).unwrap();
        assert_eq!(ctrl.current_lesson().unwrap().content, "jkl;");

        ctrl.advance(&store).unwrap();
        assert_eq!(ctrl.current_lesson().unwrap().content, "qwer");

        ctrl.advance(&store).unwrap();
        assert_eq!(ctrl.state(), &ProgressionState::Complete);

        // advancing past completion stays put
        ctrl.advance(&store).unwrap();
        assert_eq!(ctrl.state(), &ProgressionState::Complete);
    }

    #[test]
    fn snapshot_counts_completed_lessons_across_modules() {
        let store = MemoryKvStore::new();
        let mut ctrl = controller(two_module_course());

        assert_eq!(ctrl.snapshot().completed_lessons, 0);
        ctrl.advance(&store).unwrap();
        assert_eq!(ctrl.snapshot().completed_lessons, 1);
        ctrl.advance(&store).unwrap();
        let snap = ctrl.snapshot();
        assert_eq!(snap.completed_lessons, 2);
        assert_eq!(snap.current_module_index, 1);
        assert_eq!(snap.total_lessons, 3);

        ctrl.advance(&store).unwrap();
        assert_eq!(ctrl.snapshot().completed_lessons, 3);
    }

    #[test]
    fn empty_module_mid_course_becomes_error_state() {
        // second module has no lessons: the failure shows up at the
        // transition into it, not at construction
        let curriculum = Curriculum {
            modules: vec![
                Module {
                    name: "ok".into(),
                    description: String::new(),
                    lessons: vec![lesson("abc", 10.0)],
                },
                Module {
                    name: "hollow".into(),
                    description: String::new(),
                    lessons: vec![],
                },
            ],
        };
        let store = MemoryKvStore::new();
        let mut ctrl = controller(curriculum);
        assert!(ctrl.current_lesson().is_some());

        let err = ctrl.advance(&store).unwrap_err();
        assert_eq!(
            err,
            CurriculumError::EmptyModule {
                index: 1,
                name: "hollow".into()
            }
        );
        assert!(matches!(ctrl.state(), ProgressionState::Error(_)));
        assert!(ctrl.current_lesson().is_none());
    }

    #[test]
    fn empty_curriculum_is_an_error_from_the_start() {
        let ctrl = controller(Curriculum { modules: vec![] });
        assert!(matches!(ctrl.state(), ProgressionState::Error(_)));
        assert!(ctrl.session_for_current().is_none());
    }

    #[test]
    fn advance_persists_and_restore_round_trips() {
        let store = MemoryKvStore::new();
        let mut ctrl = controller(two_module_course());
        ctrl.advance(&store).unwrap();

        let saved = load_saved_plan(&store).expect("plan should be saved");
        let restored = ProgressionController::restore(saved, &params(), LevelBuckets::default())
            .expect("saved plan should restore");
        assert_eq!(
            restored.state(),
            &ProgressionState::Active {
                module: 0,
                lesson: 1
            }
        );
        assert_eq!(restored.snapshot().completed_lessons, 1);
    }

    #[test]
    fn restore_rejects_mismatched_params() {
        let store = MemoryKvStore::new();
        let mut ctrl = controller(two_module_course());
        ctrl.advance(&store).unwrap();

        let saved = load_saved_plan(&store).unwrap();
        let other = PlanParams::Level {
            level: Level::Advanced,
            current_wpm: 70.0,
        };
        assert!(ProgressionController::restore(saved, &other, LevelBuckets::default()).is_none());
    }

    #[test]
    fn restore_survives_a_drifted_average_wpm() {
        // the measured wpm moves after every recorded lesson; a saved
        // plan at the same level must still resume
        let store = MemoryKvStore::new();
        let mut ctrl = controller(two_module_course());
        ctrl.advance(&store).unwrap();

        let saved = load_saved_plan(&store).unwrap();
        let drifted = PlanParams::Level {
            level: Level::Beginner,
            current_wpm: 27.5,
        };
        let restored = ProgressionController::restore(saved, &drifted, LevelBuckets::default())
            .expect("same-level request should resume the saved plan");
        assert_eq!(restored.snapshot().completed_lessons, 1);
    }

    #[test]
    fn restore_rejects_structurally_broken_plans() {
        let saved = SavedPlan {
            params: params(),
            curriculum: Curriculum { modules: vec![] },
            progress: ProgressSnapshot {
                current_module_index: 0,
                current_lesson_index: 0,
                completed_lessons: 0,
                total_lessons: 0,
            },
        };
        assert!(ProgressionController::restore(saved, &params(), LevelBuckets::default()).is_none());
    }

    #[test]
    fn restore_rejects_out_of_bounds_position() {
        let saved = SavedPlan {
            params: params(),
            curriculum: two_module_course(),
            progress: ProgressSnapshot {
                current_module_index: 5,
                current_lesson_index: 0,
                completed_lessons: 1,
                total_lessons: 3,
            },
        };
        assert!(ProgressionController::restore(saved, &params(), LevelBuckets::default()).is_none());
    }

    #[test]
    fn restore_of_finished_plan_is_complete() {
        let saved = SavedPlan {
            params: params(),
            curriculum: two_module_course(),
            progress: ProgressSnapshot {
                current_module_index: 1,
                current_lesson_index: 0,
                completed_lessons: 3,
                total_lessons: 3,
            },
        };
        let restored =
            ProgressionController::restore(saved, &params(), LevelBuckets::default()).unwrap();
        assert_eq!(restored.state(), &ProgressionState::Complete);
    }

    #[test]
    fn policy_follows_lesson_target_pace() {
        let ctrl = controller(two_module_course());
        assert_eq!(
            ctrl.policy_for_lesson(&lesson("x", 15.0)),
            MismatchPolicy::Block
        );
        assert_eq!(
            ctrl.policy_for_lesson(&lesson("x", 40.0)),
            MismatchPolicy::Advance
        );
        assert_eq!(
            ctrl.policy_for_lesson(&lesson("x", 80.0)),
            MismatchPolicy::Block
        );
    }

    #[test]
    fn session_for_current_uses_lesson_content_and_policy() {
        let ctrl = controller(two_module_course());
        let session = ctrl.session_for_current().unwrap();
        assert_eq!(session.target_text(), "asdf");
        assert_eq!(session.policy, MismatchPolicy::Block);
    }

    #[test]
    fn reset_drops_the_saved_plan() {
        let store = MemoryKvStore::new();
        let mut ctrl = controller(two_module_course());
        ctrl.advance(&store).unwrap();
        assert!(load_saved_plan(&store).is_some());

        ProgressionController::reset(&store);
        assert!(load_saved_plan(&store).is_none());
    }
}
