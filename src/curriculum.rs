use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};

pub(crate) static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/assets");

/// One practice text within a module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: String,
    pub target_wpm: f64,
}

/// An ordered group of lessons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub lessons: Vec<Lesson>,
}

/// An ordered course of modules, generated remotely or built in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Curriculum {
    pub modules: Vec<Module>,
}

/// Structural problems with a curriculum or with saved progress into it.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CurriculumError {
    #[error("curriculum has no modules")]
    NoModules,
    #[error("module {index} ({name:?}) has no lessons")]
    EmptyModule { index: usize, name: String },
    #[error("lesson {lesson} of module {module} has empty content")]
    EmptyLesson { module: usize, lesson: usize },
    #[error("indices ({module}, {lesson}) are out of bounds")]
    IndexOutOfBounds { module: usize, lesson: usize },
}

impl Curriculum {
    /// Structural integrity check: at least one module, every module has
    /// lessons, every lesson has content.
    pub fn validate(&self) -> Result<(), CurriculumError> {
        if self.modules.is_empty() {
            return Err(CurriculumError::NoModules);
        }
        for (mi, module) in self.modules.iter().enumerate() {
            if module.lessons.is_empty() {
                return Err(CurriculumError::EmptyModule {
                    index: mi,
                    name: module.name.clone(),
                });
            }
            for (li, lesson) in module.lessons.iter().enumerate() {
                if lesson.content.trim().is_empty() {
                    return Err(CurriculumError::EmptyLesson {
                        module: mi,
                        lesson: li,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn total_lessons(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    pub fn lesson(&self, module: usize, lesson: usize) -> Option<&Lesson> {
        self.modules.get(module)?.lessons.get(lesson)
    }

    /// Lessons in all modules before `module` (used for the
    /// completed-lessons count).
    pub fn lessons_before_module(&self, module: usize) -> usize {
        self.modules
            .iter()
            .take(module)
            .map(|m| m.lessons.len())
            .sum()
    }

    /// The embedded fallback course, used whenever the plan generator is
    /// unreachable or returns something unusable.
    pub fn builtin() -> Self {
        let raw = ASSETS
            .get_file("curriculum.json")
            .expect("embedded curriculum asset missing")
            .contents_utf8()
            .expect("embedded curriculum is not utf-8");
        let curriculum: Curriculum =
            serde_json::from_str(raw).expect("embedded curriculum is valid JSON");
        debug_assert!(curriculum.validate().is_ok());
        curriculum
    }
}

/// Typing proficiency bucket, derived from recent WPM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

/// WPM thresholds separating the levels; configuration, not a law.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelBuckets {
    pub intermediate_min_wpm: f64,
    pub advanced_min_wpm: f64,
}

impl Default for LevelBuckets {
    fn default() -> Self {
        Self {
            intermediate_min_wpm: 30.0,
            advanced_min_wpm: 60.0,
        }
    }
}

impl Level {
    pub fn from_wpm(wpm: f64, buckets: &LevelBuckets) -> Self {
        if wpm >= buckets.advanced_min_wpm {
            Level::Advanced
        } else if wpm >= buckets.intermediate_min_wpm {
            Level::Intermediate
        } else {
            Level::Beginner
        }
    }
}

/// Parameters a plan was generated from. Persisted next to the curriculum
/// so a restore can verify the saved plan answers the same request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanParams {
    Level { level: Level, current_wpm: f64 },
    Assessment {
        expected_text: String,
        actual_text: String,
        wpm: f64,
    },
}

impl PlanParams {
    /// Whether a plan generated from these parameters still answers
    /// `requested`. Level plans are keyed by level alone: the measured
    /// wpm shifts a little every run without changing which plan fits,
    /// so it must not invalidate a saved plan.
    pub fn answers(&self, requested: &PlanParams) -> bool {
        match (self, requested) {
            (PlanParams::Level { level: saved, .. }, PlanParams::Level { level: wanted, .. }) => {
                saved == wanted
            }
            (saved @ PlanParams::Assessment { .. }, wanted @ PlanParams::Assessment { .. }) => {
                saved == wanted
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(content: &str) -> Lesson {
        Lesson {
            title: "t".into(),
            description: String::new(),
            content: content.into(),
            target_wpm: 25.0,
        }
    }

    #[test]
    fn builtin_curriculum_parses_and_validates() {
        let curriculum = Curriculum::builtin();
        assert!(curriculum.validate().is_ok());
        assert!(curriculum.total_lessons() >= 3);
    }

    #[test]
    fn validate_rejects_empty_curriculum() {
        let curriculum = Curriculum { modules: vec![] };
        assert_eq!(curriculum.validate(), Err(CurriculumError::NoModules));
    }

    #[test]
    fn validate_rejects_empty_module() {
        let curriculum = Curriculum {
            modules: vec![Module {
                name: "home row".into(),
                description: String::new(),
                lessons: vec![],
            }],
        };
        assert_eq!(
            curriculum.validate(),
            Err(CurriculumError::EmptyModule {
                index: 0,
                name: "home row".into()
            })
        );
    }

    #[test]
    fn validate_rejects_blank_lesson_content() {
        let curriculum = Curriculum {
            modules: vec![Module {
                name: "m".into(),
                description: String::new(),
                lessons: vec![lesson("   ")],
            }],
        };
        assert_eq!(
            curriculum.validate(),
            Err(CurriculumError::EmptyLesson {
                module: 0,
                lesson: 0
            })
        );
    }

    #[test]
    fn lesson_counts() {
        let curriculum = Curriculum {
            modules: vec![
                Module {
                    name: "a".into(),
                    description: String::new(),
                    lessons: vec![lesson("x"), lesson("y")],
                },
                Module {
                    name: "b".into(),
                    description: String::new(),
                    lessons: vec![lesson("z")],
                },
            ],
        };
        assert_eq!(curriculum.total_lessons(), 3);
        assert_eq!(curriculum.lessons_before_module(0), 0);
        assert_eq!(curriculum.lessons_before_module(1), 2);
        assert!(curriculum.lesson(1, 0).is_some());
        assert!(curriculum.lesson(1, 1).is_none());
        assert!(curriculum.lesson(2, 0).is_none());
    }

    #[test]
    fn level_bucketing_follows_thresholds() {
        let buckets = LevelBuckets::default();
        assert_eq!(Level::from_wpm(0.0, &buckets), Level::Beginner);
        assert_eq!(Level::from_wpm(29.9, &buckets), Level::Beginner);
        assert_eq!(Level::from_wpm(30.0, &buckets), Level::Intermediate);
        assert_eq!(Level::from_wpm(59.9, &buckets), Level::Intermediate);
        assert_eq!(Level::from_wpm(60.0, &buckets), Level::Advanced);
    }

    #[test]
    fn custom_buckets_shift_the_split() {
        let buckets = LevelBuckets {
            intermediate_min_wpm: 10.0,
            advanced_min_wpm: 20.0,
        };
        assert_eq!(Level::from_wpm(15.0, &buckets), Level::Intermediate);
        assert_eq!(Level::from_wpm(25.0, &buckets), Level::Advanced);
    }

    #[test]
    fn plan_params_serialize_tagged() {
        let params = PlanParams::Level {
            level: Level::Intermediate,
            current_wpm: 42.0,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["type"], "level");
        assert_eq!(json["level"], "intermediate");
        assert_eq!(json["current_wpm"], 42.0);

        let assessment = PlanParams::Assessment {
            expected_text: "abc".into(),
            actual_text: "abd".into(),
            wpm: 31.0,
        };
        let json = serde_json::to_value(&assessment).unwrap();
        assert_eq!(json["type"], "assessment");

        let back: PlanParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, assessment);
    }

    #[test]
    fn level_params_answer_requests_at_the_same_level() {
        let saved = PlanParams::Level {
            level: Level::Beginner,
            current_wpm: 0.0,
        };
        assert!(saved.answers(&PlanParams::Level {
            level: Level::Beginner,
            current_wpm: 23.4,
        }));
        assert!(!saved.answers(&PlanParams::Level {
            level: Level::Advanced,
            current_wpm: 23.4,
        }));
        assert!(!saved.answers(&PlanParams::Assessment {
            expected_text: "abc".into(),
            actual_text: "abc".into(),
            wpm: 23.4,
        }));
    }

    #[test]
    fn assessment_params_answer_only_the_identical_request() {
        let saved = PlanParams::Assessment {
            expected_text: "abc".into(),
            actual_text: "abd".into(),
            wpm: 31.0,
        };
        assert!(saved.answers(&saved.clone()));
        assert!(!saved.answers(&PlanParams::Assessment {
            expected_text: "abc".into(),
            actual_text: "abd".into(),
            wpm: 32.0,
        }));
    }

    #[test]
    fn level_display_is_lowercase() {
        assert_eq!(Level::Beginner.to_string(), "beginner");
        assert_eq!(Level::Advanced.to_string(), "advanced");
    }
}
