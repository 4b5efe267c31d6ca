use std::collections::HashSet;
use std::sync::Arc;

use quiz_core::model::{
    Answer, Course, IdList, ProgressKey, Question, QuestionId, QuestionKind, QuestionOptions, Tag, Username,
};
use quiz_core::{InMemoryCatalog, QuestionCatalog};
use rand::SeedableRng;
use rand::rngs::StdRng;
use services::{
    SessionError, SessionMode, SessionRequest, SessionService, StarAction, StudyError, StudyService,
};
use storage::{DocumentRepository, InMemoryRepository, ProgressStore};

fn catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    for unit in 1..=3 {
        for n in 1..=10 {
            let question = Question {
                id: QuestionId::new(format!("{unit}-{n}")),
                text: format!("Statement {unit}.{n}"),
                options: QuestionOptions::true_false(),
                correct_answer: Answer::single("√"),
                unit: format!("第{unit}章"),
                kind: QuestionKind::TrueFalse,
                explanation: None,
            };
            catalog.insert(Course::Mayuan, question).unwrap();
        }
    }
    catalog
}

struct Harness {
    repo: InMemoryRepository,
    store: ProgressStore,
    sessions: SessionService,
    study: StudyService,
    user: Username,
}

fn harness() -> Harness {
    let catalog: Arc<dyn QuestionCatalog> = Arc::new(catalog());
    let repo = InMemoryRepository::new();
    let store = ProgressStore::new(Arc::new(repo.clone()));
    Harness {
        sessions: SessionService::new(Arc::clone(&catalog), store.clone()),
        study: StudyService::new(catalog, store.clone()),
        store,
        repo,
        user: Username::new("student1").unwrap(),
    }
}

#[test]
fn answering_twice_does_not_duplicate_studied() {
    let h = harness();
    let id = QuestionId::new("1-4");
    h.study
        .record_answer(&h.user, Course::Mayuan, &id, Some(Answer::single("×")))
        .unwrap();
    h.study
        .record_answer(&h.user, Course::Mayuan, &id, Some(Answer::single("√")))
        .unwrap();

    let section = h.study.course_snapshot(&h.user, Course::Mayuan).unwrap();
    let unit = &section.by_unit["第1章"];
    assert_eq!(unit.studied.to_vec(), vec![id.clone()]);
    assert!(section.last_choice[&id].correct);
    assert_eq!(section.last_choice[&id].selected, Some(Answer::single("√")));
}

#[test]
fn star_toggle_is_an_involution_and_keeps_union() {
    let h = harness();
    let a = QuestionId::new("1-1");
    let b = QuestionId::new("2-5");
    let before = h.study.course_snapshot(&h.user, Course::Mayuan).unwrap();

    h.study.star(&h.user, Course::Mayuan, &a, StarAction::Toggle).unwrap();
    h.study.star(&h.user, Course::Mayuan, &b, StarAction::Toggle).unwrap();
    let section = h.study.course_snapshot(&h.user, Course::Mayuan).unwrap();
    assert_eq!(id_set(&section.global.star), id_set(&section.union_of_unit_star()));
    assert_eq!(section.global.star.len(), 2);

    h.study.star(&h.user, Course::Mayuan, &a, StarAction::Toggle).unwrap();
    h.study.star(&h.user, Course::Mayuan, &b, StarAction::Toggle).unwrap();
    let after = h.study.course_snapshot(&h.user, Course::Mayuan).unwrap();
    assert_eq!(after.global.star, before.global.star);
    assert_eq!(id_set(&after.global.star), id_set(&after.union_of_unit_star()));
}

#[test]
fn clearing_untracked_unit_leaves_document_alone() {
    let h = harness();
    h.study
        .record_answer(&h.user, Course::Mayuan, &QuestionId::new("1-1"), None)
        .unwrap();
    let stored = h.repo.fetch(&h.user).unwrap();

    let err = h
        .study
        .clear_unit(&h.user, Course::Mayuan, "第2章")
        .unwrap_err();
    assert!(matches!(err, StudyError::UnitNotTracked { unit } if unit == "第2章"));
    assert_eq!(h.repo.fetch(&h.user).unwrap(), stored);
}

#[test]
fn random_session_over_small_course_returns_every_question_once() {
    let h = harness();
    let mut rng = StdRng::seed_from_u64(42);
    let request = SessionRequest::new(SessionMode::Random { count: 50 });
    let started = h
        .sessions
        .start_with_rng(&h.user, Course::Mayuan, &request, &mut rng)
        .unwrap();

    assert_eq!(started.state.key, ProgressKey::random(50));
    assert_eq!(started.state.list.len(), 30);
    let unique: HashSet<_> = started.state.list.iter().collect();
    assert_eq!(unique.len(), 30);
}

#[test]
fn sequential_session_resumes_with_reveal_override() {
    let h = harness();
    let request = SessionRequest::new(SessionMode::Sequential {
        unit: Some("第2章".into()),
    });
    let first = h.sessions.start(&h.user, Course::Mayuan, &request).unwrap();
    assert!(!first.resumed);
    h.sessions
        .save_position(&h.user, Course::Mayuan, Some("第2章"), 6)
        .unwrap();

    let again = h
        .sessions
        .start(&h.user, Course::Mayuan, &request.clone().with_reveal(true))
        .unwrap();
    assert!(again.resumed);
    assert_eq!(again.state.pos, 6);
    assert!(again.state.reveal);
    assert_eq!(again.state.list, first.state.list);
    assert_eq!(again.progress().remaining, 4);

    let document = h.store.load(&h.user).unwrap();
    let entry = &document.section(Course::Mayuan).unwrap().progress[&ProgressKey::unit("第2章")];
    assert!(entry.reveal);
}

#[test]
fn tag_session_follows_wrong_answers() {
    let h = harness();
    for id in ["3-2", "1-7"] {
        h.study
            .record_answer(&h.user, Course::Mayuan, &QuestionId::new(id), Some(Answer::single("×")))
            .unwrap();
    }
    let request = SessionRequest::new(SessionMode::Tag(Tag::Wrong));
    let started = h.sessions.start(&h.user, Course::Mayuan, &request).unwrap();
    assert_eq!(started.state.key.as_str(), "wrong");
    assert_eq!(
        started.state.list,
        vec![QuestionId::new("3-2"), QuestionId::new("1-7")]
    );
    assert_eq!(started.state.pos, 0);
}

#[test]
fn save_position_without_key_fails() {
    let h = harness();
    assert!(matches!(
        h.sessions.save_position(&h.user, Course::Mayuan, None, 1),
        Err(SessionError::MissingKey)
    ));
}

#[test]
fn invalid_course_name_is_reported() {
    let parsed: Result<Course, StudyError> = "history".parse::<Course>().map_err(StudyError::from);
    assert!(matches!(parsed, Err(StudyError::InvalidCourse(_))));
}

#[test]
fn legacy_document_feeds_tag_session() {
    let h = harness();
    h.repo
        .insert_raw(&h.user, serde_json::json!({"wrong": ["1-3", "2-7"], "star": ["1-3"]}))
        .unwrap();
    let request = SessionRequest::new(SessionMode::Tag(Tag::Star));
    let started = h.sessions.start(&h.user, Course::Maogai, &request).unwrap();
    assert_eq!(started.state.list, vec![QuestionId::new("1-3")]);
}

fn id_set(list: &IdList) -> HashSet<QuestionId> {
    list.iter().cloned().collect()
}

#[test]
fn global_wrong_tracks_union_of_unit_lists() {
    let h = harness();
    let wrong = Some(Answer::single("×"));
    let right = Some(Answer::single("√"));
    let steps = [
        ("1-1", wrong.clone()),
        ("2-3", wrong.clone()),
        ("3-9", wrong.clone()),
        ("1-2", right.clone()),
        ("2-3", right.clone()),
        ("1-5", wrong.clone()),
        ("3-9", None),
    ];

    for (id, selected) in steps {
        h.study
            .record_answer(&h.user, Course::Mayuan, &QuestionId::new(id), selected)
            .unwrap();
        let section = h.study.course_snapshot(&h.user, Course::Mayuan).unwrap();
        assert_eq!(id_set(&section.global.wrong), id_set(&section.union_of_unit_wrong()), "after {id}");
    }

    let section = h.study.course_snapshot(&h.user, Course::Mayuan).unwrap();
    assert_eq!(
        section.global.wrong.to_vec(),
        vec![QuestionId::new("1-1"), QuestionId::new("3-9"), QuestionId::new("1-5")]
    );

    h.study.clear_unit(&h.user, Course::Mayuan, "第1章").unwrap();
    let section = h.study.course_snapshot(&h.user, Course::Mayuan).unwrap();
    assert_eq!(id_set(&section.global.wrong), id_set(&section.union_of_unit_wrong()));
    assert_eq!(section.global.wrong.to_vec(), vec![QuestionId::new("3-9")]);
}
