use super::*;
use chrono::{FixedOffset, TimeZone};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

const SMALL_CATALOG: &str = r#"
sayori:
  greeting:
  - text: top one
    conditions: { min_affinity: 0, max_affinity: 100, mood: happy }
    priority: 3
  - text: top two
    conditions: { min_affinity: 0, max_affinity: 100, mood: happy }
    priority: 3
  - text: low
    conditions: { min_affinity: 0, max_affinity: 100, mood: happy }
    priority: 1
  - text: loyal
    conditions: { min_affinity: 0, max_affinity: 100, mood: happy, consecutive_days: 5 }
    priority: 9
  session:
    break:
    - text: stretch
      conditions: { min_affinity: 0, max_affinity: 100, mood: happy }
      context: { is_break_time: true }
      priority: 2
natsuki:
  greeting:
  - text: hmph
    conditions: { min_affinity: 0, max_affinity: 100, mood: happy }
yuri:
  greeting:
  - text: hello
    conditions: { min_affinity: 0, max_affinity: 100, mood: happy }
monika:
  greeting:
  - text: hi
    conditions: { min_affinity: 0, max_affinity: 100, mood: happy }
"#;

fn at(h: u32) -> LocalTime {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 6, h, 0, 0)
        .unwrap()
}

fn texts(engine: &DialogueEngine, request: &DialogueRequest) -> HashSet<String> {
    (0..200u64)
        .map(|seed| engine.select(request, &mut StdRng::seed_from_u64(seed)).text)
        .collect()
}

#[test]
fn test_builtin_catalog_loads() {
    let engine = DialogueEngine::builtin().unwrap();
    for companion in CompanionId::ALL {
        let lines = engine.catalog().lines(companion).unwrap();
        assert!(!lines.greeting.is_empty(), "{companion} has no greetings");
        assert!(!lines.session.end.is_empty());
    }
    assert_eq!(engine.sampling(), SamplingPolicy::FullPool);
}

#[test]
fn test_single_match_returns_exact_text() {
    let engine = DialogueEngine::builtin().unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    let request = DialogueRequest::new(CompanionId::Sayori, CompanionMood::Happy, 50, at(10))
        .with_context(DialogueContext {
            affinity_milestone: Some(50),
            ..Default::default()
        })
        .with_category(DialogueCategory::Affinity);
    let line = engine.select(&request, &mut rng);
    assert_eq!(
        line.text,
        "You know what? I think we're becoming really good friends! That makes me so happy!"
    );
    assert!(!line.is_fallback);

    let request = DialogueRequest::new(CompanionId::Sayori, CompanionMood::Sad, 10, at(10))
        .with_category(DialogueCategory::Farewell);
    assert_eq!(
        engine.select(&request, &mut rng).text,
        "Aww, you're leaving already? Well, I'll be here when you get back! Promise!"
    );
}

#[test]
fn test_no_match_falls_back() {
    let engine = DialogueEngine::from_yaml(SMALL_CATALOG).unwrap();
    let request = DialogueRequest::new(CompanionId::Natsuki, CompanionMood::Sad, 10, at(10));
    let line = engine.select(&request, &mut StdRng::seed_from_u64(1));
    assert_eq!(line.text, "[Default natsuki dialogue]");
    assert!(line.is_fallback);
}

#[test]
fn test_full_pool_samples_every_survivor() {
    let engine = DialogueEngine::from_yaml(SMALL_CATALOG).unwrap();
    let request = DialogueRequest::new(CompanionId::Sayori, CompanionMood::Happy, 10, at(10));

    let candidates: Vec<_> = engine.candidates(&request).iter().map(|e| e.text.as_str()).collect();
    assert_eq!(candidates, vec!["top one", "top two", "low"]);

    let seen = texts(&engine, &request);
    assert!(seen.contains("low"));
    assert_eq!(seen.len(), 3);
}

#[test]
fn test_top_tier_samples_highest_priority_only() {
    let engine = DialogueEngine::from_yaml(SMALL_CATALOG)
        .unwrap()
        .with_sampling(SamplingPolicy::TopTier);
    let request = DialogueRequest::new(CompanionId::Sayori, CompanionMood::Happy, 10, at(10));

    let seen = texts(&engine, &request);
    let expected: HashSet<String> = ["top one", "top two"].iter().map(|s| s.to_string()).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_consecutive_days_is_a_lower_bound() {
    let engine = DialogueEngine::from_yaml(SMALL_CATALOG)
        .unwrap()
        .with_sampling(SamplingPolicy::TopTier);
    let request = DialogueRequest::new(CompanionId::Sayori, CompanionMood::Happy, 10, at(10)).with_streak(6);
    assert_eq!(engine.select(&request, &mut StdRng::seed_from_u64(3)).text, "loyal");
}

#[test]
fn test_context_picks_category() {
    let engine = DialogueEngine::from_yaml(SMALL_CATALOG).unwrap();
    let request = DialogueRequest::new(CompanionId::Sayori, CompanionMood::Happy, 10, at(10))
        .with_context(DialogueContext {
            is_break_time: Some(true),
            ..Default::default()
        });
    assert_eq!(engine.select(&request, &mut StdRng::seed_from_u64(3)).text, "stretch");
}

#[test]
fn test_context_matching_rules() {
    let current = DialogueContext {
        achievement_unlocked: Some("master".to_string()),
        streak_milestone: Some(14),
        focus_stats: Some(FocusSnapshot {
            current_session_time: 30,
            ..Default::default()
        }),
        ..Default::default()
    };

    let any = DialogueContext {
        achievement_unlocked: Some("any".to_string()),
        ..Default::default()
    };
    assert!(current.satisfies(&any));

    let other = DialogueContext {
        achievement_unlocked: Some("first_session".to_string()),
        ..Default::default()
    };
    assert!(!current.satisfies(&other));

    let weekly = DialogueContext {
        streak_milestone: Some(7),
        ..Default::default()
    };
    assert!(current.satisfies(&weekly));

    let long_session = DialogueContext {
        focus_stats: Some(FocusSnapshot {
            current_session_time: 45,
            ..Default::default()
        }),
        ..Default::default()
    };
    assert!(!current.satisfies(&long_session));
}

#[test]
fn test_helper_lines_use_builtin_entries() {
    let engine = DialogueEngine::builtin().unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    // affinity 10 leaves one eligible line in each category
    let line = engine.achievement_line(
        CompanionId::Sayori,
        CompanionMood::Happy,
        10,
        "first_session",
        at(14),
        &mut rng,
    );
    assert_eq!(
        line.text,
        "WOW! You got an achievement! That's amazing! I'm so proud of you I could burst! \u{1F389}"
    );

    let line = engine.session_complete_line(
        CompanionId::Sayori,
        CompanionMood::Happy,
        10,
        FocusSnapshot {
            current_session_time: 25,
            ..Default::default()
        },
        at(14),
        &mut rng,
    );
    assert_eq!(
        line.text,
        "You did it! Another successful focus session complete! How do you feel?"
    );
}

#[test]
fn test_generate_event() {
    let engine = DialogueEngine::builtin().unwrap();
    let now = at(14);
    let event = engine.generate_event(
        CompanionId::Sayori,
        EventTrigger::Affinity,
        50,
        CompanionMood::Happy,
        50,
        now,
        &mut StdRng::seed_from_u64(2),
    );
    assert_eq!(event.title, "Affinity Level 50");
    assert_eq!(event.id, format!("sayori_affinity_{}", now.timestamp_millis()));
    assert_eq!(event.trigger_value, Some(50));
    assert!(!event.seen);
    assert_eq!(
        event.content,
        vec!["You know what? I think we're becoming really good friends! That makes me so happy!".to_string()]
    );

    let event = engine.generate_event(
        CompanionId::Sayori,
        EventTrigger::Inactivity,
        3,
        CompanionMood::Happy,
        10,
        now,
        &mut StdRng::seed_from_u64(2),
    );
    assert_eq!(event.title, "We Miss You");
    assert_eq!(
        event.content,
        vec!["Aww, you're leaving already? Well, I'll be here when you get back! Promise!".to_string()]
    );
}

#[test]
fn test_category_from_str() {
    assert_eq!("session.start".parse::<DialogueCategory>().unwrap(), DialogueCategory::SessionStart);
    assert_eq!(
        "timeOfDay.night".parse::<DialogueCategory>().unwrap(),
        DialogueCategory::TimeOfDay(TimeOfDay::Night)
    );
    assert!("session".parse::<DialogueCategory>().is_err());
}

#[test]
fn test_catalog_requires_every_companion() {
    let partial = "sayori:\n  greeting:\n  - text: hi\n    conditions: { min_affinity: 0, max_affinity: 100, mood: happy }\n";
    assert!(matches!(
        DialogueEngine::from_yaml(partial),
        Err(CatalogError::MissingCompanion(_))
    ));
}
