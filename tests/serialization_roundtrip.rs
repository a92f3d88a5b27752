use chrono::{TimeZone, Utc};

use review_scheduler::scheduler::{Grade, ScheduleState};
use review_scheduler::session::SessionComposition;

#[test]
fn pt_serialization_roundtrip() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let state = ScheduleState::new(now);
    let encoded = serde_json::to_string(&state).expect("serialize state");
    let decoded: ScheduleState = serde_json::from_str(&encoded).expect("deserialize state");
    assert_eq!(decoded, state);

    let composition = SessionComposition {
        unfamiliar: 2,
        struggling: 3,
        due_review: 3,
        new_words: 2,
    };
    let encoded = serde_json::to_string(&composition).expect("serialize composition");
    assert!(encoded.contains("\"new\":2"));
    let decoded: SessionComposition = serde_json::from_str(&encoded).expect("deserialize composition");
    assert_eq!(decoded, composition);

    let grades: Vec<Grade> = serde_json::from_str(r#"["recognize", "barely", "not"]"#)
        .expect("deserialize grade labels");
    assert_eq!(grades, vec![Grade::Recognize, Grade::Barely, Grade::Not]);
}
