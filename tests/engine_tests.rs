use screen_verifier::catalog::Direction;
use screen_verifier::engine::{
    ActionBudgetPolicy, ActionKind, ActionOutcome, ActionRequest, ElementRef, EngineConfig,
};
use screen_verifier::engine::convert::convert_action;
use screen_verifier::env::{EnvAction, Transition};
use screen_verifier::error::VerifyError;
use screen_verifier::locator::Locator;
use screen_verifier::script::SourceLocation;
use screen_verifier::trace::{EffectScope, RecordKind};

use crate::common::fixtures::{
    DETAIL_VIEW, HOME_VIEW, KEYBOARD_VIEW, LAUNCHER_VIEW, SETTINGS_VIEW, mock, mock_with,
    test_config, verifier, verifier_with,
};

mod common;

fn located(raw: &str) -> ElementRef {
    ElementRef::Located {
        name: raw.to_string(),
        locator: Locator::parse(raw).unwrap(),
    }
}

fn actions(v: &screen_verifier::engine::Verifier<screen_verifier::env::MockEnv>) -> Vec<EnvAction> {
    v.env().history().iter().map(|h| h.action.clone()).collect()
}

// =========================================================================
// Direct lookup
// =========================================================================

#[test]
fn tap_resolves_direct_target_and_clicks_its_center() {
    let mut v = verifier(mock(&[HOME_VIEW]));
    v.start().unwrap();

    v.tap("home__search", None).unwrap();

    assert_eq!(actions(&v), vec![EnvAction::Click { x: 540.0, y: 60.0 }]);
    assert_eq!(v.env().history()[0].target, Some(1));

    let records = v.logger().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, RecordKind::Action);
    assert_eq!(records[0].target_id, Some(1));
    assert_eq!(records[0].api_name.as_deref(), Some("home__search"));
    assert_eq!(records[0].action.as_deref(), Some("tap"));
    assert_eq!(records[0].effect, EffectScope::Global);
}

#[test]
fn fallback_locator_is_used_when_the_first_misses() {
    let view = "<div id='0'><button id='1'>Settings</button></div>";
    let mut v = verifier(mock(&[view]));
    v.start().unwrap();

    v.tap("home__settings", None).unwrap();
    assert_eq!(v.env().history().len(), 1);
    assert_eq!(v.env().history()[0].target, Some(1));
}

#[test]
fn source_location_is_attached_to_records() {
    let mut v = verifier(mock(&[HOME_VIEW]));
    v.start().unwrap();
    let source = SourceLocation::new(7, "tap($home__search)");

    v.tap("home__search", Some(source.clone())).unwrap();

    assert_eq!(v.logger().records()[0].source, Some(source));
}

#[test]
fn get_text_reads_without_acting() {
    let view = "<div id='0'><p id='1'>a--b</p></div>";
    let mut v = verifier(mock(&[view]));
    v.start().unwrap();

    let outcome = v
        .execute(&ActionRequest::new(ActionKind::GetText, located("//p")))
        .unwrap();

    assert_eq!(outcome, ActionOutcome::Text(Some("a b".into())));
    assert!(v.env().history().is_empty());
    assert_eq!(v.logger().records().len(), 1);
}

#[test]
fn get_attributes_reports_flags() {
    let mut v = verifier(mock(&[SETTINGS_VIEW]));
    v.start().unwrap();

    let attrs = v.get_attributes("settings__list", None).unwrap().unwrap();
    assert!(attrs.scrollable);
    assert_eq!(attrs.resource_id.as_deref(), Some("list"));
    assert_eq!(attrs.id, 2);
    assert!(v.env().history().is_empty());
}

#[test]
fn set_text_on_non_editable_is_an_action_error() {
    let mut v = verifier(mock(&[HOME_VIEW]));
    v.start().unwrap();

    let err = v.set_text("home__search", "hello", None).unwrap_err();
    assert!(matches!(err, VerifyError::Action { .. }));
    assert!(v.env().history().is_empty());

    let records = v.logger().records();
    assert_eq!(records.last().unwrap().kind, RecordKind::Failed);
}

// =========================================================================
// Scenario B: dependency replay through "back"
// =========================================================================

#[test]
fn replay_goes_back_once_then_taps_target() {
    let mut v = verifier(mock(&[DETAIL_VIEW, HOME_VIEW]));
    v.start().unwrap();

    v.tap("home__search", None).unwrap();

    let history = actions(&v);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], EnvAction::NavigateBack);
    assert!(matches!(history[1], EnvAction::Click { .. }));
    assert!(!history.iter().any(|a| matches!(a, EnvAction::Scroll { .. })));

    let kinds: Vec<RecordKind> = v.logger().records().iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RecordKind::Navigate, RecordKind::Action]);
    assert!(v.logger().records()[0].skeleton.as_deref().is_some_and(|s| s.starts_with("<div")));
}

#[test]
fn replay_taps_dependency_to_reach_another_screen() {
    let mut v = verifier(mock(&[HOME_VIEW, SETTINGS_VIEW]));
    v.start().unwrap();

    v.tap("settings__wifi", None).unwrap();

    let history = v.env().history();
    assert_eq!(history.len(), 2);
    // first the settings button on home, then Wi-Fi on settings
    assert_eq!(history[0].state, 0);
    assert_eq!(history[0].target, Some(2));
    assert_eq!(history[1].state, 1);
    assert_eq!(history[1].target, Some(3));
    assert_eq!(v.current_screen().unwrap().as_deref(), Some("settings"));
}

// =========================================================================
// Scenario C: scroll saturation
// =========================================================================

#[test]
fn scroll_search_stops_when_nothing_new_appears() {
    let renamed = SETTINGS_VIEW
        .replace("Wi-Fi", "Hotspot")
        .replace("Bluetooth", "NFC");
    let mut config = test_config();
    config.max_scroll_count = 5;
    let mut v = verifier_with(mock(&[SETTINGS_VIEW, &renamed]), config);
    v.start().unwrap();

    let err = v
        .execute(&ActionRequest::new(ActionKind::Tap, located("//p[text()='Printing']")))
        .unwrap_err();

    assert!(matches!(err, VerifyError::NotFound { .. }));
    let scrolls = actions(&v)
        .iter()
        .filter(|a| matches!(a, EnvAction::Scroll { .. }))
        .count();
    assert_eq!(scrolls, 1);
}

#[test]
fn scroll_search_stops_when_screen_does_not_move() {
    let mut v = verifier(mock_with(&[SETTINGS_VIEW], vec![]));
    v.start().unwrap();

    let err = v
        .execute(&ActionRequest::new(ActionKind::Tap, located("//p[text()='Printing']")))
        .unwrap_err();

    assert!(matches!(err, VerifyError::NotFound { .. }));
    assert_eq!(v.env().history().len(), 1);
    assert_eq!(
        v.env().history()[0].action,
        EnvAction::Scroll {
            index: 1,
            direction: Direction::Down
        }
    );
}

#[test]
fn scroll_search_finds_element_below_the_fold() {
    let below = SETTINGS_VIEW.replace(
        "<p id='4'>Bluetooth</p>",
        "<p id='4'>Bluetooth</p>\n    <p id='5'>Printing</p>",
    );
    let mut v = verifier(mock(&[SETTINGS_VIEW, &below]));
    v.start().unwrap();

    v.execute(&ActionRequest::new(ActionKind::Tap, located("//p[text()='Printing']")))
        .unwrap();

    let history = actions(&v);
    assert_eq!(history.len(), 2);
    assert!(matches!(history[0], EnvAction::Scroll { .. }));
    assert_eq!(v.env().history()[1].target, Some(5));

    let kinds: Vec<RecordKind> = v.logger().records().iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RecordKind::Navigate, RecordKind::Action]);
    assert!(v.logger().records()[0].skeleton.as_deref().is_some_and(|s| s.starts_with("<div")));
}

const TWO_LISTS_VIEW: &str = "
<div id='0'>
  <scrollbar id='1' resource_id='com.example:id/left'>
    <p id='2'>Recent</p>
  </scrollbar>
  <scrollbar id='3' resource_id='com.example:id/right'>
    <p id='4'>Mobile</p>
  </scrollbar>
</div>";

#[test]
fn scroll_search_tries_every_container() {
    let revealed = TWO_LISTS_VIEW.replace("Mobile", "Cellular");
    let mut v = verifier(mock_with(
        &[TWO_LISTS_VIEW, &revealed],
        vec![Transition::new(0, "scroll", Some(3), 1)],
    ));
    v.start().unwrap();

    v.execute(&ActionRequest::new(ActionKind::Tap, located("//p[text()='Cellular']")))
        .unwrap();

    let scrolled: Vec<Option<usize>> = v
        .env()
        .history()
        .iter()
        .filter(|h| matches!(h.action, EnvAction::Scroll { .. }))
        .map(|h| h.target)
        .collect();
    assert_eq!(scrolled, vec![Some(1), Some(3)]);
    assert_eq!(v.env().history().last().unwrap().target, Some(4));
}

#[test]
fn scrolling_needs_an_actionable_container() {
    let mut v = verifier(mock(&[HOME_VIEW]));
    v.start().unwrap();
    let root = v.current_tree().unwrap().root().unwrap().clone();
    let button = v.current_tree().unwrap().node(1).unwrap().clone();

    assert!(convert_action(ActionKind::Scroll, &root, None, None).is_err());
    assert_eq!(
        convert_action(ActionKind::Scroll, &button, None, Some(Direction::Up)),
        Ok(EnvAction::Scroll {
            index: 0,
            direction: Direction::Up
        })
    );
}

// =========================================================================
// Scenario D and other failures
// =========================================================================

#[test]
fn undeclared_api_fails_before_touching_the_device() {
    let mut v = verifier(mock(&[HOME_VIEW]));

    let err = v.tap("home__nope", None).unwrap_err();

    assert!(matches!(err, VerifyError::Doc { ref name, .. } if name == "home__nope"));
    assert!(v.env().history().is_empty());
    assert_eq!(v.env().observations(), 0);
    let records = v.logger().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, RecordKind::Failed);
}

#[test]
fn missing_element_on_its_own_screen_is_a_locator_error() {
    let mut v = verifier(mock_with(&[SETTINGS_VIEW], vec![]));
    v.start().unwrap();

    let err = v.tap("settings__cellular", None).unwrap_err();

    assert!(matches!(err, VerifyError::Locator { .. }));
    assert_eq!(err.kind(), "locator");
    // one scroll attempt on the list, no replay
    assert!(v
        .env()
        .history()
        .iter()
        .all(|h| matches!(h.action, EnvAction::Scroll { .. })));
    assert_eq!(v.logger().records().last().unwrap().kind, RecordKind::Failed);
}

#[test]
fn unreachable_target_respects_replay_bound() {
    let config = EngineConfig {
        max_path_count: 2,
        max_path_length: 2,
        max_replay_rounds: 10,
        ..test_config()
    };
    let mut v = verifier_with(mock_with(&[HOME_VIEW], vec![]), config);
    v.start().unwrap();

    let err = v.tap("settings__missing", None).unwrap_err();

    assert!(matches!(err, VerifyError::NotFound { .. }));
    assert!(v.env().history().len() <= 4);
    assert!(v
        .env()
        .history()
        .iter()
        .all(|h| matches!(h.action, EnvAction::Click { .. })));
    let navigations = v
        .logger()
        .records()
        .iter()
        .filter(|r| r.kind == RecordKind::Navigate)
        .count();
    assert_eq!(navigations, v.env().history().len());
}

#[test]
fn located_target_without_api_is_not_replayed() {
    let mut v = verifier(mock(&[HOME_VIEW, SETTINGS_VIEW]));
    v.start().unwrap();

    let err = v
        .execute(&ActionRequest::new(ActionKind::Tap, located("//p[text()='Wi-Fi']")))
        .unwrap_err();
    assert!(matches!(err, VerifyError::NotFound { group: None, .. }));
    assert!(v.env().history().is_empty());
}

// =========================================================================
// Action budget
// =========================================================================

#[test]
fn enforced_budget_blocks_over_cap_requests() {
    let config = EngineConfig {
        max_action_count: 1,
        action_budget: ActionBudgetPolicy::Enforced,
        ..test_config()
    };
    let mut v = verifier_with(mock(&[HOME_VIEW]), config);
    v.start().unwrap();

    v.tap("home__search", None).unwrap();
    let err = v.tap("home__search", None).unwrap_err();

    assert!(matches!(err, VerifyError::BudgetExhausted { count: 2, cap: 1, .. }));
    assert_eq!(v.env().history().len(), 1);
    assert_eq!(v.action_count(), 2);
}

#[test]
fn advisory_budget_only_warns() {
    let config = EngineConfig {
        max_action_count: 1,
        ..test_config()
    };
    let mut v = verifier_with(mock(&[HOME_VIEW]), config);
    v.start().unwrap();

    v.tap("home__search", None).unwrap();
    v.tap("home__search", None).unwrap();
    assert_eq!(v.env().history().len(), 2);
}

#[test]
fn failed_requests_still_count() {
    let mut v = verifier(mock(&[HOME_VIEW]));
    v.start().unwrap();

    let _ = v.tap("home__nope", None);
    let _ = v.tap("home__nope", None);
    assert_eq!(v.action_count(), 2);
}

// =========================================================================
// Extras: keyboard guard, scroll end, back
// =========================================================================

#[test]
fn set_text_near_bottom_scrolls_the_field_first() {
    let mut v = verifier(mock_with(&[KEYBOARD_VIEW], vec![]));
    v.start().unwrap();

    v.set_text("compose__query", "rust", None).unwrap();

    let history = actions(&v);
    assert_eq!(history.len(), 2);
    assert!(matches!(
        history[0],
        EnvAction::Scroll {
            direction: Direction::Down,
            ..
        }
    ));
    assert_eq!(
        history[1],
        EnvAction::InputText {
            x: 540.0,
            y: 2340.0,
            text: "rust".into()
        }
    );
}

#[test]
fn scroll_reports_end_when_screen_is_unchanged() {
    let mut v = verifier(mock_with(&[SETTINGS_VIEW], vec![]));
    v.start().unwrap();

    let at_end = v.scroll("settings__list", Direction::Down, None).unwrap();
    assert!(at_end);
}

#[test]
fn scroll_reports_movement() {
    let moved = SETTINGS_VIEW.replace("Bluetooth", "Display");
    let mut v = verifier(mock(&[SETTINGS_VIEW, &moved]));
    v.start().unwrap();

    let at_end = v.scroll("settings__list", Direction::Up, None).unwrap();
    assert!(!at_end);
    assert_eq!(
        v.env().history()[0].action,
        EnvAction::Scroll {
            index: 1,
            direction: Direction::Up
        }
    );
}

#[test]
fn back_reopens_app_after_leaving_it() {
    let config = EngineConfig {
        app_name: Some("com.example".into()),
        ..test_config()
    };
    let mut v = verifier_with(
        mock_with(
            &[HOME_VIEW, LAUNCHER_VIEW],
            vec![
                Transition::new(0, "navigate_back", None, 1),
                Transition::new(1, "open_app", None, 0),
            ],
        ),
        config,
    );
    v.start().unwrap();

    v.execute(&ActionRequest::back()).unwrap();

    assert_eq!(
        actions(&v),
        vec![
            EnvAction::NavigateBack,
            EnvAction::OpenApp {
                app_name: "com.example".into()
            }
        ]
    );
    assert_eq!(v.current_screen().unwrap().as_deref(), Some("home"));
}

#[test]
fn back_without_app_name_stays_outside() {
    let mut v = verifier(mock(&[HOME_VIEW, LAUNCHER_VIEW]));
    v.start().unwrap();

    v.execute(&ActionRequest::back()).unwrap();
    assert_eq!(actions(&v), vec![EnvAction::NavigateBack]);
    // falls back to the default screen
    assert_eq!(v.current_screen().unwrap().as_deref(), Some("home"));
}

#[test]
fn describe_current_elements_lists_present_apis() {
    let mut v = verifier(mock(&[SETTINGS_VIEW]));
    v.start().unwrap();

    let text = v.describe_current_elements(true).unwrap();
    assert!(text.contains("settings__list"));
    assert!(text.contains("settings__wifi"));
    assert!(!text.contains("settings__cellular"));
    assert!(text.contains("Locator: //scrollbar[@resource_id='list']"));
}

#[test]
fn reset_returns_to_first_screen_and_clears_count() {
    let mut v = verifier(mock(&[HOME_VIEW, SETTINGS_VIEW]));
    v.start().unwrap();
    v.tap("home__settings", None).unwrap();
    assert_eq!(v.current_screen().unwrap().as_deref(), Some("settings"));

    v.reset().unwrap();
    assert_eq!(v.action_count(), 0);
    assert_eq!(v.current_screen().unwrap().as_deref(), Some("home"));
}
