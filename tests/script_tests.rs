use screen_verifier::catalog::Direction;
use screen_verifier::script::script_model::{Access, MatchQuery, TargetBase, TargetRef};
use screen_verifier::trace::RecordKind;
use screen_verifier::script::{Script, ScriptRunner, StepOp, StepValue, compile, parse_selector};

use crate::common::fixtures::{HOME_VIEW, SETTINGS_VIEW, mock, verifier};

mod common;

// =========================================================================
// Compiler
// =========================================================================

const WIFI_SCRIPT: &str = "\
# open the settings list
tap($home__settings)  # navigates
for row in $settings__list:
    get_text(row)
len($settings__list)
";

#[test]
fn compiles_statements_and_loops() {
    let script = compile("wifi", WIFI_SCRIPT).unwrap();

    assert_eq!(script.name, "wifi");
    assert_eq!(script.steps.len(), 3);
    assert_eq!(script.step_count(), 4);

    assert_eq!(script.steps[0].source.line, 2);
    assert_eq!(script.steps[0].source.code, "tap($home__settings)");
    assert_eq!(
        script.steps[0].op,
        StepOp::Tap {
            target: TargetRef::api("home__settings")
        }
    );

    match &script.steps[1].op {
        StepOp::For { var, target, body } => {
            assert_eq!(var, "row");
            assert_eq!(*target, TargetRef::api("settings__list"));
            assert_eq!(body.len(), 1);
            assert_eq!(body[0].source.line, 4);
            assert_eq!(
                body[0].op,
                StepOp::GetText {
                    target: TargetRef::var("row")
                }
            );
        }
        other => panic!("expected a loop, got {:?}", other),
    }
    assert_eq!(script.steps[2].op.name(), "len");
}

#[test]
fn compiles_string_arguments() {
    let script = compile(
        "args",
        "set_text($compose__query, \"a \\\"b\\\" # c\")\nscroll($settings__list, 'up')\nback()",
    )
    .unwrap();

    assert_eq!(
        script.steps[0].op,
        StepOp::SetText {
            target: TargetRef::api("compose__query"),
            text: "a \"b\" # c".into()
        }
    );
    assert_eq!(
        script.steps[1].op,
        StepOp::Scroll {
            target: TargetRef::api("settings__list"),
            direction: Direction::Up
        }
    );
    assert_eq!(script.steps[2].op, StepOp::Back);
}

#[test]
fn nested_loops_see_outer_variables() {
    let text = "for a in $settings__list:\n  for b in a:\n    tap(b)\n  tap(a)\n";
    let script = compile("nested", text).unwrap();
    assert_eq!(script.step_count(), 4);
}

#[test]
fn compile_errors_carry_the_line() {
    let cases = [
        ("jump($home__search)", 1, "unknown action 'jump'"),
        ("tap($a, $b)", 1, "tap() takes 1 argument(s), got 2"),
        ("back()\n    back()", 2, "unexpected indentation"),
        ("for row in $settings__list:\nback()", 1, "expected an indented loop body"),
        ("back()\ntap(row)", 2, "unknown variable 'row'"),
        ("scroll($settings__list, \"sideways\")", 1, "unknown scroll direction"),
        ("set_text($compose__query, \"open)", 1, "unterminated string literal"),
        ("tap $home__search", 1, "expected a call"),
    ];

    for (text, line, message) in cases {
        let err = compile("bad", text).unwrap_err();
        assert_eq!(err.line, line, "{}", text);
        assert!(
            err.message.contains(message),
            "{:?} does not mention {:?}",
            err.message,
            message
        );
    }
}

#[test]
fn loop_variable_goes_out_of_scope() {
    let text = "for row in $settings__list:\n    tap(row)\ntap(row)";
    let err = compile("scope", text).unwrap_err();
    assert_eq!(err.line, 3);
}

#[test]
fn parses_selectors() {
    let indexed = parse_selector("$settings__list[2]", 1).unwrap();
    assert_eq!(indexed.base, TargetBase::Api("settings__list".into()));
    assert_eq!(indexed.access, Some(Access::Index(2)));

    let by_text = parse_selector("row.match('Wi-Fi')", 1).unwrap();
    assert_eq!(by_text.base, TargetBase::Var("row".into()));
    assert_eq!(
        by_text.access,
        Some(Access::Match(MatchQuery::Text("Wi-Fi".into())))
    );

    let by_attrs = parse_selector("$settings__list.match({\"checked\": true})", 1).unwrap();
    match by_attrs.access {
        Some(Access::Match(MatchQuery::Attributes(map))) => {
            assert_eq!(map.get("checked"), Some(&serde_json::Value::Bool(true)));
        }
        other => panic!("expected attribute match, got {:?}", other),
    }

    assert!(parse_selector("$", 1).is_err());
    assert!(parse_selector("$list.foo", 1).is_err());
    assert!(parse_selector("$list[x]", 1).is_err());
    assert!(parse_selector("$list.match([1])", 1).is_err());
}

#[test]
fn selector_display_parses_back() {
    for text in ["$settings__list", "$settings__list[0]", "row.match(\"Wi-Fi\")"] {
        let selector = parse_selector(text, 1).unwrap();
        assert_eq!(selector.to_string(), text);
    }
}

#[test]
fn compiled_script_survives_yaml() {
    let script = compile("wifi", WIFI_SCRIPT).unwrap();
    let yaml = serde_yaml::to_string(&script).unwrap();
    assert!(yaml.contains("$settings__list"));

    let loaded: Script = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(loaded, script);
}

// =========================================================================
// Runner
// =========================================================================

#[test]
fn runs_loop_and_collects_outputs() {
    let script = compile("wifi", WIFI_SCRIPT).unwrap();
    let mut v = verifier(mock(&[HOME_VIEW, SETTINGS_VIEW]));

    let result = ScriptRunner::run(&script, &mut v);

    assert!(result.passed, "{:?}", result.error);
    assert_eq!(result.script, "wifi");
    assert_eq!(result.steps_run, 5);
    assert_eq!(result.actions, 7);
    let values: Vec<&StepValue> = result.outputs.iter().map(|o| &o.value).collect();
    assert_eq!(
        values,
        vec![
            &StepValue::Text(Some("Wi-Fi".into())),
            &StepValue::Text(Some("Bluetooth".into())),
            &StepValue::Count(2),
        ]
    );
    assert_eq!(result.outputs[2].source.line, 5);
}

#[test]
fn first_failure_ends_the_run() {
    let script = compile("broken", "tap($nope__x)\ntap($home__search)").unwrap();
    let mut v = verifier(mock(&[HOME_VIEW]));

    let result = ScriptRunner::run(&script, &mut v);

    assert!(!result.passed);
    assert_eq!(result.steps_run, 1);
    let error = result.error.unwrap();
    assert_eq!(error.kind, "doc");
    assert_eq!(error.location.unwrap().line, 1);
    assert!(v.env().history().is_empty());
}

#[test]
fn index_past_the_end_is_an_action_failure() {
    let script = compile("index", "tap($settings__list[5])").unwrap();
    let mut v = verifier(mock(&[SETTINGS_VIEW]));

    let result = ScriptRunner::run(&script, &mut v);

    let error = result.error.unwrap();
    assert_eq!(error.kind, "action");
    assert_eq!(error.location.unwrap().code, "tap($settings__list[5])");

    let records = v.logger().records();
    let failed = records.last().unwrap();
    assert_eq!(failed.kind, RecordKind::Failed);
    assert_eq!(failed.action.as_deref(), Some("index"));
    assert_eq!(failed.api_name.as_deref(), Some("settings__list"));
    assert!(v.env().history().is_empty());
}

#[test]
fn match_then_read_attributes() {
    let script = compile(
        "attrs",
        "get_attributes($settings__list.match(\"Bluetooth\"))\nscroll($settings__list, \"down\")",
    )
    .unwrap();
    let mut v = verifier(mock(&[SETTINGS_VIEW]));

    let result = ScriptRunner::run(&script, &mut v);

    assert!(result.passed, "{:?}", result.error);
    match &result.outputs[0].value {
        StepValue::Attributes(attrs) => {
            assert_eq!(attrs.id, 4);
            assert_eq!(attrs.text.as_deref(), Some("Bluetooth"));
        }
        other => panic!("expected attributes, got {:?}", other),
    }
    assert_eq!(result.outputs[1].value, StepValue::AtEnd(true));
}
