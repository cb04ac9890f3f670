use screen_verifier::element::classify::{element_from_raw, is_actionable};
use screen_verifier::element::element_model::{BoundingBox, ElementRole, RawNode, UiElement, class_tag};
use screen_verifier::element::normalize::{
    MAX_CONTENT_CHARS, display_text, escape_markup, short_resource_id, text_fingerprint,
    unescape_markup,
};

#[test]
fn display_text_flattens_newlines() {
    assert_eq!(display_text(Some("a\nb")).as_deref(), Some("a \\ b"));
    assert_eq!(display_text(Some("")), None);
    assert_eq!(display_text(None), None);
}

#[test]
fn display_text_is_truncated() {
    let long = "x".repeat(MAX_CONTENT_CHARS + 10);
    assert_eq!(display_text(Some(&long)).unwrap().chars().count(), MAX_CONTENT_CHARS);
}

#[test]
fn resource_ids_are_shortened() {
    assert_eq!(short_resource_id("com.example:id/search"), "search");
    assert_eq!(short_resource_id("plain"), "plain");
}

#[test]
fn class_names_become_tags() {
    assert_eq!(class_tag(Some("android.widget.FrameLayout")), "FrameLayout");
    assert_eq!(class_tag(Some("div")), "div");
    assert_eq!(class_tag(None), "div");
}

#[test]
fn markup_escaping_round_trips() {
    let raw = "a < b & 'c' > \"d\"";
    let escaped = escape_markup(raw);
    assert!(!escaped.contains('<'));
    assert_eq!(unescape_markup(&escaped), raw);
}

#[test]
fn fingerprints_are_stable_hex() {
    let a = text_fingerprint("<div></div>");
    assert_eq!(a.len(), 40);
    assert_eq!(a, text_fingerprint("<div></div>"));
    assert_ne!(a, text_fingerprint("<div/>"));
}

#[test]
fn roles_follow_capability_flags() {
    let mut element = UiElement::default();
    assert_eq!(ElementRole::infer(&element), ElementRole::P);

    element.is_scrollable = true;
    assert_eq!(ElementRole::infer(&element), ElementRole::Scrollbar);
    element.is_clickable = true;
    assert_eq!(ElementRole::infer(&element), ElementRole::Button);
    element.is_checkable = true;
    assert_eq!(ElementRole::infer(&element), ElementRole::Checkbox);
    element.is_editable = true;
    assert_eq!(ElementRole::infer(&element), ElementRole::Input);
    assert_eq!(ElementRole::Input.tag(), "input");
}

#[test]
fn actionability() {
    let visible = UiElement {
        is_visible: true,
        ..UiElement::default()
    };
    assert!(is_actionable(&visible, false));
    assert!(!is_actionable(&visible, true));

    let described = UiElement {
        content_description: Some("Menu".into()),
        ..visible.clone()
    };
    assert!(is_actionable(&described, true));

    let scrollable = UiElement {
        is_scrollable: true,
        ..visible.clone()
    };
    assert!(is_actionable(&scrollable, true));

    let hidden = UiElement::default();
    assert!(!is_actionable(&hidden, false));
}

#[test]
fn raw_nodes_are_normalized() {
    let raw = RawNode {
        id: 1,
        text: Some(String::new()),
        resource_id: Some("com.example:id/ok".into()),
        bound_box: Some([[0.0, 0.0], [540.0, 1200.0]]),
        ..RawNode::default()
    };
    let element = element_from_raw(&raw, Some((1080, 2400)));

    assert_eq!(element.text, None);
    assert!(element.is_visible);
    assert!(element.is_enabled);
    assert_eq!(
        element.bbox,
        Some(BoundingBox {
            x_min: 0.0,
            x_max: 0.5,
            y_min: 0.0,
            y_max: 0.5
        })
    );
    assert_eq!(element_from_raw(&raw, None).bbox, None);
}
