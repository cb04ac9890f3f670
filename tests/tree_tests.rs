use screen_verifier::element::element_model::{RawNode, RawScreen};
use screen_verifier::env::parse_view;
use screen_verifier::locator::Locator;
use screen_verifier::tree::ElementTree;

use crate::common::fixtures::{KEYBOARD_VIEW, SETTINGS_VIEW};

mod common;

fn node(id: usize, children: &[usize]) -> RawNode {
    RawNode {
        id,
        child_ids: children.to_vec(),
        bound_box: Some([[0.0, 0.0], [100.0, 100.0]]),
        ..RawNode::default()
    }
}

fn text_node(id: usize, text: &str) -> RawNode {
    RawNode {
        text: Some(text.to_string()),
        ..node(id, &[])
    }
}

fn screen(nodes: Vec<RawNode>, root: usize) -> RawScreen {
    RawScreen {
        nodes,
        root_id: Some(root),
    }
}

fn view_tree(view: &str) -> ElementTree {
    ElementTree::from_raw(&parse_view(view).unwrap(), Some((1080, 2400)))
}

// =========================================================================
// Canonical ids
// =========================================================================

#[test]
fn ids_follow_preorder_rank() {
    let raw = screen(
        vec![
            node(10, &[30, 20]),
            node(30, &[5]),
            text_node(5, "deep"),
            text_node(20, "shallow"),
        ],
        10,
    );
    let tree = ElementTree::from_raw(&raw, None);

    assert_eq!(tree.root_id(), Some(5));
    assert_eq!(tree.node(5).unwrap().children, vec![10, 30]);
    assert_eq!(tree.node(10).unwrap().children, vec![20]);
    assert_eq!(tree.node(20).unwrap().element.text.as_deref(), Some("deep"));
    assert_eq!(tree.node(30).unwrap().element.text.as_deref(), Some("shallow"));
    assert_eq!(tree.node(20).unwrap().parent, Some(10));

    let leaves: Vec<usize> = tree.leaves(5).iter().map(|n| n.id).collect();
    assert_eq!(leaves, vec![20, 30]);
}

#[test]
fn construction_is_independent_of_delivery_order() {
    let ordered = screen(
        vec![
            node(1, &[2, 3]),
            text_node(2, "a"),
            node(3, &[4]),
            text_node(4, "b"),
        ],
        1,
    );
    let mut shuffled = ordered.clone();
    shuffled.nodes.reverse();

    let a = ElementTree::from_raw(&ordered, None);
    let b = ElementTree::from_raw(&shuffled, None);
    assert_eq!(a, b);
    assert_eq!(a.markup(), b.markup());
}

#[test]
fn cycles_and_dangling_children_are_ignored() {
    let raw = screen(
        vec![node(1, &[2, 9]), node(2, &[1, 3]), text_node(3, "x")],
        1,
    );
    let tree = ElementTree::from_raw(&raw, None);

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.node(1).unwrap().children, vec![2]);
    assert_eq!(tree.node(2).unwrap().children, vec![3]);
}

#[test]
fn local_ids_are_dense_over_actionable_nodes() {
    let tree = view_tree(SETTINGS_VIEW);

    assert_eq!(tree.node(0).unwrap().local_id, None);
    let locals: Vec<Option<usize>> = (1..=4).map(|id| tree.node(id).unwrap().local_id).collect();
    assert_eq!(locals, vec![Some(0), Some(1), Some(2), Some(3)]);
    assert_eq!(tree.scrollable_ids(), &[2]);
}

// =========================================================================
// Pruning
// =========================================================================

#[test]
fn subtrees_without_actionable_leaves_are_pruned() {
    let hidden = RawNode {
        is_visible: Some(false),
        ..text_node(4, "hidden")
    };
    let raw = screen(
        vec![node(1, &[2, 3]), text_node(2, "shown"), node(3, &[4]), hidden],
        1,
    );
    let tree = ElementTree::from_raw(&raw, None);

    assert_eq!(tree.len(), 2);
    assert_eq!(tree.node(1).unwrap().children, vec![2]);
    assert!(tree.node(3).is_none());
    assert!(!tree.markup().contains("hidden"));
}

#[test]
fn root_is_kept_even_when_nothing_is_actionable() {
    let hidden = RawNode {
        is_visible: Some(false),
        ..text_node(2, "hidden")
    };
    let tree = ElementTree::from_raw(&screen(vec![node(1, &[2]), hidden], 1), None);

    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root_id(), Some(1));
    assert!(tree.valid_ids().is_empty());
}

#[test]
fn empty_observation_gives_empty_tree() {
    let tree = ElementTree::from_raw(&RawScreen::default(), None);
    assert!(tree.is_empty());
    assert_eq!(tree.markup(), "");
}

// =========================================================================
// Subtrees and queries
// =========================================================================

#[test]
fn subtree_keeps_ids_and_locators() {
    let tree = view_tree(SETTINGS_VIEW);
    let sub = tree.extract_subtree(2);

    assert_eq!(sub.root_id(), Some(2));
    assert_eq!(sub.len(), 3);
    let wifi = sub
        .get_by_locator(&Locator::parse("//p[text()='Wi-Fi']").unwrap())
        .unwrap();
    assert_eq!(wifi.id, 3);
    assert!(sub
        .get_by_locator(&Locator::parse("//button").unwrap())
        .is_none());

    assert!(tree.extract_subtree(42).is_empty());
}

#[test]
fn document_form_carries_ids_and_short_resource_ids() {
    let tree = view_tree(SETTINGS_VIEW);
    let markup = tree.markup();

    assert!(markup.starts_with("<div id='0'>"));
    assert!(markup.contains("<scrollbar id='2' resource_id='list'>"));
    assert!(markup.contains("<p id='3'>Wi-Fi</p>"));
    assert!(!markup.contains("com.example"));
}

#[test]
fn text_and_attribute_queries() {
    let tree = view_tree(SETTINGS_VIEW);

    assert_eq!(tree.get_text(2).as_deref(), Some("Wi-Fi"));
    assert_eq!(tree.get_text(4).as_deref(), Some("Bluetooth"));
    assert_eq!(tree.get_text(99), None);

    let attrs = tree.get_attributes(1).unwrap();
    assert_eq!(attrs.resource_id.as_deref(), Some("back_button"));
    assert!(attrs.clickable);
    assert!(!attrs.editable);

    assert!(tree.is_match(2, "list"));
    assert!(tree.is_match(3, "Wi-Fi"));
    assert!(tree.is_match(1, "button"));
    assert!(!tree.is_match(3, "Wi"));
}

#[test]
fn children_are_direct_only() {
    let tree = view_tree(SETTINGS_VIEW);
    let ids: Vec<usize> = tree.children(0).iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn properties_match_across_observations() {
    let before = view_tree(SETTINGS_VIEW);
    let after = view_tree(&SETTINGS_VIEW.replace("Wi-Fi", "Hotspot"));

    let container = before.node(2).unwrap();
    assert_eq!(after.find_by_properties(container).map(|n| n.id), Some(2));
    assert_eq!(
        before.descriptions_without_text(),
        after.descriptions_without_text()
    );
    assert_ne!(before.markup(), after.markup());
}

#[test]
fn pixel_and_normalized_geometry() {
    let tree = view_tree(KEYBOARD_VIEW);
    let input = tree.node(2).unwrap();

    let pixels = input.element.bbox_pixels.unwrap();
    assert_eq!(pixels.center(), (540.0, 2340.0));
    let normalized = input.element.bbox.unwrap();
    assert!((normalized.y_min - 2300.0 / 2400.0).abs() < 1e-9);
    assert!(input.element.is_editable);
    assert_eq!(input.tag, "input");
}

#[test]
fn render_visible_flattens_wrappers() {
    let tree = view_tree(SETTINGS_VIEW);
    let text = tree.render_visible();

    assert!(!text.contains("div"));
    assert!(text.starts_with("<button resource_id='back_button'>Back</button>"));
    assert!(text.contains("  <p>Wi-Fi</p>"));
}
