use screen_verifier::env::parse_view;
use screen_verifier::skeleton::Skeleton;
use screen_verifier::tree::ElementTree;

use crate::common::fixtures::{HOME_VIEW, LAUNCHER_VIEW, SETTINGS_VIEW};

mod common;

fn skeleton_of(view: &str) -> Skeleton {
    ElementTree::from_raw(&parse_view(view).unwrap(), Some((1080, 2400))).skeleton()
}

#[test]
fn text_changes_keep_the_skeleton() {
    let a = skeleton_of(SETTINGS_VIEW);
    let b = skeleton_of(&SETTINGS_VIEW.replace("Wi-Fi", "Hotspot"));
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn list_length_does_not_matter() {
    let longer = SETTINGS_VIEW.replace(
        "<p id='4'>Bluetooth</p>",
        "<p id='4'>Bluetooth</p><p id='5'>Display</p><p id='6'>Sound</p>",
    );
    assert_eq!(skeleton_of(SETTINGS_VIEW), skeleton_of(&longer));
}

#[test]
fn consecutive_siblings_of_one_kind_collapse() {
    let skeleton = Skeleton::from_markup("<div><p/><p/><p/><button/></div>").unwrap();
    let root = skeleton.root().unwrap();
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].tag, "p");
    assert_eq!(root.children[1].tag, "button");
    assert_eq!(skeleton.count(), 3);
}

#[test]
fn non_consecutive_siblings_are_kept() {
    let skeleton = Skeleton::from_markup("<div><p/><button/><p/></div>").unwrap();
    assert_eq!(skeleton.root().unwrap().children.len(), 3);
}

#[test]
fn resource_id_distinguishes_kinds() {
    let skeleton = Skeleton::from_markup(
        "<div><button resource_id='a'/><button resource_id='b'/><button resource_id='b'/></div>",
    )
    .unwrap();
    let children = &skeleton.root().unwrap().children;
    assert_eq!(children.len(), 2);
    assert_eq!(children[1].resource_id.as_deref(), Some("b"));
}

#[test]
fn only_tag_and_resource_id_survive() {
    let skeleton = skeleton_of(HOME_VIEW);
    assert_eq!(
        skeleton.render(),
        "<div>\n  <button resource_id='search'></button>\n  <button resource_id='settings'></button>\n</div>\n"
    );
}

#[test]
fn stored_skeleton_matches_observation() {
    let stored = Skeleton::from_markup(
        "<div><button resource_id='back_button'/><scrollbar resource_id='list'><p/></scrollbar></div>",
    )
    .unwrap();
    assert_eq!(stored, skeleton_of(SETTINGS_VIEW));
}

#[test]
fn common_structure() {
    let home = skeleton_of(HOME_VIEW);
    let settings = skeleton_of(SETTINGS_VIEW);

    // root div plus one positional button without a shared resource id
    let shared = home.common(&settings);
    assert_eq!(shared.count(), 2);
    assert_eq!(shared.root().unwrap().children[0].resource_id, None);

    assert_eq!(home.common(&home), home);
    assert!(home.common(&skeleton_of(LAUNCHER_VIEW)).is_empty());
    assert!(home.common(&Skeleton::default()).is_empty());
}

#[test]
fn malformed_skeleton_is_an_error() {
    assert!(Skeleton::from_markup("<div><p></div>").is_err());
}
