use screen_verifier::locator::{Locator, describe_locators, evaluate};
use screen_verifier::markup::{Document, parse};

const DOC: &str = "
<div id='0'>
  <button id='1' resource_id='back'>Back</button>
  <scrollbar id='2' resource_id='list'>
    <p id='3'>Wi-Fi</p>
    <p id='4' status='selected'>Bluetooth</p>
    <p id='5'>Battery saver</p>
  </scrollbar>
  <input id='6' resource_id='query' alt='Search field'></input>
</div>";

fn doc() -> Document {
    parse(DOC).unwrap()
}

/// Ids of the elements `raw` selects, in document order.
fn select(raw: &str) -> Vec<String> {
    let doc = doc();
    let locator = Locator::parse(raw).unwrap();
    evaluate(&doc, &locator)
        .into_iter()
        .filter_map(|i| doc.attr(i, "id").map(str::to_string))
        .collect()
}

#[test]
fn attribute_equality() {
    assert_eq!(select("//button[@resource_id='back']"), vec!["1"]);
    assert_eq!(select("//*[@resource_id='list']"), vec!["2"]);
    assert!(select("//button[@resource_id='list']").is_empty());
}

#[test]
fn text_predicates() {
    assert_eq!(select("//p[text()='Bluetooth']"), vec!["4"]);
    assert_eq!(select("//p[contains(text(), 'saver')]"), vec!["5"]);
    assert_eq!(select("//p[starts-with(., 'Wi')]"), vec!["3"]);
    assert_eq!(select("//p[normalize-space()='Battery saver']"), vec!["5"]);
}

#[test]
fn positional_predicates() {
    assert_eq!(select("//scrollbar/p[1]"), vec!["3"]);
    assert_eq!(select("//scrollbar/p[last()]"), vec!["5"]);
    assert_eq!(select("//scrollbar/p[position() > 1]"), vec!["4", "5"]);
    assert!(select("//scrollbar/p[4]").is_empty());
}

#[test]
fn boolean_combinations() {
    assert_eq!(select("//p[@status='selected' or text()='Wi-Fi']"), vec!["3", "4"]);
    assert_eq!(select("//p[not(@status)]"), vec!["3", "5"]);
    assert_eq!(select("//*[@resource_id and @alt]"), vec!["6"]);
    assert_eq!(select("//p[@id != '3' and @id != '5']"), vec!["4"]);
}

#[test]
fn paths_and_axes() {
    assert_eq!(select("/div/button"), vec!["1"]);
    assert_eq!(select("//p[text()='Wi-Fi']/.."), vec!["2"]);
    assert_eq!(select("//scrollbar[p[text()='Battery saver']]"), vec!["2"]);
    assert_eq!(select("//div/*").len(), 3);
    assert_eq!(select("scrollbar/p").len(), 3);
}

#[test]
fn union_is_deduplicated_in_document_order() {
    assert_eq!(
        select("//input | //button | //button[@resource_id='back']"),
        vec!["1", "6"]
    );
}

#[test]
fn syntax_errors_report_the_offset() {
    let err = Locator::parse("//p[text()='x'").unwrap_err();
    assert_eq!(err.locator, "//p[text()='x'");
    assert!(err.message.contains("']'"));

    assert!(Locator::parse("").is_err());
    assert!(Locator::parse("//p[@]").is_err());
    assert!(Locator::parse("//p[text()='open").is_err());
    assert!(Locator::parse("//p[0]").is_err());
    assert!(Locator::parse("//p[foo()]").is_err());
    assert!(Locator::parse("//@id").is_err());

    let err = Locator::parse("//p)").unwrap_err();
    assert_eq!(err.offset, 3);
}

#[test]
fn node_locator_selects_by_tag_and_id() {
    let locator = Locator::for_node("p", 4);
    assert_eq!(locator.to_string(), "//p[@id='4']");
    assert_eq!(locator, Locator::parse("//p[@id='4']").unwrap());

    let doc = doc();
    let hits = evaluate(&doc, &locator);
    assert_eq!(hits.len(), 1);
    assert_eq!(doc.node(hits[0]).text.as_deref(), Some("Bluetooth"));
}

#[test]
fn locator_list_description() {
    let locators = vec![
        Locator::parse("//a").unwrap(),
        Locator::parse("//b[1]").unwrap(),
    ];
    assert_eq!(describe_locators(&locators), "//a | //b[1]");
}

#[test]
fn locators_serialize_as_strings() {
    let locator = Locator::parse("//p[text()='Wi-Fi']").unwrap();
    let json = serde_json::to_string(&locator).unwrap();
    assert_eq!(json, "\"//p[text()='Wi-Fi']\"");

    let back: Locator = serde_json::from_str(&json).unwrap();
    assert_eq!(back, locator);
    assert!(serde_json::from_str::<Locator>("\"//p[\"").is_err());
}

// =========================================================================
// Document form
// =========================================================================

#[test]
fn document_parse_and_render() {
    let doc = parse("<a x='1'><b>t &amp; u</b><c/></a>").unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.node(root).tag, "a");
    assert_eq!(doc.attr(root, "x"), Some("1"));
    assert_eq!(doc.node(root).children.len(), 2);

    let b = doc.node(root).children[0];
    assert_eq!(doc.node(b).text.as_deref(), Some("t & u"));
    assert_eq!(doc.render(), "<a x='1'>\n  <b>t &amp; u</b>\n  <c></c>\n</a>\n");

    let again = parse(&doc.render()).unwrap();
    assert_eq!(again.render(), doc.render());
}

#[test]
fn document_parse_errors() {
    assert!(parse("<a><b></a>").is_err());
    assert!(parse("<a>").is_err());
    assert!(parse("text").is_err());
    assert!(parse("<a x='1></a>").is_err());
}
