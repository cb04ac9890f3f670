use screen_verifier::catalog::Catalog;
use screen_verifier::engine::{EngineConfig, Verifier};
use screen_verifier::env::{MockEnv, Transition};
use screen_verifier::trace::TraceLogger;

// ============================================================================
// Screens
// ============================================================================

pub const HOME_VIEW: &str = "
<div id='0'>
  <button id='1' resource_id='com.example:id/search'>Search</button>
  <button id='2' resource_id='com.example:id/settings'>Settings</button>
</div>";

pub const SETTINGS_VIEW: &str = "
<div id='0'>
  <button id='1' resource_id='com.example:id/back_button'>Back</button>
  <scrollbar id='2' resource_id='com.example:id/list'>
    <p id='3'>Wi-Fi</p>
    <p id='4'>Bluetooth</p>
  </scrollbar>
</div>";

pub const DETAIL_VIEW: &str = "
<div id='0'>
  <button id='1' resource_id='com.example:id/close'>Close</button>
  <p id='2'>Details</p>
</div>";

pub const KEYBOARD_VIEW: &str = "
<div id='0'>
  <p id='1'>Compose</p>
  <input id='2' resource_id='com.example:id/query' bounds='0,2300,1080,2380'></input>
</div>";

/// Not part of the catalog: the root tag matches no cataloged screen.
pub const LAUNCHER_VIEW: &str = "
<frame id='0'>
  <button id='1' resource_id='com.launcher:id/icon'>Example</button>
</frame>";

// ============================================================================
// Catalog
// ============================================================================

pub const CATALOG_JSON: &str = r#"{
  "home": {
    "skeleton": "<div><button resource_id='search'/><button resource_id='settings'/></div>",
    "elements": {
      "home__search": {
        "type": "button",
        "description": "Opens the search page",
        "xpath": "//button[@resource_id='search']",
        "paths": [["detail__back()"]]
      },
      "home__settings": {
        "type": "button",
        "description": "Opens the settings list",
        "effect": "navigates to settings",
        "xpath": ["//button[@resource_id='settings']", "//button[text()='Settings']"]
      }
    }
  },
  "settings": {
    "skeleton": "<div><button resource_id='back_button'/><scrollbar resource_id='list'><p/></scrollbar></div>",
    "elements": {
      "settings__back_button": {
        "description": "Returns to the home screen",
        "xpath": "//button[@resource_id='back_button']"
      },
      "settings__list": {
        "type": "list",
        "description": "List of settings categories",
        "xpath": "//scrollbar[@resource_id='list']",
        "paths": [["tap(home__settings)"]]
      },
      "settings__wifi": {
        "description": "Wi-Fi category",
        "xpath": "//p[text()='Wi-Fi']",
        "paths": [["tap(home__settings)"]]
      },
      "settings__cellular": {
        "description": "Cellular category, missing on this device",
        "xpath": "//p[text()='Cellular']"
      },
      "settings__missing": {
        "description": "Never shown",
        "xpath": "//p[text()='Missing']",
        "paths": [["tap(home__settings)", "tap(home__search)"]]
      }
    }
  },
  "detail": {
    "skeleton": "<div><button resource_id='close'/><p/></div>",
    "elements": {
      "detail__close": {
        "description": "Closes the detail page",
        "xpath": "//button[@resource_id='close']"
      }
    }
  },
  "compose": {
    "skeleton": "<div><p/><input resource_id='query'/></div>",
    "elements": {
      "compose__query": {
        "type": "input",
        "description": "Query text field",
        "xpath": "//input[@resource_id='query']"
      }
    }
  }
}"#;

pub fn catalog() -> Catalog {
    Catalog::from_json_str(CATALOG_JSON).unwrap()
}

/// Engine config without the settle pause.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        settle_delay_ms: 0,
        ..EngineConfig::default()
    }
}

pub fn mock(views: &[&str]) -> MockEnv {
    MockEnv::from_views(views).unwrap()
}

pub fn mock_with(views: &[&str], transitions: Vec<Transition>) -> MockEnv {
    mock(views).with_transitions(transitions)
}

pub fn verifier(env: MockEnv) -> Verifier<MockEnv> {
    verifier_with(env, test_config())
}

pub fn verifier_with(env: MockEnv, config: EngineConfig) -> Verifier<MockEnv> {
    Verifier::new(env, catalog(), config, TraceLogger::in_memory())
}
