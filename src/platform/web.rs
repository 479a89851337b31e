//! Browser bindings
//!
//! The host page owns rendering and the animation frame loop; it forwards
//! key events and frame times here and reads back JSON snapshots.

use wasm_bindgen::prelude::*;

use super::keymap::{self, KeyAction};
use crate::persistence::{KeyValueStore, LocalStorageStore, MemoryStore, StoreError};
use crate::session::{NextStage, Session};
use crate::sim::TickInput;
use crate::tuning::{Platform, Tuning};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialized".into());
    }
    log::info!("Shinobi Stealth starting...");
}

/// LocalStorage when the browser allows it, memory otherwise
enum WebStore {
    Local(LocalStorageStore),
    Memory(MemoryStore),
}

impl WebStore {
    fn open() -> Self {
        match LocalStorageStore::open() {
            Ok(store) => WebStore::Local(store),
            Err(e) => {
                log::warn!("{}; progress will not survive a reload", e);
                WebStore::Memory(MemoryStore::new())
            }
        }
    }
}

impl KeyValueStore for WebStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            WebStore::Local(s) => s.get(key),
            WebStore::Memory(s) => s.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            WebStore::Local(s) => s.set(key, value),
            WebStore::Memory(s) => s.set(key, value),
        }
    }
}

fn to_js<E: std::fmt::Display>(e: E) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct StealthGame {
    session: Session<WebStore>,
    input: TickInput,
}

#[wasm_bindgen]
impl StealthGame {
    /// `platform` is "desktop" or "mobile"; unknown values fall back to desktop
    #[wasm_bindgen(constructor)]
    pub fn new(platform: &str) -> StealthGame {
        let platform = Platform::from_str(platform).unwrap_or_default();
        let seed = js_sys::Date::now() as u64;
        log::info!("Platform: {}, seed: {}", platform.as_str(), seed);
        StealthGame {
            session: Session::new(WebStore::open(), Tuning::for_platform(platform), seed),
            input: TickInput::default(),
        }
    }

    pub fn start_mission(&mut self) {
        self.input.clear();
        self.session.start_mission();
    }

    pub fn select_stage(&mut self, stage: u8) -> Result<(), JsValue> {
        self.input.clear();
        self.session.select_stage(stage).map_err(to_js)
    }

    pub fn restart_stage(&mut self) -> Result<(), JsValue> {
        self.input.clear();
        self.session.restart_stage().map_err(to_js)
    }

    /// Returns false once the final stage has been cleared
    pub fn next_stage(&mut self) -> Result<bool, JsValue> {
        self.input.clear();
        match self.session.next_stage().map_err(to_js)? {
            NextStage::Started(_) => Ok(true),
            NextStage::CampaignComplete => Ok(false),
        }
    }

    pub fn toggle_pause(&mut self) -> Result<bool, JsValue> {
        self.session.toggle_pause().map_err(to_js)
    }

    /// Forward a `keydown` code. Returns true if the key was consumed.
    pub fn key_down(&mut self, code: &str) -> bool {
        self.handle(keymap::key_down(code))
    }

    pub fn key_up(&mut self, code: &str) -> bool {
        self.handle(keymap::key_up(code))
    }

    /// Advance by one animation frame (`dt` in seconds)
    pub fn frame(&mut self, dt: f32) -> Result<u32, JsValue> {
        if self.session.game().is_none() {
            return Ok(0);
        }
        self.session.advance(dt, &mut self.input).map_err(to_js)
    }

    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        match self.session.game() {
            Some(game) => serde_json::to_string(&game.snapshot()).map_err(to_js),
            None => Ok("null".to_string()),
        }
    }

    /// Events since the previous call, as a JSON array
    pub fn events_json(&mut self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.drain_events()).map_err(to_js)
    }

    pub fn progress_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.session.progress()).map_err(to_js)
    }

    pub fn max_unlocked_stage(&self) -> u8 {
        self.session.progress().max_unlocked_stage
    }
}

impl StealthGame {
    fn handle(&mut self, action: Option<KeyAction>) -> bool {
        match action {
            Some(KeyAction::Command(command)) => {
                if self.session.game().is_none() {
                    return false;
                }
                self.input.push(command);
                true
            }
            Some(KeyAction::Start) if self.session.game().is_none() => {
                self.start_mission();
                true
            }
            Some(KeyAction::Restart) => self.restart_stage().is_ok(),
            _ => false,
        }
    }
}
