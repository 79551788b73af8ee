//! Per-field status flags
//!
//! Fields are read through getters. Every change goes through one of the
//! transition methods here or the marking operations on `DocumentContext`,
//! so scans and queries always see a consistent picture.

use crate::spatial::Zone;

/// When a field receives focus during sequential keyboard navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabStopMode {
    #[default]
    Always,
    WhenPopulatedOrInvalid,
    WhenInvalid,
    Never,
}

impl TabStopMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "always" => Some(TabStopMode::Always),
            "when_populated_or_invalid" => Some(TabStopMode::WhenPopulatedOrInvalid),
            "when_invalid" => Some(TabStopMode::WhenInvalid),
            "never" => Some(TabStopMode::Never),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TabStopMode::Always => "always",
            TabStopMode::WhenPopulatedOrInvalid => "when_populated_or_invalid",
            TabStopMode::WhenInvalid => "when_invalid",
            TabStopMode::Never => "never",
        }
    }
}

/// Kind of spatial hint shown for a field without real spatial backing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HintType {
    #[default]
    None,
    /// The hint zones mark where the value is expected
    Direct,
    /// The hint is derived from related fields (row/column intersection)
    Indirect,
}

impl HintType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(HintType::None),
            "direct" => Some(HintType::Direct),
            "indirect" => Some(HintType::Indirect),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HintType::None => "none",
            HintType::Direct => "direct",
            HintType::Indirect => "indirect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldStatus {
    viewable: bool,
    viewed: bool,
    data_valid: bool,
    validation_enabled: bool,
    propagated: bool,
    tab_stop_mode: TabStopMode,
    persist: bool,
    hint_type: HintType,
    hint_zones: Vec<Zone>,
    accepted: bool,
}

impl Default for FieldStatus {
    fn default() -> Self {
        FieldStatus {
            viewable: true,
            viewed: false,
            data_valid: true,
            validation_enabled: true,
            propagated: false,
            tab_stop_mode: TabStopMode::Always,
            persist: true,
            hint_type: HintType::None,
            hint_zones: Vec::new(),
            accepted: false,
        }
    }
}

impl FieldStatus {
    pub fn viewable(&self) -> bool {
        self.viewable
    }

    pub fn viewed(&self) -> bool {
        self.viewed
    }

    pub fn data_valid(&self) -> bool {
        self.data_valid
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    pub fn propagated(&self) -> bool {
        self.propagated
    }

    pub fn tab_stop_mode(&self) -> TabStopMode {
        self.tab_stop_mode
    }

    pub fn persist(&self) -> bool {
        self.persist
    }

    pub fn hint_type(&self) -> HintType {
        self.hint_type
    }

    pub fn hint_zones(&self) -> &[Zone] {
        &self.hint_zones
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }

    /// Field is shown to the user and still needs to be looked at
    pub fn is_unviewed(&self) -> bool {
        self.viewable && !self.viewed
    }

    /// Field is shown to the user and currently fails validation
    pub fn is_invalid(&self) -> bool {
        self.viewable && self.validation_enabled && !self.data_valid
    }

    /// Whether sequential navigation should stop at this field
    pub fn is_tab_stop(&self, value_is_empty: bool) -> bool {
        if !self.viewable {
            return false;
        }
        let invalid = self.validation_enabled && !self.data_valid;
        match self.tab_stop_mode {
            TabStopMode::Always => true,
            TabStopMode::WhenPopulatedOrInvalid => !value_is_empty || invalid,
            TabStopMode::WhenInvalid => invalid,
            TabStopMode::Never => false,
        }
    }

    pub(crate) fn set_viewable(&mut self, viewable: bool) {
        self.viewable = viewable;
    }

    pub(crate) fn set_viewed(&mut self, viewed: bool) {
        self.viewed = viewed;
    }

    pub(crate) fn set_data_valid(&mut self, valid: bool) {
        self.data_valid = valid;
    }

    /// Disabling validation also clears any stale invalid flag
    pub(crate) fn set_validation_enabled(&mut self, enabled: bool) {
        self.validation_enabled = enabled;
        if !enabled {
            self.data_valid = true;
        }
    }

    pub(crate) fn set_propagated(&mut self, propagated: bool) {
        self.propagated = propagated;
    }

    pub(crate) fn set_tab_stop_mode(&mut self, mode: TabStopMode) {
        self.tab_stop_mode = mode;
    }

    pub(crate) fn set_persist(&mut self, persist: bool) {
        self.persist = persist;
    }

    pub(crate) fn set_hint(&mut self, hint_type: HintType, zones: Vec<Zone>) {
        self.hint_type = hint_type;
        self.hint_zones = if hint_type == HintType::None {
            Vec::new()
        } else {
            zones
        };
    }

    pub(crate) fn set_accepted(&mut self, accepted: bool) {
        self.accepted = accepted;
    }
}
