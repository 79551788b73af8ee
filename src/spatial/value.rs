//! Text plus optional zones

/// A rectangle on one page of the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Zone {
    pub page: u32,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Zone {
    pub fn new(page: u32, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Zone {
            page,
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Field value: text, with the zones it was read from when it came off a page.
///
/// An empty zone list means plain text. When zones are present they describe
/// the whole text or a prefix of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpatialValue {
    text: String,
    zones: Vec<Zone>,
}

impl SpatialValue {
    /// Plain text value
    pub fn plain(text: impl Into<String>) -> Self {
        SpatialValue {
            text: text.into(),
            zones: Vec::new(),
        }
    }

    /// Value backed by page zones
    pub fn spatial(text: impl Into<String>, zones: Vec<Zone>) -> Self {
        SpatialValue {
            text: text.into(),
            zones,
        }
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// True when the value has real spatial backing
    #[inline]
    pub fn has_spatial_info(&self) -> bool {
        !self.zones.is_empty()
    }

    /// Strip zones, keep text
    pub fn downgrade(&mut self) {
        self.zones.clear();
    }

    /// Consuming form of [`downgrade`](Self::downgrade)
    pub fn into_plain(mut self) -> Self {
        self.downgrade();
        self
    }

    pub fn into_parts(self) -> (String, Vec<Zone>) {
        (self.text, self.zones)
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub(crate) fn extend_zones(&mut self, zones: &[Zone]) {
        self.zones.extend_from_slice(zones);
    }

    pub(crate) fn replace_zones(&mut self, zones: Vec<Zone>) {
        self.zones = zones;
    }
}

impl From<&str> for SpatialValue {
    fn from(text: &str) -> Self {
        SpatialValue::plain(text)
    }
}

impl From<String> for SpatialValue {
    fn from(text: String) -> Self {
        SpatialValue::plain(text)
    }
}
