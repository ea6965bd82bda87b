use serde::{Deserialize, Serialize};

/// One imported sound. Stored in the config document's `audio_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    pub name: String,
    pub path: String,
    /// e.g. "Ctrl+Shift+A"; empty when unassigned
    #[serde(default)]
    pub hotkey: String,
    /// Cached at import, e.g. "3.2s"
    #[serde(default)]
    pub duration: String,
    /// Cached at import, e.g. "0.41MB"
    #[serde(default)]
    pub size: String,
}

impl Clip {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
        hotkey: impl Into<String>,
        duration: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            hotkey: hotkey.into(),
            duration: duration.into(),
            size: size.into(),
        }
    }
}

/// Reorder `clips` to follow `ids`. Unknown ids are ignored and clips not
/// named keep their relative order at the end.
pub fn reorder(clips: Vec<Clip>, ids: &[String]) -> Vec<Clip> {
    let mut remaining: Vec<Option<Clip>> = clips.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());

    for id in ids {
        if let Some(slot) = remaining
            .iter_mut()
            .find(|slot| slot.as_ref().map_or(false, |c| &c.id == id))
        {
            ordered.extend(slot.take());
        }
    }
    ordered.extend(remaining.into_iter().flatten());
    ordered
}
