use crate::backend::{BackendResult, DeviceBackend, WidgetInput, WidgetKind};
use crate::errors::TetherError;
use crate::settings::value::{match_choice, SettingInput, SettingValue};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// The one configuration snapshot a session keeps cached.
///
/// The snapshot is fetched lazily, served for reads until it is older than
/// the freshness window, and released before any replacement is fetched.
pub struct SnapshotCache<B: DeviceBackend> {
    root: Option<B::Widget>,
    captured_at: Option<Instant>,
    freshness: Duration,
}

impl<B: DeviceBackend> SnapshotCache<B> {
    pub fn new(freshness: Duration) -> Self {
        Self {
            root: None,
            captured_at: None,
            freshness,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.root.is_some()
    }

    fn is_stale(&self) -> bool {
        match (&self.root, self.captured_at) {
            (Some(_), Some(at)) => at.elapsed() > self.freshness,
            _ => true,
        }
    }

    /// Hand the cached snapshot back to the backend, if there is one.
    pub fn release(&mut self, backend: &B) {
        self.captured_at = None;
        if let Some(root) = self.root.take() {
            if let Err(status) = backend.config_release(root) {
                log::warn!(
                    "Failed to release configuration snapshot: {} ({})",
                    backend.describe_status(status),
                    status
                );
            }
        }
    }
}

/// Typed get/set access to a live camera's settings.
///
/// Borrowed from a live [`CameraSession`](crate::session::CameraSession);
/// all reads inside the freshness window share one snapshot. Missing labels
/// and backend refusals come back as `None`/`false`, never as errors.
pub struct ConfigurationTree<'a, B: DeviceBackend> {
    backend: &'a B,
    camera: &'a mut B::Camera,
    context: &'a B::Context,
    cache: &'a mut SnapshotCache<B>,
}

impl<'a, B: DeviceBackend> ConfigurationTree<'a, B> {
    pub(crate) fn new(
        backend: &'a B,
        camera: &'a mut B::Camera,
        context: &'a B::Context,
        cache: &'a mut SnapshotCache<B>,
    ) -> Self {
        Self {
            backend,
            camera,
            context,
            cache,
        }
    }

    /// Read and decode one setting.
    pub fn get(&mut self, label: &str) -> Option<SettingValue> {
        let node = self.find(label)?;
        match self.decode(&node) {
            Ok(value) => Some(value),
            Err(status) => {
                log::warn!(
                    "Failed to read setting {}: {} ({})",
                    label,
                    self.backend.describe_status(status),
                    status
                );
                None
            }
        }
    }

    /// Candidate list of a radio or menu setting.
    pub fn get_choices(&mut self, label: &str) -> Option<Vec<String>> {
        let node = self.find(label)?;
        match self.backend.widget_kind(&node) {
            Ok(kind) if kind.is_choice() => self.choices_of(&node).ok(),
            _ => None,
        }
    }

    /// Coerce `input` into the setting's current type, write it and commit
    /// the snapshot. Returns `true` only when the commit succeeded; on any
    /// failure the snapshot is dropped so later reads see the camera again.
    pub fn set(&mut self, label: &str, input: impl Into<SettingInput>) -> bool {
        let input = input.into();
        let Some(node) = self.find(label) else {
            log::debug!("Setting {} not present, nothing to set", label);
            return false;
        };

        let kind = match self.backend.widget_kind(&node) {
            Ok(kind) => kind,
            Err(status) => {
                log::warn!("Failed to read type of {}: {}", label, status);
                return false;
            }
        };

        let Some(value) = self.coerce(&node, kind, &input) else {
            log::warn!("Cannot set {} ({:?}) from {:?}", label, kind, input);
            return false;
        };

        let written = self.backend.widget_set(&node, &value);
        drop(node);
        if let Err(status) = written {
            log::warn!(
                "Camera rejected {} = {:?}: {} ({})",
                label,
                value,
                self.backend.describe_status(status),
                status
            );
            self.cache.release(self.backend);
            return false;
        }

        // A failed commit leaves the rejected value in the snapshot.
        if !self.commit() {
            self.cache.release(self.backend);
            return false;
        }
        true
    }

    /// Read every label of a model catalog. Absent labels map to `None`.
    pub fn enumerate<I, S>(&mut self, catalog: I) -> BTreeMap<String, Option<SettingValue>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        catalog
            .into_iter()
            .map(|label| {
                let label = label.as_ref();
                (label.to_string(), self.get(label))
            })
            .collect()
    }

    /// Drop the cached snapshot so the next access refetches it.
    pub fn invalidate(&mut self) {
        self.cache.release(self.backend);
    }

    fn refresh(&mut self) -> bool {
        if !self.cache.is_stale() {
            return true;
        }

        self.cache.release(self.backend);
        match self.backend.config_fetch(self.camera, self.context) {
            Ok(root) => {
                self.cache.root = Some(root);
                self.cache.captured_at = Some(Instant::now());
                true
            }
            Err(status) => {
                let err = TetherError::config_fetch(status.code(), self.backend.describe_status(status));
                log::warn!("{}", err);
                false
            }
        }
    }

    fn find(&mut self, label: &str) -> Option<B::Node> {
        if !self.refresh() {
            return None;
        }
        let root = self.cache.root.as_ref()?;
        self.backend.widget_child_by_name(root, label).ok()
    }

    fn commit(&mut self) -> bool {
        let Some(root) = self.cache.root.as_ref() else {
            return false;
        };
        match self.backend.config_commit(self.camera, self.context, root) {
            Ok(()) => true,
            Err(status) => {
                let err = TetherError::config_commit(status.code(), self.backend.describe_status(status));
                log::warn!("{}", err);
                false
            }
        }
    }

    fn decode(&self, node: &B::Node) -> BackendResult<SettingValue> {
        let backend = self.backend;
        let value = match backend.widget_kind(node)? {
            WidgetKind::Text => SettingValue::Text(backend.widget_text(node)?),
            WidgetKind::Radio => SettingValue::ChoiceSingle {
                value: backend.widget_text(node)?,
                choices: self.choices_of(node)?,
            },
            WidgetKind::Menu => SettingValue::ChoiceMenu {
                value: backend.widget_text(node)?,
                choices: self.choices_of(node)?,
            },
            WidgetKind::Range => {
                let (min, max, step) = backend.widget_range(node)?;
                SettingValue::Range {
                    value: backend.widget_float(node)?,
                    min,
                    max,
                    step,
                }
            }
            WidgetKind::Toggle => SettingValue::Toggle(backend.widget_int(node)? != 0),
            WidgetKind::Date => SettingValue::DateStamp(backend.widget_int(node)?),
            WidgetKind::Window
            | WidgetKind::Section
            | WidgetKind::Button
            | WidgetKind::Unknown(_) => SettingValue::Unsupported,
        };
        Ok(value)
    }

    fn choices_of(&self, node: &B::Node) -> BackendResult<Vec<String>> {
        let count = self.backend.widget_choice_count(node)?;
        (0..count)
            .map(|index| self.backend.widget_choice(node, index))
            .collect()
    }

    fn coerce(&self, node: &B::Node, kind: WidgetKind, input: &SettingInput) -> Option<WidgetInput> {
        match kind {
            WidgetKind::Toggle => Some(WidgetInput::Int(i32::from(input.is_truthy()))),
            WidgetKind::Range => input.as_f32().map(WidgetInput::Float),
            WidgetKind::Radio | WidgetKind::Menu => {
                let choices = self.choices_of(node).unwrap_or_default();
                Some(WidgetInput::Text(match_choice(&choices, input)))
            }
            WidgetKind::Text => Some(WidgetInput::Text(input.to_text())),
            WidgetKind::Date => input.as_i32().map(WidgetInput::Int),
            WidgetKind::Window
            | WidgetKind::Section
            | WidgetKind::Button
            | WidgetKind::Unknown(_) => None,
        }
    }
}
