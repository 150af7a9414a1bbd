//! Interactive crop editor state machine
//!
//! Pointer gestures on the preview overlay (draw, move, resize) as a pure
//! transition function over ratio-space events. The caller applies the
//! returned effects to the preset store; nothing here touches storage.

use crate::error::CropError;
use crate::preset::{CropPreset, RatioPoint, RatioRect};
use serde::{Deserialize, Serialize};

/// One of the eight resize handles drawn around the selected preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    N,
    S,
    E,
    W,
    Ne,
    Nw,
    Se,
    Sw,
}

impl ResizeHandle {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "n" => Some(Self::N),
            "s" => Some(Self::S),
            "e" => Some(Self::E),
            "w" => Some(Self::W),
            "ne" => Some(Self::Ne),
            "nw" => Some(Self::Nw),
            "se" => Some(Self::Se),
            "sw" => Some(Self::Sw),
            _ => None,
        }
    }

    fn moves_left(self) -> bool {
        matches!(self, Self::W | Self::Nw | Self::Sw)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::E | Self::Ne | Self::Se)
    }

    fn moves_top(self) -> bool {
        matches!(self, Self::N | Self::Ne | Self::Nw)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::S | Self::Se | Self::Sw)
    }
}

/// What the pointer went down on
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    Empty,
    PresetBody(String),
    Handle(String, ResizeHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Down { point: RatioPoint, target: HitTarget },
    Move { point: RatioPoint },
    Up { point: RatioPoint },
    /// Pointer left the tracking surface
    Leave,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureState {
    Idle,
    Drawing {
        anchor: RatioPoint,
        current: RatioRect,
    },
    Moving {
        preset_id: String,
        grab_offset: RatioPoint,
        original: RatioRect,
        current: RatioRect,
    },
    Resizing {
        preset_id: String,
        handle: ResizeHandle,
        start: RatioPoint,
        original: RatioRect,
        current: RatioRect,
    },
}

impl GestureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GestureState::Idle)
    }

    /// The rectangle being drawn or edited, for overlay rendering
    pub fn preview(&self) -> Option<RatioRect> {
        match self {
            GestureState::Idle => None,
            GestureState::Drawing { current, .. }
            | GestureState::Moving { current, .. }
            | GestureState::Resizing { current, .. } => Some(*current),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEffect {
    Select(String),
    Deselect,
    /// Overlay should show this rectangle while the gesture is active
    Preview(RatioRect),
    CreatePreset(RatioRect),
    UpdateGeometry { preset_id: String, rect: RatioRect },
    Cancelled,
    Rejected(CropError),
}

/// Read-only view of the surroundings a transition needs
#[derive(Debug, Clone, Copy)]
pub struct EditorContext<'a> {
    pub presets: &'a [CropPreset],
    pub selected: Option<&'a str>,
    pub max_presets: usize,
    /// Minimum drawn width/height in ratio space (pixel threshold converted)
    pub min_draw: (f64, f64),
    /// Size floor for resizing, in ratio space
    pub min_size: f64,
}

impl EditorContext<'_> {
    fn preset(&self, id: &str) -> Option<&CropPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    fn is_selected(&self, id: &str) -> bool {
        self.selected == Some(id)
    }
}

/// Advance the gesture state machine by one pointer event
pub fn transition(
    state: GestureState,
    event: PointerEvent,
    ctx: &EditorContext<'_>,
) -> (GestureState, Vec<EditorEffect>) {
    match (state, event) {
        (GestureState::Idle, PointerEvent::Down { point, target }) => begin(point, target, ctx),

        // One gesture at a time: a second press while busy is ignored
        (state, PointerEvent::Down { .. }) => (state, Vec::new()),

        (GestureState::Idle, _) => (GestureState::Idle, Vec::new()),

        (state, PointerEvent::Leave) => {
            tracing::debug!(?state, "Gesture cancelled");
            (GestureState::Idle, vec![EditorEffect::Cancelled])
        }

        (GestureState::Drawing { anchor, .. }, PointerEvent::Move { point }) => {
            let current = RatioRect::from_corners(anchor, point);
            (
                GestureState::Drawing { anchor, current },
                vec![EditorEffect::Preview(current)],
            )
        }

        (GestureState::Drawing { anchor, .. }, PointerEvent::Up { point }) => {
            let rect = RatioRect::from_corners(anchor, point);
            let (min_w, min_h) = ctx.min_draw;
            if rect.width > min_w && rect.height > min_h {
                (GestureState::Idle, vec![EditorEffect::CreatePreset(rect)])
            } else {
                // Accidental click, not an error
                (GestureState::Idle, Vec::new())
            }
        }

        (
            GestureState::Moving {
                preset_id,
                grab_offset,
                original,
                ..
            },
            PointerEvent::Move { point },
        ) => {
            let current = moved(&original, grab_offset, point);
            (
                GestureState::Moving {
                    preset_id,
                    grab_offset,
                    original,
                    current,
                },
                vec![EditorEffect::Preview(current)],
            )
        }

        (
            GestureState::Moving {
                preset_id,
                grab_offset,
                original,
                ..
            },
            PointerEvent::Up { point },
        ) => {
            let rect = moved(&original, grab_offset, point);
            let changed = (rect.x - original.x).abs() > f64::EPSILON
                || (rect.y - original.y).abs() > f64::EPSILON;
            let effects = if changed {
                vec![EditorEffect::UpdateGeometry { preset_id, rect }]
            } else {
                Vec::new()
            };
            (GestureState::Idle, effects)
        }

        (
            GestureState::Resizing {
                preset_id,
                handle,
                start,
                original,
                ..
            },
            PointerEvent::Move { point },
        ) => {
            let delta = RatioPoint::new(point.x - start.x, point.y - start.y);
            let current = resize(&original, handle, delta, ctx.min_size);
            (
                GestureState::Resizing {
                    preset_id,
                    handle,
                    start,
                    original,
                    current,
                },
                vec![EditorEffect::Preview(current)],
            )
        }

        (
            GestureState::Resizing {
                preset_id,
                handle,
                start,
                original,
                ..
            },
            PointerEvent::Up { point },
        ) => {
            let delta = RatioPoint::new(point.x - start.x, point.y - start.y);
            let rect = resize(&original, handle, delta, ctx.min_size);
            let effects = if rect.differs_from(&original) {
                vec![EditorEffect::UpdateGeometry { preset_id, rect }]
            } else {
                Vec::new()
            };
            (GestureState::Idle, effects)
        }
    }
}

fn begin(
    point: RatioPoint,
    target: HitTarget,
    ctx: &EditorContext<'_>,
) -> (GestureState, Vec<EditorEffect>) {
    match target {
        HitTarget::Empty => {
            if ctx.presets.len() >= ctx.max_presets {
                return (
                    GestureState::Idle,
                    vec![EditorEffect::Rejected(CropError::LimitExceeded {
                        limit: ctx.max_presets,
                    })],
                );
            }
            let mut effects = Vec::new();
            if ctx.selected.is_some() {
                effects.push(EditorEffect::Deselect);
            }
            let current = RatioRect::from_corners(point, point);
            (
                GestureState::Drawing {
                    anchor: point,
                    current,
                },
                effects,
            )
        }

        HitTarget::PresetBody(id) => match ctx.preset(&id) {
            Some(preset) if ctx.is_selected(&id) => {
                let original = preset.rect();
                let grab_offset = RatioPoint::new(point.x - original.x, point.y - original.y);
                (
                    GestureState::Moving {
                        preset_id: id,
                        grab_offset,
                        original,
                        current: original,
                    },
                    Vec::new(),
                )
            }
            Some(_) => (GestureState::Idle, vec![EditorEffect::Select(id)]),
            None => (GestureState::Idle, Vec::new()),
        },

        HitTarget::Handle(id, handle) => match ctx.preset(&id) {
            Some(preset) if ctx.is_selected(&id) => {
                let original = preset.rect();
                (
                    GestureState::Resizing {
                        preset_id: id,
                        handle,
                        start: point,
                        original,
                        current: original,
                    },
                    Vec::new(),
                )
            }
            Some(_) => (GestureState::Idle, vec![EditorEffect::Select(id)]),
            None => (GestureState::Idle, Vec::new()),
        },
    }
}

/// New origin follows the pointer minus the grab offset, kept on the page
fn moved(original: &RatioRect, grab_offset: RatioPoint, pointer: RatioPoint) -> RatioRect {
    let max_x = (1.0 - original.width).max(0.0);
    let max_y = (1.0 - original.height).max(0.0);
    RatioRect {
        x: (pointer.x - grab_offset.x).clamp(0.0, max_x),
        y: (pointer.y - grab_offset.y).clamp(0.0, max_y),
        ..*original
    }
}

/// Resize from a handle; the opposite edges stay fixed
pub fn resize(
    original: &RatioRect,
    handle: ResizeHandle,
    delta: RatioPoint,
    min_size: f64,
) -> RatioRect {
    let mut left = original.x;
    let mut top = original.y;
    let mut right = original.right();
    let mut bottom = original.bottom();

    if handle.moves_left() {
        left = (left + delta.x).clamp(0.0, (right - min_size).max(0.0));
    }
    if handle.moves_right() {
        right = (right + delta.x).clamp((left + min_size).min(1.0), 1.0);
    }
    if handle.moves_top() {
        top = (top + delta.y).clamp(0.0, (bottom - min_size).max(0.0));
    }
    if handle.moves_bottom() {
        bottom = (bottom + delta.y).clamp((top + min_size).min(1.0), 1.0);
    }

    RatioRect {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    }
}

/// Gesture state plus current selection
#[derive(Debug, Clone)]
pub struct Editor {
    state: GestureState,
    selected: Option<String>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            state: GestureState::Idle,
            selected: None,
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, preset_id: Option<String>) {
        self.selected = preset_id;
    }

    /// Abandon the gesture in progress, keeping the selection
    pub fn cancel(&mut self) {
        if !self.state.is_idle() {
            tracing::debug!("Gesture cancelled");
        }
        self.state = GestureState::Idle;
    }

    /// Drop any gesture and selection (document switch, reset)
    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
        self.selected = None;
    }

    /// Feed one pointer event; `ctx.selected` is taken from this editor
    pub fn handle(&mut self, event: PointerEvent, ctx: EditorContext<'_>) -> Vec<EditorEffect> {
        let ctx = EditorContext {
            selected: self.selected.as_deref(),
            ..ctx
        };
        let state = std::mem::replace(&mut self.state, GestureState::Idle);
        let (next, effects) = transition(state, event, &ctx);
        self.state = next;

        for effect in &effects {
            match effect {
                EditorEffect::Select(id) => self.selected = Some(id.clone()),
                EditorEffect::Deselect => self.selected = None,
                _ => {}
            }
        }
        effects
    }
}
