//! Sprite-sheet animation selection.
//!
//! Each [`PetState`] maps to a [`SpriteDescriptor`] describing a horizontal
//! strip of frames. The [`Animator`] tracks which strip is active and which
//! frame is showing; the runner advances it on the descriptor's cadence.
//! Slicing pixels out of the strip is left to the front end.

use crate::error::{Error, Result};
use crate::pet::PetState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Image shown when a sprite sheet cannot be loaded.
pub const PLACEHOLDER_IMAGE: &str = "fallback.png";

/// Shortest frame duration accepted; anything smaller is raised to this.
const MIN_FRAME_DURATION: Duration = Duration::from_millis(1);

/// How to slice and time one animation strip.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteDescriptor {
    /// Sheet path, relative to the asset directory.
    pub sheet: PathBuf,
    /// Number of frames in the strip, at least 1.
    pub frame_count: u32,
    /// How long each frame stays on screen.
    pub frame_duration: Duration,
    /// Whether to wrap around after the last frame.
    pub looping: bool,
}

impl SpriteDescriptor {
    /// Build a descriptor, raising a zero frame count or duration to the minimum.
    pub fn new(
        sheet: impl Into<PathBuf>,
        frame_count: u32,
        frame_secs: f64,
        looping: bool,
    ) -> Self {
        let frame_duration = Duration::try_from_secs_f64(frame_secs)
            .unwrap_or(MIN_FRAME_DURATION)
            .max(MIN_FRAME_DURATION);
        Self {
            sheet: sheet.into(),
            frame_count: frame_count.max(1),
            frame_duration,
            looping,
        }
    }
}

/// Lookup from pet state to animation strip.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTable {
    entries: HashMap<PetState, SpriteDescriptor>,
}

impl Default for AnimationTable {
    fn default() -> Self {
        let strip = SpriteDescriptor::new;
        Self::empty()
            .with(PetState::Idle, strip("idle_sheet.png", 4, 0.25, true))
            .with(PetState::Eating, strip("eating_sheet.png", 6, 0.2, false))
            .with(PetState::Playing, strip("playing_sheet.png", 6, 0.15, true))
            .with(PetState::Sleeping, strip("sleeping_sheet.png", 4, 0.5, true))
            .with(PetState::Hungry, strip("hungry_sheet.png", 3, 0.3, true))
            .with(PetState::Sick, strip("sick_sheet.png", 3, 0.4, true))
            .with(PetState::Tired, strip("tired_sheet.png", 3, 0.4, true))
    }
}

impl AnimationTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Add or replace the strip for `state`.
    pub fn with(mut self, state: PetState, descriptor: SpriteDescriptor) -> Self {
        self.entries.insert(state, descriptor);
        self
    }

    /// The strip for `state`, or the idle strip if `state` has none.
    pub fn resolve(&self, state: PetState) -> Option<&SpriteDescriptor> {
        self.entries
            .get(&state)
            .or_else(|| self.entries.get(&PetState::Idle))
    }
}

/// A loaded image.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteSheet {
    pub path: PathBuf,
    pub data: Arc<[u8]>,
}

/// Source of sprite-sheet images.
pub trait SpriteLoader: Send {
    /// Load the image at `path`, relative to the loader's asset directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::SpriteLoad` if the image is unavailable.
    fn load(&mut self, path: &Path) -> Result<SpriteSheet>;
}

/// Loads images from a directory, caching them by path.
#[derive(Debug, Clone)]
pub struct FsSpriteLoader {
    root: PathBuf,
    cache: HashMap<PathBuf, SpriteSheet>,
}

impl FsSpriteLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: HashMap::new(),
        }
    }
}

impl SpriteLoader for FsSpriteLoader {
    fn load(&mut self, path: &Path) -> Result<SpriteSheet> {
        if let Some(sheet) = self.cache.get(path) {
            return Ok(sheet.clone());
        }

        let full = self.root.join(path);
        let data = std::fs::read(&full).map_err(|e| Error::sprite_load(&full, e.to_string()))?;
        if data.is_empty() {
            return Err(Error::sprite_load(&full, "image is empty"));
        }

        let sheet = SpriteSheet {
            path: full,
            data: data.into(),
        };
        self.cache.insert(path.to_path_buf(), sheet.clone());
        Ok(sheet)
    }
}

/// What the pet's picture currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    /// One frame of a sprite strip.
    Sprite {
        sheet: PathBuf,
        frame: u32,
        frame_count: u32,
    },
    /// The static fallback image.
    Placeholder { image: PathBuf },
    /// Nothing could be loaded.
    Blank,
}

/// Tracks the active animation strip and frame.
#[derive(Debug)]
pub struct Animator<L = FsSpriteLoader> {
    table: AnimationTable,
    loader: L,
    placeholder: PathBuf,
    state: Option<PetState>,
    descriptor: Option<SpriteDescriptor>,
    frame: u32,
    playing: bool,
    view: View,
}

impl<L: SpriteLoader> Animator<L> {
    /// Create an animator showing nothing until the first [`select`](Self::select).
    pub fn new(table: AnimationTable, loader: L) -> Self {
        Self {
            table,
            loader,
            placeholder: PathBuf::from(PLACEHOLDER_IMAGE),
            state: None,
            descriptor: None,
            frame: 0,
            playing: false,
            view: View::Blank,
        }
    }

    /// Switch to the strip for `state`, restarting at frame 0.
    ///
    /// Returns `false` without doing anything if `state` is already playing.
    pub fn select(&mut self, state: PetState) -> bool {
        if self.state == Some(state) && self.playing {
            return false;
        }
        self.state = Some(state);

        let Some(descriptor) = self.table.resolve(state).cloned() else {
            warn!(%state, "no animation for state");
            self.show_placeholder();
            return true;
        };

        match self.loader.load(&descriptor.sheet) {
            Ok(sheet) => {
                debug!(%state, sheet = %sheet.path.display(), "animation started");
                self.frame = 0;
                self.playing = true;
                self.view = View::Sprite {
                    sheet: sheet.path,
                    frame: 0,
                    frame_count: descriptor.frame_count,
                };
                self.descriptor = Some(descriptor);
            }
            Err(e) => {
                warn!(error = %e, %state, "could not load animation");
                self.show_placeholder();
            }
        }
        true
    }

    fn show_placeholder(&mut self) {
        self.playing = false;
        self.descriptor = None;
        self.frame = 0;
        self.view = match self.loader.load(&self.placeholder) {
            Ok(image) => View::Placeholder { image: image.path },
            Err(e) => {
                warn!(error = %e, "could not load placeholder image");
                View::Blank
            }
        };
    }

    /// Step to the next frame.
    ///
    /// Looping strips wrap to frame 0; others stop on their last frame.
    /// Returns whether the shown frame changed.
    pub fn advance(&mut self) -> bool {
        let (frame_count, looping) = match &self.descriptor {
            Some(d) if self.playing => (d.frame_count, d.looping),
            _ => return false,
        };

        let next = self.frame + 1;
        if next >= frame_count {
            if !looping {
                self.playing = false;
                return false;
            }
            self.frame = 0;
        } else {
            self.frame = next;
        }

        if let View::Sprite { frame, .. } = &mut self.view {
            *frame = self.frame;
        }
        true
    }

    /// How long until the next frame, or `None` when nothing is playing.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.descriptor
            .as_ref()
            .filter(|_| self.playing)
            .map(|d| d.frame_duration)
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn state(&self) -> Option<PetState> {
        self.state
    }

    pub fn view(&self) -> &View {
        &self.view
    }
}
