//! Animation clock for the clips of the loaded model
//!
//! The controller owns the playing set and each clip's local time. The
//! renderer only seeks its players to these times, so the clock can be
//! tested without a scene.

use thiserror::Error;

/// Shown in place of the clip list when a model has no animations
pub const NO_ANIMATIONS: &str = "No animations in this model";

#[derive(Error, Debug, PartialEq)]
pub enum AnimationError {
    #[error("unknown animation clip `{0}`")]
    UnknownClip(String),
}

/// Playback state of one clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipState {
    pub name: String,
    /// Clip length in seconds. `None` or zero means the time never wraps.
    pub duration: Option<f32>,
    pub playing: bool,
    /// Local time in seconds
    pub time: f32,
}

#[derive(Debug, Clone, Default)]
pub struct AnimationController {
    clips: Vec<ClipState>,
}

impl AnimationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, duration)` pairs, nothing playing
    pub fn from_clips<S: Into<String>>(clips: impl IntoIterator<Item = (S, Option<f32>)>) -> Self {
        let clips = clips
            .into_iter()
            .map(|(name, duration)| ClipState {
                name: name.into(),
                duration,
                playing: false,
                time: 0.0,
            })
            .collect();
        Self { clips }
    }

    /// Discard every clip and its state (model switch)
    pub fn reset(&mut self) {
        self.clips.clear();
    }

    pub fn clips(&self) -> &[ClipState] {
        &self.clips
    }

    pub fn clip_names(&self) -> Vec<&str> {
        self.clips.iter().map(|clip| clip.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Message for the animation panel, `None` when clips exist
    pub fn status_message(&self) -> Option<&'static str> {
        self.is_empty().then_some(NO_ANIMATIONS)
    }

    pub fn active(&self) -> Vec<&str> {
        self.clips
            .iter()
            .filter(|clip| clip.playing)
            .map(|clip| clip.name.as_str())
            .collect()
    }

    pub fn is_playing(&self, name: &str) -> bool {
        self.clip(name).is_some_and(|clip| clip.playing)
    }

    /// Local time of a clip, `None` for unknown names
    pub fn time_of(&self, name: &str) -> Option<f32> {
        self.clip(name).map(|clip| clip.time)
    }

    fn clip(&self, name: &str) -> Option<&ClipState> {
        self.clips.iter().find(|clip| clip.name == name)
    }

    fn index_of(&self, name: &str) -> Result<usize, AnimationError> {
        self.clips
            .iter()
            .position(|clip| clip.name == name)
            .ok_or_else(|| AnimationError::UnknownClip(name.to_string()))
    }

    fn halt(clip: &mut ClipState) {
        clip.playing = false;
        clip.time = 0.0;
    }

    /// Play `name` from the start and stop every other clip
    pub fn start(&mut self, name: &str) -> Result<(), AnimationError> {
        let index = self.index_of(name)?;
        for (i, clip) in self.clips.iter_mut().enumerate() {
            if i == index {
                clip.playing = true;
                clip.time = 0.0;
            } else {
                Self::halt(clip);
            }
        }
        Ok(())
    }

    pub fn stop(&mut self, name: &str) -> Result<(), AnimationError> {
        let index = self.index_of(name)?;
        Self::halt(&mut self.clips[index]);
        Ok(())
    }

    /// Checkbox path: checking starts the clip, unchecking stops it
    pub fn set_playing(&mut self, name: &str, playing: bool) -> Result<(), AnimationError> {
        if playing {
            self.start(name)
        } else {
            self.stop(name)
        }
    }

    /// Stop everything, then play every selected clip together.
    ///
    /// Unknown names are reported after the known ones have started.
    pub fn play_selection(&mut self, names: &[&str]) -> Result<(), AnimationError> {
        let mut unknown = None;
        self.stop_all();
        for name in names {
            match self.index_of(name) {
                Ok(index) => self.clips[index].playing = true,
                Err(err) => unknown = unknown.or(Some(err)),
            }
        }
        unknown.map_or(Ok(()), Err)
    }

    pub fn stop_all(&mut self) {
        for clip in &mut self.clips {
            Self::halt(clip);
        }
    }

    /// Advance every playing clip by `delta` seconds, wrapping at its duration
    pub fn tick(&mut self, delta: f32) {
        if !delta.is_finite() || delta <= 0.0 {
            return;
        }
        for clip in self.clips.iter_mut().filter(|clip| clip.playing) {
            clip.time += delta;
            if let Some(duration) = clip.duration.filter(|d| *d > 0.0) {
                clip.time = clip.time.rem_euclid(duration);
            }
        }
    }
}
