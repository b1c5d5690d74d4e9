//! Playlist navigation
//!
//! Resolves which library index plays next or previous, with optional
//! shuffle-with-history. Indices refer to the fixed library list.

use crate::types::RepeatMode;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::VecDeque;
use tracing::debug;

/// What the transport should do after a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTarget {
    /// Start the track at this library index
    Play(usize),

    /// Nothing left to play
    Stop,
}

/// Navigation state over a library of `len` tracks
///
/// With shuffle off the queue and history are empty. With shuffle on the
/// current index is never in the queue and history holds no consecutive
/// duplicates.
pub struct PlaylistNavigator {
    len: usize,
    current: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    queue: VecDeque<usize>,
    history: Vec<usize>,
    rng: StdRng,
}

impl PlaylistNavigator {
    /// Create a navigator seeded from the OS
    pub fn new(len: usize) -> Self {
        Self::with_rng(len, StdRng::from_entropy())
    }

    /// Create a navigator with a given RNG
    pub fn with_rng(len: usize, rng: StdRng) -> Self {
        Self {
            len,
            current: None,
            shuffle: false,
            repeat: RepeatMode::Off,
            queue: VecDeque::new(),
            history: Vec::new(),
            rng,
        }
    }

    /// Resolve the track after the current one
    ///
    /// In shuffle mode this consumes the queue front. An exhausted queue
    /// yields `Stop`; it is not refilled.
    pub fn resolve_next(&mut self) -> NavigationTarget {
        if self.len == 0 {
            return NavigationTarget::Stop;
        }

        if self.shuffle {
            let Some(index) = self.queue.pop_front() else {
                debug!("Shuffle queue exhausted");
                return NavigationTarget::Stop;
            };
            self.push_history(index);
            return NavigationTarget::Play(index);
        }

        let next = self.current.map_or(0, |current| current + 1);
        if next < self.len {
            NavigationTarget::Play(next)
        } else {
            NavigationTarget::Stop
        }
    }

    /// Resolve the track before the current one
    ///
    /// In shuffle mode the history top goes back to the queue front and the
    /// new top is returned. A history of one entry returns the current track.
    pub fn resolve_previous(&mut self) -> NavigationTarget {
        if self.len == 0 {
            return NavigationTarget::Stop;
        }

        if self.shuffle {
            if self.history.len() > 1 {
                if let Some(popped) = self.history.pop() {
                    self.queue.push_front(popped);
                }
                if let Some(&top) = self.history.last() {
                    return NavigationTarget::Play(top);
                }
            }
            return self.current.map_or(NavigationTarget::Stop, NavigationTarget::Play);
        }

        match self.current {
            Some(current) => NavigationTarget::Play(current.saturating_sub(1)),
            None => NavigationTarget::Stop,
        }
    }

    /// Refill the shuffle queue with every index except `anchor`
    ///
    /// History restarts from the anchor.
    pub fn regenerate_shuffle_queue(&mut self, anchor: Option<usize>) {
        let mut indices: Vec<usize> = (0..self.len).filter(|&i| Some(i) != anchor).collect();
        indices.shuffle(&mut self.rng);

        self.queue = indices.into();
        self.history = anchor.into_iter().collect();
        debug!("Shuffle queue regenerated ({} tracks)", self.queue.len());
    }

    /// Bookkeeping for a track picked by the user
    pub fn on_manual_play(&mut self, index: usize) {
        self.current = Some(index);
        if self.shuffle {
            self.regenerate_shuffle_queue(Some(index));
        }
    }

    /// Bookkeeping for every track that starts playing
    pub fn record_play(&mut self, index: usize) {
        self.current = Some(index);
        if self.shuffle {
            self.queue.retain(|&i| i != index);
            self.push_history(index);
        }
    }

    fn push_history(&mut self, index: usize) {
        if self.history.last() != Some(&index) {
            self.history.push(index);
        }
    }

    /// Turn shuffle on (regenerating around the current track) or off
    pub fn set_shuffle(&mut self, enabled: bool) {
        if self.shuffle == enabled {
            return;
        }
        self.shuffle = enabled;
        if enabled {
            self.regenerate_shuffle_queue(self.current);
        } else {
            self.queue.clear();
            self.history.clear();
        }
        debug!("Shuffle {}", if enabled { "on" } else { "off" });
    }

    /// Set the repeat mode
    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    /// Current library index
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Whether shuffle is on
    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    /// Repeat mode
    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    /// Unplayed indices in shuffle order
    pub fn queue(&self) -> &VecDeque<usize> {
        &self.queue
    }

    /// Indices played in this shuffle session, oldest first
    pub fn history(&self) -> &[usize] {
        &self.history
    }

    /// Number of tracks in the library
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
