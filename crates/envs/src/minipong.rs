//! A tiny deterministic Pong-like simulator.
//!
//! The player controls a paddle on the left edge of a square grid; the ball
//! bounces off the other three walls. Each episode opens with an intro of
//! blank frames during which nothing moves. Missing the ball ends the
//! episode.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env::{Environment, Step};

/// Actions: 0 = stay, 1 = up, 2 = down, 3 = stay.
pub const NUM_ACTIONS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PongError {
    #[error("action {0} outside action space of size {NUM_ACTIONS}")]
    InvalidAction(usize),
    #[error("episode is over, reset required")]
    EpisodeOver,
    #[error("invalid pong config: {0}")]
    Config(&'static str),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PongConfig {
    /// Side length of the square frame in pixels.
    pub size: usize,
    pub paddle_height: usize,
    /// Blank frames at the start of every episode.
    pub intro_frames: usize,
    pub seed: u64,
}

impl Default for PongConfig {
    fn default() -> Self {
        Self { size: 16, paddle_height: 4, intro_frames: 96, seed: 0 }
    }
}

impl PongConfig {
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self { seed, ..Self::default() }
    }
}

/// Single-channel frame, row-major, values in {0, 1}.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub size: usize,
    pub pixels: Vec<f32>,
}

impl Frame {
    #[must_use]
    pub fn blank(size: usize) -> Self {
        Self { size, pixels: vec![0.0; size * size] }
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.pixels[y * self.size + x]
    }

    fn set(&mut self, x: usize, y: usize) {
        self.pixels[y * self.size + x] = 1.0;
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PongInfo {
    /// Steps since the last reset.
    pub frame_index: usize,
    /// Returned balls this episode.
    pub score: u32,
}

pub struct MiniPong {
    config: PongConfig,
    rng: fastrand::Rng,
    ball: (i64, i64),
    vel: (i64, i64),
    paddle: i64,
    frame_index: usize,
    score: u32,
    over: bool,
}

impl MiniPong {
    /// Creates a new game. Call [`Environment::reset`] before stepping.
    ///
    /// # Errors
    ///
    /// Rejects frames smaller than 8 pixels and paddles that do not fit.
    pub fn new(config: PongConfig) -> Result<Self, PongError> {
        if config.size < 8 {
            return Err(PongError::Config("size must be at least 8"));
        }
        if config.paddle_height == 0 || config.paddle_height >= config.size {
            return Err(PongError::Config("paddle must fit inside the frame"));
        }
        let rng = fastrand::Rng::with_seed(config.seed);
        Ok(Self {
            config,
            rng,
            ball: (0, 0),
            vel: (0, 0),
            paddle: 0,
            frame_index: 0,
            score: 0,
            over: true,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PongConfig {
        &self.config
    }

    fn size(&self) -> i64 {
        self.config.size as i64
    }

    fn in_intro(&self) -> bool {
        self.frame_index < self.config.intro_frames
    }

    fn info(&self) -> PongInfo {
        PongInfo { frame_index: self.frame_index, score: self.score }
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::blank(self.config.size);
        if self.in_intro() {
            return frame;
        }
        for y in self.paddle..self.paddle + self.config.paddle_height as i64 {
            frame.set(0, y as usize);
        }
        frame.set(self.ball.0 as usize, self.ball.1 as usize);
        frame
    }

    fn move_paddle(&mut self, action: usize) {
        let max = self.size() - self.config.paddle_height as i64;
        match action {
            1 => self.paddle = (self.paddle - 1).max(0),
            2 => self.paddle = (self.paddle + 1).min(max),
            _ => {}
        }
    }

    /// Advance the ball one cell; returns `(reward, done)`.
    fn advance_ball(&mut self) -> (f32, bool) {
        let last = self.size() - 1;
        let (mut x, mut y) = (self.ball.0 + self.vel.0, self.ball.1 + self.vel.1);
        if y < 0 || y > last {
            self.vel.1 = -self.vel.1;
            y = if y < 0 { -y } else { 2 * last - y };
        }
        if x > last {
            self.vel.0 = -self.vel.0;
            x = 2 * last - x;
        }
        let mut outcome = (0.0, false);
        if x < 1 {
            let top = self.paddle;
            let bottom = self.paddle + self.config.paddle_height as i64;
            if (top..bottom).contains(&y) {
                self.vel.0 = -self.vel.0;
                x = 2 - x;
                self.score += 1;
                outcome = (1.0, false);
            } else {
                x = 0;
                outcome = (-1.0, true);
            }
        }
        self.ball = (x, y);
        outcome
    }
}

impl Environment for MiniPong {
    type Observation = Frame;
    type Info = PongInfo;
    type Error = PongError;

    fn reset(&mut self) -> Result<Frame, PongError> {
        let centre = self.size() / 2;
        self.ball = (centre, centre);
        // Served away from the player so no episode can end inside the intro
        // plus a short warm-up.
        self.vel = (1, if self.rng.bool() { 1 } else { -1 });
        self.paddle = centre - self.config.paddle_height as i64 / 2;
        self.frame_index = 0;
        self.score = 0;
        self.over = false;
        Ok(self.render())
    }

    fn step(&mut self, action: usize) -> Result<Step<Frame, PongInfo>, PongError> {
        if action >= NUM_ACTIONS {
            return Err(PongError::InvalidAction(action));
        }
        if self.over {
            return Err(PongError::EpisodeOver);
        }
        let (reward, done) = if self.in_intro() {
            (0.0, false)
        } else {
            self.move_paddle(action);
            self.advance_ball()
        };
        self.frame_index += 1;
        self.over = done;
        Ok(Step { observation: self.render(), reward, done, info: self.info() })
    }

    fn action_space(&self) -> usize {
        NUM_ACTIONS
    }
}
